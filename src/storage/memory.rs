//! 进程内存存储，不落盘，适合测试和短生命周期使用

use crate::error::Result;
use crate::storage::Storage;
use crate::storage::address::{Address, AddressPolicy, MirrorPolicy};
use crate::storage::record::{Conversations, Data, Field, RecordTable, Records};
use crate::storage::state::{PlainStates, StatePolicy};
use async_trait::async_trait;
use std::sync::Arc;

/// 进程内存 FSM 存储，与 [`FileStorage`](crate::storage::FileStorage) 共用同一套寻址和清理规则
///
/// # 示例
///
/// ```rust
/// use fsm_storage::storage::{Address, MemoryStorage, Storage};
///
/// # #[tokio::main]
/// # async fn main() -> fsm_storage::error::Result<()> {
/// let storage = MemoryStorage::new();
/// let addr = Address::new(100, 7);
/// storage.set_state(&addr, Some("collecting_name")).await?;
/// assert_eq!(storage.get_state(&addr, None).await?.as_deref(), Some("collecting_name"));
/// # Ok(())
/// # }
/// ```
pub struct MemoryStorage {
    records: Records,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_policies(None, MirrorPolicy, PlainStates)
    }

    pub fn with_policies(
        default_state: Option<String>,
        addresses: impl AddressPolicy + 'static,
        states: impl StatePolicy + 'static,
    ) -> Self {
        let addresses: Arc<dyn AddressPolicy> = Arc::new(addresses);
        let states: Arc<dyn StatePolicy> = Arc::new(states);
        Self {
            records: Records::new(
                RecordTable::new(Conversations::new(), default_state),
                addresses,
                states,
            ),
        }
    }

    pub async fn snapshot(&self) -> Conversations {
        self.records.snapshot().await
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_state(&self, address: &Address, default: Option<&str>) -> Result<Option<String>> {
        self.records.get_state(address, default).await
    }

    async fn set_state(&self, address: &Address, state: Option<&str>) -> Result<()> {
        self.records.set_state(address, state).await
    }

    async fn get_data(&self, address: &Address) -> Result<Data> {
        self.records.get_field(address, Field::Data).await
    }

    async fn set_data(&self, address: &Address, data: Data) -> Result<()> {
        self.records.set_field(address, Field::Data, data).await
    }

    async fn update_data(&self, address: &Address, data: Data) -> Result<()> {
        self.records.update_field(address, Field::Data, data).await
    }

    async fn get_bucket(&self, address: &Address) -> Result<Data> {
        self.records.get_field(address, Field::Bucket).await
    }

    async fn set_bucket(&self, address: &Address, bucket: Data) -> Result<()> {
        self.records.set_field(address, Field::Bucket, bucket).await
    }

    async fn update_bucket(&self, address: &Address, bucket: Data) -> Result<()> {
        self.records.update_field(address, Field::Bucket, bucket).await
    }

    async fn reset_state(&self, address: &Address, with_data: bool) -> Result<()> {
        self.records.reset(address, with_data).await
    }

    async fn close(&self) -> Result<()> {
        self.records.clear().await;
        Ok(())
    }

    fn has_bucket(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AddressError, StorageError};
    use serde_json::json;

    #[tokio::test]
    async fn test_finish_clears_state_and_data() {
        let storage = MemoryStorage::new();
        let addr = Address::new("100", "7");
        storage.set_state(&addr, Some("collecting_name")).await.unwrap();
        storage
            .update_data_with(&addr, Data::new(), vec![("name".into(), json!("Ann"))])
            .await
            .unwrap();
        assert_eq!(storage.get_data(&addr).await.unwrap()["name"], json!("Ann"));

        storage.finish(&addr).await.unwrap();
        assert_eq!(storage.get_state(&addr, None).await.unwrap(), None);
        assert!(storage.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_helpers() {
        let storage = MemoryStorage::new();
        let addr = Address::chat(3);
        storage
            .update_bucket(&addr, json!({"b": 1}).as_object().cloned().unwrap())
            .await
            .unwrap();
        storage
            .update_data(&addr, json!({"d": 1}).as_object().cloned().unwrap())
            .await
            .unwrap();

        storage.reset_data(&addr).await.unwrap();
        assert!(storage.get_data(&addr).await.unwrap().is_empty());
        assert_eq!(storage.snapshot().await.len(), 1, "bucket 仍非空");

        storage.reset_bucket(&addr).await.unwrap();
        assert!(storage.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_principals_are_isolated_within_conversation() {
        let storage = MemoryStorage::new();
        storage
            .set_state(&Address::new(1, "alice"), Some("a"))
            .await
            .unwrap();
        storage
            .set_state(&Address::new(1, "bob"), Some("b"))
            .await
            .unwrap();

        storage.finish(&Address::new(1, "alice")).await.unwrap();
        assert_eq!(
            storage
                .get_state(&Address::new(1, "bob"), None)
                .await
                .unwrap()
                .as_deref(),
            Some("b")
        );
        assert_eq!(storage.snapshot().await["1"].len(), 1);
    }

    #[tokio::test]
    async fn test_reads_and_empty_writes_leave_no_trace() {
        let storage = MemoryStorage::new();
        let addr = Address::new(9, 9);

        storage.get_state(&addr, Some("x")).await.unwrap();
        storage.get_data(&addr).await.unwrap();
        storage.get_bucket(&addr).await.unwrap();
        storage.set_state(&addr, None).await.unwrap();
        storage.set_data(&addr, Data::new()).await.unwrap();
        assert!(storage.snapshot().await.is_empty());

        storage.set_state(&addr, Some("s")).await.unwrap();
        assert_eq!(storage.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_merge_on_fresh_address_is_dropped() {
        let storage = MemoryStorage::new();
        let addr = Address::new(100, 7);
        storage.update_data(&addr, Data::new()).await.unwrap();
        storage.update_bucket_with(&addr, Data::new(), Vec::new()).await.unwrap();
        assert!(storage.snapshot().await.is_empty());

        // 已有内容的记录不受空合并影响
        storage.set_state(&addr, Some("s")).await.unwrap();
        storage.update_data(&addr, Data::new()).await.unwrap();
        assert_eq!(storage.snapshot().await["100"].len(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_address_is_reported() {
        let storage = MemoryStorage::new();
        let err = storage.get_data(&Address::default()).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Address(AddressError::Unresolvable)
        ));
    }

    #[tokio::test]
    async fn test_close_clears_and_revivifies() {
        let storage = MemoryStorage::with_policies(Some("idle".into()), MirrorPolicy, PlainStates);
        let addr = Address::new(1, 1);
        storage.set_state(&addr, Some("busy")).await.unwrap();

        storage.close().await.unwrap();
        assert!(storage.snapshot().await.is_empty());
        assert_eq!(
            storage.get_state(&addr, None).await.unwrap().as_deref(),
            Some("idle")
        );
    }
}

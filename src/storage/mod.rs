//! FSM 状态存储
//!
//! 以 `(chat, user)` 为地址，为每个地址保存三样东西：
//!
//! | 字段 | 类型 | 说明 |
//! |------|------|------|
//! | `state` | `Option<String>` | 有限状态机标签，由宿主框架解释 |
//! | `data` | JSON 对象 | 当前流程收集的数据 |
//! | `bucket` | JSON 对象 | 与 `data` 平行的辅助数据 |
//!
//! ## 内置实现
//!
//! - [`MemoryStorage`]：进程内存，重启即清空，适合测试
//! - [`FileStorage`]：整表 JSON 文件持久化，每次写操作后全量落盘
//!
//! ## 快速上手
//!
//! ```rust,no_run
//! use fsm_storage::storage::{Address, FileStorage, Storage};
//! use serde_json::json;
//!
//! # async fn example() -> fsm_storage::error::Result<()> {
//! let storage = FileStorage::new("~/.fsm-storage/storage_data.json");
//! let addr = Address::new(100, 7);
//!
//! storage.set_state(&addr, Some("collecting_name")).await?;
//! storage.update_data(&addr, json!({"step": 1}).as_object().cloned().unwrap_or_default()).await?;
//! assert_eq!(storage.get_state(&addr, None).await?.as_deref(), Some("collecting_name"));
//!
//! storage.finish(&addr).await?;
//! storage.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod file;
pub mod memory;
pub mod record;
pub mod state;

pub use address::{Address, AddressKey, AddressPolicy, FallbackPolicy, Identifier, MirrorPolicy};
pub use file::{FileStorage, FileStorageBuilder};
pub use memory::MemoryStorage;
pub use record::{Conversation, Conversations, Data, Record};
pub use state::{PlainStates, StatePolicy, StatesGroup};

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// FSM 存储的统一接口
///
/// 所有读操作返回独立副本，调用方修改返回值不会影响存储内部状态。
#[async_trait]
pub trait Storage: Send + Sync {
    /// 读取状态；从未写入过状态时返回经过状态策略解析的 `default`
    async fn get_state(&self, address: &Address, default: Option<&str>) -> Result<Option<String>>;

    /// 写入状态（`None` 表示清空）
    async fn set_state(&self, address: &Address, state: Option<&str>) -> Result<()>;

    async fn get_data(&self, address: &Address) -> Result<Data>;

    /// 整体替换 data，记录变为空白时自动清理
    async fn set_data(&self, address: &Address, data: Data) -> Result<()>;

    /// 合并到现有 data，同名键后者覆盖
    async fn update_data(&self, address: &Address, data: Data) -> Result<()>;

    async fn get_bucket(&self, address: &Address) -> Result<Data>;

    /// 整体替换 bucket，记录变为空白时自动清理
    async fn set_bucket(&self, address: &Address, bucket: Data) -> Result<()>;

    /// 合并到现有 bucket，同名键后者覆盖
    async fn update_bucket(&self, address: &Address, bucket: Data) -> Result<()>;

    /// 清空状态；`with_data` 为 true 时同时清空 data
    async fn reset_state(&self, address: &Address, with_data: bool) -> Result<()>;

    /// 写出最后一次快照并释放内存数据
    async fn close(&self) -> Result<()>;

    /// 是否支持 bucket
    fn has_bucket(&self) -> bool {
        false
    }

    async fn wait_closed(&self) -> Result<()> {
        Ok(())
    }

    /// 合并 `data` 后再依次合并额外键值对
    async fn update_data_with(
        &self,
        address: &Address,
        data: Data,
        extra: Vec<(String, Value)>,
    ) -> Result<()> {
        self.update_data(address, merge_pairs(data, extra)).await
    }

    async fn update_bucket_with(
        &self,
        address: &Address,
        bucket: Data,
        extra: Vec<(String, Value)>,
    ) -> Result<()> {
        self.update_bucket(address, merge_pairs(bucket, extra)).await
    }

    async fn reset_data(&self, address: &Address) -> Result<()> {
        self.set_data(address, Data::new()).await
    }

    async fn reset_bucket(&self, address: &Address) -> Result<()> {
        self.set_bucket(address, Data::new()).await
    }

    /// 结束当前流程：清空状态和数据
    async fn finish(&self, address: &Address) -> Result<()> {
        self.reset_state(address, true).await
    }
}

fn merge_pairs(mut data: Data, extra: Vec<(String, Value)>) -> Data {
    data.extend(extra);
    data
}

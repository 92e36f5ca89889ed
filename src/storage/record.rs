//! 按地址组织的记录表
//!
//! 两级映射 `chat → user → Record`：
//!
//! - **自动创建**：任何操作访问一个不存在的地址时，先插入一条空白记录
//! - **自动清理**：记录回到空白形态后立即删除，会话随之变空时也一并删除
//!
//! 因此表中可见的每条记录都非空白，每个会话都至少有一条记录。

use crate::error::Result;
use crate::storage::address::{Address, AddressKey, AddressPolicy};
use crate::storage::state::StatePolicy;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// 任意 JSON 键值数据（`data` 与 `bucket` 共用）
pub type Data = Map<String, Value>;

/// 单个会话：user → Record
pub type Conversation = HashMap<String, Record>;

/// 整个存储：chat → Conversation
pub type Conversations = HashMap<String, Conversation>;

// ── Record ───────────────────────────────────────────────────────────────────

/// 单个地址上的状态、数据与 bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// 外层 `None`：从未写入状态；`Some(None)`：状态被显式清空
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub state: Option<Option<String>>,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub bucket: Data,
}

impl Record {
    /// 当前状态标签（未写入与已清空都返回 `None`）
    pub fn state(&self) -> Option<&str> {
        self.state.as_ref().and_then(|s| s.as_deref())
    }

    pub fn field(&self, field: Field) -> &Data {
        match field {
            Field::Data => &self.data,
            Field::Bucket => &self.bucket,
        }
    }

    pub fn field_mut(&mut self, field: Field) -> &mut Data {
        match field {
            Field::Data => &mut self.data,
            Field::Bucket => &mut self.bucket,
        }
    }
}

// 字段存在即为 Some，哪怕值是 null
fn deserialize_present<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// 记录中的两个键值字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Data,
    Bucket,
}

impl Field {
    fn as_str(&self) -> &'static str {
        match self {
            Field::Data => "data",
            Field::Bucket => "bucket",
        }
    }
}

/// 记录是否处于空白形态：无状态（或等于配置的默认状态）且两个字段都为空
pub fn is_blank(record: &Record, default_state: Option<&str>) -> bool {
    let state_is_default = match record.state() {
        None => true,
        Some(label) => default_state == Some(label),
    };
    state_is_default && record.data.is_empty() && record.bucket.is_empty()
}

// ── RecordTable ──────────────────────────────────────────────────────────────

/// 同步的记录表，只负责创建/清理规则，不涉及锁与持久化
#[derive(Debug, Default)]
pub struct RecordTable {
    conversations: Conversations,
    default_state: Option<String>,
}

impl RecordTable {
    pub fn new(conversations: Conversations, default_state: Option<String>) -> Self {
        Self {
            conversations,
            default_state,
        }
    }

    /// 新建记录的初始形态
    pub fn blank(&self) -> Record {
        Record {
            state: self.default_state.clone().map(Some),
            ..Record::default()
        }
    }

    /// 取得地址对应的记录，不存在时先创建会话和空白记录
    pub fn vivify(&mut self, key: &AddressKey) -> &mut Record {
        let blank = self.blank();
        self.conversations
            .entry(key.chat.clone())
            .or_default()
            .entry(key.user.clone())
            .or_insert(blank)
    }

    pub fn get(&self, key: &AddressKey) -> Option<&Record> {
        self.conversations
            .get(&key.chat)
            .and_then(|c| c.get(&key.user))
    }

    /// 删除空白记录及随之变空的会话，返回记录是否被删除
    pub fn cleanup(&mut self, key: &AddressKey) -> bool {
        self.vivify(key);
        let Some(conversation) = self.conversations.get_mut(&key.chat) else {
            return false;
        };
        let removed = conversation
            .get(&key.user)
            .is_some_and(|r| is_blank(r, self.default_state.as_deref()));
        if removed {
            conversation.remove(&key.user);
        }
        if conversation.is_empty() {
            self.conversations.remove(&key.chat);
        }
        removed
    }

    /// 整表清理（加载外部文件后使用），返回被丢弃的记录数
    pub fn normalize(&mut self) -> usize {
        let default_state = self.default_state.clone();
        let mut dropped = 0;
        self.conversations.retain(|_, conversation| {
            let before = conversation.len();
            conversation.retain(|_, record| !is_blank(record, default_state.as_deref()));
            dropped += before - conversation.len();
            !conversation.is_empty()
        });
        dropped
    }

    pub fn conversations(&self) -> &Conversations {
        &self.conversations
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    pub fn record_count(&self) -> usize {
        self.conversations.values().map(HashMap::len).sum()
    }

    pub fn clear(&mut self) {
        self.conversations.clear();
    }
}

// ── Records ──────────────────────────────────────────────────────────────────

/// 带锁的记录表 + 注入的地址/状态策略，供各存储实现共用
///
/// 每个操作在一次写锁内完成"解析地址 → 读写 → 清理"，中间没有挂起点，
/// 对其他任务而言是原子的。持久化由调用方在操作完成后自行触发。
pub(crate) struct Records {
    table: RwLock<RecordTable>,
    addresses: Arc<dyn AddressPolicy>,
    states: Arc<dyn StatePolicy>,
}

impl Records {
    pub(crate) fn new(
        table: RecordTable,
        addresses: Arc<dyn AddressPolicy>,
        states: Arc<dyn StatePolicy>,
    ) -> Self {
        Self {
            table: RwLock::new(table),
            addresses,
            states,
        }
    }

    pub(crate) async fn get_state(
        &self,
        address: &Address,
        default: Option<&str>,
    ) -> Result<Option<String>> {
        let key = self.addresses.resolve(address)?;
        let state = {
            let mut table = self.table.write().await;
            let state = table.vivify(&key).state.clone();
            // 读操作不留下空白记录
            table.cleanup(&key);
            state
        };
        Ok(match state {
            Some(state) => state,
            None => self.states.resolve_state(default),
        })
    }

    pub(crate) async fn set_state(&self, address: &Address, state: Option<&str>) -> Result<()> {
        let key = self.addresses.resolve(address)?;
        let state = self.states.resolve_state(state);
        debug!(chat = %key.chat, user = %key.user, state = ?state, "set_state");
        let mut table = self.table.write().await;
        table.vivify(&key).state = Some(state);
        // 只有写入空状态时才可能删除记录
        table.cleanup(&key);
        Ok(())
    }

    pub(crate) async fn get_field(&self, address: &Address, field: Field) -> Result<Data> {
        let key = self.addresses.resolve(address)?;
        let mut table = self.table.write().await;
        let value = table.vivify(&key).field(field).clone();
        table.cleanup(&key);
        Ok(value)
    }

    pub(crate) async fn set_field(
        &self,
        address: &Address,
        field: Field,
        value: Data,
    ) -> Result<()> {
        let key = self.addresses.resolve(address)?;
        debug!(
            chat = %key.chat,
            user = %key.user,
            field = field.as_str(),
            keys = value.len(),
            "set"
        );
        let mut table = self.table.write().await;
        *table.vivify(&key).field_mut(field) = value;
        table.cleanup(&key);
        Ok(())
    }

    pub(crate) async fn update_field(
        &self,
        address: &Address,
        field: Field,
        value: Data,
    ) -> Result<()> {
        let key = self.addresses.resolve(address)?;
        debug!(
            chat = %key.chat,
            user = %key.user,
            field = field.as_str(),
            keys = value.len(),
            "update"
        );
        let mut table = self.table.write().await;
        table.vivify(&key).field_mut(field).extend(value);
        // 空合并不能留下空白记录
        table.cleanup(&key);
        Ok(())
    }

    pub(crate) async fn reset(&self, address: &Address, with_data: bool) -> Result<()> {
        let key = self.addresses.resolve(address)?;
        let cleared = self.states.resolve_state(None);
        let mut table = self.table.write().await;
        let record = table.vivify(&key);
        record.state = Some(cleared);
        if with_data {
            record.data = Data::new();
        }
        let removed = table.cleanup(&key);
        debug!(chat = %key.chat, user = %key.user, with_data, removed, "reset_state");
        Ok(())
    }

    pub(crate) async fn snapshot(&self) -> Conversations {
        self.table.read().await.conversations().clone()
    }

    pub(crate) async fn counts(&self) -> (usize, usize) {
        let table = self.table.read().await;
        (table.conversation_count(), table.record_count())
    }

    /// 在读锁内序列化整表
    pub(crate) async fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        let table = self.table.read().await;
        if pretty {
            serde_json::to_string_pretty(table.conversations())
        } else {
            serde_json::to_string(table.conversations())
        }
    }

    pub(crate) async fn clear(&self) {
        self.table.write().await.clear();
    }
}

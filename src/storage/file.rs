//! 基于 JSON 文件的持久化存储
//!
//! 启动时一次性加载整表，此后每次写操作都在内存中完成，再把整表重新序列化
//! 覆盖写回文件。写文件由一把异步互斥锁串行化，并发的写操作按到达顺序排队，
//! 每次写出的都是拿到锁那一刻的整表快照，文件最终与内存保持一致。
//!
//! 加载失败（文件不存在、无法读取、内容损坏）时从空表开始；持久化失败只记日志，
//! 内存中的数据仍是最新版本，下一次写操作会再次尝试落盘。
//!
//! 存储格式：
//! ```json
//! {
//!   "100": {
//!     "7": { "state": "collecting_name", "data": { "name": "Ann" }, "bucket": {} }
//!   }
//! }
//! ```

use crate::config::StorageConfig;
use crate::error::{PersistError, Result};
use crate::storage::Storage;
use crate::storage::address::{Address, AddressPolicy, FallbackPolicy, MirrorPolicy};
use crate::storage::record::{Conversations, Data, Field, RecordTable, Records};
use crate::storage::state::{PlainStates, StatePolicy};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// 默认文件名，位于可执行文件所在目录
pub const DEFAULT_FILE_NAME: &str = "storage_data.json";

/// 文件持久化的 FSM 存储
pub struct FileStorage {
    path: PathBuf,
    records: Records,
    /// 串行化整表写文件
    write_lock: Mutex<()>,
    pretty: bool,
}

/// [`FileStorage`] 的构建器
pub struct FileStorageBuilder {
    path: PathBuf,
    default_state: Option<String>,
    addresses: Arc<dyn AddressPolicy>,
    states: Arc<dyn StatePolicy>,
    pretty: bool,
}

impl FileStorageBuilder {
    /// 新建记录的初始状态（默认无状态）
    pub fn default_state(mut self, state: impl Into<String>) -> Self {
        self.default_state = Some(state.into());
        self
    }

    /// 缺省 chat/user 的补全策略（默认 [`MirrorPolicy`]）
    pub fn address_policy(mut self, policy: impl AddressPolicy + 'static) -> Self {
        self.addresses = Arc::new(policy);
        self
    }

    /// 状态标签解析策略（默认 [`PlainStates`]）
    pub fn state_policy(mut self, policy: impl StatePolicy + 'static) -> Self {
        self.states = Arc::new(policy);
        self
    }

    /// 是否以缩进格式写文件
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// 加载已有文件并构建存储，自动建父目录
    pub fn build(self) -> FileStorage {
        let path = expand_tilde(&self.path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(path = %parent.display(), "创建存储目录失败: {e}");
        }

        let mut table = RecordTable::new(load_all(&path), self.default_state);
        let dropped = table.normalize();
        if dropped > 0 {
            debug!(path = %path.display(), dropped, "丢弃空白记录");
        }
        info!(
            path = %path.display(),
            conversations = table.conversation_count(),
            records = table.record_count(),
            "🗄️ FileStorage 初始化"
        );

        FileStorage {
            path,
            records: Records::new(table, self.addresses, self.states),
            write_lock: Mutex::new(()),
            pretty: self.pretty,
        }
    }
}

impl FileStorage {
    /// 使用默认策略打开存储文件
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::builder(path).build()
    }

    pub fn builder(path: impl AsRef<Path>) -> FileStorageBuilder {
        FileStorageBuilder {
            path: path.as_ref().to_path_buf(),
            default_state: None,
            addresses: Arc::new(MirrorPolicy),
            states: Arc::new(PlainStates),
            pretty: false,
        }
    }

    /// 按配置构建：配置了默认 chat/user 时使用 [`FallbackPolicy`]
    pub fn from_config(config: &StorageConfig) -> Self {
        let mut builder = Self::builder(&config.path).pretty(config.pretty);
        if let Some(state) = &config.default_state {
            builder = builder.default_state(state.clone());
        }
        if config.default_chat.is_some() || config.default_user.is_some() {
            builder = builder.address_policy(FallbackPolicy::new(
                config.default_chat.clone(),
                config.default_user.clone(),
            ));
        }
        builder.build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn conversation_count(&self) -> usize {
        self.records.counts().await.0
    }

    pub async fn record_count(&self) -> usize {
        self.records.counts().await.1
    }

    /// 整表的独立副本
    pub async fn snapshot(&self) -> Conversations {
        self.records.snapshot().await
    }

    /// 整表写回文件；失败只记录日志
    pub async fn persist(&self) {
        if let Err(e) = self.try_persist().await {
            error!(path = %self.path.display(), "💥 Storage 持久化失败: {e}");
        }
    }

    /// 整表写回文件，并把失败原因返回给调用方
    pub async fn try_persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let json = self
            .records
            .to_json(self.pretty)
            .await
            .map_err(|e| PersistError::SerializationError(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| PersistError::IoError(format!("写入存储文件失败: {e}")))?;
        debug!(path = %self.path.display(), "💾 Storage 已持久化");
        Ok(())
    }
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new(default_path())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_state(&self, address: &Address, default: Option<&str>) -> Result<Option<String>> {
        self.records.get_state(address, default).await
    }

    async fn set_state(&self, address: &Address, state: Option<&str>) -> Result<()> {
        self.records.set_state(address, state).await?;
        self.persist().await;
        Ok(())
    }

    async fn get_data(&self, address: &Address) -> Result<Data> {
        self.records.get_field(address, Field::Data).await
    }

    async fn set_data(&self, address: &Address, data: Data) -> Result<()> {
        self.records.set_field(address, Field::Data, data).await?;
        self.persist().await;
        Ok(())
    }

    async fn update_data(&self, address: &Address, data: Data) -> Result<()> {
        self.records.update_field(address, Field::Data, data).await?;
        self.persist().await;
        Ok(())
    }

    async fn get_bucket(&self, address: &Address) -> Result<Data> {
        self.records.get_field(address, Field::Bucket).await
    }

    async fn set_bucket(&self, address: &Address, bucket: Data) -> Result<()> {
        self.records.set_field(address, Field::Bucket, bucket).await?;
        self.persist().await;
        Ok(())
    }

    async fn update_bucket(&self, address: &Address, bucket: Data) -> Result<()> {
        self.records.update_field(address, Field::Bucket, bucket).await?;
        self.persist().await;
        Ok(())
    }

    // 状态与数据在同一次写锁内清空，只落盘一次
    async fn reset_state(&self, address: &Address, with_data: bool) -> Result<()> {
        self.records.reset(address, with_data).await?;
        self.persist().await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.persist().await;
        self.records.clear().await;
        info!(path = %self.path.display(), "🔒 FileStorage 已关闭");
        Ok(())
    }

    fn has_bucket(&self) -> bool {
        true
    }
}

// ── 私有工具函数 ──────────────────────────────────────────────────────────────

fn load_all(path: &Path) -> Conversations {
    if !path.exists() {
        return Conversations::new();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            error!(path = %path.display(), "读取存储文件失败，从空状态开始: {e}");
            return Conversations::new();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(path = %path.display(), "存储文件解析失败，从空状态开始: {e}");
        Conversations::new()
    })
}

/// 可执行文件同目录下的 [`DEFAULT_FILE_NAME`]
pub fn default_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_NAME))
}

pub(crate) fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/")
        && let Some(home) = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())
    {
        return PathBuf::from(home).join(rest);
    }
    path.to_path_buf()
}

use std::fmt;

/// 状态存储的统一错误类型
#[derive(Debug)]
pub enum StorageError {
    /// 持久化错误（序列化 / 写文件）
    Persist(PersistError),
    /// 地址解析错误
    Address(AddressError),
    /// 配置错误
    Config(ConfigError),
}

/// 持久化错误
#[derive(Debug)]
pub enum PersistError {
    /// 读写存储文件失败
    IoError(String),
    /// 序列化/反序列化失败
    SerializationError(String),
}

/// 地址解析错误
#[derive(Debug)]
pub enum AddressError {
    /// chat 与 user 均未提供，且地址策略没有可用的默认值
    Unresolvable,
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),
    /// 配置解析失败
    ParseFailed(String),
    /// 配置值无效
    InvalidValue { field: String, message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Persist(e) => write!(f, "Persist Error: {}", e),
            StorageError::Address(e) => write!(f, "Address Error: {}", e),
            StorageError::Config(e) => write!(f, "Config Error: {}", e),
        }
    }
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::IoError(msg) => write!(f, "IO error: {}", msg),
            PersistError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::Unresolvable => {
                write!(f, "Either chat or user must be provided to address a record")
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseFailed(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid config value for '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl std::error::Error for PersistError {}
impl std::error::Error for AddressError {}
impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Persist(PersistError::SerializationError(err.to_string()))
    }
}

impl From<serde_yaml::Error> for StorageError {
    fn from(err: serde_yaml::Error) -> Self {
        StorageError::Config(ConfigError::ParseFailed(err.to_string()))
    }
}

impl From<PersistError> for StorageError {
    fn from(err: PersistError) -> Self {
        StorageError::Persist(err)
    }
}

impl From<AddressError> for StorageError {
    fn from(err: AddressError) -> Self {
        StorageError::Address(err)
    }
}

impl From<ConfigError> for StorageError {
    fn from(err: ConfigError) -> Self {
        StorageError::Config(err)
    }
}

// 便捷的 Result 类型别名
pub type Result<T> = std::result::Result<T, StorageError>;

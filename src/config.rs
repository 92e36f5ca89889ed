//! 存储配置加载
//!
//! 支持 YAML 文件或环境变量两种来源。环境变量格式：
//! ```text
//! FSM_STORAGE_PATH=~/.fsm-storage/storage_data.json
//! FSM_STORAGE_DEFAULT_STATE=start
//! FSM_STORAGE_DEFAULT_CHAT=lobby
//! FSM_STORAGE_DEFAULT_USER=system
//! FSM_STORAGE_PRETTY=true
//! ```
//! 未设置的项使用默认值。

use crate::error::{ConfigError, Result};
use crate::storage::file::default_path;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const PREFIX: &str = "FSM_STORAGE_";

/// 存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 存储文件路径（默认可执行文件同目录下的 `storage_data.json`）
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// 新建记录的初始状态
    #[serde(default)]
    pub default_state: Option<String>,
    /// 未提供 chat 时使用的标识
    #[serde(default)]
    pub default_chat: Option<String>,
    /// 未提供 user 时使用的标识
    #[serde(default)]
    pub default_user: Option<String>,
    /// 以缩进格式写文件
    #[serde(default)]
    pub pretty: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            default_state: None,
            default_chat: None,
            default_user: None,
            pretty: false,
        }
    }
}

impl StorageConfig {
    /// 从 YAML 文件加载
    pub fn load(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        let config: StorageConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }

    /// 从环境变量（及 `.env`）加载
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in vars {
            let Some(suffix) = key.strip_prefix(PREFIX) else {
                continue;
            };
            match suffix {
                "PATH" => config.path = PathBuf::from(value),
                "DEFAULT_STATE" => config.default_state = non_empty(value),
                "DEFAULT_CHAT" => config.default_chat = non_empty(value),
                "DEFAULT_USER" => config.default_user = non_empty(value),
                "PRETTY" => {
                    config.pretty = value.parse().map_err(|_| ConfigError::InvalidValue {
                        field: key.clone(),
                        message: format!("expected true/false, got '{}'", value),
                    })?;
                }
                _ => {}
            }
        }
        Ok(config)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

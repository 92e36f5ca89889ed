//! 记录寻址
//!
//! 每条记录由 `(chat, user)` 两级地址定位。两个标识都可以是字符串或整数，
//! 查找前统一转换为字符串形式；缺省的一侧交给注入的 [`AddressPolicy`] 补全。

use crate::error::{AddressError, Result};
use std::fmt;

/// 会话或用户标识（字符串 / 整数）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Int(i64),
    Text(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(n) => write!(f, "{}", n),
            Identifier::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::Text(s.to_string())
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier::Text(s)
    }
}

impl From<&String> for Identifier {
    fn from(s: &String) -> Self {
        Identifier::Text(s.clone())
    }
}

impl From<i64> for Identifier {
    fn from(n: i64) -> Self {
        Identifier::Int(n)
    }
}

impl From<i32> for Identifier {
    fn from(n: i32) -> Self {
        Identifier::Int(n.into())
    }
}

impl From<u32> for Identifier {
    fn from(n: u32) -> Self {
        Identifier::Int(n.into())
    }
}

/// 记录地址，`None` 表示由地址策略补全
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub chat: Option<Identifier>,
    pub user: Option<Identifier>,
}

impl Address {
    /// 同时指定 chat 与 user
    pub fn new(chat: impl Into<Identifier>, user: impl Into<Identifier>) -> Self {
        Self {
            chat: Some(chat.into()),
            user: Some(user.into()),
        }
    }

    /// 只指定 chat，user 由策略补全
    pub fn chat(chat: impl Into<Identifier>) -> Self {
        Self {
            chat: Some(chat.into()),
            user: None,
        }
    }

    /// 只指定 user，chat 由策略补全
    pub fn user(user: impl Into<Identifier>) -> Self {
        Self {
            chat: None,
            user: Some(user.into()),
        }
    }
}

/// 解析后的规范地址（均为字符串键）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressKey {
    pub chat: String,
    pub user: String,
}

/// 缺省标识的补全策略
pub trait AddressPolicy: Send + Sync {
    /// 将原始地址转换为规范键对；无法补全时返回 [`AddressError::Unresolvable`]
    fn resolve(&self, address: &Address) -> Result<AddressKey>;
}

/// 默认策略：缺失的一侧沿用另一侧的标识（私聊中 chat 与 user 相同）
#[derive(Debug, Clone, Copy, Default)]
pub struct MirrorPolicy;

impl AddressPolicy for MirrorPolicy {
    fn resolve(&self, address: &Address) -> Result<AddressKey> {
        let (chat, user) = match (&address.chat, &address.user) {
            (Some(chat), Some(user)) => (chat.to_string(), user.to_string()),
            (Some(chat), None) => (chat.to_string(), chat.to_string()),
            (None, Some(user)) => (user.to_string(), user.to_string()),
            (None, None) => return Err(AddressError::Unresolvable.into()),
        };
        Ok(AddressKey { chat, user })
    }
}

/// 缺失的一侧使用固定的默认标识（通常来自配置）
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    chat: Option<String>,
    user: Option<String>,
}

impl FallbackPolicy {
    pub fn new(chat: Option<String>, user: Option<String>) -> Self {
        Self { chat, user }
    }
}

impl AddressPolicy for FallbackPolicy {
    fn resolve(&self, address: &Address) -> Result<AddressKey> {
        // 配置值优先，其次退回镜像规则
        let chat = address
            .chat
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| self.chat.clone());
        let user = address
            .user
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| self.user.clone());
        MirrorPolicy.resolve(&Address {
            chat: chat.map(Identifier::Text),
            user: user.map(Identifier::Text),
        })
    }
}

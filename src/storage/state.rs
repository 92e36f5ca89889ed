//! 状态标签解析
//!
//! 存储本身不理解状态机，只把标签当作不透明字符串；写入和读取默认值前
//! 都先经过注入的 [`StatePolicy`] 转换为规范形式，`None` 表示"无状态"。

/// 原始标签 → 规范标签
pub trait StatePolicy: Send + Sync {
    fn resolve_state(&self, raw: Option<&str>) -> Option<String>;
}

/// 默认策略：原样保留
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainStates;

impl StatePolicy for PlainStates {
    fn resolve_state(&self, raw: Option<&str>) -> Option<String> {
        raw.map(str::to_string)
    }
}

/// 一组具名状态，规范形式为 `"Group:name"`
///
/// ```rust
/// use fsm_storage::storage::state::{StatePolicy, StatesGroup};
///
/// let form = StatesGroup::new("Form", ["name", "age"]);
/// assert_eq!(form.resolve_state(Some("name")).as_deref(), Some("Form:name"));
/// assert_eq!(form.resolve_state(Some("Form:age")).as_deref(), Some("Form:age"));
/// assert_eq!(form.resolve_state(None), None);
/// ```
#[derive(Debug, Clone)]
pub struct StatesGroup {
    name: String,
    states: Vec<String>,
}

impl StatesGroup {
    pub fn new<I, S>(name: impl Into<String>, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            states: states.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 组内全部状态的规范标签
    pub fn all_states(&self) -> Vec<String> {
        self.states.iter().map(|s| self.qualify(s)).collect()
    }

    fn qualify(&self, state: &str) -> String {
        format!("{}:{}", self.name, state)
    }
}

impl StatePolicy for StatesGroup {
    fn resolve_state(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw?;
        // 已带组前缀或不属于本组的标签原样透传
        if self.states.iter().any(|s| s == raw) {
            Some(self.qualify(raw))
        } else {
            Some(raw.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_states_passthrough() {
        assert_eq!(
            PlainStates.resolve_state(Some("collecting_name")).as_deref(),
            Some("collecting_name")
        );
        assert_eq!(PlainStates.resolve_state(None), None);
    }

    #[test]
    fn test_states_group_qualifies_members_only() {
        let group = StatesGroup::new("Order", ["address", "confirm"]);

        assert_eq!(
            group.resolve_state(Some("address")).as_deref(),
            Some("Order:address")
        );
        assert_eq!(
            group.resolve_state(Some("Order:confirm")).as_deref(),
            Some("Order:confirm")
        );
        assert_eq!(
            group.resolve_state(Some("Other:step")).as_deref(),
            Some("Other:step")
        );
        assert_eq!(
            group.all_states(),
            vec!["Order:address".to_string(), "Order:confirm".to_string()]
        );
    }
}

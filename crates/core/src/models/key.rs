use std::fmt;

use serde::{Deserialize, Serialize};

/// 组合键中使用的分隔符
///
/// 租户名和任务类型名中都不可能出现 NUL 字符，因此不同的
/// (租户, 任务) 组合不会产生相同的组合字符串。
pub const KEY_SEPARATOR: char = '\u{0}';

/// 注册表中 (租户, 任务) 的组合键
///
/// `task_name` 是任务实现类型的完全限定名。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub tenant: String,
    pub task_name: String,
}

impl TaskKey {
    pub fn new(tenant: impl Into<String>, task_name: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            task_name: task_name.into(),
        }
    }

    /// 生成注册表使用的组合字符串形式
    pub fn compose(&self) -> String {
        format!("{}{}{}", self.tenant, KEY_SEPARATOR, self.task_name)
    }

    /// 从组合字符串还原键
    pub fn parse(composed: &str) -> Option<Self> {
        composed
            .split_once(KEY_SEPARATOR)
            .map(|(tenant, task_name)| Self::new(tenant, task_name))
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.task_name)
    }
}

use serde::{Deserialize, Serialize};

/// 未指定计划时使用的默认CRON表达式（每分钟）
pub const DEFAULT_SCHEDULE: &str = "* * * * *";

/// 任务设置
///
/// 描述一个后台任务的调度配置，由设置提供者解析得到。
/// 设置是不可变快照：注册表对外只交出克隆，修改通过重新应用完成。
///
/// # 字段说明
///
/// - `name`: 任务标识，与任务实现类型的完全限定名一致
/// - `schedule`: CRON表达式（标准5字段，分钟粒度）
/// - `enable`: 是否允许调度执行
/// - `title` / `description`: 给管理界面看的元数据，调度核心不解释
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSettings {
    pub name: String,
    pub schedule: String,
    pub enable: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl TaskSettings {
    pub fn new(name: impl Into<String>, schedule: impl Into<String>, enable: bool) -> Self {
        Self {
            name: name.into(),
            schedule: schedule.into(),
            enable,
            title: String::new(),
            description: String::new(),
        }
    }

    /// 所有设置提供者都没有结果时的回退设置
    ///
    /// 计划取任务声明的默认CRON表达式，没有声明时每分钟一次；
    /// 回退设置默认不启用，需要管理端显式开启。
    pub fn fallback(task_name: &str, default_schedule: Option<&str>) -> Self {
        Self::new(
            task_name,
            default_schedule.unwrap_or(DEFAULT_SCHEDULE),
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_uses_task_default_schedule() {
        let settings = TaskSettings::fallback("demo.Task", Some("*/5 * * * *"));
        assert_eq!(settings.schedule, "*/5 * * * *");
        assert!(!settings.enable);
    }

    #[test]
    fn test_fallback_without_default_is_every_minute() {
        let settings = TaskSettings::fallback("demo.Task", None);
        assert_eq!(settings.schedule, DEFAULT_SCHEDULE);
        assert_eq!(settings.name, "demo.Task");
    }
}

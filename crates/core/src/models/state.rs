use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 任务状态机的状态
///
/// # 变体说明
///
/// - `Idle`: 空闲，等待下一次计划时间
/// - `Running`: 正在执行，同一个键同时最多一次
/// - `Faulted`: 上一次执行失败；到达下一次计划时间后仍会重试
/// - `Disabled`: 被管理命令禁用，只有Enable命令能恢复
/// - `Undefined`: 尚未解析到任何设置，不可调度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "FAULTED")]
    Faulted,
    #[serde(rename = "DISABLED")]
    Disabled,
    #[serde(rename = "UNDEFINED")]
    Undefined,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Undefined
    }
}

/// 任务运行状态快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub status: TaskStatus,
    /// 最近一次运行的开始时间
    pub started_at: Option<DateTime<Utc>>,
    /// 最近一次运行的结束时间
    pub stopped_at: Option<DateTime<Utc>>,
    /// 最近一次失败的错误信息
    pub last_error: Option<String>,
    /// 下一次计划启动时间
    pub next_start_at: Option<DateTime<Utc>>,
}

impl TaskState {
    pub fn is_running(&self) -> bool {
        matches!(self.status, TaskStatus::Running)
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.status, TaskStatus::Faulted)
    }
}

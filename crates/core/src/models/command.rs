use serde::{Deserialize, Serialize};

/// 针对单个调度条目的管理命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandCode {
    /// 启用任务；若条目处于Disabled状态则恢复为Idle
    #[serde(rename = "ENABLE")]
    Enable,
    /// 禁用任务，状态转为Disabled
    #[serde(rename = "DISABLE")]
    Disable,
    /// 清除错误并重置参考时间，状态转为Idle
    #[serde(rename = "RESET_STATE")]
    ResetState,
}

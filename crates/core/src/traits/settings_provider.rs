use async_trait::async_trait;

use crate::errors::Result;
use crate::models::TaskSettings;
use crate::traits::task::BackgroundTask;

/// 任务设置提供者契约
///
/// 调度器按 `order` 升序依次询问提供者，第一个返回 `Some` 的结果生效。
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// 提供者的优先级，数值越小越先被询问
    fn order(&self) -> i32 {
        0
    }

    /// 解析指定任务的设置；该提供者没有对应设置时返回None
    async fn get_settings(&self, task: &dyn BackgroundTask) -> Result<Option<TaskSettings>>;
}

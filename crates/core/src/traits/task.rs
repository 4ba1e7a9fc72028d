use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::errors::Result;
use crate::traits::tenant_host::TenantScope;

/// 后台任务契约
///
/// 任务以实现类型的完全限定名自我标识，调度器据此在注册表中定位
/// 对应的条目。`do_work` 在任务自己的服务作用域内被调用，并收到
/// 停止信号的接收端，长时间运行的任务应当配合该信号尽快退出。
#[async_trait]
pub trait BackgroundTask: Send + Sync {
    /// 任务实现类型的完全限定名
    fn name(&self) -> &str;

    /// 任务声明的默认CRON表达式
    ///
    /// 没有任何设置提供者给出结果时，回退设置采用这里声明的计划。
    fn default_schedule(&self) -> Option<&str> {
        None
    }

    /// 执行一次任务
    async fn do_work(
        &self,
        scope: Arc<dyn TenantScope>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()>;
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use tenant_tasks_core::{
    AppConfig, BackgroundContext, BackgroundTask, SettingsProvider, ShellInfo, ShellState,
    TaskSettings, TenantHost, TenantScope,
};
use tenant_tasks_scheduler::BackgroundTaskService;

/// 演示应用
///
/// 以嵌入式方式运行调度器：租户集合与任务都由内置的内存宿主提供，
/// 不依赖任何外部系统，用于演示与本地验证。
pub struct Application {
    service: Arc<BackgroundTaskService>,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        let host = StaticTenantHost::with_demo_tenants();
        let service = Arc::new(BackgroundTaskService::new(
            host as Arc<dyn TenantHost>,
            config.scheduler,
        ));
        Self { service }
    }

    /// 运行应用直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let loop_handle = {
            let service = Arc::clone(&self.service);
            tokio::spawn(async move { service.run().await })
        };

        let _ = shutdown_rx.recv().await;
        info!("应用收到关闭信号");

        self.service.stop();
        loop_handle.await?;
        Ok(())
    }
}

/// 内置的内存租户宿主
///
/// 租户集合在构造时固定，每个租户持有自己的作用域实例。
pub struct StaticTenantHost {
    shells: Vec<ShellInfo>,
    scopes: HashMap<String, Arc<StaticScope>>,
}

impl StaticTenantHost {
    /// 构造带两个演示租户的宿主
    pub fn with_demo_tenants() -> Arc<Self> {
        let mut shells = Vec::new();
        let mut scopes = HashMap::new();

        for tenant in ["alpha", "beta"] {
            let provider = Arc::new(StaticSettingsProvider::demo());
            let scope = Arc::new(StaticScope {
                tasks: vec![
                    Arc::new(HeartbeatTask) as Arc<dyn BackgroundTask>,
                    Arc::new(PurgeTask) as Arc<dyn BackgroundTask>,
                ],
                providers: vec![provider as Arc<dyn SettingsProvider>],
                context: Mutex::new(None),
            });
            shells.push(
                ShellInfo::new(tenant, ShellState::Running)
                    .with_urls("localhost", format!("/{tenant}")),
            );
            scopes.insert(tenant.to_string(), scope);
        }

        Arc::new(Self { shells, scopes })
    }
}

#[async_trait]
impl TenantHost for StaticTenantHost {
    async fn list_shells(&self) -> tenant_tasks_core::Result<Vec<ShellInfo>> {
        Ok(self.shells.clone())
    }

    async fn enter_scope(
        &self,
        tenant: &str,
    ) -> tenant_tasks_core::Result<Option<Arc<dyn TenantScope>>> {
        Ok(self
            .scopes
            .get(tenant)
            .map(|scope| Arc::clone(scope) as Arc<dyn TenantScope>))
    }
}

struct StaticScope {
    tasks: Vec<Arc<dyn BackgroundTask>>,
    providers: Vec<Arc<dyn SettingsProvider>>,
    context: Mutex<Option<BackgroundContext>>,
}

impl TenantScope for StaticScope {
    fn background_tasks(&self) -> Vec<Arc<dyn BackgroundTask>> {
        self.tasks.clone()
    }

    fn settings_providers(&self) -> Vec<Arc<dyn SettingsProvider>> {
        self.providers.clone()
    }

    fn set_background_context(&self, context: BackgroundContext) {
        *self.context.lock().unwrap() = Some(context);
    }

    fn background_context(&self) -> Option<BackgroundContext> {
        self.context.lock().unwrap().clone()
    }
}

/// 演示任务：每分钟打一条心跳日志
struct HeartbeatTask;

#[async_trait]
impl BackgroundTask for HeartbeatTask {
    fn name(&self) -> &str {
        "demo.tasks.Heartbeat"
    }

    async fn do_work(
        &self,
        scope: Arc<dyn TenantScope>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tenant_tasks_core::Result<()> {
        let tenant = scope
            .background_context()
            .map(|ctx| ctx.tenant)
            .unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(200)) => {
                info!("心跳: tenant={tenant}");
                Ok(())
            }
            _ = shutdown_rx.recv() => {
                info!("心跳任务收到停止信号: tenant={tenant}");
                Ok(())
            }
        }
    }
}

/// 演示任务：定期清理，默认每5分钟一次
struct PurgeTask;

#[async_trait]
impl BackgroundTask for PurgeTask {
    fn name(&self) -> &str {
        "demo.tasks.Purge"
    }

    fn default_schedule(&self) -> Option<&str> {
        Some("*/5 * * * *")
    }

    async fn do_work(
        &self,
        scope: Arc<dyn TenantScope>,
        _shutdown_rx: broadcast::Receiver<()>,
    ) -> tenant_tasks_core::Result<()> {
        let tenant = scope
            .background_context()
            .map(|ctx| ctx.tenant)
            .unwrap_or_default();
        info!("执行清理: tenant={tenant}");
        Ok(())
    }
}

/// 静态设置提供者：只启用心跳任务，清理任务走默认回退设置
struct StaticSettingsProvider {
    settings: HashMap<String, TaskSettings>,
}

impl StaticSettingsProvider {
    fn demo() -> Self {
        let mut settings = HashMap::new();
        settings.insert(
            "demo.tasks.Heartbeat".to_string(),
            TaskSettings::new("demo.tasks.Heartbeat", "* * * * *", true),
        );
        Self { settings }
    }
}

#[async_trait]
impl SettingsProvider for StaticSettingsProvider {
    async fn get_settings(
        &self,
        task: &dyn BackgroundTask,
    ) -> tenant_tasks_core::Result<Option<TaskSettings>> {
        Ok(self.settings.get(task.name()).cloned())
    }
}

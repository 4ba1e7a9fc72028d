use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, Notify, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use tenant_tasks_core::{
    BackgroundContext, BackgroundTask, CommandCode, SchedulerConfig, SettingsProvider, ShellInfo,
    TaskKey, TaskSettings, TaskState, TenantHost, TenantScope,
};

use crate::metrics;
use crate::registry::SchedulerRegistry;
use crate::view::TenantView;

/// 提前调度信号
///
/// `notify` 负责打断等待中的休眠；`requested` 标志在每轮等待结束时
/// 被原子地取走，相当于换上一个全新的信号源。
#[derive(Default)]
struct UpdateSignal {
    notify: Notify,
    requested: AtomicBool,
}

impl UpdateSignal {
    fn raise(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

/// 一轮等待的结束原因
enum WaitOutcome {
    /// 到达下一个tick（超时或提前调度信号）
    Tick,
    /// 收到停止信号
    Stopped,
}

/// 后台任务调度服务
///
/// 持续驱动所有运行中租户的后台任务：每个tick重建租户视图、清理
/// 注册表、以有限并行度对租户扇出执行，并响应提前调度信号与全局
/// 停止信号。同一个租户内的任务严格串行，不同租户之间并行。
pub struct BackgroundTaskService {
    host: Arc<dyn TenantHost>,
    registry: Arc<SchedulerRegistry>,
    config: SchedulerConfig,
    update: UpdateSignal,
    shutdown_tx: broadcast::Sender<()>,
    stopping: AtomicBool,
    is_running: RwLock<bool>,
}

impl BackgroundTaskService {
    pub fn new(host: Arc<dyn TenantHost>, config: SchedulerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            host,
            registry: Arc::new(SchedulerRegistry::new()),
            config,
            update: UpdateSignal::default(),
            shutdown_tx,
            stopping: AtomicBool::new(false),
            is_running: RwLock::new(false),
        }
    }

    /// 调度器是否已完成启动（至少观察到过一个运行中的租户）
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// 请求提前进入下一个tick；立即返回
    pub fn update(&self) {
        self.update.raise();
    }

    /// 请求停止调度循环；正在执行的任务收到停止信号后自行收尾
    pub fn stop(&self) {
        if !self.stopping.swap(true, Ordering::SeqCst) {
            info!("后台任务调度器正在停止");
            let _ = self.shutdown_tx.send(());
        }
    }

    /// 订阅停止信号
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// 对指定条目应用管理命令；条目不存在时忽略
    pub async fn command(&self, tenant: &str, task_name: &str, code: CommandCode) {
        let key = TaskKey::new(tenant, task_name);
        if self.registry.apply_command(&key, code, Utc::now()).await {
            info!("管理命令已应用: {key}, command={code:?}");
        } else {
            debug!("管理命令的目标条目不存在，忽略: {key}");
        }
    }

    /// 读取指定任务的设置克隆
    pub async fn get_settings(&self, tenant: &str, task_name: &str) -> Option<TaskSettings> {
        self.registry
            .settings_of(&TaskKey::new(tenant, task_name))
            .await
    }

    /// 读取指定租户全部任务的设置克隆
    pub async fn get_settings_for(&self, tenant: &str) -> Vec<TaskSettings> {
        self.registry
            .snapshot_by_tenant(tenant)
            .await
            .into_iter()
            .filter_map(|entry| entry.settings)
            .collect()
    }

    /// 读取指定任务的状态克隆；条目不存在时返回Undefined状态
    pub async fn get_state(&self, tenant: &str, task_name: &str) -> TaskState {
        self.registry.state_of(&TaskKey::new(tenant, task_name)).await
    }

    /// 读取指定租户全部任务的状态克隆
    pub async fn get_states_for(&self, tenant: &str) -> Vec<(String, TaskState)> {
        self.registry
            .snapshot_by_tenant(tenant)
            .await
            .into_iter()
            .map(|entry| (entry.key.task_name, entry.state))
            .collect()
    }

    /// 运行调度主循环，直到收到停止信号
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!(
            "后台任务调度器启动: polling={}s, min_idle={}s, max_parallelism={}",
            self.config.polling_seconds, self.config.min_idle_seconds, self.config.max_parallelism
        );

        // 启动阶段：等到至少一个运行中的租户出现
        loop {
            if self.stopping() {
                info!("后台任务调度器已停止");
                return;
            }
            let view = TenantView::build(self.host.as_ref()).await;
            if !view.is_empty() {
                break;
            }
            debug!(
                "暂无运行中的租户，{}秒后重试",
                self.config.min_idle_seconds
            );
            tokio::select! {
                _ = sleep(self.config.min_idle_time()) => {}
                _ = shutdown_rx.recv() => {
                    info!("后台任务调度器已停止");
                    return;
                }
            }
        }

        *self.is_running.write().await = true;
        info!("检测到运行中的租户，进入调度循环");

        loop {
            let tick_start = Utc::now();
            let tick_began = tokio::time::Instant::now();
            let view = self.run_once(tick_start).await;
            metrics::record_tick_duration(tick_began.elapsed());

            match self.wait_for_next_tick(&mut shutdown_rx, &view).await {
                WaitOutcome::Tick => {}
                WaitOutcome::Stopped => break,
            }
        }

        *self.is_running.write().await = false;
        info!("后台任务调度器已停止");
    }

    /// 执行一次完整的调度扫描
    ///
    /// 返回本次扫描使用的租户视图，供循环在等待阶段比较租户变化。
    pub async fn run_once(&self, now: DateTime<Utc>) -> TenantView {
        let view = TenantView::build(self.host.as_ref()).await;
        self.registry
            .prune_keeping_tenants(&view.tenant_names)
            .await;
        metrics::record_registry_size(self.registry.len().await);

        let invoked: usize = stream::iter(view.shells.clone())
            .map(|shell| self.process_shell(shell, now))
            .buffer_unordered(self.config.max_parallelism.max(1))
            .collect::<Vec<usize>>()
            .await
            .into_iter()
            .sum();

        if invoked > 0 {
            info!("本次调度共执行 {invoked} 个任务");
        }
        view
    }

    /// 处理单个租户壳；返回实际执行的任务数
    ///
    /// 同一个壳内的任务按名称排序后串行执行，避免同租户的两个任务
    /// 在服务作用域里相互干扰。
    async fn process_shell(&self, shell: ShellInfo, now: DateTime<Utc>) -> usize {
        if shell.is_released() || self.stopping() {
            return 0;
        }

        // 用一个短命作用域发现该租户注册的任务类型
        let scope = match self.host.enter_scope(&shell.tenant).await {
            Ok(Some(scope)) => scope,
            Ok(None) => {
                debug!("租户作用域不存在: tenant={}", shell.tenant);
                return 0;
            }
            Err(e) => {
                warn!("进入租户作用域失败: tenant={}, error={e}", shell.tenant);
                return 0;
            }
        };
        let mut task_names: Vec<String> = scope
            .background_tasks()
            .iter()
            .map(|task| task.name().to_string())
            .collect();
        drop(scope);
        task_names.sort();
        task_names.dedup();

        self.registry
            .prune_tenant_keeping(&shell.tenant, &task_names)
            .await;

        let context = BackgroundContext::for_shell(&shell);
        let mut invoked = 0;
        for task_name in &task_names {
            if shell.is_released() || self.stopping() {
                break;
            }
            invoked += self.process_task(&shell, task_name, &context, now).await;
        }
        invoked
    }

    /// 处理单个任务；返回1表示本tick实际执行了该任务
    async fn process_task(
        &self,
        shell: &ShellInfo,
        task_name: &str,
        context: &BackgroundContext,
        now: DateTime<Utc>,
    ) -> usize {
        // 每次任务调用使用一个新的服务作用域
        let scope = match self.host.enter_scope(&shell.tenant).await {
            Ok(Some(scope)) => scope,
            Ok(None) => return 0,
            Err(e) => {
                warn!("进入租户作用域失败: tenant={}, error={e}", shell.tenant);
                return 0;
            }
        };
        scope.set_background_context(context.clone());

        let Some(task) = scope
            .background_tasks()
            .into_iter()
            .find(|task| task.name() == task_name)
        else {
            return 0;
        };

        let key = TaskKey::new(&shell.tenant, task_name);
        self.registry.get_or_create(&key, now).await;

        let settings = self.resolve_settings(scope.as_ref(), task.as_ref()).await;
        if !self.registry.apply_and_begin(&key, settings, now).await {
            return 0;
        }

        info!("任务开始执行: {key}");
        let shutdown_rx = self.shutdown_tx.subscribe();
        let worker_scope = Arc::clone(&scope);
        let worker_task = Arc::clone(&task);
        let handle =
            tokio::spawn(async move { worker_task.do_work(worker_scope, shutdown_rx).await });

        match handle.await {
            Ok(Ok(())) => {
                let _ = self
                    .registry
                    .update(&key, |entry| entry.idle(Utc::now()))
                    .await;
                metrics::record_task_success();
                info!("任务执行完成: {key}");
            }
            Ok(Err(e)) => {
                error!("任务执行失败: {key}, error={e}");
                let _ = self
                    .registry
                    .update(&key, |entry| entry.fault(Utc::now(), e.to_string()))
                    .await;
                metrics::record_task_failure();
            }
            Err(e) => {
                // 任务崩溃（panic）同样按失败记账，不影响后续任务
                error!("任务执行中止: {key}, error={e}");
                let _ = self
                    .registry
                    .update(&key, |entry| {
                        entry.fault(Utc::now(), format!("任务执行中止: {e}"))
                    })
                    .await;
                metrics::record_task_failure();
            }
        }
        1
    }

    /// 依优先级询问设置提供者；都没有结果时回退为默认设置
    async fn resolve_settings(
        &self,
        scope: &dyn TenantScope,
        task: &dyn BackgroundTask,
    ) -> TaskSettings {
        let mut providers: Vec<Arc<dyn SettingsProvider>> = scope.settings_providers();
        providers.sort_by_key(|provider| provider.order());

        for provider in providers {
            match provider.get_settings(task).await {
                Ok(Some(settings)) => return settings,
                Ok(None) => {}
                Err(e) => {
                    warn!("设置提供者查询失败: task={}, error={e}", task.name());
                }
            }
        }
        TaskSettings::fallback(task.name(), task.default_schedule())
    }

    /// 两个tick之间的等待
    ///
    /// 以1秒粒度轮询：等待在最小空闲时间过去、且（轮询周期耗尽或收到
    /// 提前调度信号）时结束。每次轮询都会检查已观察的壳是否被释放、
    /// 运行中壳的数量是否变化，一旦变化就主动拉起提前调度信号。
    async fn wait_for_next_tick(
        &self,
        shutdown_rx: &mut broadcast::Receiver<()>,
        observed: &TenantView,
    ) -> WaitOutcome {
        let started = tokio::time::Instant::now();
        let polling = self.config.polling_time();
        let min_idle = self.config.min_idle_time();

        loop {
            tokio::select! {
                _ = sleep(Duration::from_secs(1)) => {}
                _ = self.update.notify.notified() => {}
                _ = shutdown_rx.recv() => return WaitOutcome::Stopped,
            }
            if self.stopping() {
                return WaitOutcome::Stopped;
            }

            if self.shells_changed(observed).await {
                self.update.raise();
            }

            let elapsed = started.elapsed();
            if elapsed >= min_idle && (elapsed >= polling || self.update.is_requested()) {
                if self.update.take() {
                    debug!("收到提前调度信号，缩短等待");
                }
                return WaitOutcome::Tick;
            }
        }
    }

    /// 检查租户集合相对上一个tick是否发生了变化
    async fn shells_changed(&self, observed: &TenantView) -> bool {
        if observed.shells.iter().any(ShellInfo::is_released) {
            return true;
        }
        let current = TenantView::build(self.host.as_ref()).await;
        current.shells.len() != observed.shells.len()
    }

    fn stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }
}

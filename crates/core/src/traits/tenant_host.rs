use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::traits::settings_provider::SettingsProvider;
use crate::traits::task::BackgroundTask;

/// 租户壳的生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShellState {
    #[serde(rename = "INITIALIZING")]
    Initializing,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "STOPPED")]
    Stopped,
}

/// 租户壳快照
///
/// `released` 标志由宿主在拆除租户时置位，调度循环在同一个tick内
/// 也能观察到变化，因此通过共享的原子布尔暴露而不是普通字段。
#[derive(Debug, Clone)]
pub struct ShellInfo {
    pub tenant: String,
    pub state: ShellState,
    pub request_url_host: Option<String>,
    pub request_url_prefix: Option<String>,
    released: Arc<AtomicBool>,
}

impl ShellInfo {
    pub fn new(tenant: impl Into<String>, state: ShellState) -> Self {
        Self {
            tenant: tenant.into(),
            state,
            request_url_host: None,
            request_url_prefix: None,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_urls(
        mut self,
        host: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        self.request_url_host = Some(host.into());
        self.request_url_prefix = Some(prefix.into());
        self
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ShellState::Running)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// 标记壳已被释放（宿主侧调用）
    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// 后台请求上下文
///
/// 在处理某个租户的任务期间挂在该租户的服务作用域上，
/// 供下游协作方识别当前租户以及"这是后台调用"这一事实。
#[derive(Debug, Clone)]
pub struct BackgroundContext {
    pub tenant: String,
    pub url_host: Option<String>,
    pub url_prefix: Option<String>,
    pub is_background: bool,
}

impl BackgroundContext {
    pub fn for_shell(shell: &ShellInfo) -> Self {
        Self {
            tenant: shell.tenant.clone(),
            url_host: shell.request_url_host.clone(),
            url_prefix: shell.request_url_prefix.clone(),
            is_background: true,
        }
    }
}

/// 租户宿主契约
///
/// 宿主负责维护租户集合，并为每个租户提供独立的服务作用域。
/// 调度器每个tick都会重新询问宿主，几秒内即可感知租户的出现与消失。
#[async_trait]
pub trait TenantHost: Send + Sync {
    /// 列出当前全部租户壳（包含非Running状态的）
    async fn list_shells(&self) -> Result<Vec<ShellInfo>>;

    /// 进入指定租户的服务作用域；租户不存在时返回None
    async fn enter_scope(&self, tenant: &str) -> Result<Option<Arc<dyn TenantScope>>>;
}

/// 租户服务作用域
///
/// 作用域暴露该租户注册的后台任务与设置提供者。作用域的生命周期
/// 由调用方控制，用完即丢弃；同一租户的两次查询使用各自的新作用域。
pub trait TenantScope: Send + Sync {
    /// 该租户注册的全部后台任务实例
    fn background_tasks(&self) -> Vec<Arc<dyn BackgroundTask>>;

    /// 该租户注册的设置提供者
    fn settings_providers(&self) -> Vec<Arc<dyn SettingsProvider>>;

    /// 安装后台请求上下文，作用于本次租户迭代
    fn set_background_context(&self, context: BackgroundContext);

    /// 读取当前的后台请求上下文
    fn background_context(&self) -> Option<BackgroundContext>;
}

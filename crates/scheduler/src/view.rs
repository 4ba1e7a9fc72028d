use std::collections::HashSet;

use tracing::warn;

use tenant_tasks_core::{ShellInfo, TenantHost};

/// 每个tick开始时对租户宿主的快照
///
/// 只保留处于Running状态的壳；宿主返回错误按"本tick没有租户"处理。
#[derive(Clone, Default)]
pub struct TenantView {
    pub shells: Vec<ShellInfo>,
    pub tenant_names: HashSet<String>,
}

impl TenantView {
    pub async fn build(host: &dyn TenantHost) -> Self {
        let shells = match host.list_shells().await {
            Ok(shells) => shells,
            Err(e) => {
                warn!("列出租户壳失败: {e}");
                Vec::new()
            }
        };
        let shells: Vec<ShellInfo> = shells.into_iter().filter(ShellInfo::is_running).collect();
        let tenant_names = shells.iter().map(|shell| shell.tenant.clone()).collect();
        Self {
            shells,
            tenant_names,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shells.is_empty()
    }
}

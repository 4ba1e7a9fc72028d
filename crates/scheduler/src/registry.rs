use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use tenant_tasks_core::{CommandCode, TaskKey, TaskSettings, TaskState};

use crate::entry::SchedulerEntry;

/// 调度条目注册表
///
/// 键为 (租户, 任务) 的组合字符串。注册表是调度循环与管理API之间
/// 唯一共享的可变状态：对外读取一律返回克隆快照，变更在写锁内完成，
/// 因此对同一个键的操作是线性化的。
#[derive(Default)]
pub struct SchedulerRegistry {
    entries: RwLock<HashMap<String, SchedulerEntry>>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 条目数量
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// 读取条目快照
    pub async fn get(&self, key: &TaskKey) -> Option<SchedulerEntry> {
        self.entries.read().await.get(&key.compose()).cloned()
    }

    /// 获取或创建条目；新条目以 `reference_time` 作为参考时间
    pub async fn get_or_create(
        &self,
        key: &TaskKey,
        reference_time: DateTime<Utc>,
    ) -> SchedulerEntry {
        let mut entries = self.entries.write().await;
        entries
            .entry(key.compose())
            .or_insert_with(|| {
                debug!("创建调度条目: {}", key);
                SchedulerEntry::new(key.clone(), reference_time)
            })
            .clone()
    }

    /// 移除条目
    pub async fn remove(&self, key: &TaskKey) -> Option<SchedulerEntry> {
        self.entries.write().await.remove(&key.compose())
    }

    /// 指定租户的条目快照
    pub async fn snapshot_by_tenant(&self, tenant: &str) -> Vec<SchedulerEntry> {
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.key.tenant == tenant)
            .cloned()
            .collect()
    }

    /// 全部条目快照
    pub async fn snapshot_all(&self) -> Vec<SchedulerEntry> {
        self.entries.read().await.values().cloned().collect()
    }

    /// 读取条目设置的克隆
    pub async fn settings_of(&self, key: &TaskKey) -> Option<TaskSettings> {
        self.entries
            .read()
            .await
            .get(&key.compose())
            .and_then(|entry| entry.settings.clone())
    }

    /// 读取条目状态的克隆；条目不存在时返回Undefined状态
    pub async fn state_of(&self, key: &TaskKey) -> TaskState {
        self.entries
            .read()
            .await
            .get(&key.compose())
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    /// 仅保留租户仍在运行的条目
    pub async fn prune_keeping_tenants(&self, tenants: &HashSet<String>) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| {
            let keep = tenants.contains(&entry.key.tenant);
            if !keep {
                debug!("移除调度条目（租户已停止）: {}", entry.key);
            }
            keep
        });
    }

    /// 仅保留指定租户当前仍注册的任务
    pub async fn prune_tenant_keeping(&self, tenant: &str, task_names: &[String]) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| {
            if entry.key.tenant != tenant {
                return true;
            }
            let keep = task_names.iter().any(|name| *name == entry.key.task_name);
            if !keep {
                debug!("移除调度条目（任务已注销）: {}", entry.key);
            }
            keep
        });
    }

    /// 在同一个临界区内对条目应用变更
    pub async fn update<F, R>(&self, key: &TaskKey, f: F) -> Option<R>
    where
        F: FnOnce(&mut SchedulerEntry) -> R,
    {
        self.entries.write().await.get_mut(&key.compose()).map(f)
    }

    /// 应用设置，并在满足运行条件时原子地进入Running状态
    ///
    /// "检查可运行"与"置为Running"发生在同一个临界区内，保证同一个键
    /// 不会出现两次并发的任务调用。
    pub async fn apply_and_begin(
        &self,
        key: &TaskKey,
        settings: TaskSettings,
        now: DateTime<Utc>,
    ) -> bool {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(&key.compose()) else {
            return false;
        };
        entry.apply_settings(settings, now);
        if entry.can_run(now) {
            entry.run(now);
            true
        } else {
            false
        }
    }

    /// 应用管理命令；条目不存在时忽略，返回是否生效
    pub async fn apply_command(&self, key: &TaskKey, code: CommandCode, now: DateTime<Utc>) -> bool {
        self.update(key, |entry| entry.apply_command(code, now))
            .await
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tenant_tasks_core::TaskStatus;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn key(tenant: &str, task: &str) -> TaskKey {
        TaskKey::new(tenant, task)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let registry = SchedulerRegistry::new();
        let created = registry.get_or_create(&key("t1", "a"), t0()).await;
        assert_eq!(created.reference_time, t0());

        // 第二次调用不会覆盖已有条目的参考时间
        let later = t0() + chrono::Duration::minutes(5);
        let existing = registry.get_or_create(&key("t1", "a"), later).await;
        assert_eq!(existing.reference_time, t0());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshots_are_clones() {
        let registry = SchedulerRegistry::new();
        registry.get_or_create(&key("t1", "a"), t0()).await;

        let mut snapshot = registry.get(&key("t1", "a")).await.unwrap();
        snapshot.state.status = TaskStatus::Running;

        // 修改快照不影响注册表内部状态
        let fresh = registry.get(&key("t1", "a")).await.unwrap();
        assert_eq!(fresh.state.status, TaskStatus::Undefined);
    }

    #[tokio::test]
    async fn test_prune_keeping_tenants() {
        let registry = SchedulerRegistry::new();
        registry.get_or_create(&key("t1", "a"), t0()).await;
        registry.get_or_create(&key("t1", "b"), t0()).await;
        registry.get_or_create(&key("t2", "a"), t0()).await;

        let keep: HashSet<String> = ["t1".to_string()].into_iter().collect();
        registry.prune_keeping_tenants(&keep).await;

        assert_eq!(registry.len().await, 2);
        assert!(registry.get(&key("t2", "a")).await.is_none());
        assert_eq!(registry.snapshot_by_tenant("t1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_tenant_keeping_only_touches_that_tenant() {
        let registry = SchedulerRegistry::new();
        registry.get_or_create(&key("t1", "a"), t0()).await;
        registry.get_or_create(&key("t1", "b"), t0()).await;
        registry.get_or_create(&key("t2", "b"), t0()).await;

        registry
            .prune_tenant_keeping("t1", &["a".to_string()])
            .await;

        assert!(registry.get(&key("t1", "a")).await.is_some());
        assert!(registry.get(&key("t1", "b")).await.is_none());
        // 其他租户的同名任务不受影响
        assert!(registry.get(&key("t2", "b")).await.is_some());
    }

    #[tokio::test]
    async fn test_apply_and_begin_runs_once_per_occurrence() {
        let registry = SchedulerRegistry::new();
        let k = key("t1", "a");
        registry.get_or_create(&k, t0()).await;

        let now = t0() + chrono::Duration::seconds(70);
        let settings = TaskSettings::new("a", "* * * * *", true);

        assert!(registry.apply_and_begin(&k, settings.clone(), now).await);
        // 条目已处于Running，第二次尝试被拒绝
        assert!(!registry.apply_and_begin(&k, settings, now).await);

        let state = registry.state_of(&k).await;
        assert_eq!(state.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_apply_and_begin_on_missing_entry() {
        let registry = SchedulerRegistry::new();
        let settings = TaskSettings::new("a", "* * * * *", true);
        assert!(
            !registry
                .apply_and_begin(&key("t1", "a"), settings, t0())
                .await
        );
    }

    #[tokio::test]
    async fn test_state_of_missing_entry_is_undefined() {
        let registry = SchedulerRegistry::new();
        let state = registry.state_of(&key("t1", "ghost")).await;
        assert_eq!(state.status, TaskStatus::Undefined);
    }

    #[tokio::test]
    async fn test_apply_command_on_missing_entry_is_ignored() {
        let registry = SchedulerRegistry::new();
        assert!(
            !registry
                .apply_command(&key("t1", "ghost"), CommandCode::Disable, t0())
                .await
        );
    }
}

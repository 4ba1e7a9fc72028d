use chrono::{DateTime, Utc};

use tenant_tasks_core::{
    CommandCode, CronEvaluator, TaskKey, TaskSettings, TaskState, TaskStatus,
};

/// 每个 (租户, 任务) 的调度簿记记录
///
/// 条目在第一次观察到对应的 (租户, 任务) 时创建，在租户停止运行、
/// 任务从租户的注册集合中消失或进程停止时移除。
///
/// # 不变式
///
/// - `state.status == Running` 当且仅当该键有一次执行在途
/// - `state.next_start_at` 完全由 `(settings.schedule, reference_time)` 推导
/// - 计划（CRON表达式）变化会把参考时间重置为当前时间，新节奏从头开始
#[derive(Debug, Clone)]
pub struct SchedulerEntry {
    pub key: TaskKey,
    pub reference_time: DateTime<Utc>,
    pub settings: Option<TaskSettings>,
    pub state: TaskState,
}

impl SchedulerEntry {
    /// 创建新条目；解析到有效设置之前状态为Undefined，不可调度
    pub fn new(key: TaskKey, reference_time: DateTime<Utc>) -> Self {
        Self {
            key,
            reference_time,
            settings: None,
            state: TaskState::default(),
        }
    }

    /// 判断任务现在是否可以运行
    ///
    /// 条件：设置已启用、状态为Idle或Faulted（失败的任务到达下一次
    /// 计划时间后重试）、且当前时间不早于下一次计划启动时间。
    pub fn can_run(&self, now: DateTime<Utc>) -> bool {
        let Some(settings) = &self.settings else {
            return false;
        };
        if !settings.enable {
            return false;
        }
        if !matches!(self.state.status, TaskStatus::Idle | TaskStatus::Faulted) {
            return false;
        }
        match self.state.next_start_at {
            Some(next) => now >= next,
            None => false,
        }
    }

    /// 进入运行状态
    ///
    /// 参考时间前移到本次运行的开始时刻，下一次计划时间从这里算起，
    /// 否则稀疏计划（如 `*/5 * * * *`）在首个触发点过后会每个tick都触发。
    pub fn run(&mut self, now: DateTime<Utc>) {
        self.reference_time = now;
        self.state.status = TaskStatus::Running;
        self.state.started_at = Some(now);
        self.recompute_next_start();
    }

    /// 运行成功结束，清除上一次的错误
    pub fn idle(&mut self, now: DateTime<Utc>) {
        self.state.status = TaskStatus::Idle;
        self.state.stopped_at = Some(now);
        self.state.last_error = None;
    }

    /// 运行失败
    pub fn fault(&mut self, now: DateTime<Utc>, error: impl Into<String>) {
        self.state.status = TaskStatus::Faulted;
        self.state.stopped_at = Some(now);
        self.state.last_error = Some(error.into());
    }

    /// 应用新设置
    ///
    /// 计划变化时先把参考时间重置为 `now` 再采用新设置；首次拿到设置时
    /// 状态从Undefined转为Idle。状态机的其余部分不受设置刷新影响，
    /// 因此Disabled状态在设置提供者重新给出 enable=true 时依然保持。
    pub fn apply_settings(&mut self, new: TaskSettings, now: DateTime<Utc>) {
        let schedule_changed = match &self.settings {
            Some(current) => current.schedule != new.schedule,
            None => false,
        };
        if schedule_changed {
            self.reference_time = now;
        }
        if self.state.status == TaskStatus::Undefined {
            self.state.status = TaskStatus::Idle;
        }
        self.settings = Some(new);
        self.recompute_next_start();
    }

    /// 同步应用管理命令
    pub fn apply_command(&mut self, code: CommandCode, now: DateTime<Utc>) {
        match code {
            CommandCode::Enable => {
                if let Some(settings) = &mut self.settings {
                    settings.enable = true;
                }
                if self.state.status == TaskStatus::Disabled {
                    self.state.status = TaskStatus::Idle;
                }
            }
            CommandCode::Disable => {
                if let Some(settings) = &mut self.settings {
                    settings.enable = false;
                }
                self.state.status = TaskStatus::Disabled;
            }
            CommandCode::ResetState => {
                self.state.status = TaskStatus::Idle;
                self.state.last_error = None;
                self.reference_time = now;
                self.recompute_next_start();
            }
        }
    }

    /// 依据 (计划, 参考时间) 重新推导下一次启动时间
    ///
    /// 表达式非法时条目进入Faulted并携带解析错误，`next_start_at`
    /// 清空使其不可调度，直到设置变化带来可解析的计划。
    fn recompute_next_start(&mut self) {
        let Some(settings) = &self.settings else {
            self.state.next_start_at = None;
            return;
        };
        match CronEvaluator::parse(&settings.schedule) {
            Ok(evaluator) => {
                self.state.next_start_at = evaluator.next_occurrence(self.reference_time);
            }
            Err(e) => {
                self.state.status = TaskStatus::Faulted;
                self.state.last_error = Some(e.to_string());
                self.state.next_start_at = None;
            }
        }
    }
}

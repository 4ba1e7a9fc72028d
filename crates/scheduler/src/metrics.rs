//! 调度器运行指标

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// 记录一次调度扫描的耗时
pub fn record_tick_duration(duration: Duration) {
    histogram!("background_tasks_tick_duration_ms").record(duration.as_millis() as f64);
}

pub fn record_task_success() {
    counter!("background_tasks_succeeded_total").increment(1);
}

pub fn record_task_failure() {
    counter!("background_tasks_failed_total").increment(1);
}

/// 记录注册表当前的条目数量
pub fn record_registry_size(size: usize) {
    gauge!("background_tasks_registry_entries").set(size as f64);
}

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;

use crate::errors::{Result, SchedulerError};

/// CRON表达式求值器
///
/// `cron` crate 解析的是带秒字段的6/7字段表达式；标准的5字段表达式
/// 在解析前补上秒字段 `0`，6/7字段的输入原样透传。
///
/// 求值器按次构造，不跨调用缓存：解析很便宜，正确性优先。
#[derive(Debug)]
pub struct CronEvaluator {
    schedule: Schedule,
}

impl CronEvaluator {
    /// 解析CRON表达式
    pub fn parse(expr: &str) -> Result<Self> {
        let normalized = normalize_expression(expr);
        let schedule =
            Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
                expr: expr.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { schedule })
    }

    /// 获取严格晚于 `after` 的下一次执行时间
    pub fn next_occurrence(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }

    /// 计算下次执行时间距离现在的时长
    pub fn time_until_next(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_occurrence(now).map(|next| next - now)
    }
}

/// 验证CRON表达式是否有效
pub fn validate_expression(expr: &str) -> Result<()> {
    CronEvaluator::parse(expr).map(|_| ())
}

/// 5字段表达式补齐秒字段
fn normalize_expression(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

pub mod config;
pub mod cron;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::{default_parallelism, AppConfig, SchedulerConfig};
pub use cron::{validate_expression, CronEvaluator};
pub use errors::{Result, SchedulerError};
pub use models::{CommandCode, TaskKey, TaskSettings, TaskState, TaskStatus, DEFAULT_SCHEDULE};
pub use traits::{
    BackgroundContext, BackgroundTask, SettingsProvider, ShellInfo, ShellState, TenantHost,
    TenantScope,
};

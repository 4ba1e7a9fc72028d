pub mod settings_provider;
pub mod task;
pub mod tenant_host;

pub use settings_provider::SettingsProvider;
pub use task::BackgroundTask;
pub use tenant_host::{BackgroundContext, ShellInfo, ShellState, TenantHost, TenantScope};

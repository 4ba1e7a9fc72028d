pub mod command;
pub mod key;
pub mod settings;
pub mod state;

pub use command::CommandCode;
pub use key::{TaskKey, KEY_SEPARATOR};
pub use settings::{TaskSettings, DEFAULT_SCHEDULE};
pub use state::{TaskState, TaskStatus};

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod executor;
pub mod types;
pub mod utils;


// Re-export commonly used items
pub use error::{ExecutorError, ExecutorResult};
pub use executor::{available_commands, Executor, EXECUTOR_NAME};
pub use types::{Command, StepRequest, StepResult};

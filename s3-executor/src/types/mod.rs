pub mod command;
pub mod step;

pub use command::Command;
pub use step::{StepRequest, StepResult};

//! Deploy execution: commands, task groups, the stage runner and the poll loop

pub mod command;
pub mod engine;
pub mod executor;
pub mod scheduler;
pub mod stamp;

pub use command::{shell_quote, CommandOutput, CommandRunner, ShellCommandRunner};
pub use engine::{EventHandler, ExecutionEvent, PipelineRunner};
pub use executor::TaskGroupExecutor;
pub use scheduler::{FlightGuard, PollScheduler, SingleFlight, TickOutcome, MAX_CONSECUTIVE_FAILURES};
pub use stamp::CommitStamper;

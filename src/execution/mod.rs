//! Pipeline execution: commands, steps, jobs and job groups

pub mod command;
pub mod events;
pub mod job;
pub mod orchestrator;
pub mod scheduler;
pub mod sequencer;

pub use command::{CommandExecutor, CommandOutput, ProcessExecutor};
pub use events::{EventHandler, EventSink, ExecutionEvent};
pub use job::{JobExecutor, JobRunner};
pub use orchestrator::PipelineOrchestrator;
pub use scheduler::SchedulingStrategy;
pub use sequencer::StepSequencer;

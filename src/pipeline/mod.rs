pub mod commit;
pub mod runner;

pub use commit::CommitTracker;
pub use runner::{PipelineError, Worker, WorkerControl, WorkerReport, WorkerSettings};

//! Task orchestration: ordering, execution, and compensation.

pub mod events;
pub mod graph;
pub mod orchestrator;
pub mod report;
pub mod rollback;

pub use events::{EventSink, MemorySink, RunEvent, Severity, TracingSink};
pub use graph::{resolve, TaskGraph, TaskGraphBuilder};
pub use orchestrator::{CancelToken, Orchestrator};
pub use report::{ExecutionReport, RunState, TaskRecord, TaskStatus};
pub use rollback::{RollbackFailure, RollbackManager, RollbackOutcome};

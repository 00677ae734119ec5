mod execution;
mod state;

pub use execution::{AuditRecord, Execution, FailureKind, Outcome};
pub use state::{Event, State, StateMachine, Transition};

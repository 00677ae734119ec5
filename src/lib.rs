//! Bounded-recovery action executor.
//!
//! An [`ActionExecutor`] drives one goal at a time through
//! INITIALIZING → RUNNING (→ RECOVERING → RUNNING)* → DONE | FAILED while a
//! watchdog enforces a wall-clock deadline. Concrete actions plug in through
//! the [`action`] capability traits; [`recognition`] provides the gender
//! recognition action backed by an [`inference`] server.

pub mod action;
pub mod config;
pub mod error;
pub mod executor;
pub mod inference;
pub mod recognition;
pub mod result;
pub mod state_machine;

pub use action::{
    BlockingTask, ChannelSink, RecoveryStep, ResourceLoader, ResultSink, ReuseHandle, TaskBody,
};
pub use config::ActionsmConfig;
pub use error::{ActionError, ExecutorError};
pub use executor::{ActionExecutor, ExecutorConfig};
pub use result::ActionResult;
pub use state_machine::{AuditRecord, FailureKind, State};

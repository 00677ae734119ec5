use serde::Serialize;

use crate::state_machine::{AuditRecord, FailureKind};

/// Terminal result of one execution.
///
/// Only built through [`ActionResult::succeeded`] and [`ActionResult::failed`],
/// so `success` is true exactly when a payload is attached.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult<P> {
    pub success: bool,
    pub payload: Option<P>,
    pub failure: Option<FailureKind>,
    pub report: AuditRecord,
}

impl<P> ActionResult<P> {
    pub fn succeeded(payload: P, report: AuditRecord) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            failure: None,
            report,
        }
    }

    pub fn failed(failure: FailureKind, report: AuditRecord) -> Self {
        Self {
            success: false,
            payload: None,
            failure: Some(failure),
            report,
        }
    }

    /// True when the deadline, not the task logic, ended the execution.
    pub fn is_timeout(&self) -> bool {
        self.failure.as_ref().is_some_and(FailureKind::is_timeout)
    }
}

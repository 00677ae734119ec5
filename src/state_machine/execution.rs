use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::State;

/// Why an execution ended in `FAILED`.
///
/// Timeouts are reported separately from task failures so callers can tell
/// "ran out of time" apart from "logic failed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The resource needed by the task body could not be acquired. Never retried.
    Initialization(String),
    /// The task body failed and the recovery budget is spent.
    Task(String),
    /// The recovery step itself failed.
    Recovery(String),
    /// The deadline elapsed before a terminal outcome.
    Timeout { timeout_ms: u64 },
}

impl FailureKind {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FailureKind::Timeout { .. })
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Initialization(msg) => write!(f, "Initialization failure: {msg}"),
            FailureKind::Task(msg) => write!(f, "Task failure: {msg}"),
            FailureKind::Recovery(msg) => write!(f, "Recovery failure: {msg}"),
            FailureKind::Timeout { timeout_ms } => {
                write!(f, "Timeout failure: deadline of {timeout_ms}ms elapsed")
            }
        }
    }
}

/// Terminal outcome of one execution, without the domain payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Failure(FailureKind),
}

/// Bookkeeping for a single `execute` call.
///
/// Lives from INITIALIZING entry until the terminal transition. The recovery
/// counter starts at zero for every execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub action: String,
    pub state: State,
    pub state_history: Vec<State>,
    pub recovery_count: u32,
    pub max_recovery_attempts: u32,
    pub timeout: Duration,
    pub started_at: DateTime<Utc>,
}

impl Execution {
    pub fn new(action: impl Into<String>, max_recovery_attempts: u32, timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action: action.into(),
            state: State::Uninitialized,
            state_history: Vec::new(),
            recovery_count: 0,
            max_recovery_attempts,
            timeout,
            started_at: Utc::now(),
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Structured audit record produced at the terminal transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub execution_id: String,
    pub action: String,
    pub final_state: State,
    pub state_transitions: Vec<State>,
    pub recovery_count: u32,
    pub max_recovery_attempts: u32,
    pub failure: Option<FailureKind>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl AuditRecord {
    /// Generate an audit record from a finished execution.
    pub fn from_execution(execution: &Execution, failure: Option<FailureKind>) -> Self {
        let now = Utc::now();
        let duration = now - execution.started_at;
        let mut transitions = execution.state_history.clone();
        transitions.push(execution.state);

        Self {
            execution_id: execution.id.clone(),
            action: execution.action.clone(),
            final_state: execution.state,
            state_transitions: transitions,
            recovery_count: execution.recovery_count,
            max_recovery_attempts: execution.max_recovery_attempts,
            failure,
            started_at: execution.started_at,
            completed_at: now,
            duration_ms: duration.num_milliseconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_creation_defaults() {
        let exec = Execution::new("recognize_gender", 1, Duration::from_secs(120));
        assert_eq!(exec.state, State::Uninitialized);
        assert_eq!(exec.recovery_count, 0);
        assert_eq!(exec.max_recovery_attempts, 1);
        assert_eq!(exec.timeout_ms(), 120_000);
        assert!(exec.state_history.is_empty());
    }

    #[test]
    fn executions_get_distinct_ids() {
        let a = Execution::new("a", 0, Duration::ZERO);
        let b = Execution::new("a", 0, Duration::ZERO);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn audit_record_appends_final_state() {
        let mut exec = Execution::new("recognize_gender", 1, Duration::from_secs(1));
        exec.state_history = vec![State::Uninitialized, State::Initializing];
        exec.state = State::Failed;
        let failure = FailureKind::Initialization("model missing".into());

        let record = AuditRecord::from_execution(&exec, Some(failure.clone()));

        assert_eq!(record.execution_id, exec.id);
        assert_eq!(record.final_state, State::Failed);
        assert_eq!(
            record.state_transitions,
            vec![State::Uninitialized, State::Initializing, State::Failed]
        );
        assert_eq!(record.failure, Some(failure));
        assert!(record.duration_ms >= 0);
    }

    #[test]
    fn failure_kind_display() {
        assert_eq!(
            FailureKind::Task("bad frame".into()).to_string(),
            "Task failure: bad frame"
        );
        assert_eq!(
            FailureKind::Timeout { timeout_ms: 10 }.to_string(),
            "Timeout failure: deadline of 10ms elapsed"
        );
        assert!(FailureKind::Timeout { timeout_ms: 10 }.is_timeout());
        assert!(!FailureKind::Recovery("x".into()).is_timeout());
    }

    #[test]
    fn audit_record_serializes_to_json() {
        let exec = Execution::new("demo", 2, Duration::from_millis(500));
        let record = AuditRecord::from_execution(&exec, None);
        let json = serde_json::to_string(&record).unwrap();
        let parsed: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.execution_id, record.execution_id);
        assert_eq!(parsed.final_state, State::Uninitialized);
        assert!(json.contains("\"max_recovery_attempts\":2"));
    }
}

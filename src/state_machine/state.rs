use std::fmt;

use serde::{Deserialize, Serialize};

use super::execution::{Execution, FailureKind, Outcome};

/// The six states of the action life cycle.
///
/// Each execution flows through: UNINITIALIZED → INITIALIZING → RUNNING
/// (→ RECOVERING → RUNNING)* → DONE | FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Uninitialized,
    Initializing,
    Running,
    Recovering,
    Done,
    Failed,
}

impl State {
    /// `Done` and `Failed` accept no further events.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Done | State::Failed)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Uninitialized => write!(f, "UNINITIALIZED"),
            State::Initializing => write!(f, "INITIALIZING"),
            State::Running => write!(f, "RUNNING"),
            State::Recovering => write!(f, "RECOVERING"),
            State::Done => write!(f, "DONE"),
            State::Failed => write!(f, "FAILED"),
        }
    }
}

/// A signal reported by the active-state body or by the watchdog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start,
    Initialized,
    InitializationFailed(String),
    TaskSucceeded,
    TaskFailed(String),
    Recovered,
    RecoveryFailed(String),
    DeadlineElapsed,
}

/// The result of evaluating a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Advance to the next state.
    Next(State),
    /// Enter RECOVERING; `attempt` is the 1-based recovery attempt about to run.
    Recover { attempt: u32, reason: String },
    /// The execution reached DONE or FAILED.
    Complete(Outcome),
    /// The event is not accepted in `state`. The execution is left untouched.
    Invalid { state: State, event: Event },
}

/// Drives an `Execution` through the transition table.
pub struct StateMachine;

impl StateMachine {
    /// Compute the next transition for the execution based on its current
    /// state and the reported event, then apply it.
    ///
    /// - `Initializing` failures are fatal and never touch the recovery counter.
    /// - A `Running` failure enters `Recovering` while
    ///   `recovery_count < max_recovery_attempts`, otherwise fails.
    /// - The counter is incremented only on `Recovering → Running`.
    /// - `DeadlineElapsed` fails any non-terminal, started execution.
    pub fn next(exec: &mut Execution, event: Event) -> Transition {
        let transition = match (exec.state, &event) {
            (State::Uninitialized, Event::Start) => Transition::Next(State::Initializing),
            (State::Initializing, Event::Initialized) => Transition::Next(State::Running),
            (State::Initializing, Event::InitializationFailed(msg)) => Transition::Complete(
                Outcome::Failure(FailureKind::Initialization(msg.clone())),
            ),
            (State::Running, Event::TaskSucceeded) => Transition::Complete(Outcome::Success),
            (State::Running, Event::TaskFailed(msg)) => Self::handle_failure(exec, msg),
            (State::Recovering, Event::Recovered) => Transition::Next(State::Running),
            (State::Recovering, Event::RecoveryFailed(msg)) => {
                Transition::Complete(Outcome::Failure(FailureKind::Recovery(msg.clone())))
            }
            (State::Initializing | State::Running | State::Recovering, Event::DeadlineElapsed) => {
                Transition::Complete(Outcome::Failure(FailureKind::Timeout {
                    timeout_ms: exec.timeout_ms(),
                }))
            }
            (state, _) => Transition::Invalid {
                state,
                event: event.clone(),
            },
        };

        match &transition {
            Transition::Next(next_state) => {
                if exec.state == State::Recovering && *next_state == State::Running {
                    exec.recovery_count += 1;
                }
                exec.state_history.push(exec.state);
                exec.state = *next_state;
            }
            Transition::Recover { .. } => {
                exec.state_history.push(exec.state);
                exec.state = State::Recovering;
            }
            Transition::Complete(outcome) => {
                exec.state_history.push(exec.state);
                exec.state = match outcome {
                    Outcome::Success => State::Done,
                    Outcome::Failure(_) => State::Failed,
                };
            }
            Transition::Invalid { .. } => {}
        }

        transition
    }

    fn handle_failure(exec: &Execution, reason: &str) -> Transition {
        if exec.recovery_count < exec.max_recovery_attempts {
            Transition::Recover {
                attempt: exec.recovery_count + 1,
                reason: reason.to_string(),
            }
        } else {
            Transition::Complete(Outcome::Failure(FailureKind::Task(reason.to_string())))
        }
    }
}

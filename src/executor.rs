use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::action::{RecoveryStep, ResourceLoader, ResultSink, ReuseHandle, TaskBody};
use crate::error::{ActionError, ExecutorError};
use crate::result::ActionResult;
use crate::state_machine::{
    AuditRecord, Event, Execution, FailureKind, Outcome, State, StateMachine, Transition,
};

/// Timeout and recovery budget for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Wall-clock budget measured from INITIALIZING entry.
    pub timeout: Duration,
    /// How many times RECOVERING may be entered per execution.
    pub max_recovery_attempts: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_recovery_attempts: 1,
        }
    }
}

type TransitionHook = Box<dyn Fn(State, State) + Send + Sync>;

/// What the worker side of the race produced.
enum Finish<P> {
    Succeeded(P),
    Failed(FailureKind),
}

/// Drives one goal at a time through the action life cycle while a watchdog
/// enforces the deadline.
pub struct ActionExecutor<G, L, T, R = ReuseHandle>
where
    L: ResourceLoader,
    T: TaskBody<G, L::Handle>,
    R: RecoveryStep<L::Handle>,
{
    name: String,
    config: ExecutorConfig,
    loader: L,
    task: T,
    recovery: R,
    sinks: Vec<Box<dyn ResultSink<T::Payload>>>,
    hooks: Vec<TransitionHook>,
    state: State,
    last_report: Option<AuditRecord>,
    _goal: PhantomData<fn(G)>,
}

impl<G, L, T> ActionExecutor<G, L, T, ReuseHandle>
where
    L: ResourceLoader,
    T: TaskBody<G, L::Handle>,
{
    /// Create an executor whose recovery step reuses the existing handle.
    pub fn new(name: impl Into<String>, loader: L, task: T, config: ExecutorConfig) -> Self {
        Self {
            name: name.into(),
            config,
            loader,
            task,
            recovery: ReuseHandle,
            sinks: Vec::new(),
            hooks: Vec::new(),
            state: State::Uninitialized,
            last_report: None,
            _goal: PhantomData,
        }
    }
}

impl<G, L, T, R> ActionExecutor<G, L, T, R>
where
    L: ResourceLoader,
    T: TaskBody<G, L::Handle>,
    R: RecoveryStep<L::Handle>,
{
    /// Replace the recovery step.
    pub fn with_recovery<R2>(self, recovery: R2) -> ActionExecutor<G, L, T, R2>
    where
        R2: RecoveryStep<L::Handle>,
    {
        ActionExecutor {
            name: self.name,
            config: self.config,
            loader: self.loader,
            task: self.task,
            recovery,
            sinks: self.sinks,
            hooks: self.hooks,
            state: self.state,
            last_report: self.last_report,
            _goal: PhantomData,
        }
    }

    /// Register a sink that receives every finalized result.
    pub fn with_sink(mut self, sink: impl ResultSink<T::Payload> + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Register a callback invoked with `(from, to)` on every state change.
    pub fn on_transition(mut self, hook: impl Fn(State, State) + Send + Sync + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// State reached by the most recent execution.
    pub fn state(&self) -> State {
        self.state
    }

    pub fn last_report(&self) -> Option<&AuditRecord> {
        self.last_report.as_ref()
    }

    /// Return a finished executor to `Uninitialized` so it accepts a new goal.
    ///
    /// Clears the report of the previous execution.
    pub fn reset(&mut self) {
        self.state = State::Uninitialized;
        self.last_report = None;
    }

    /// Run one full life cycle for `goal` and return its terminal result.
    ///
    /// The worker (INITIALIZING, RUNNING, RECOVERING bodies) races a watchdog
    /// armed with `timeout`. The watchdog is polled first, so on simultaneous
    /// completion the timeout wins, and once it fires the worker future is
    /// dropped and whatever it would have produced is discarded.
    pub async fn execute(&mut self, goal: G) -> Result<ActionResult<T::Payload>, ExecutorError> {
        if self.state.is_terminal() {
            return Err(ExecutorError::NotReset { state: self.state });
        }

        let mut exec = Execution::new(
            self.name.clone(),
            self.config.max_recovery_attempts,
            self.config.timeout,
        );
        let span = info_span!("execute", action = %self.name, execution_id = %exec.id);

        self.apply(&mut exec, Event::Start);
        let deadline = deadline_after(self.config.timeout);

        let finish = async {
            tokio::select! {
                biased;
                () = watchdog(deadline) => None,
                finish = self.drive(&goal, &mut exec) => Some(finish),
            }
        }
        .instrument(span.clone())
        .await;

        let finish = match finish {
            Some(finish) => finish,
            None => {
                let _enter = span.enter();
                let kind = FailureKind::Timeout {
                    timeout_ms: exec.timeout_ms(),
                };
                self.apply(&mut exec, Event::DeadlineElapsed);
                Finish::Failed(kind)
            }
        };

        let result = match finish {
            Finish::Succeeded(payload) => {
                ActionResult::succeeded(payload, AuditRecord::from_execution(&exec, None))
            }
            Finish::Failed(kind) => {
                let report = AuditRecord::from_execution(&exec, Some(kind.clone()));
                ActionResult::failed(kind, report)
            }
        };

        self.state = exec.state;
        self.last_report = Some(result.report.clone());
        for sink in &self.sinks {
            sink.deliver(&result);
        }

        Ok(result)
    }

    async fn drive(&self, goal: &G, exec: &mut Execution) -> Finish<T::Payload> {
        let mut handle = match guarded(self.loader.load()).await {
            Ok(handle) => {
                self.apply(exec, Event::Initialized);
                handle
            }
            Err(e) => {
                let t = self.apply(exec, Event::InitializationFailed(e.to_string()));
                return Finish::Failed(failure_of(t));
            }
        };

        loop {
            match guarded(self.task.run(goal, &handle)).await {
                Ok(payload) => {
                    self.apply(exec, Event::TaskSucceeded);
                    return Finish::Succeeded(payload);
                }
                Err(e) => match self.apply(exec, Event::TaskFailed(e.to_string())) {
                    Transition::Recover { .. } => {}
                    t => return Finish::Failed(failure_of(t)),
                },
            }

            handle = match guarded(self.recovery.recover(handle)).await {
                Ok(handle) => {
                    self.apply(exec, Event::Recovered);
                    handle
                }
                Err(e) => {
                    let t = self.apply(exec, Event::RecoveryFailed(e.to_string()));
                    return Finish::Failed(failure_of(t));
                }
            };
        }
    }

    fn apply(&self, exec: &mut Execution, event: Event) -> Transition {
        let from = exec.state;
        let transition = StateMachine::next(exec, event);

        match &transition {
            Transition::Next(to) => {
                debug!(from = %from, to = %to, recovery_count = exec.recovery_count, "transition");
            }
            Transition::Recover { attempt, reason } => {
                warn!(
                    attempt,
                    max = exec.max_recovery_attempts,
                    %reason,
                    "task failed, recovering"
                );
            }
            Transition::Complete(Outcome::Success) => {
                info!(recovery_count = exec.recovery_count, "action done");
            }
            Transition::Complete(Outcome::Failure(kind)) => {
                error!(recovery_count = exec.recovery_count, failure = %kind, "action failed");
            }
            Transition::Invalid { state, event } => {
                warn!(state = %state, ?event, "event ignored in current state");
            }
        }

        if exec.state != from {
            for hook in &self.hooks {
                hook(from, exec.state);
            }
        }

        transition
    }
}

/// Awaits a collaborator future, reporting a panic as an [`ActionError`].
async fn guarded<T>(fut: impl Future<Output = Result<T, ActionError>>) -> Result<T, ActionError> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(ActionError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Completes once `deadline` has passed; an already expired deadline
/// completes on the first poll.
async fn watchdog(deadline: Instant) {
    if Instant::now() < deadline {
        tokio::time::sleep_until(deadline).await;
    }
}

// Far enough out to never fire, without overflowing `Instant`.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

fn failure_of(transition: Transition) -> FailureKind {
    match transition {
        Transition::Complete(Outcome::Failure(kind)) => kind,
        other => FailureKind::Task(format!("unexpected transition: {other:?}")),
    }
}

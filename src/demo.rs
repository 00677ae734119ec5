//! Simulated action for `actionsm demo`: no model server needed.

use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use actionsm::{ActionError, ActionExecutor, ExecutorConfig, ResourceLoader, TaskBody};

use crate::ui::ActionProgress;

const DEMO_ACTION: &str = "simulated_recognition";
const DEMO_LABELS: [&str; 2] = ["female", "male"];

/// Number of faces to "recognize".
pub struct DemoGoal {
    pub faces: usize,
}

pub struct SimulatedLoader;

impl ResourceLoader for SimulatedLoader {
    type Handle = String;

    async fn load(&self) -> Result<String, ActionError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok("simulated-model-v1".to_string())
    }
}

/// Sleeps for `task_time`, failing the first `fail_times` calls.
pub struct SimulatedTask {
    fail_times: u32,
    task_time: Duration,
    calls: AtomicU32,
}

impl SimulatedTask {
    pub fn new(fail_times: u32, task_time: Duration) -> Self {
        Self {
            fail_times,
            task_time,
            calls: AtomicU32::new(0),
        }
    }
}

impl TaskBody<DemoGoal, String> for SimulatedTask {
    type Payload = Vec<String>;

    async fn run(&self, goal: &DemoGoal, model: &String) -> Result<Vec<String>, ActionError> {
        tokio::time::sleep(self.task_time).await;
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_times {
            return Err(ActionError::Classification(format!(
                "{model} could not classify frame (simulated failure {})",
                call + 1
            )));
        }
        Ok((0..goal.faces)
            .map(|i| DEMO_LABELS[i % DEMO_LABELS.len()].to_string())
            .collect())
    }
}

pub async fn run(
    fail_times: u32,
    task_ms: u64,
    config: ExecutorConfig,
) -> anyhow::Result<ExitCode> {
    println!(
        "Running simulated action: {fail_times} failure(s), {task_ms}ms per attempt, \
         timeout {:?}, {} recovery attempt(s)",
        config.timeout, config.max_recovery_attempts
    );

    let progress = ActionProgress::start(DEMO_ACTION);
    let mut executor = ActionExecutor::new(
        DEMO_ACTION,
        SimulatedLoader,
        SimulatedTask::new(fail_times, Duration::from_millis(task_ms)),
        config,
    )
    .on_transition(progress.hook());

    let result = executor.execute(DemoGoal { faces: 2 }).await?;
    progress.complete(&result);
    progress.print_audit(&result.report);

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

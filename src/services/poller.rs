//! Task polling
//!
//! Fixed-interval, bounded-attempt polling of asynchronous generation tasks

use crate::models::media::UnifiedTask;
use crate::utils::console;
use crate::utils::error::ProbeResult;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Polling configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between attempts
    pub interval: Duration,
    /// Number of fetches before giving up
    pub max_attempts: u32,
    /// Sleep before the first fetch too
    pub initial_delay: bool,
    /// Keep polling after a failed fetch
    pub tolerate_errors: bool,
}

impl PollConfig {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            initial_delay: false,
            tolerate_errors: false,
        }
    }

    pub fn sleep_first(mut self) -> Self {
        self.initial_delay = true;
        self
    }

    pub fn tolerate_errors(mut self) -> Self {
        self.tolerate_errors = true;
        self
    }
}

/// State of a task as seen by one fetch
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState<T> {
    Pending { status: String, progress: Option<String> },
    Succeeded(T),
    Failed(String),
}

/// Final polling result
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Succeeded(T),
    Failed(String),
    TimedOut { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Succeeded(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            PollOutcome::Succeeded(value) => Some(value),
            _ => None,
        }
    }
}

/// Poll until `classify` reports a terminal state or the attempt budget runs out
pub async fn poll_task<V, T, F, Fut, C>(mut fetch: F, classify: C, config: &PollConfig) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult<V>>,
    C: Fn(&V) -> TaskState<T>,
{
    for attempt in 1..=config.max_attempts {
        if config.initial_delay || attempt > 1 {
            tokio::time::sleep(config.interval).await;
        }

        let value = match fetch().await {
            Ok(value) => value,
            Err(e) if config.tolerate_errors => {
                warn!(attempt, "Poll request failed: {}", e);
                console::warn(&format!("[{}/{}] poll error: {}", attempt, config.max_attempts, e));
                continue;
            }
            Err(e) => return PollOutcome::Failed(format!("poll request failed: {}", e)),
        };

        match classify(&value) {
            TaskState::Pending { status, progress } => {
                debug!(attempt, status = %status, "Task pending");
                console::progress(attempt, config.max_attempts, &status, progress.as_deref());
            }
            TaskState::Succeeded(result) => return PollOutcome::Succeeded(result),
            TaskState::Failed(reason) => return PollOutcome::Failed(reason),
        }
    }

    PollOutcome::TimedOut {
        attempts: config.max_attempts,
    }
}

/// Coarse classification of a provider status string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Failure,
    Pending,
}

/// Classify a status string, case-insensitively
///
/// Covers the gateway (`SUCCESS`/`FAILURE`), seedance (`success`/`failure`)
/// and Kling (`succeed`/`failed`) vocabularies.
pub fn classify_status(status: &str) -> StatusKind {
    let status = status.trim().to_ascii_lowercase();
    match status.as_str() {
        "success" | "succeed" | "succeeded" | "completed" => StatusKind::Success,
        "failure" | "failed" | "fail" => StatusKind::Failure,
        _ => StatusKind::Pending,
    }
}

/// Classify a task object from the gateway's unified envelope
pub fn classify_unified(task: &UnifiedTask) -> TaskState<UnifiedTask> {
    match classify_status(&task.status) {
        StatusKind::Success => {
            // The gateway can report SUCCESS while the provider payload carries an error
            if let Some(kling) = task.kling() {
                if kling.code != 0 {
                    return TaskState::Failed(format!("provider error {}: {}", kling.code, kling.message));
                }
                if let Some(data) = &kling.data {
                    if classify_status(&data.task_status) == StatusKind::Failure {
                        return TaskState::Failed(
                            data.task_status_msg.clone().unwrap_or_else(|| "provider task failed".to_string()),
                        );
                    }
                }
            }
            TaskState::Succeeded(task.clone())
        }
        StatusKind::Failure => TaskState::Failed(task.failure_reason()),
        StatusKind::Pending => TaskState::Pending {
            status: if task.status.is_empty() {
                "unknown".to_string()
            } else {
                task.status.clone()
            },
            progress: Some(task.progress().to_string()),
        },
    }
}

/// Classify a raw fetch response through the unified envelope
pub fn classify_value(value: &Value) -> TaskState<UnifiedTask> {
    match UnifiedTask::from_value(value) {
        Ok(task) => classify_unified(&task),
        Err(e) => TaskState::Failed(format!("unexpected task response: {}", e)),
    }
}

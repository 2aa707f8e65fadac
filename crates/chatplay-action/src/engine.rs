//! Execution engine: a bounded worker pool plus a completion delivery task.
//!
//! Each admitted action runs in its own tokio task, capped by a semaphore of
//! `pool_size` permits. When the action returns (or panics) the worker hands
//! the result to a single delivery task, which marks the task terminal,
//! invokes the completion callback and then drops the task, releasing its
//! governor slot.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinError;

use crate::error::EngineError;
use crate::governor::AdmissionTicket;
use crate::task::{Completion, Task, TaskHandle};
use crate::types::{AuthorizationDecision, ErrorOutcome, FailureFlag, TaskStatus};

/// Observer invoked once per finished task, on the delivery task.
pub type CompletionCallback = Arc<dyn Fn(&Completion) + Send + Sync>;

/// A worker's report, on its way to the delivery task.
struct Finished {
    task: Task,
    status: TaskStatus,
    outcome: ErrorOutcome,
    fault: Option<String>,
    done: oneshot::Sender<Completion>,
}

pub struct ExecutionEngine {
    pool_size: usize,
    permits: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    finished_tx: mpsc::UnboundedSender<Finished>,
}

impl ExecutionEngine {
    /// Create the engine and spawn its delivery task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<F>(pool_size: usize, callback: F) -> Self
    where
        F: Fn(&Completion) + Send + Sync + 'static,
    {
        Self::with_callback(pool_size, Arc::new(callback))
    }

    pub fn with_callback(pool_size: usize, callback: CompletionCallback) -> Self {
        let pool_size = pool_size.max(1);
        let pending = Arc::new(AtomicUsize::new(0));
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();

        tokio::spawn(deliver_completions(
            finished_rx,
            callback,
            Arc::clone(&pending),
        ));

        tracing::debug!(pool_size, "Execution engine started");

        Self {
            pool_size,
            permits: Arc::new(Semaphore::new(pool_size)),
            pending,
            finished_tx,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Workers currently running an action.
    pub fn busy_workers(&self) -> usize {
        self.pool_size - self.permits.available_permits()
    }

    /// Tasks submitted whose completion has not been delivered yet.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Start running `decision` on the pool. Never waits for a worker.
    ///
    /// On `PoolSaturated` the ticket is dropped and its slot released.
    pub fn submit(
        &self,
        decision: AuthorizationDecision,
        ticket: AdmissionTicket,
    ) -> Result<TaskHandle, EngineError> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| EngineError::PoolSaturated {
                pool_size: self.pool_size,
            })?;

        let task = Task::start(&decision, ticket);
        let (done_tx, done_rx) = oneshot::channel();
        let handle = TaskHandle {
            id: task.id,
            tag: task.tag.clone(),
            owner: task.owner.clone(),
            started_at: task.started_at,
            done: done_rx,
        };

        self.pending.fetch_add(1, Ordering::AcqRel);
        let finished_tx = self.finished_tx.clone();
        let action = decision.action;
        let force = decision.elevated;

        tokio::spawn(async move {
            let joined = tokio::spawn(async move { action.run(force).await }).await;
            drop(permit);

            let (status, outcome, fault) = match joined {
                Ok(outcome) => (TaskStatus::Completed, outcome, None),
                Err(e) => crashed(e),
            };

            let finished = Finished {
                task,
                status,
                outcome,
                fault,
                done: done_tx,
            };
            if finished_tx.send(finished).is_err() {
                tracing::warn!("Completion dropped: delivery task is gone");
            }
        });

        Ok(handle)
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("pool_size", &self.pool_size)
            .field("busy_workers", &self.busy_workers())
            .field("pending", &self.pending())
            .finish()
    }
}

fn crashed(err: JoinError) -> (TaskStatus, ErrorOutcome, Option<String>) {
    if err.is_panic() {
        let fault = panic_message(err.into_panic());
        (
            TaskStatus::Crashed,
            ErrorOutcome::failure(FailureFlag::Panic),
            Some(fault),
        )
    } else {
        (
            TaskStatus::Crashed,
            ErrorOutcome::failure(FailureFlag::Cancelled),
            None,
        )
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn deliver_completions(
    mut finished_rx: mpsc::UnboundedReceiver<Finished>,
    callback: CompletionCallback,
    pending: Arc<AtomicUsize>,
) {
    while let Some(finished) = finished_rx.recv().await {
        let Finished {
            mut task,
            status,
            outcome,
            fault,
            done,
        } = finished;

        if let Err(e) = task.transition(status) {
            tracing::error!(task_id = %task.id, error = %e, "Completion for task in wrong state");
            pending.fetch_sub(1, Ordering::AcqRel);
            continue;
        }

        let completion = task.complete(outcome, fault);
        if catch_unwind(AssertUnwindSafe(|| callback(&completion))).is_err() {
            tracing::error!(task_id = %completion.task_id, tag = %completion.tag, "Completion callback panicked");
        }

        drop(task);
        pending.fetch_sub(1, Ordering::AcqRel);
        // Nobody waiting on the handle is fine.
        let _ = done.send(completion);
    }
    tracing::debug!("Completion delivery stopped");
}

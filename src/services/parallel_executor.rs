//! Parallel task executor: dependency-aware scheduling under a concurrency cap.
//!
//! Tasks are started as soon as every dependency has completed, in insertion
//! order, with at most `max_concurrency` in flight. A task whose dependency
//! failed or was blocked is itself blocked, transitively. Task failures are
//! recorded on the task and never abort the run.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::{TaskExecution, TaskStatus};
use crate::services::dependency_resolver::DependencyResolver;

/// Outputs of a task's dependencies, keyed by dependency id.
///
/// Each task receives its own snapshot, taken when the task starts.
pub type DependencyOutputs<T> = HashMap<String, T>;

type TaskWork<T> = Box<dyn FnOnce(DependencyOutputs<T>) -> BoxFuture<'static, WorkflowResult<T>> + Send>;

/// Event emitted during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    /// Task started.
    TaskStarted { task_id: String },
    /// Task completed.
    TaskCompleted { task_id: String, duration_ms: u64 },
    /// Task failed.
    TaskFailed { task_id: String, error: String },
    /// Task will never run because a dependency did not complete.
    TaskBlocked {
        task_id: String,
        blocked_by: Vec<String>,
    },
}

struct ScheduledTask<T> {
    id: String,
    dependencies: BTreeSet<String>,
    work: Option<TaskWork<T>>,
}

/// Executor for one phase's task graph.
pub struct ParallelExecutor<T> {
    tasks: Vec<ScheduledTask<T>>,
    index: HashMap<String, usize>,
    preblocked: Vec<(String, Vec<String>)>,
    task_timeout: Option<Duration>,
    events: Option<mpsc::UnboundedSender<ExecutionEvent>>,
}

impl<T> Default for ParallelExecutor<T> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            index: HashMap::new(),
            preblocked: Vec::new(),
            task_timeout: None,
            events: None,
        }
    }
}

impl<T> ParallelExecutor<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any task that runs longer than `timeout`.
    #[must_use]
    pub const fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Register a task. Dependencies are checked when [`execute`](Self::execute) runs.
    pub fn add_task<F, Fut>(
        &mut self,
        id: impl Into<String>,
        work: F,
        dependencies: impl IntoIterator<Item = impl Into<String>>,
    ) -> WorkflowResult<()>
    where
        F: FnOnce(DependencyOutputs<T>) -> Fut + Send + 'static,
        Fut: Future<Output = WorkflowResult<T>> + Send + 'static,
    {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(WorkflowError::DuplicateTask(id));
        }

        let work: TaskWork<T> = Box::new(move |outputs| work(outputs).boxed());
        self.index.insert(id.clone(), self.tasks.len());
        self.tasks.push(ScheduledTask {
            id,
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            work: Some(work),
        });
        Ok(())
    }

    /// Mark a registered task as blocked before execution starts.
    ///
    /// `blocked_by` lists the ids the task was waiting for. Dependents of
    /// the task are blocked in turn.
    pub fn block_task<I, S>(&mut self, id: &str, blocked_by: I) -> WorkflowResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.index.contains_key(id) {
            return Err(WorkflowError::InvalidInput(format!(
                "cannot block unknown task '{id}'"
            )));
        }
        self.preblocked
            .push((id.to_string(), blocked_by.into_iter().map(Into::into).collect()));
        Ok(())
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Run every task to a terminal status.
    ///
    /// Returns one entry per registered task. Only configuration problems
    /// (unknown dependency, cycle, zero concurrency) produce an error.
    pub async fn execute(
        mut self,
        max_concurrency: usize,
    ) -> WorkflowResult<HashMap<String, TaskExecution<T>>> {
        if max_concurrency == 0 {
            return Err(WorkflowError::InvalidConcurrency(max_concurrency));
        }
        DependencyResolver::new().order_ids(
            self.tasks
                .iter()
                .map(|t| (t.id.as_str(), t.dependencies.iter().map(String::as_str))),
        )?;

        let mut executions: Vec<TaskExecution<T>> = self
            .tasks
            .iter()
            .map(|t| TaskExecution::pending(t.id.clone()))
            .collect();

        for (id, blocked_by) in std::mem::take(&mut self.preblocked) {
            let idx = self.index[&id];
            if executions[idx].status == TaskStatus::Pending {
                executions[idx].block(blocked_by.clone())?;
                info!(task_id = %id, blocked_by = ?blocked_by, "Task blocked before start");
                self.emit(ExecutionEvent::TaskBlocked {
                    task_id: id,
                    blocked_by,
                });
            }
        }

        let mut join_set: JoinSet<(usize, WorkflowResult<T>)> = JoinSet::new();
        let mut started: HashMap<usize, Instant> = HashMap::new();
        let timeout = self.task_timeout;

        loop {
            self.propagate_blocking(&mut executions)?;

            for idx in 0..self.tasks.len() {
                if join_set.len() >= max_concurrency {
                    break;
                }
                if executions[idx].status != TaskStatus::Pending {
                    continue;
                }
                let ready = self.tasks[idx]
                    .dependencies
                    .iter()
                    .all(|dep| executions[self.index[dep]].status == TaskStatus::Complete);
                if !ready {
                    continue;
                }

                let snapshot: DependencyOutputs<T> = self.tasks[idx]
                    .dependencies
                    .iter()
                    .filter_map(|dep| {
                        executions[self.index[dep]]
                            .result
                            .clone()
                            .map(|output| (dep.clone(), output))
                    })
                    .collect();

                let Some(work) = self.tasks[idx].work.take() else {
                    continue;
                };
                executions[idx].start()?;
                started.insert(idx, Instant::now());

                let task_id = self.tasks[idx].id.clone();
                debug!(task_id = %task_id, "Starting task");
                self.emit(ExecutionEvent::TaskStarted {
                    task_id: task_id.clone(),
                });

                join_set.spawn(async move {
                    let result = run_guarded(work, snapshot, timeout).await;
                    (idx, result)
                });
            }

            if join_set.is_empty() {
                break;
            }

            match join_set.join_next().await {
                Some(Ok((idx, result))) => {
                    let duration_ms = started
                        .remove(&idx)
                        .map_or(0, |s| u64::try_from(s.elapsed().as_millis()).unwrap_or(u64::MAX));
                    let task_id = self.tasks[idx].id.clone();
                    match result {
                        Ok(output) => {
                            executions[idx].complete(output)?;
                            info!(task_id = %task_id, duration_ms, "Task completed");
                            self.emit(ExecutionEvent::TaskCompleted {
                                task_id,
                                duration_ms,
                            });
                        }
                        Err(err) => {
                            let message = err.to_string();
                            executions[idx].fail(message.clone())?;
                            warn!(task_id = %task_id, error = %message, "Task failed");
                            self.emit(ExecutionEvent::TaskFailed {
                                task_id,
                                error: message,
                            });
                        }
                    }
                }
                Some(Err(join_err)) => {
                    error!(error = %join_err, "Task join failed");
                }
                None => break,
            }
        }

        self.settle(&mut executions)?;

        Ok(self
            .tasks
            .iter()
            .map(|t| t.id.clone())
            .zip(executions)
            .collect())
    }

    /// Block every pending task with a failed or blocked dependency, until
    /// nothing changes.
    fn propagate_blocking(&self, executions: &mut [TaskExecution<T>]) -> WorkflowResult<()> {
        loop {
            let mut changed = false;
            for idx in 0..self.tasks.len() {
                if executions[idx].status != TaskStatus::Pending {
                    continue;
                }
                let blocked_by: Vec<String> = self.tasks[idx]
                    .dependencies
                    .iter()
                    .filter(|dep| executions[self.index[*dep]].status.blocks_dependents())
                    .cloned()
                    .collect();
                if blocked_by.is_empty() {
                    continue;
                }

                let task_id = self.tasks[idx].id.clone();
                info!(task_id = %task_id, blocked_by = ?blocked_by, "Task blocked by failed dependency");
                executions[idx].block(blocked_by.clone())?;
                self.emit(ExecutionEvent::TaskBlocked {
                    task_id,
                    blocked_by,
                });
                changed = true;
            }
            if !changed {
                return Ok(());
            }
        }
    }

    // Force any task that never reported back into a terminal state.
    fn settle(&self, executions: &mut [TaskExecution<T>]) -> WorkflowResult<()> {
        for (idx, execution) in executions.iter_mut().enumerate() {
            match execution.status {
                TaskStatus::Running => {
                    error!(task_id = %self.tasks[idx].id, "Task did not report a result");
                    execution.fail("task did not report a result")?;
                }
                TaskStatus::Pending => {
                    let unfinished: Vec<String> =
                        self.tasks[idx].dependencies.iter().cloned().collect();
                    execution.block(unfinished)?;
                }
                TaskStatus::Complete | TaskStatus::Failed | TaskStatus::Blocked => {}
            }
        }
        Ok(())
    }
}

async fn run_guarded<T>(
    work: TaskWork<T>,
    snapshot: DependencyOutputs<T>,
    timeout: Option<Duration>,
) -> WorkflowResult<T> {
    let guarded = AssertUnwindSafe(async move {
        let future = work(snapshot);
        match timeout {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .unwrap_or_else(|_| Err(WorkflowError::TaskTimedOut(limit))),
            None => future.await,
        }
    })
    .catch_unwind();

    match guarded.await {
        Ok(result) => result,
        Err(payload) => Err(WorkflowError::TaskPanicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_dependency_output_is_passed() {
        let mut executor: ParallelExecutor<String> = ParallelExecutor::new();
        executor
            .add_task("a", |_| async { Ok("A".to_string()) }, Vec::<String>::new())
            .unwrap();
        executor
            .add_task(
                "b",
                |deps: DependencyOutputs<String>| async move { Ok(format!("{}+B", deps["a"])) },
                ["a"],
            )
            .unwrap();

        let results = executor.execute(2).await.unwrap();
        assert_eq!(results["b"].result.as_deref(), Some("A+B"));
        assert_eq!(results["a"].status, TaskStatus::Complete);
    }

    #[tokio::test]
    async fn test_duplicate_task_rejected() {
        let mut executor: ParallelExecutor<u32> = ParallelExecutor::new();
        executor
            .add_task("a", |_| async { Ok(1) }, Vec::<String>::new())
            .unwrap();
        let err = executor
            .add_task("a", |_| async { Ok(2) }, Vec::<String>::new())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateTask(ref id) if id == "a"));
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let executor: ParallelExecutor<u32> = ParallelExecutor::new();
        assert!(matches!(
            executor.execute(0).await,
            Err(WorkflowError::InvalidConcurrency(0))
        ));
    }

    #[tokio::test]
    async fn test_unknown_dependency_rejected() {
        let mut executor: ParallelExecutor<u32> = ParallelExecutor::new();
        executor.add_task("a", |_| async { Ok(1) }, ["ghost"]).unwrap();
        assert!(matches!(
            executor.execute(1).await,
            Err(WorkflowError::UnknownDependency { .. })
        ));
    }

    fn explode() -> WorkflowResult<u32> {
        panic!("exploded")
    }

    #[tokio::test]
    async fn test_panic_marks_task_failed() {
        let mut executor: ParallelExecutor<u32> = ParallelExecutor::new();
        executor
            .add_task("boom", |_| async { explode() }, Vec::<String>::new())
            .unwrap();
        executor
            .add_task("fine", |_| async { Ok(3) }, Vec::<String>::new())
            .unwrap();

        let results = executor.execute(2).await.unwrap();
        assert_eq!(results["boom"].status, TaskStatus::Failed);
        assert!(results["boom"]
            .error
            .as_deref()
            .unwrap()
            .contains("exploded"));
        assert_eq!(results["fine"].status, TaskStatus::Complete);
    }

    #[tokio::test]
    async fn test_timeout_marks_task_failed() {
        let mut executor: ParallelExecutor<u32> =
            ParallelExecutor::new().with_task_timeout(Duration::from_millis(20));
        executor
            .add_task(
                "slow",
                |_| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(1)
                },
                Vec::<String>::new(),
            )
            .unwrap();

        let results = executor.execute(1).await.unwrap();
        assert_eq!(results["slow"].status, TaskStatus::Failed);
        assert_eq!(
            results["slow"].error.as_deref(),
            Some("Task timed out after 20ms")
        );
    }

    #[tokio::test]
    async fn test_preblocked_task_blocks_dependents() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut executor: ParallelExecutor<u32> = ParallelExecutor::new();
        for (id, deps) in [("x", vec![]), ("y", vec!["x"]), ("z", vec![])] {
            let ran = Arc::clone(&ran);
            executor
                .add_task(
                    id,
                    move |_| async move {
                        ran.fetch_add(1, Ordering::SeqCst);
                        Ok(1)
                    },
                    deps,
                )
                .unwrap();
        }
        executor
            .block_task("x", ["requirements", "project_charter"])
            .unwrap();
        assert!(executor.block_task("nope", ["requirements"]).is_err());

        let results = executor.execute(2).await.unwrap();
        assert_eq!(results["x"].blocked_by, vec!["requirements", "project_charter"]);
        assert_eq!(results["y"].status, TaskStatus::Blocked);
        assert_eq!(results["y"].blocked_by, vec!["x"]);
        assert_eq!(results["z"].status, TaskStatus::Complete);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut executor: ParallelExecutor<u32> = ParallelExecutor::new().with_events(tx);
        executor
            .add_task(
                "a",
                |_| async { Err(WorkflowError::GenerationFailed("nope".to_string())) },
                Vec::<String>::new(),
            )
            .unwrap();
        executor.add_task("b", |_| async { Ok(1) }, ["a"]).unwrap();
        executor.execute(1).await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                ExecutionEvent::TaskStarted {
                    task_id: "a".to_string()
                },
                ExecutionEvent::TaskFailed {
                    task_id: "a".to_string(),
                    error: "Generation failed: nope".to_string()
                },
                ExecutionEvent::TaskBlocked {
                    task_id: "b".to_string(),
                    blocked_by: vec!["a".to_string()]
                },
            ]
        );
    }
}

//! Task dispatcher
//!
//! Routes each task to the handler registered for its recipient and
//! capability, and drives the task through its lifecycle:
//!
//! ```text
//! pending ──resolve/validate fails──▶ failed
//!    │
//!    ▼
//! running ──▶ completed | failed | timed-out
//! ```
//!
//! Scheduling follows [`OrderingPolicy`]. With the default per-capability
//! policy, tasks for the same `(agent_id, capability)` run one at a time in
//! the order they reached the dispatcher, so side effects of stateful
//! capabilities (calendar writes) are applied in submission order.
//!
//! Every task runs on its own tokio task. A caller that stops waiting for a
//! result does not stop the dispatch; the outcome is still recorded.

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
    time::Duration,
};

use futures::future::BoxFuture;
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_service::Service;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    protocol::{
        A2AError, A2AMessage, A2ATask, CapabilityError, MessagePart, RegistryError, TaskError,
        TaskErrorKind, TaskStatus,
    },
    registry::{AgentRegistry, ResolvedCapability, SharedHandler},
    service::{
        builder::DispatcherBuilder,
        config::{DispatcherConfig, OrderingPolicy},
        store::TaskStore,
    },
};

type LaneKey = (String, String);

/// Result of a cancellation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The task had not started and will never run
    Cancelled,

    /// The task is running a cancellable handler; it will end as `cancelled`
    Requested,

    /// The task is running a handler without cancellation support and will
    /// run to completion
    Ignored,

    /// The task had already finished with the given status
    AlreadyTerminal(TaskStatus),
}

/// How a single handler invocation ended
enum Invocation {
    Returned(Result<Vec<MessagePart>, CapabilityError>),
    Panicked(String),
    TimedOut(Duration),
    Cancelled,
}

/// A task that passed resolution and input validation
struct Planned {
    resolved: ResolvedCapability,
    ticket: Option<LaneTicket>,
}

/// Last task queued on each lane
///
/// A lane only has an entry while some task holds or waits for it.
#[derive(Debug, Default)]
struct Lanes {
    issued: u64,
    tails: HashMap<LaneKey, (u64, oneshot::Receiver<()>)>,
}

fn lock_lanes(lanes: &Mutex<Lanes>) -> MutexGuard<'_, Lanes> {
    lanes.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A task's place in its lane
///
/// The ticket waits for the previous ticket of the lane to be dropped, and
/// dropping it lets the next one through.
struct LaneTicket {
    lanes: Arc<Mutex<Lanes>>,
    key: LaneKey,
    seq: u64,
    predecessor: Option<oneshot::Receiver<()>>,
    release: Option<oneshot::Sender<()>>,
}

impl LaneTicket {
    /// Take the last place in `key`'s lane
    fn issue(lanes: &Arc<Mutex<Lanes>>, key: LaneKey) -> Self {
        let (release, next) = oneshot::channel();
        let mut guard = lock_lanes(lanes);
        guard.issued += 1;
        let seq = guard.issued;
        let predecessor = guard
            .tails
            .insert(key.clone(), (seq, next))
            .map(|(_, receiver)| receiver);

        Self {
            lanes: lanes.clone(),
            key,
            seq,
            predecessor,
            release: Some(release),
        }
    }

    /// Wait until every task queued before this one has finished
    ///
    /// Safe to abandon and call again.
    async fn wait(&mut self) {
        if let Some(predecessor) = self.predecessor.as_mut() {
            // resolves once the predecessor drops its sender
            let _ = predecessor.await;
        }
        self.predecessor = None;
    }
}

impl Drop for LaneTicket {
    fn drop(&mut self) {
        if let Some(predecessor) = self.predecessor.take() {
            // left the queue early: keep the lane closed until the predecessor is done
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let rest = LaneTicket {
                    lanes: self.lanes.clone(),
                    key: self.key.clone(),
                    seq: self.seq,
                    predecessor: None,
                    release: self.release.take(),
                };
                runtime.spawn(async move {
                    let _ = predecessor.await;
                    drop(rest);
                });
                return;
            }
        }

        let mut lanes = lock_lanes(&self.lanes);
        if lanes.tails.get(&self.key).is_some_and(|(seq, _)| *seq == self.seq) {
            lanes.tails.remove(&self.key);
        }
    }
}

/// Routes tasks to registered capability handlers
///
/// Cloning is cheap; clones share the registry, the task table and the
/// scheduling lanes.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: AgentRegistry,
    store: TaskStore,
    config: Arc<DispatcherConfig>,
    lanes: Arc<Mutex<Lanes>>,
}

impl Dispatcher {
    /// Create a dispatcher with default configuration
    pub fn new(registry: AgentRegistry) -> Self {
        Self::with_config(registry, DispatcherConfig::default())
    }

    /// Create a dispatcher with the given configuration
    pub fn with_config(registry: AgentRegistry, config: DispatcherConfig) -> Self {
        Self {
            registry,
            store: TaskStore::new(),
            config: Arc::new(config),
            lanes: Arc::new(Mutex::new(Lanes::default())),
        }
    }

    /// Start building a dispatcher
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// The registry tasks are resolved against
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// The dispatcher configuration
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Run a task to a terminal status and return it
    ///
    /// Every dispatch outcome, including unknown agents, schema mismatches and
    /// handler failures, comes back as `Ok(task)` with `status` and `error` or
    /// `result_message` set. Dropping the returned future does not stop the
    /// task; its outcome stays available through [`get_task`](Self::get_task).
    ///
    /// # Errors
    ///
    /// Only for misuse: the task is not `pending`, has an empty id, or its id
    /// is already tracked by this dispatcher.
    pub async fn submit(&self, task: A2ATask) -> Result<A2ATask, A2AError> {
        let task_id = task.task_id.clone();
        let dispatch = self.spawn(task).await?;
        dispatch.await.map_err(|err| A2AError::Aborted {
            task_id,
            reason: err.to_string(),
        })?
    }

    /// Queue a task and run it in the background
    ///
    /// The task is tracked (and cancellable) and holds its place in its lane
    /// as soon as this returns.
    pub async fn spawn(
        &self,
        task: A2ATask,
    ) -> Result<JoinHandle<Result<A2ATask, A2AError>>, A2AError> {
        let resolved = self
            .registry
            .resolve(task.recipient(), &task.requested_capability)
            .await;
        let cancel = self.admit(&task).await?;

        // no await from here on: once admitted, the task must reach the runtime
        let span = dispatch_span(&task);
        let plan = span.in_scope(|| self.plan(&task, resolved));
        let dispatcher = self.clone();
        Ok(tokio::spawn(
            async move { dispatcher.run(task, cancel, plan).await }.instrument(span),
        ))
    }

    /// Snapshot of a tracked task
    pub async fn get_task(&self, task_id: &str) -> Result<A2ATask, A2AError> {
        self.store
            .get(task_id)
            .await
            .ok_or_else(|| A2AError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    /// Retrieve a finished task and stop tracking it
    pub async fn take_task(&self, task_id: &str) -> Result<A2ATask, A2AError> {
        self.store.take(task_id).await
    }

    /// Snapshots of tracked tasks, oldest first
    pub async fn list_tasks(&self, status: Option<TaskStatus>) -> Vec<A2ATask> {
        self.store.list(status).await
    }

    /// Request cancellation of a task
    ///
    /// A pending task is cancelled immediately and its handler never runs. A
    /// running task is only interrupted when its handler supports
    /// cancellation; otherwise the request is ignored, reported as
    /// [`CancelOutcome::Ignored`], and the task runs to completion.
    pub async fn cancel(&self, task_id: &str) -> Result<CancelOutcome, A2AError> {
        let outcome = self
            .store
            .update(task_id, |entry| match entry.task.status {
                status if status.is_terminal() => Ok(CancelOutcome::AlreadyTerminal(status)),
                TaskStatus::Pending => {
                    entry.task.cancel("cancelled before execution")?;
                    entry.cancel.cancel();
                    Ok(CancelOutcome::Cancelled)
                }
                _ if entry.cancellable => {
                    entry.cancel.cancel();
                    Ok(CancelOutcome::Requested)
                }
                _ => Ok(CancelOutcome::Ignored),
            })
            .await?;

        match outcome {
            CancelOutcome::Ignored => info!(
                task_id,
                "Cancellation ignored: handler does not support cancellation, task runs to completion"
            ),
            _ => debug!(task_id, ?outcome, "Cancellation processed"),
        }
        Ok(outcome)
    }

    /// Drop finished tasks older than the configured retention
    ///
    /// Returns the number of tasks removed; always 0 without a retention period.
    pub async fn purge_expired(&self) -> usize {
        match self.config.retention {
            Some(retention) => {
                let purged = self.store.purge_finished_before(retention).await;
                if purged > 0 {
                    debug!(purged, "Purged expired tasks");
                }
                purged
            }
            None => 0,
        }
    }

    async fn admit(&self, task: &A2ATask) -> Result<CancellationToken, A2AError> {
        if task.task_id.is_empty() {
            return Err(A2AError::Validation("Task ID cannot be empty".into()));
        }
        if task.status != TaskStatus::Pending
            || task.result_message.is_some()
            || task.error.is_some()
        {
            return Err(A2AError::Validation(format!(
                "task {} must be pending to be submitted (status: {:?})",
                task.task_id, task.status
            )));
        }
        self.store.insert(task.clone()).await
    }

    /// Validate the input and queue the task on its lane
    fn plan(
        &self,
        task: &A2ATask,
        resolved: Result<ResolvedCapability, RegistryError>,
    ) -> Result<Planned, TaskError> {
        let resolved = resolved.map_err(|err| {
            warn!(error = %err, "Task rejected");
            TaskError::from(err)
        })?;

        resolved
            .capability()
            .input_schema
            .validate(&task.input_message.parts)
            .map_err(|err| {
                warn!(error = %err, "Task input does not match schema");
                TaskError::from(err)
            })?;

        let ticket = match self.config.ordering {
            OrderingPolicy::Concurrent => None,
            OrderingPolicy::PerCapabilitySerialized => Some(LaneTicket::issue(
                &self.lanes,
                (
                    task.recipient().to_string(),
                    task.requested_capability.clone(),
                ),
            )),
        };
        Ok(Planned { resolved, ticket })
    }

    async fn run(
        &self,
        task: A2ATask,
        cancel: CancellationToken,
        plan: Result<Planned, TaskError>,
    ) -> Result<A2ATask, A2AError> {
        let task_id = task.task_id.as_str();
        let capability = task.requested_capability.as_str();

        // the ticket is held until this function returns
        let Planned {
            resolved,
            mut ticket,
        } = match plan {
            Ok(planned) => planned,
            Err(error) => return self.finish(task_id, |t| t.fail(error)).await,
        };

        if let Some(ticket) = ticket.as_mut() {
            tokio::select! {
                _ = ticket.wait() => {}
                _ = cancel.cancelled() => {
                    debug!("Task cancelled while queued");
                    return self.get_task(task_id).await;
                }
            }
        }

        let handler = resolved.handler().clone();
        let cancellable = handler.supports_cancellation();
        let started = self
            .store
            .update(task_id, |entry| {
                if entry.task.status != TaskStatus::Pending {
                    return Ok(false);
                }
                entry.task.start()?;
                entry.cancellable = cancellable;
                Ok(true)
            })
            .await?;
        if !started {
            debug!("Task cancelled before start");
            return self.get_task(task_id).await;
        }

        debug!("Invoking handler");
        let invocation = self
            .invoke(handler, task.input_message.clone(), &cancel)
            .await;

        match invocation {
            Invocation::Returned(Ok(parts)) => {
                match resolved.capability().output_schema.validate(&parts) {
                    Ok(()) => {
                        info!("Task completed");
                        let reply = task.input_message.reply(parts);
                        self.finish(task_id, |t| t.complete(reply)).await
                    }
                    Err(err) => {
                        warn!(error = %err, "Handler output does not match schema");
                        let cause =
                            CapabilityError::Failed(format!("output does not match schema: {err}"));
                        let error = TaskError::execution(capability, &cause);
                        self.finish(task_id, |t| t.fail(error)).await
                    }
                }
            }
            Invocation::Returned(Err(cause)) => {
                warn!(error = %cause, "Handler failed");
                let error = TaskError::execution(capability, &cause);
                self.finish(task_id, |t| t.fail(error)).await
            }
            Invocation::Panicked(message) => {
                warn!(panic = %message, "Handler panicked");
                let cause = CapabilityError::Failed(format!("handler panicked: {message}"));
                let error = TaskError::execution(capability, &cause);
                self.finish(task_id, |t| t.fail(error)).await
            }
            Invocation::TimedOut(limit) => {
                warn!(timeout_ms = limit.as_millis() as u64, "Handler timed out");
                let error = TaskError::new(
                    TaskErrorKind::Timeout,
                    format!("capability '{capability}' did not finish within {limit:?}"),
                )
                .with_details(serde_json::json!({ "timeoutMs": limit.as_millis() as u64 }));
                self.finish(task_id, |t| t.time_out(error)).await
            }
            Invocation::Cancelled => {
                info!("Task cancelled while running");
                self.finish(task_id, |t| t.cancel("cancelled while running"))
                    .await
            }
        }
    }

    /// Run the handler on its own tokio task, bounded by the timeout and,
    /// for cancellable handlers, by the task's cancellation token
    async fn invoke(
        &self,
        handler: SharedHandler,
        input: A2AMessage,
        cancel: &CancellationToken,
    ) -> Invocation {
        let cancellable = handler.supports_cancellation();
        let mut call = tokio::spawn(async move { handler.handle(input).await });
        let abort = call.abort_handle();
        let limit = self.config.handler_timeout;

        let joined = async {
            match limit {
                Some(limit) => tokio::time::timeout(limit, &mut call)
                    .await
                    .map_err(|_| limit),
                None => Ok((&mut call).await),
            }
        };
        let cancelled = async {
            if cancellable {
                cancel.cancelled().await
            } else {
                std::future::pending::<()>().await
            }
        };

        tokio::select! {
            joined = joined => match joined {
                Ok(Ok(result)) => Invocation::Returned(result),
                Ok(Err(err)) if err.is_panic() => Invocation::Panicked(panic_message(err.into_panic())),
                Ok(Err(err)) => Invocation::Panicked(err.to_string()),
                Err(limit) => {
                    abort.abort();
                    Invocation::TimedOut(limit)
                }
            },
            _ = cancelled => {
                abort.abort();
                Invocation::Cancelled
            }
        }
    }

    /// Apply a terminal transition in the store and return the resulting task
    async fn finish(
        &self,
        task_id: &str,
        transition: impl FnOnce(&mut A2ATask) -> Result<(), A2AError>,
    ) -> Result<A2ATask, A2AError> {
        self.store
            .update(task_id, |entry| {
                // a concurrent cancel may have already closed a pending task
                if !entry.task.is_terminal() {
                    transition(&mut entry.task)?;
                }
                Ok(entry.task.clone())
            })
            .await
    }
}

fn dispatch_span(task: &A2ATask) -> tracing::Span {
    info_span!(
        "dispatch",
        task_id = %task.task_id,
        agent_id = %task.recipient(),
        capability = %task.requested_capability,
    )
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl Service<A2ATask> for Dispatcher {
    type Response = A2ATask;
    type Error = A2AError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, task: A2ATask) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { dispatcher.submit(task).await })
    }
}

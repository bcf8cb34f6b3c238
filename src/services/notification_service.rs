// services/notification_service.rs

use std::{
    any::Any,
    collections::{HashSet, VecDeque},
    fmt,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    errors::RemoteError,
    models::{Invitation, Link},
};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Delivers user-visible notifications about lifecycle events.
///
/// Implementations must be idempotent per `(entity id, kind)`: the queue may
/// deliver the same job more than once.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_invitation_created(&self, invitation: &Invitation)
        -> Result<(), NotificationError>;

    async fn send_accepted(&self, invitation: &Invitation, link: &Link)
        -> Result<(), NotificationError>;

    async fn send_rejected(&self, invitation: &Invitation) -> Result<(), NotificationError>;

    async fn send_unlinked(&self, link: &Link) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    InvitationCreated,
    Accepted,
    Rejected,
    Unlinked,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                NotificationKind::InvitationCreated => "invitation_created",
                NotificationKind::Accepted => "accepted",
                NotificationKind::Rejected => "rejected",
                NotificationKind::Unlinked => "unlinked",
            }
        )
    }
}

/// One notification waiting to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationJob {
    InvitationCreated(Invitation),
    Accepted { invitation: Invitation, link: Link },
    Rejected(Invitation),
    Unlinked(Link),
}

impl NotificationJob {
    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationJob::InvitationCreated(_) => NotificationKind::InvitationCreated,
            NotificationJob::Accepted { .. } => NotificationKind::Accepted,
            NotificationJob::Rejected(_) => NotificationKind::Rejected,
            NotificationJob::Unlinked(_) => NotificationKind::Unlinked,
        }
    }

    /// Deduplication key: the entity the event is about plus the event kind
    pub fn key(&self) -> (String, NotificationKind) {
        let id = match self {
            NotificationJob::InvitationCreated(invitation)
            | NotificationJob::Accepted { invitation, .. }
            | NotificationJob::Rejected(invitation) => invitation.id.clone(),
            NotificationJob::Unlinked(link) => link.id.clone(),
        };
        (id, self.kind())
    }

    async fn deliver(&self, dispatcher: &dyn NotificationDispatcher) -> Result<(), NotificationError> {
        match self {
            NotificationJob::InvitationCreated(invitation) => {
                dispatcher.send_invitation_created(invitation).await
            }
            NotificationJob::Accepted { invitation, link } => {
                dispatcher.send_accepted(invitation, link).await
            }
            NotificationJob::Rejected(invitation) => dispatcher.send_rejected(invitation).await,
            NotificationJob::Unlinked(link) => dispatcher.send_unlinked(link).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationQueueConfig {
    /// Total delivery attempts per job, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry
    pub initial_backoff: Duration,
    /// How many delivered `(id, kind)` keys are remembered for deduplication
    pub dedupe_capacity: usize,
}

impl Default for NotificationQueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            dedupe_capacity: 10_000,
        }
    }
}

enum Command {
    Deliver(NotificationJob),
    Flush(oneshot::Sender<()>),
}

/// Handle for enqueueing notification jobs onto a background worker.
///
/// Enqueueing never fails the caller; if the worker has stopped the job is
/// dropped with a log line.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<Command>,
}

impl NotificationQueue {
    /// Starts the worker on the current tokio runtime
    pub fn spawn(
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: NotificationQueueConfig,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = Worker {
            dispatcher,
            delivered: DeliveredKeys::new(config.dedupe_capacity),
            config,
        };
        let handle = tokio::spawn(worker.run(receiver));
        (Self { sender }, handle)
    }

    pub fn enqueue(&self, job: NotificationJob) {
        let (id, kind) = job.key();
        if self.sender.send(Command::Deliver(job)).is_err() {
            error!(%id, %kind, "notification worker stopped; dropping job");
        } else {
            debug!(%id, %kind, "notification queued");
        }
    }

    /// Waits until every job enqueued before this call has been handled
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(Command::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

struct Worker {
    dispatcher: Arc<dyn NotificationDispatcher>,
    config: NotificationQueueConfig,
    delivered: DeliveredKeys,
}

/// Keys of delivered jobs, oldest evicted first once full
struct DeliveredKeys {
    capacity: usize,
    keys: HashSet<(String, NotificationKind)>,
    order: VecDeque<(String, NotificationKind)>,
}

impl DeliveredKeys {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            keys: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    fn contains(&self, key: &(String, NotificationKind)) -> bool {
        self.keys.contains(key)
    }

    fn insert(&mut self, key: (String, NotificationKind)) {
        if self.capacity == 0 || !self.keys.insert(key.clone()) {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.keys.len()
    }
}

impl Worker {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = receiver.recv().await {
            match command {
                Command::Deliver(job) => self.process(job).await,
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        info!("notification worker stopped");
    }

    async fn process(&mut self, job: NotificationJob) {
        let key = job.key();
        if self.delivered.contains(&key) {
            debug!(id = %key.0, kind = %key.1, "notification already delivered; skipping");
            return;
        }

        let mut backoff = self.config.initial_backoff;
        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            // a panicking dispatcher counts as a failed attempt
            let outcome = AssertUnwindSafe(job.deliver(self.dispatcher.as_ref()))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(NotificationError::Delivery(format!(
                        "dispatcher panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                });
            match outcome {
                Ok(()) => {
                    debug!(id = %key.0, kind = %key.1, attempt, "notification delivered");
                    self.delivered.insert(key);
                    return;
                }
                Err(e) if attempt < max_attempts => {
                    warn!(id = %key.0, kind = %key.1, attempt, error = %e, "notification failed; retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => {
                    error!(id = %key.0, kind = %key.1, attempt, error = %e, "notification abandoned");
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

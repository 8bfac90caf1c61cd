use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ChannelEvent, ChannelKind};
use crate::state_machine::{JobId, JobResult};

/// Capacity of in-process job event fan-out.
const CHANNEL_CAPACITY: usize = 256;

/// A server-pushed stream of job completion and failure events.
pub trait JobEventSource {
    fn subscribe(&self) -> broadcast::Receiver<JobResult>;
}

/// In-process event source. Anything holding it can publish job events.
#[derive(Debug, Clone)]
pub struct BroadcastEventSource {
    tx: broadcast::Sender<JobResult>,
}

impl Default for BroadcastEventSource {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl BroadcastEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes an event; returns how many subscribers received it.
    pub fn publish(&self, result: JobResult) -> usize {
        self.tx.send(result).unwrap_or(0)
    }
}

impl JobEventSource for BroadcastEventSource {
    fn subscribe(&self) -> broadcast::Receiver<JobResult> {
        self.tx.subscribe()
    }
}

/// Forwards pushed events for the currently armed job.
///
/// The subscription is made once and lives until [`PushChannel::shutdown`] or
/// drop. Arming only changes which job id is let through.
pub struct PushChannel {
    filter: watch::Sender<Option<JobId>>,
    task: Option<JoinHandle<()>>,
}

impl PushChannel {
    pub fn subscribe(
        source: &(impl JobEventSource + ?Sized),
        events: UnboundedSender<ChannelEvent>,
    ) -> Self {
        let (filter, filter_rx) = watch::channel(None);
        let incoming = source.subscribe();
        let task = tokio::spawn(forward(incoming, filter_rx, events));
        Self {
            filter,
            task: Some(task),
        }
    }

    pub fn arm(&self, job_id: JobId) {
        debug!(%job_id, "arming push channel");
        self.filter.send_replace(Some(job_id));
    }

    pub fn cancel(&self) {
        self.filter.send_replace(None);
    }

    pub fn armed_job(&self) -> Option<JobId> {
        self.filter.borrow().clone()
    }

    /// Ends the subscription. Only done at process teardown.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn forward(
    mut incoming: broadcast::Receiver<JobResult>,
    filter: watch::Receiver<Option<JobId>>,
    events: UnboundedSender<ChannelEvent>,
) {
    loop {
        let result = match incoming.recv().await {
            Ok(result) => result,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "push subscriber lagged, events dropped");
                continue;
            }
            Err(RecvError::Closed) => {
                debug!("push event source closed");
                return;
            }
        };

        let wanted = filter.borrow().as_ref() == Some(&result.job_id);
        if !wanted {
            debug!(job_id = %result.job_id, "dropping push event for unarmed job");
            continue;
        }
        let event = ChannelEvent::Observed {
            channel: ChannelKind::Push,
            result,
        };
        if events.send(event).is_err() {
            return;
        }
    }
}

//! Independent producers of job status observations.
//!
//! Poll, push and manual channels all report into one unbounded queue of
//! [`ChannelEvent`]s drained by the coordinator. None of them touch
//! coordinator state directly.

pub mod manual;
pub mod poll;
pub mod push;
pub mod websocket;

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

pub use manual::ManualChannel;
pub use poll::{PollChannel, PollSettings};
pub use push::{BroadcastEventSource, JobEventSource, PushChannel};
pub use websocket::WebSocketEventSource;

use crate::backend::JobBackend;
use crate::state_machine::{JobId, JobResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Poll,
    Push,
    Manual,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Poll => write!(f, "poll"),
            ChannelKind::Push => write!(f, "push"),
            ChannelKind::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Observed {
        channel: ChannelKind,
        result: JobResult,
    },
    /// A status query failed; retried while attempts remain.
    QueryFailed {
        channel: ChannelKind,
        job_id: JobId,
        error: String,
    },
    /// The poller hit its attempt ceiling and disarmed itself.
    PollExhausted { job_id: JobId },
}

/// The three channels, armed and cancelled as a unit.
pub struct ChannelSet<B> {
    pub poll: PollChannel<B>,
    pub push: PushChannel,
    pub manual: ManualChannel<B>,
}

impl<B: JobBackend> ChannelSet<B> {
    pub fn new(
        backend: Arc<B>,
        source: &(impl JobEventSource + ?Sized),
        settings: PollSettings,
        events: UnboundedSender<ChannelEvent>,
    ) -> Self {
        Self {
            poll: PollChannel::new(Arc::clone(&backend), settings, events.clone()),
            push: PushChannel::subscribe(source, events),
            manual: ManualChannel::new(backend),
        }
    }

    pub fn arm_all(&mut self, job_id: &JobId) {
        self.poll.arm(job_id.clone());
        self.push.arm(job_id.clone());
        self.manual.arm(job_id.clone());
    }

    pub fn cancel_all(&mut self) {
        debug!("cancelling all channels");
        self.poll.cancel();
        self.push.cancel();
        self.manual.cancel();
    }
}

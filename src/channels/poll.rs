use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{ChannelEvent, ChannelKind};
use crate::backend::JobBackend;
use crate::state_machine::JobId;

/// Timing for the status poller.
///
/// The first query runs after `initial_delay`, later ones every `interval`,
/// for at most `max_attempts` queries in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            interval: Duration::from_secs(3),
            max_attempts: 60,
        }
    }
}

impl PollSettings {
    /// Longest time the poller runs unattended before giving up.
    /// max_wait = initial_delay + interval * (max_attempts - 1)
    pub fn max_wait(&self) -> Duration {
        self.initial_delay + self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Self-scheduling status poller for a single job.
pub struct PollChannel<B> {
    backend: Arc<B>,
    settings: PollSettings,
    events: UnboundedSender<ChannelEvent>,
    task: Option<JoinHandle<()>>,
}

impl<B: JobBackend> PollChannel<B> {
    pub fn new(backend: Arc<B>, settings: PollSettings, events: UnboundedSender<ChannelEvent>) -> Self {
        Self {
            backend,
            settings,
            events,
            task: None,
        }
    }

    /// Starts polling `job_id`, retiring any poll still running for an
    /// earlier job first.
    pub fn arm(&mut self, job_id: JobId) {
        self.cancel();
        debug!(%job_id, "arming poll channel");
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let settings = self.settings;
        self.task = Some(tokio::spawn(poll_loop(backend, settings, events, job_id)));
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl<B> Drop for PollChannel<B> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn poll_loop<B: JobBackend>(
    backend: Arc<B>,
    settings: PollSettings,
    events: UnboundedSender<ChannelEvent>,
    job_id: JobId,
) {
    sleep(settings.initial_delay).await;

    for attempt in 1..=settings.max_attempts {
        match backend.query_job_status(&job_id).await {
            Ok(result) => {
                let is_final = result.is_final();
                debug!(%job_id, attempt, status = %result.status(), "poll response");
                let event = ChannelEvent::Observed {
                    channel: ChannelKind::Poll,
                    result,
                };
                if events.send(event).is_err() || is_final {
                    return;
                }
            }
            Err(e) => {
                if e.is_transient() {
                    debug!(%job_id, attempt, "poll query failed, will retry: {e}");
                } else {
                    warn!(%job_id, attempt, max = settings.max_attempts, "poll query failed: {e}");
                }
                let event = ChannelEvent::QueryFailed {
                    channel: ChannelKind::Poll,
                    job_id: job_id.clone(),
                    error: e.to_string(),
                };
                if events.send(event).is_err() {
                    return;
                }
            }
        }

        if attempt < settings.max_attempts {
            sleep(settings.interval).await;
        }
    }

    info!(%job_id, attempts = settings.max_attempts, "poll ceiling reached, manual check available");
    let _ = events.send(ChannelEvent::PollExhausted { job_id });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::state_machine::JobResult;
    use tokio::sync::mpsc;

    fn settings(max_attempts: u32) -> PollSettings {
        PollSettings {
            initial_delay: Duration::from_millis(100),
            interval: Duration::from_millis(100),
            max_attempts,
        }
    }

    #[test]
    fn default_ceiling_is_three_minutes() {
        let s = PollSettings::default();
        assert_eq!(s.max_attempts, 60);
        assert_eq!(s.max_wait(), Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_completion_then_stops() {
        let backend = Arc::new(MockBackend::new());
        backend.script(
            "job-1",
            vec![
                Ok(JobResult::pending("job-1")),
                Ok(JobResult::pending("job-1")),
                Ok(JobResult::completed("job-1", "https://r/1.png")),
            ],
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poll = PollChannel::new(Arc::clone(&backend), settings(10), tx);
        poll.arm(JobId::new("job-1"));

        let mut statuses = Vec::new();
        while let Some(ChannelEvent::Observed { result, .. }) = rx.recv().await {
            let done = result.is_final();
            statuses.push(result.status());
            if done {
                break;
            }
        }
        assert_eq!(statuses.len(), 3);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.query_count("job-1"), 3);
        assert!(!poll.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_ceiling() {
        let backend = Arc::new(MockBackend::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poll = PollChannel::new(Arc::clone(&backend), settings(4), tx);
        poll.arm(JobId::new("job-1"));

        let mut observed = 0;
        loop {
            match rx.recv().await.unwrap() {
                ChannelEvent::Observed { .. } => observed += 1,
                ChannelEvent::PollExhausted { job_id } => {
                    assert_eq!(job_id, JobId::new("job-1"));
                    break;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(observed, 4);
        assert_eq!(backend.query_count("job-1"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_count_toward_ceiling() {
        let backend = Arc::new(MockBackend::new());
        backend.script(
            "job-1",
            vec![Err(503), Ok(JobResult::completed("job-1", "u"))],
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poll = PollChannel::new(Arc::clone(&backend), settings(5), tx);
        poll.arm(JobId::new("job-1"));

        assert!(matches!(
            rx.recv().await.unwrap(),
            ChannelEvent::QueryFailed { channel: ChannelKind::Poll, .. }
        ));
        match rx.recv().await.unwrap() {
            ChannelEvent::Observed { result, .. } => assert_eq!(result.result_url(), Some("u")),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_further_queries() {
        let backend = Arc::new(MockBackend::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut poll = PollChannel::new(Arc::clone(&backend), settings(10), tx);
        poll.arm(JobId::new("job-1"));

        sleep(Duration::from_millis(250)).await;
        poll.cancel();
        let seen = backend.query_count("job-1");
        sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.query_count("job-1"), seen);
        assert!(!poll.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_retires_previous_job() {
        let backend = Arc::new(MockBackend::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut poll = PollChannel::new(Arc::clone(&backend), settings(10), tx);
        poll.arm(JobId::new("job-1"));
        sleep(Duration::from_millis(150)).await;
        poll.arm(JobId::new("job-2"));

        let old = backend.query_count("job-1");
        sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.query_count("job-1"), old);
        assert!(backend.query_count("job-2") > 0);
    }
}

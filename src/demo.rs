//! In-process backend used by `tryon demo`.
//!
//! Jobs complete after a fixed number of status queries. The demo also
//! pushes a completion event on a timer so push and poll race for the same
//! job, which is the situation the coordinator exists for.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::backend::{ApiError, JobBackend};
use crate::channels::BroadcastEventSource;
use crate::state_machine::{JobId, JobOutcome, JobResult, MediaRef, OrderRequest};

pub struct SimulatedBackend {
    ready_after: u32,
    jobs: AtomicU32,
    orders: AtomicU32,
    queries: Mutex<HashMap<JobId, u32>>,
}

impl SimulatedBackend {
    pub fn new(ready_after: u32) -> Self {
        Self {
            ready_after,
            jobs: AtomicU32::new(0),
            orders: AtomicU32::new(0),
            queries: Mutex::new(HashMap::new()),
        }
    }

    pub fn orders_created(&self) -> u32 {
        self.orders.load(Ordering::SeqCst)
    }
}

pub fn result_url_for(job_id: &JobId) -> String {
    format!("https://example.invalid/tryon/{job_id}.png")
}

impl JobBackend for SimulatedBackend {
    async fn submit_job(&self, garment: &MediaRef, photo: &MediaRef) -> Result<JobId, ApiError> {
        let n = self.jobs.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(garment = %garment.describe(), photo = %photo.describe(), "simulated submit");
        Ok(JobId::new(format!("sim-{n}")))
    }

    async fn query_job_status(&self, job_id: &JobId) -> Result<JobResult, ApiError> {
        let seen = {
            let mut queries = self
                .queries
                .lock()
                .map_err(|_| ApiError::Decode("simulated backend poisoned".into()))?;
            let count = queries.entry(job_id.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if seen >= self.ready_after {
            return Ok(JobResult::completed(job_id.clone(), result_url_for(job_id)));
        }
        let progress = (seen * 100 / self.ready_after.max(1)).min(99) as u8;
        Ok(JobResult {
            job_id: job_id.clone(),
            outcome: JobOutcome::Pending {
                progress: Some(progress),
            },
        })
    }

    async fn create_order(&self, _request: &OrderRequest) -> Result<String, ApiError> {
        let n = self.orders.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("ord-{n}"))
    }
}

/// Publishes a completion for `job_id` after `delay`.
pub fn push_completion_after(
    source: &BroadcastEventSource,
    job_id: JobId,
    delay: Duration,
) -> JoinHandle<()> {
    let source = source.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let url = result_url_for(&job_id);
        source.publish(JobResult::completed(job_id, url));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelKind, PollSettings};
    use crate::coordinator::JobResultCoordinator;
    use crate::session::MemorySessionStore;
    use crate::state_machine::{ContactInfo, JobStatus, Phase};
    use std::sync::Arc;

    #[tokio::test]
    async fn completes_after_configured_queries() {
        let backend = SimulatedBackend::new(3);
        let job = JobId::new("sim-1");
        assert_eq!(backend.query_job_status(&job).await.unwrap().status(), JobStatus::Pending);
        assert_eq!(backend.query_job_status(&job).await.unwrap().status(), JobStatus::Pending);
        let done = backend.query_job_status(&job).await.unwrap();
        assert_eq!(done.result_url(), Some(result_url_for(&job).as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn push_and_poll_race_yields_one_order() {
        let backend = Arc::new(SimulatedBackend::new(2));
        let source = BroadcastEventSource::new();
        let settings = PollSettings {
            initial_delay: Duration::from_millis(500),
            interval: Duration::from_millis(500),
            max_attempts: 10,
        };
        let mut coordinator = JobResultCoordinator::new(
            Arc::clone(&backend),
            &source,
            MemorySessionStore::new(),
            "tab-demo",
            settings,
        );
        coordinator
            .submit_info(ContactInfo {
                name: "Gil".into(),
                email: "gil@example.com".into(),
                phone: None,
            })
            .await
            .unwrap();
        let job = coordinator
            .submit_job(MediaRef::url("https://cdn/g.png"), MediaRef::url("https://cdn/p.png"))
            .await
            .unwrap();
        // Gate was opened before submission; a new job closes it again.
        assert!(!coordinator.state().gate.is_open());

        push_completion_after(&source, job.id.clone(), Duration::from_millis(1000));
        assert_eq!(coordinator.wait_for_result().await.unwrap(), Phase::Gated);

        coordinator
            .submit_info(ContactInfo {
                name: "Gil".into(),
                email: "gil@example.com".into(),
                phone: None,
            })
            .await
            .unwrap();
        assert_eq!(coordinator.phase(), Phase::Complete);

        let late = JobResult::completed(job.id.clone(), result_url_for(&job.id));
        coordinator.observe(ChannelKind::Push, late).await.unwrap();
        assert_eq!(backend.orders_created(), 1);
    }
}

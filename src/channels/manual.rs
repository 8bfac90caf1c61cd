use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{ApiError, JobBackend};
use crate::state_machine::{JobId, JobResult};

/// One-shot status query triggered by an operator.
///
/// Results of [`ManualChannel::check`] go through the coordinator like any
/// other observation. [`ManualChannel::inspect`] is a diagnostic that can look
/// at any job and never feeds the coordinator.
pub struct ManualChannel<B> {
    backend: Arc<B>,
    armed: Option<JobId>,
}

impl<B: JobBackend> ManualChannel<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            armed: None,
        }
    }

    pub fn arm(&mut self, job_id: JobId) {
        self.armed = Some(job_id);
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }

    pub fn armed_job(&self) -> Option<&JobId> {
        self.armed.as_ref()
    }

    /// Queries the armed job. Returns `Ok(None)` when nothing is armed.
    pub async fn check(&self) -> Result<Option<JobResult>, ApiError> {
        let Some(job_id) = &self.armed else {
            debug!("manual check with no armed job");
            return Ok(None);
        };
        info!(%job_id, "manual status check");
        self.backend.query_job_status(job_id).await.map(Some)
    }

    pub async fn inspect(&self, job_id: &JobId) -> Result<JobResult, ApiError> {
        info!(%job_id, "diagnostic status query");
        self.backend.query_job_status(job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    #[tokio::test]
    async fn check_queries_only_when_armed() {
        let backend = Arc::new(MockBackend::new());
        backend.script("job-1", vec![Ok(JobResult::completed("job-1", "u"))]);
        let mut manual = ManualChannel::new(Arc::clone(&backend));

        assert_eq!(manual.check().await.unwrap(), None);
        assert_eq!(backend.query_count("job-1"), 0);

        manual.arm(JobId::new("job-1"));
        let result = manual.check().await.unwrap().unwrap();
        assert_eq!(result.result_url(), Some("u"));

        manual.cancel();
        assert_eq!(manual.check().await.unwrap(), None);
        assert_eq!(backend.query_count("job-1"), 1);
    }

    #[tokio::test]
    async fn inspect_reaches_any_job() {
        let backend = Arc::new(MockBackend::new());
        backend.script("legacy-7", vec![Ok(JobResult::failed("legacy-7", "gone"))]);
        let manual = ManualChannel::new(Arc::clone(&backend));

        let result = manual.inspect(&JobId::new("legacy-7")).await.unwrap();
        assert_eq!(result.error(), Some("gone"));
        assert!(manual.armed_job().is_none());
    }

    #[tokio::test]
    async fn check_propagates_query_errors() {
        let backend = Arc::new(MockBackend::new());
        backend.script("job-1", vec![Err(502)]);
        let mut manual = ManualChannel::new(Arc::clone(&backend));
        manual.arm(JobId::new("job-1"));

        let err = manual.check().await.unwrap_err();
        assert!(err.is_transient());
    }
}

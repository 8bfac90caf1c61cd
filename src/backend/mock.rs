use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{ApiError, JobBackend};
use crate::state_machine::{JobId, JobResult, MediaRef, OrderRequest};

/// Scriptable in-memory backend for tests.
///
/// Each job has a queue of scripted query responses; the last one repeats.
/// Unscripted jobs report `pending`.
#[derive(Default)]
pub(crate) struct MockBackend {
    submitted: Mutex<u32>,
    scripts: Mutex<HashMap<JobId, VecDeque<Result<JobResult, u16>>>>,
    queries: Mutex<Vec<JobId>>,
    orders: Mutex<Vec<OrderRequest>>,
    failing_orders: Mutex<u32>,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(&self, job: &str, responses: Vec<Result<JobResult, u16>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(JobId::new(job), responses.into());
    }

    /// Makes the next `count` order creations fail with a 500.
    pub(crate) fn fail_next_orders(&self, count: u32) {
        *self.failing_orders.lock().unwrap() = count;
    }

    pub(crate) fn query_count(&self, job: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == job)
            .count()
    }

    pub(crate) fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }
}

impl JobBackend for MockBackend {
    async fn submit_job(&self, _garment: &MediaRef, _photo: &MediaRef) -> Result<JobId, ApiError> {
        let mut submitted = self.submitted.lock().unwrap();
        *submitted += 1;
        Ok(JobId::new(format!("job-{}", *submitted)))
    }

    async fn query_job_status(&self, job_id: &JobId) -> Result<JobResult, ApiError> {
        self.queries.lock().unwrap().push(job_id.clone());
        let mut scripts = self.scripts.lock().unwrap();
        let next = match scripts.get_mut(job_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match next {
            Some(Ok(result)) => Ok(result),
            Some(Err(status)) => Err(ApiError::Status {
                status,
                message: "scripted failure".into(),
            }),
            None => Ok(JobResult::pending(job_id.clone())),
        }
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<String, ApiError> {
        let mut failing = self.failing_orders.lock().unwrap();
        if *failing > 0 {
            *failing -= 1;
            return Err(ApiError::Status {
                status: 500,
                message: "order store unavailable".into(),
            });
        }
        let mut orders = self.orders.lock().unwrap();
        orders.push(request.clone());
        Ok(format!("order-{}", orders.len()))
    }
}

//! The processing backend the coordinator talks to.

pub mod client;
pub mod error;
#[cfg(test)]
pub(crate) mod mock;
pub mod types;

use std::future::Future;

pub use client::HttpBackend;
pub use error::ApiError;

use crate::state_machine::{JobId, JobResult, MediaRef, OrderRequest};

/// Collaborator operations consumed by the coordinator and its channels.
///
/// `create_order` is not assumed to deduplicate server-side; callers must
/// invoke it at most once per job.
pub trait JobBackend: Send + Sync + 'static {
    fn submit_job(
        &self,
        garment: &MediaRef,
        photo: &MediaRef,
    ) -> impl Future<Output = Result<JobId, ApiError>> + Send;

    fn query_job_status(
        &self,
        job_id: &JobId,
    ) -> impl Future<Output = Result<JobResult, ApiError>> + Send;

    /// Returns the new order's id.
    fn create_order(
        &self,
        request: &OrderRequest,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;
}

//! Writes the order record for a committed job.
//!
//! [`OrderCreator`] only executes the write. Whether a write may happen at
//! all is decided by the coordinator's order state, which admits one
//! in-flight claim per job.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::{ApiError, JobBackend};
use crate::state_machine::{Order, OrderRequest};

pub struct OrderCreator<B> {
    backend: Arc<B>,
}

impl<B: JobBackend> OrderCreator<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn create(&self, request: OrderRequest) -> Result<Order, ApiError> {
        info!(job_id = %request.job_id, "creating order");
        match self.backend.create_order(&request).await {
            Ok(order_id) => {
                info!(job_id = %request.job_id, %order_id, "order created");
                Ok(Order::from_request(order_id, request))
            }
            Err(e) => {
                warn!(job_id = %request.job_id, "order creation failed: {e}");
                Err(e)
            }
        }
    }
}

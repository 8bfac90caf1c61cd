mod job;
mod state;

pub use job::{
    ContactInfo, Job, JobId, JobOutcome, JobResult, JobStatus, MediaRef, Order, OrderRequest,
};
pub use state::{Committed, CoordinatorState, IgnoreReason, OrderState, Phase, Transition};

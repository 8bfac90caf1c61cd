use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::{ContactInfo, JobId, JobOutcome, JobResult, OrderRequest};
use crate::error::GateViolation;
use crate::gate::GateController;

/// Phases of the result-delivery state machine.
///
/// A job flows through: IDLE → AWAITING_RESULT → {GATED | DISPLAYED} →
/// ORDER_PENDING → COMPLETE, with FAILED reachable from AWAITING_RESULT or GATED.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingResult,
    Gated,
    Displayed,
    OrderPending,
    Complete,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "IDLE"),
            Phase::AwaitingResult => write!(f, "AWAITING_RESULT"),
            Phase::Gated => write!(f, "GATED"),
            Phase::Displayed => write!(f, "DISPLAYED"),
            Phase::OrderPending => write!(f, "ORDER_PENDING"),
            Phase::Complete => write!(f, "COMPLETE"),
            Phase::Failed => write!(f, "FAILED"),
        }
    }
}

/// Progress of the single order side effect for the current job.
///
/// `Created` is terminal and only reachable from `InFlight` or `Unknown`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrderState {
    #[default]
    None,
    InFlight,
    /// The tab went away while an order was in flight. The write may or may
    /// not have landed, so nothing is sent again until an operator settles it.
    Unknown,
    Created { order_id: String },
}

/// Why an observation had no effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Nothing is being tracked.
    NoActiveJob,
    /// The observation belongs to a different job.
    StaleJob { current: JobId, observed: JobId },
    /// A result was already committed for this job.
    AlreadyProcessed,
    /// A completion is already buffered behind the gate.
    AlreadyBuffered,
    /// The job already failed.
    Terminal,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::NoActiveJob => write!(f, "no active job"),
            IgnoreReason::StaleJob { current, observed } => {
                write!(f, "stale job {observed} (tracking {current})")
            }
            IgnoreReason::AlreadyProcessed => write!(f, "result already processed"),
            IgnoreReason::AlreadyBuffered => write!(f, "result already buffered"),
            IgnoreReason::Terminal => write!(f, "job already failed"),
        }
    }
}

/// The result accepted for display, exactly once per job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub job_id: JobId,
    pub result_url: String,
}

/// The effect of feeding an input into [`CoordinatorState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// No state change.
    Ignored(IgnoreReason),
    /// Still processing; progress indication only.
    Progress(Option<u8>),
    /// Completed while the gate is closed; the result is held.
    Buffered,
    /// The gate opened before any result arrived.
    GateOpened,
    /// A result was committed and must now be displayed.
    Commit(Committed),
    /// The backend reported failure.
    Failed { job_id: JobId, error: String },
}

impl Transition {
    /// Whether the channels for the job should be retired.
    pub fn retires_channels(&self) -> bool {
        matches!(
            self,
            Transition::Buffered | Transition::Commit(_) | Transition::Failed { .. }
        )
    }
}

/// All mutable coordination state for one tab. Only the transition methods
/// below may change it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorState {
    pub phase: Phase,
    pub current_job_id: Option<JobId>,
    pub result_processed: bool,
    pub gate: GateController,
    pub order_state: OrderState,
    pub result_url: Option<String>,
    pub error: Option<String>,
    pub phase_history: Vec<Phase>,
}

impl CoordinatorState {
    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase_history.push(self.phase);
            self.phase = phase;
        }
    }

    /// Starts tracking a freshly submitted job. Any previous job's state,
    /// including the gate, is discarded.
    pub fn submit(&mut self, job_id: JobId) {
        self.current_job_id = Some(job_id);
        self.result_processed = false;
        self.gate.reset();
        self.order_state = OrderState::None;
        self.result_url = None;
        self.error = None;
        self.enter(Phase::AwaitingResult);
    }

    /// Applies one channel observation.
    ///
    /// Only an observation for the tracked job, arriving while the state is
    /// `AwaitingResult`, can change anything. The `result_processed` flip in
    /// the commit branch is the single point that admits a result.
    pub fn observe(&mut self, result: &JobResult) -> Transition {
        let Some(current) = &self.current_job_id else {
            return Transition::Ignored(IgnoreReason::NoActiveJob);
        };
        if *current != result.job_id {
            return Transition::Ignored(IgnoreReason::StaleJob {
                current: current.clone(),
                observed: result.job_id.clone(),
            });
        }
        if self.result_processed {
            return Transition::Ignored(IgnoreReason::AlreadyProcessed);
        }
        match (self.phase, &result.outcome) {
            (Phase::AwaitingResult, _) => {}
            // A failure still wins over a result nobody has seen yet.
            (Phase::Gated, JobOutcome::Failed { .. }) => {
                self.gate.discard();
            }
            (Phase::Gated, _) => return Transition::Ignored(IgnoreReason::AlreadyBuffered),
            (Phase::Failed, _) => return Transition::Ignored(IgnoreReason::Terminal),
            _ => return Transition::Ignored(IgnoreReason::AlreadyProcessed),
        }

        match &result.outcome {
            JobOutcome::Pending { progress } => Transition::Progress(*progress),
            JobOutcome::Failed { error } => {
                self.error = Some(error.clone());
                self.enter(Phase::Failed);
                Transition::Failed {
                    job_id: result.job_id.clone(),
                    error: error.clone(),
                }
            }
            JobOutcome::Completed { result_url } => {
                if self.gate.is_open() {
                    self.commit(result.job_id.clone(), result_url.clone())
                } else {
                    match self.gate.buffer(result.clone()) {
                        Ok(()) => {
                            self.enter(Phase::Gated);
                            Transition::Buffered
                        }
                        // Gate reported open after all; commit directly.
                        Err(_) => self.commit(result.job_id.clone(), result_url.clone()),
                    }
                }
            }
        }
    }

    /// Records the user's contact details and opens the gate, replaying the
    /// buffered result if one is waiting.
    pub fn submit_info(&mut self, info: ContactInfo) -> Transition {
        let released = self.gate.submit_info(info);
        match (self.phase, released) {
            (Phase::Gated, Some(result)) => match result.outcome {
                JobOutcome::Completed { result_url } => self.commit(result.job_id, result_url),
                _ => Transition::Ignored(IgnoreReason::AlreadyProcessed),
            },
            (Phase::Gated, None) => Transition::Ignored(IgnoreReason::AlreadyProcessed),
            (Phase::Idle | Phase::AwaitingResult, _) => Transition::GateOpened,
            (Phase::Failed, _) => Transition::Ignored(IgnoreReason::Terminal),
            _ => Transition::Ignored(IgnoreReason::AlreadyProcessed),
        }
    }

    fn commit(&mut self, job_id: JobId, result_url: String) -> Transition {
        self.result_processed = true;
        self.result_url = Some(result_url.clone());
        self.enter(Phase::Displayed);
        Transition::Commit(Committed { job_id, result_url })
    }

    /// Claims the order side effect. Returns `Ok(None)` when an order is
    /// already in flight, created, or of unknown outcome for this job.
    pub fn begin_order(&mut self) -> Result<Option<OrderRequest>, GateViolation> {
        if self.order_state != OrderState::None {
            return Ok(None);
        }
        let contact = match (self.gate.is_open(), self.gate.contact()) {
            (true, Some(contact)) => contact.clone(),
            _ => return Err(GateViolation::GateClosed),
        };
        let (Some(job_id), Some(result_url), true) = (
            self.current_job_id.clone(),
            self.result_url.clone(),
            self.result_processed,
        ) else {
            return Err(GateViolation::ResultNotDisplayed);
        };

        self.order_state = OrderState::InFlight;
        self.enter(Phase::OrderPending);
        Ok(Some(OrderRequest {
            job_id,
            result_url,
            contact,
        }))
    }

    /// Settles an in-flight order. On failure the order reverts to `None` so
    /// an explicit retry can claim it again; the displayed result is untouched.
    pub fn finish_order(&mut self, order_id: Option<String>) {
        if self.order_state != OrderState::InFlight {
            return;
        }
        match order_id {
            Some(order_id) => {
                self.order_state = OrderState::Created { order_id };
                self.enter(Phase::Complete);
            }
            None => {
                self.order_state = OrderState::None;
                self.enter(Phase::Displayed);
            }
        }
    }

    /// Normalises a snapshot read back after a reload. An order that was in
    /// flight when the tab went away becomes `Unknown` and blocks every
    /// further claim until [`CoordinatorState::settle_unknown_order`] runs.
    pub fn recover(&mut self) -> bool {
        if self.order_state == OrderState::InFlight {
            self.order_state = OrderState::Unknown;
            self.enter(Phase::Displayed);
            return true;
        }
        false
    }

    /// Operator verdict on an order of unknown outcome. `Some(id)` records the
    /// order that was found; `None` states that none exists, which releases the
    /// job for one more claim. Returns false unless the outcome was unknown.
    pub fn settle_unknown_order(&mut self, order_id: Option<String>) -> bool {
        if self.order_state != OrderState::Unknown {
            return false;
        }
        match order_id {
            Some(order_id) => {
                self.order_state = OrderState::Created { order_id };
                self.enter(Phase::Complete);
            }
            None => self.order_state = OrderState::None,
        }
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, warn};

use crate::backend::JobBackend;
use crate::channels::{ChannelEvent, ChannelKind, ChannelSet, JobEventSource, PollSettings};
use crate::error::{Result, TryOnError};
use crate::order::OrderCreator;
use crate::session::{FlowStep, TabSession, TabSessionStore};
use crate::state_machine::{
    ContactInfo, CoordinatorState, IgnoreReason, Job, JobId, JobResult, MediaRef, Order,
    OrderState, Phase, Transition,
};

/// Notifications for the surrounding UI.
#[derive(Debug, Clone)]
pub enum StateChange {
    Submitted { job_id: JobId },
    Progress { job_id: JobId, progress: Option<u8> },
    /// A result is ready but waits for contact details.
    Gated { job_id: JobId },
    /// Show this result now.
    Displayed { job_id: JobId, result_url: String },
    OrderCreated { order: Order },
    /// Recoverable; the displayed result stays and `retry_order` may be used.
    OrderFailed { job_id: JobId, error: String },
    Failed { job_id: JobId, error: String },
    /// Polling gave up; offer the operator a manual check.
    ManualCheckAvailable { job_id: JobId },
    Reset,
}

type Listener = Box<dyn FnMut(&StateChange) + Send>;

/// Turns racing channel observations into at most one displayed result and
/// at most one order per job.
///
/// All state lives in a [`CoordinatorState`] owned by this value and mirrored
/// into the tab's session store after every mutation. Channels only enqueue
/// [`ChannelEvent`]s; each event is applied to completion before the next is
/// taken, so the commit check and the commit itself never interleave.
pub struct JobResultCoordinator<B, S> {
    backend: Arc<B>,
    store: S,
    tab_key: String,
    state: CoordinatorState,
    step: FlowStep,
    manual_check_available: bool,
    channels: ChannelSet<B>,
    events: UnboundedReceiver<ChannelEvent>,
    orders: OrderCreator<B>,
    listeners: Vec<Listener>,
}

impl<B: JobBackend, S: TabSessionStore> JobResultCoordinator<B, S> {
    /// Creates an idle coordinator for a tab. Subscribes to `source` once;
    /// the subscription is reused by every job this coordinator runs.
    pub fn new(
        backend: Arc<B>,
        source: &(impl JobEventSource + ?Sized),
        store: S,
        tab_key: impl Into<String>,
        settings: PollSettings,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            channels: ChannelSet::new(Arc::clone(&backend), source, settings, tx),
            orders: OrderCreator::new(Arc::clone(&backend)),
            backend,
            store,
            tab_key: tab_key.into(),
            state: CoordinatorState::default(),
            step: FlowStep::default(),
            manual_check_available: false,
            events: rx,
            listeners: Vec::new(),
        }
    }

    /// Creates a coordinator and restores whatever the tab had persisted.
    ///
    /// A job still awaiting its result gets all channels re-armed. A gated
    /// result stays buffered. An order that was in flight is marked unknown
    /// and is never re-sent until [`Self::settle_order`] is called.
    pub fn resume(
        backend: Arc<B>,
        source: &(impl JobEventSource + ?Sized),
        store: S,
        tab_key: impl Into<String>,
        settings: PollSettings,
    ) -> Result<Self> {
        let mut coordinator = Self::new(backend, source, store, tab_key, settings);
        let Some(session) = TabSession::load(&coordinator.store, &coordinator.tab_key)? else {
            debug!(tab = %coordinator.tab_key, "no session to resume");
            return Ok(coordinator);
        };

        coordinator.state = session.state;
        coordinator.step = session.step;
        if coordinator.state.recover() {
            warn!(tab = %coordinator.tab_key, "order outcome unknown after reload, confirmation required");
        }
        if coordinator.state.phase == Phase::AwaitingResult
            && let Some(job_id) = coordinator.state.current_job_id.clone()
        {
            coordinator.channels.arm_all(&job_id);
        }
        coordinator.persist();
        info!(
            tab = %coordinator.tab_key,
            phase = %coordinator.state.phase,
            "resumed tab session"
        );
        Ok(coordinator)
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn step(&self) -> FlowStep {
        self.step
    }

    pub fn tab_key(&self) -> &str {
        &self.tab_key
    }

    pub fn manual_check_available(&self) -> bool {
        self.manual_check_available
    }

    pub fn channels(&self) -> &ChannelSet<B> {
        &self.channels
    }

    pub fn on_state_change(&mut self, listener: impl FnMut(&StateChange) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Submits a new job and arms every channel for it. Channels of the
    /// previous job are retired and its queued observations discarded first.
    pub async fn submit_job(&mut self, garment: MediaRef, photo: MediaRef) -> Result<Job> {
        info!(garment = %garment.describe(), photo = %photo.describe(), "submitting job");
        let job_id = self.backend.submit_job(&garment, &photo).await?;
        let job = Job::new(job_id, garment, photo);

        self.channels.cancel_all();
        self.drain_events();
        self.state.submit(job.id.clone());
        self.step = FlowStep::Processing;
        self.manual_check_available = false;
        self.persist();
        self.channels.arm_all(&job.id);

        info!(job_id = %job.id, "job submitted, channels armed");
        self.emit(StateChange::Submitted {
            job_id: job.id.clone(),
        });
        Ok(job)
    }

    /// Applies one observation from any channel.
    pub async fn observe(&mut self, channel: ChannelKind, result: JobResult) -> Result<Transition> {
        let transition = self.state.observe(&result);
        match &transition {
            Transition::Ignored(reason) => {
                debug!(%channel, job_id = %result.job_id, %reason, "observation ignored");
            }
            Transition::Progress(_) => {
                debug!(%channel, job_id = %result.job_id, "job still pending");
            }
            _ => {
                info!(
                    %channel,
                    job_id = %result.job_id,
                    phase = %self.state.phase,
                    "observation accepted"
                );
            }
        }
        self.apply(transition).await
    }

    /// Records the user's contact details and opens the gate. A buffered
    /// result is displayed immediately.
    pub async fn submit_info(&mut self, info: ContactInfo) -> Result<Transition> {
        if let Some(field) = info.missing_field() {
            return Err(TryOnError::InvalidContact(field));
        }
        let transition = self.state.submit_info(info);
        debug!(phase = %self.state.phase, "gate opened");
        if matches!(transition, Transition::Ignored(_)) {
            self.persist();
        }
        self.apply(transition).await
    }

    /// Operator-triggered recheck through the manual channel. Subject to the
    /// same dedup and gate rules as the automatic channels.
    pub async fn observe_externally(&mut self) -> Result<Transition> {
        match self.channels.manual.check().await? {
            Some(result) => self.observe(ChannelKind::Manual, result).await,
            None => Ok(Transition::Ignored(self.inactive_reason())),
        }
    }

    /// Retries order creation after an earlier failure. Returns `Ok(None)`
    /// when an order already exists or is in flight. An order of unknown
    /// outcome is refused with [`TryOnError::OrderOutcomeUnknown`].
    pub async fn retry_order(&mut self) -> Result<Option<Order>> {
        if self.state.order_state == OrderState::Unknown {
            return Err(TryOnError::OrderOutcomeUnknown {
                job_id: self.state.current_job_id.clone().ok_or(TryOnError::NoActiveJob)?,
            });
        }
        self.sequence_order().await
    }

    /// Records the operator's verdict on an order of unknown outcome.
    /// `Some(order_id)` means the order exists; `None` means it was never
    /// written and may be retried. Returns false when nothing was unknown.
    pub fn settle_order(&mut self, order_id: Option<String>) -> Result<bool> {
        let found = order_id.clone();
        if !self.state.settle_unknown_order(order_id) {
            return Ok(false);
        }
        self.persist();
        info!(tab = %self.tab_key, order_id = ?found, "unknown order settled");
        Ok(true)
    }

    /// Takes the next queued channel event, if any channel is still alive.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    pub async fn handle_event(&mut self, event: ChannelEvent) -> Result<()> {
        match event {
            ChannelEvent::Observed { channel, result } => {
                self.observe(channel, result).await?;
            }
            ChannelEvent::QueryFailed {
                channel,
                job_id,
                error,
            } => {
                debug!(%channel, %job_id, "transient query failure: {error}");
            }
            ChannelEvent::PollExhausted { job_id } => {
                let current = self.state.current_job_id.as_ref() == Some(&job_id);
                if current && self.state.phase == Phase::AwaitingResult {
                    self.manual_check_available = true;
                    self.emit(StateChange::ManualCheckAvailable { job_id });
                }
            }
        }
        Ok(())
    }

    /// Processes channel events until the job leaves `AwaitingResult` or the
    /// poller gives up. A failed job is returned as [`TryOnError::JobFailed`].
    pub async fn wait_for_result(&mut self) -> Result<Phase> {
        while self.state.phase == Phase::AwaitingResult && !self.manual_check_available {
            let Some(event) = self.events.recv().await else {
                break;
            };
            self.handle_event(event).await?;
        }

        if self.state.phase == Phase::Failed {
            return Err(TryOnError::JobFailed {
                job_id: self.state.current_job_id.clone().ok_or(TryOnError::NoActiveJob)?,
                error: self.state.error.clone().unwrap_or_default(),
            });
        }
        Ok(self.state.phase)
    }

    /// Records the UI's position in the flow.
    pub fn navigate(&mut self, step: FlowStep) {
        self.step = step;
        self.persist();
    }

    /// Returns to `Idle` from any phase and forgets the tab's snapshot.
    pub fn reset(&mut self) -> Result<()> {
        self.channels.cancel_all();
        self.drain_events();
        self.state.reset();
        self.step = FlowStep::ChooseItem;
        self.manual_check_available = false;
        self.store.delete(&self.tab_key)?;
        info!(tab = %self.tab_key, "coordinator reset");
        self.emit(StateChange::Reset);
        Ok(())
    }

    /// Acknowledges a failed job, resetting to `Idle`. No-op otherwise.
    pub fn acknowledge_failure(&mut self) -> Result<bool> {
        if self.state.phase != Phase::Failed {
            return Ok(false);
        }
        self.reset()?;
        Ok(true)
    }

    /// Ends the push subscription and stops all channels.
    pub fn shutdown(&mut self) {
        self.channels.cancel_all();
        self.channels.push.shutdown();
    }

    async fn apply(&mut self, transition: Transition) -> Result<Transition> {
        if transition.retires_channels() {
            self.channels.cancel_all();
        }
        match &transition {
            Transition::Ignored(_) => {}
            Transition::Progress(progress) => {
                if let Some(job_id) = self.state.current_job_id.clone() {
                    self.emit(StateChange::Progress {
                        job_id,
                        progress: *progress,
                    });
                }
            }
            Transition::GateOpened => self.persist(),
            Transition::Buffered => {
                self.persist();
                if let Some(job_id) = self.state.current_job_id.clone() {
                    self.emit(StateChange::Gated { job_id });
                }
            }
            Transition::Failed { job_id, error } => {
                self.persist();
                warn!(%job_id, "job failed: {error}");
                self.emit(StateChange::Failed {
                    job_id: job_id.clone(),
                    error: error.clone(),
                });
            }
            Transition::Commit(committed) => {
                self.step = FlowStep::ShowResult;
                self.persist();
                info!(job_id = %committed.job_id, "result committed");
                // Display strictly precedes the order write.
                self.emit(StateChange::Displayed {
                    job_id: committed.job_id.clone(),
                    result_url: committed.result_url.clone(),
                });
                if let Err(e) = self.sequence_order().await {
                    warn!(job_id = %committed.job_id, "order left for retry: {e}");
                }
            }
        }
        Ok(transition)
    }

    async fn sequence_order(&mut self) -> Result<Option<Order>> {
        let request = match self.state.begin_order() {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!(order_state = ?self.state.order_state, "order already claimed");
                return Ok(None);
            }
            Err(violation) => {
                error!("order sequencing refused: {violation}");
                return Err(violation.into());
            }
        };
        self.persist();

        let job_id = request.job_id.clone();
        match self.orders.create(request).await {
            Ok(order) => {
                self.state.finish_order(Some(order.id.clone()));
                self.persist();
                self.emit(StateChange::OrderCreated {
                    order: order.clone(),
                });
                Ok(Some(order))
            }
            Err(e) => {
                self.state.finish_order(None);
                self.persist();
                self.emit(StateChange::OrderFailed {
                    job_id,
                    error: e.to_string(),
                });
                Err(TryOnError::OrderCreation(e))
            }
        }
    }

    fn inactive_reason(&self) -> IgnoreReason {
        match self.state.phase {
            Phase::Idle => IgnoreReason::NoActiveJob,
            Phase::Gated => IgnoreReason::AlreadyBuffered,
            Phase::Failed => IgnoreReason::Terminal,
            _ => IgnoreReason::AlreadyProcessed,
        }
    }

    fn drain_events(&mut self) {
        let mut dropped = 0usize;
        while self.events.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "discarded queued observations");
        }
    }

    fn persist(&self) {
        let session = TabSession::new(self.state.clone(), self.step);
        if let Err(e) = session.save(&self.store, &self.tab_key) {
            warn!(tab = %self.tab_key, "failed to persist tab session: {e}");
        }
    }

    fn emit(&mut self, change: StateChange) {
        for listener in &mut self.listeners {
            listener(&change);
        }
    }
}

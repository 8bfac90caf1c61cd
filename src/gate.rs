//! The human-information gate.
//!
//! A completed result may only be shown once the user has submitted their
//! contact details. While the gate is closed, [`GateController`] holds at most
//! one completed result so it can be replayed the moment the gate opens.

use serde::{Deserialize, Serialize};

use crate::error::GateViolation;
use crate::state_machine::{ContactInfo, JobResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateController {
    open: bool,
    contact: Option<ContactInfo>,
    pending: Option<JobResult>,
}

impl GateController {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn contact(&self) -> Option<&ContactInfo> {
        self.contact.as_ref()
    }

    /// The buffered result, if one is waiting for the gate.
    pub fn pending(&self) -> Option<&JobResult> {
        self.pending.as_ref()
    }

    /// Holds a completed result until the gate opens. The first buffered
    /// result wins; later ones are dropped.
    pub(crate) fn buffer(&mut self, result: JobResult) -> Result<(), GateViolation> {
        if self.open {
            return Err(GateViolation::BufferWhileOpen);
        }
        if self.pending.is_none() {
            self.pending = Some(result);
        }
        Ok(())
    }

    /// Stores the contact details, opens the gate and hands back whatever was
    /// buffered so the caller can replay it.
    pub(crate) fn submit_info(&mut self, info: ContactInfo) -> Option<JobResult> {
        self.contact = Some(info);
        self.open = true;
        self.pending.take()
    }

    /// Drops a buffered result that can no longer be shown.
    pub(crate) fn discard(&mut self) -> Option<JobResult> {
        self.pending.take()
    }

    /// Closes the gate for a fresh job.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

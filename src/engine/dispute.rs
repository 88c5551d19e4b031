//! Dispute state: the adjudicator keeps only the currently accepted
//! sequence's length and derived classification, never the full log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::dispute_window;
use crate::engine::replay::Outcome;
use crate::engine::EngineError;
use crate::types::{Party, Seq};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeState {
    pub action_count: Seq,
    pub outcome: Outcome,
    /// Party on whose behalf the currently accepted sequence was submitted.
    pub submitter: Party,
    pub deadline: DateTime<Utc>,
    pub resolved: bool,
}

impl DisputeState {
    pub fn open(action_count: Seq, outcome: Outcome, submitter: Party, now: DateTime<Utc>) -> Self {
        Self {
            action_count,
            outcome,
            submitter,
            deadline: now + dispute_window(),
            resolved: false,
        }
    }

    /// Replace the accepted sequence with a strictly longer one. Equal or
    /// shorter resubmissions are rejected; the window does not restart.
    pub fn supersede(
        &mut self,
        action_count: Seq,
        outcome: Outcome,
        submitter: Party,
    ) -> Result<(), EngineError> {
        if action_count <= self.action_count {
            return Err(EngineError::DisputeNotLonger {
                current: self.action_count,
                submitted: action_count,
            });
        }
        self.action_count = action_count;
        self.outcome = outcome;
        self.submitter = submitter;
        Ok(())
    }

    pub fn window_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

//! Notifications emitted at the boundary for external observers.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::force_reveal::RevealStage;
use crate::types::{ChannelId, Chips, HandId, Party, Seq};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Notification {
    ChannelOpened {
        channel_id: ChannelId,
        min_blind: Chips,
    },
    ChannelJoined {
        channel_id: ChannelId,
    },
    ChannelToppedUp {
        channel_id: ChannelId,
        party: Party,
        amount: Chips,
    },
    GameStarted {
        channel_id: ChannelId,
        hand_id: HandId,
    },
    ActionsSettled {
        channel_id: ChannelId,
        hand_id: HandId,
        action_count: Seq,
        pot: Chips,
    },
    DisputeOpened {
        channel_id: ChannelId,
        hand_id: HandId,
        action_count: Seq,
        deadline: DateTime<Utc>,
    },
    DisputeExtended {
        channel_id: ChannelId,
        hand_id: HandId,
        action_count: Seq,
    },
    DisputeFinalized {
        channel_id: ChannelId,
        hand_id: HandId,
    },
    ShowdownStarted {
        channel_id: ChannelId,
        hand_id: HandId,
        initiator: Party,
        deadline: DateTime<Utc>,
    },
    CommitMaskUpdated {
        channel_id: ChannelId,
        hand_id: HandId,
        mask: u16,
    },
    RevealProgress {
        channel_id: ChannelId,
        hand_id: HandId,
        mask: u16,
    },
    ShowdownFinalized {
        channel_id: ChannelId,
        hand_id: HandId,
        winner: Option<Party>,
        balances: [Chips; 2],
    },
    ForceRevealRequested {
        channel_id: ChannelId,
        hand_id: HandId,
        stage: RevealStage,
        helper: Party,
        deadline: DateTime<Utc>,
    },
    ForceRevealAnswered {
        channel_id: ChannelId,
        hand_id: HandId,
        stage: RevealStage,
    },
    ForceRevealSlashed {
        channel_id: ChannelId,
        hand_id: HandId,
        helper: Party,
        amount: Chips,
    },
}

/// Boundary seam for notification delivery.
pub trait EventSink: Send + Sync {
    fn emit(&self, notification: Notification);
}

/// Sink that records everything; the default collaborator and the one the
/// test harnesses inspect.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RwLock<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.events.read().expect("event sink poisoned").clone()
    }

    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.write().expect("event sink poisoned"))
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, notification: Notification) {
        self.events
            .write()
            .expect("event sink poisoned")
            .push(notification);
    }
}

//! Signed betting actions and the hash chain that links them to a
//! hand-specific genesis.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::signing::{Signable, TranscriptBuilder};
use crate::types::{ChannelId, Chips, HandId, Party, Seq, StateHash};

const DOMAIN_GENESIS: &[u8] = b"headsup/hand/genesis/v1";
const DOMAIN_ACTION: &[u8] = b"headsup/hand/action/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SmallBlind,
    BigBlind,
    CheckCall,
    BetRaise,
    Fold,
}

impl ActionKind {
    pub fn as_byte(self) -> u8 {
        match self {
            ActionKind::SmallBlind => 0,
            ActionKind::BigBlind => 1,
            ActionKind::CheckCall => 2,
            ActionKind::BetRaise => 3,
            ActionKind::Fold => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub channel_id: ChannelId,
    pub hand_id: HandId,
    pub seq: Seq,
    pub kind: ActionKind,
    pub amount: Chips,
    /// Hash of the previous action, or the hand genesis hash for `seq == 0`.
    pub prev_hash: StateHash,
    pub sender: Party,
}

impl Signable for Action {
    fn domain_kind(&self) -> &'static str {
        "engine/action_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_u64(self.channel_id);
        builder.append_u64(self.hand_id);
        builder.append_u32(self.seq);
        builder.append_u8(self.kind.as_byte());
        builder.append_u64(self.amount);
        builder.append_bytes(self.prev_hash.as_bytes());
        builder.append_u8(self.sender.as_byte());
    }
}

fn finalize_hash(hasher: Sha256) -> StateHash {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    StateHash::from(bytes)
}

/// Chain anchor for a hand's first action.
pub fn genesis_hash(channel_id: ChannelId, hand_id: HandId) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_GENESIS);
    hasher.update(&channel_id.to_be_bytes());
    hasher.update(&hand_id.to_be_bytes());
    finalize_hash(hasher)
}

/// Hash of one action, as referenced by its successor's `prev_hash`.
pub fn action_hash(action: &Action) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_ACTION);
    hasher.update(&action.to_signing_bytes());
    finalize_hash(hasher)
}

/// Build the `prev_hash`-linked chain for a sequence of bare actions.
/// Test and client-side helper; the adjudicator only ever validates.
pub fn link_actions(actions: &mut [Action]) {
    let mut prev = match actions.first() {
        Some(first) => genesis_hash(first.channel_id, first.hand_id),
        None => return,
    };
    for (index, action) in actions.iter_mut().enumerate() {
        action.seq = index as Seq;
        action.prev_hash = prev;
        prev = action_hash(action);
    }
}

//! Force-reveal engine: a strict per-stage obligation machine that compels a
//! counterpart to produce a verified card opening within a deadline, under
//! threat of a slash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cards::{CardError, DeckRegistry, Slot};
use crate::channel::Channel;
use crate::config::force_reveal_window;
use crate::masking::{decode_g1, verify_partial_decrypt, MaskingError};
use crate::signing::{Signable, SignatureValidator, TranscriptBuilder};
use crate::types::{ChannelId, HandId, Party};

const LOG_TARGET: &str = "headsup_channel::force_reveal";

const PREREQ_HOLE_B: [Slot; 2] = Slot::HOLES_A;
const PREREQ_FLOP: [Slot; 4] = [Slot::HoleA1, Slot::HoleA2, Slot::HoleB1, Slot::HoleB2];
const PREREQ_TURN: [Slot; 7] = [
    Slot::HoleA1,
    Slot::HoleA2,
    Slot::HoleB1,
    Slot::HoleB2,
    Slot::Flop1,
    Slot::Flop2,
    Slot::Flop3,
];
const PREREQ_RIVER: [Slot; 8] = [
    Slot::HoleA1,
    Slot::HoleA2,
    Slot::HoleB1,
    Slot::HoleB2,
    Slot::Flop1,
    Slot::Flop2,
    Slot::Flop3,
    Slot::Turn,
];

/// Disclosure stages in their mandatory order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealStage {
    HoleA,
    HoleB,
    Flop,
    Turn,
    River,
}

impl RevealStage {
    /// Card indices this stage obliges the helper to open.
    pub fn slots(self) -> &'static [Slot] {
        match self {
            RevealStage::HoleA => &Slot::HOLES_A,
            RevealStage::HoleB => &Slot::HOLES_B,
            RevealStage::Flop => &[Slot::Flop1, Slot::Flop2, Slot::Flop3],
            RevealStage::Turn => &[Slot::Turn],
            RevealStage::River => &[Slot::River],
        }
    }

    /// Earlier streets' openings that must be on record before this stage
    /// may open.
    pub fn prerequisites(self) -> &'static [Slot] {
        match self {
            RevealStage::HoleA => &[],
            RevealStage::HoleB => &PREREQ_HOLE_B,
            RevealStage::Flop => &PREREQ_FLOP,
            RevealStage::Turn => &PREREQ_TURN,
            RevealStage::River => &PREREQ_RIVER,
        }
    }

    /// Stage whose obligation covers the given slot.
    pub fn covering(slot: Slot) -> RevealStage {
        match slot {
            Slot::HoleA1 | Slot::HoleA2 => RevealStage::HoleA,
            Slot::HoleB1 | Slot::HoleB2 => RevealStage::HoleB,
            Slot::Flop1 | Slot::Flop2 | Slot::Flop3 => RevealStage::Flop,
            Slot::Turn => RevealStage::Turn,
            Slot::River => RevealStage::River,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            RevealStage::HoleA => 0,
            RevealStage::HoleB => 1,
            RevealStage::Flop => 2,
            RevealStage::Turn => 3,
            RevealStage::River => 4,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForceRevealError {
    #[error("a party cannot oblige itself")]
    SelfObligation,
    #[error("another force-reveal is already in progress")]
    StageInProgress,
    #[error("no force-reveal is in progress")]
    NothingInProgress,
    #[error("prerequisites for stage {0:?} are not on record")]
    PrerequisitesMissing(RevealStage),
    #[error("channel or hand id does not match the force-reveal")]
    ContextMismatch,
    #[error("answer targets a different stage")]
    WrongStage,
    #[error("only the obligated helper may answer")]
    WrongHelper,
    #[error("signature does not bind to the obligated helper or their delegate")]
    Unauthorized,
    #[error("an answer must open exactly the stage's card indices")]
    WrongSlots,
    #[error("deadline already passed")]
    DeadlinePassed,
    #[error("deadline not yet expired")]
    NotYetExpired,
    #[error("claimed opening of slot {0:?} failed the pairing check")]
    VerificationFailed(Slot),
    #[error(transparent)]
    Masking(#[from] MaskingError),
    #[error(transparent)]
    Cards(#[from] CardError),
}

/// A claimed opening for one slot of the demanded stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOpening {
    pub slot: Slot,
    /// Compressed G1 encoding of the point with the helper's layer removed.
    pub opened: Vec<u8>,
}

/// Signed answer supplied by the obligated helper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceAnswer {
    pub channel_id: ChannelId,
    pub hand_id: HandId,
    pub stage: RevealStage,
    pub helper: Party,
    pub openings: Vec<StageOpening>,
}

impl Signable for ForceAnswer {
    fn domain_kind(&self) -> &'static str {
        "force_reveal/answer_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_u64(self.channel_id);
        builder.append_u64(self.hand_id);
        builder.append_u8(self.stage.as_byte());
        builder.append_u8(self.helper.as_byte());
        builder.append_u32(self.openings.len() as u32);
        for opening in &self.openings {
            builder.append_u8(opening.slot.index() as u8);
            builder.append_bytes(&opening.opened);
        }
    }
}

/// Per-hand force-reveal record: at most one stage in progress at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceRevealState {
    pub channel_id: ChannelId,
    pub hand_id: HandId,
    pub stage: Option<RevealStage>,
    pub in_progress: bool,
    pub served: bool,
    pub deadline: DateTime<Utc>,
    pub obligated_helper: Party,
    pub requester: Party,
    /// Stages already answered, which satisfy later prerequisites even when
    /// the underlying points remain partially masked.
    pub served_stages: Vec<RevealStage>,
    pub slashed: bool,
}

impl ForceRevealState {
    pub fn idle(channel_id: ChannelId, hand_id: HandId) -> Self {
        Self {
            channel_id,
            hand_id,
            stage: None,
            in_progress: false,
            served: false,
            deadline: DateTime::<Utc>::MIN_UTC,
            obligated_helper: Party::B,
            requester: Party::A,
            served_stages: Vec::new(),
            slashed: false,
        }
    }

    fn prerequisite_on_record(&self, registry: &DeckRegistry, slot: Slot) -> bool {
        registry.is_revealed(self.channel_id, self.hand_id, slot)
            || self.served_stages.contains(&RevealStage::covering(slot))
    }

    /// Open a stage: all earlier streets' openings must already be on
    /// record, and no other stage may be in progress.
    pub fn request(
        &mut self,
        stage: RevealStage,
        requester: Party,
        helper: Party,
        registry: &DeckRegistry,
        now: DateTime<Utc>,
    ) -> Result<(), ForceRevealError> {
        if requester == helper {
            return Err(ForceRevealError::SelfObligation);
        }
        if self.in_progress {
            return Err(ForceRevealError::StageInProgress);
        }
        for slot in stage.prerequisites() {
            if !self.prerequisite_on_record(registry, *slot) {
                return Err(ForceRevealError::PrerequisitesMissing(stage));
            }
        }

        self.stage = Some(stage);
        self.in_progress = true;
        self.served = false;
        self.slashed = false;
        self.deadline = now + force_reveal_window();
        self.obligated_helper = helper;
        self.requester = requester;
        tracing::info!(
            target: LOG_TARGET,
            channel = self.channel_id,
            hand = self.hand_id,
            ?stage,
            helper = ?helper,
            "force-reveal requested"
        );
        Ok(())
    }

    /// Answer the open stage with verified openings for exactly its card
    /// indices. A valid answer closes the stage as served.
    pub fn answer(
        &mut self,
        channel: &Channel,
        registry: &mut DeckRegistry,
        validator: &dyn SignatureValidator,
        answer: &ForceAnswer,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), ForceRevealError> {
        if !self.in_progress {
            return Err(ForceRevealError::NothingInProgress);
        }
        if answer.channel_id != self.channel_id || answer.hand_id != self.hand_id {
            return Err(ForceRevealError::ContextMismatch);
        }
        let stage = self.stage.ok_or(ForceRevealError::NothingInProgress)?;
        if answer.stage != stage {
            return Err(ForceRevealError::WrongStage);
        }
        if now >= self.deadline {
            return Err(ForceRevealError::DeadlinePassed);
        }
        if answer.helper != self.obligated_helper {
            return Err(ForceRevealError::WrongHelper);
        }
        if !channel.is_authorized_signer(
            answer.helper,
            &answer.to_signing_bytes(),
            signature,
            validator,
        ) {
            return Err(ForceRevealError::Unauthorized);
        }

        // Exactly the stage's slots, each exactly once.
        let expected = stage.slots();
        if answer.openings.len() != expected.len() {
            return Err(ForceRevealError::WrongSlots);
        }
        for slot in expected {
            if answer
                .openings
                .iter()
                .filter(|opening| opening.slot == *slot)
                .count()
                != 1
            {
                return Err(ForceRevealError::WrongSlots);
            }
        }

        let helper_key = channel
            .participant(answer.helper)
            .map_err(|_| ForceRevealError::Unauthorized)?
            .masking_key;

        // Verify every opening before applying any.
        let mut stripped = Vec::new();
        for opening in &answer.openings {
            let opened = decode_g1(&opening.opened)?;
            let stored = registry.encrypted_slot(self.channel_id, self.hand_id, opening.slot)?;
            if !verify_partial_decrypt(&stored, &opened, &helper_key) {
                return Err(ForceRevealError::VerificationFailed(opening.slot));
            }
            stripped.push((opening.slot, opened));
        }

        for (slot, opened) in stripped {
            registry.replace_slot(self.channel_id, self.hand_id, slot, opened)?;
            if let Some(card) = registry.card_value_of(self.channel_id, self.hand_id, &opened)? {
                registry.record_revealed(self.channel_id, self.hand_id, slot, card)?;
            }
        }

        self.served = true;
        self.in_progress = false;
        self.served_stages.push(stage);
        tracing::info!(
            target: LOG_TARGET,
            channel = self.channel_id,
            hand = self.hand_id,
            ?stage,
            "force-reveal served"
        );
        Ok(())
    }

    /// Close an unserved stage whose deadline has elapsed. The caller applies
    /// the penalty transfer to the channel. Succeeds at most once per stage.
    pub fn slash(&mut self, now: DateTime<Utc>) -> Result<(Party, Party), ForceRevealError> {
        if !self.in_progress {
            return Err(ForceRevealError::NothingInProgress);
        }
        if now < self.deadline {
            return Err(ForceRevealError::NotYetExpired);
        }

        self.in_progress = false;
        self.slashed = true;
        tracing::warn!(
            target: LOG_TARGET,
            channel = self.channel_id,
            hand = self.hand_id,
            stage = ?self.stage,
            helper = ?self.obligated_helper,
            "force-reveal slashed"
        );
        Ok((self.obligated_helper, self.requester))
    }
}

//! Showdown/reveal engine: a commit-reveal bitmask state machine that locks
//! per-slot card commitments, merges incremental disclosures from either
//! party (or third parties acting on their behalf), and finalizes the
//! payout.
//!
//! The salted-hash commitment variant is the canonical disclosure mechanism;
//! the cryptographic masking variant feeds the same per-slot state through
//! [`reveal_cards`].

pub mod rank;

pub use rank::{DefaultRanker, HandCategory, HandRanker, RankError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::cards::{CardError, CardValue, DeckRegistry, Slot, SlotMask, UNREVEALED};
use crate::channel::Channel;
use crate::config::reveal_window;
use crate::masking::{decode_g1, verify_partial_decrypt, MaskingError};
use crate::signing::{Signable, SignatureValidator, TranscriptBuilder};
use crate::types::{ChannelId, Chips, HandId, Party, Seq, SignatureBytes};

const LOG_TARGET: &str = "headsup_channel::showdown";
const DOMAIN_COMMIT: &[u8] = b"headsup/showdown/commit/v1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShowdownError {
    #[error("showdown already started")]
    AlreadyStarted,
    #[error("showdown already settled")]
    AlreadySettled,
    #[error("channel or hand id does not match the showdown")]
    ContextMismatch,
    #[error("only the initiator may start the showdown")]
    NotTheInitiator,
    #[error("signature does not bind to the named player or their delegate")]
    Unauthorized,
    #[error("submission sequence {submitted} does not exceed {current}")]
    StaleSequence { current: Seq, submitted: Seq },
    #[error("expected {expected} commitments, got {got}")]
    WrongCommitCount { expected: usize, got: usize },
    #[error("slot {0:?} appears more than once in one submission")]
    DuplicateSlot(Slot),
    #[error("deal reference for slot {0:?} does not address its deck entry")]
    DealRefMismatch(Slot),
    #[error("card byte for slot {0:?} is not a valid card")]
    MalformedCard(Slot),
    #[error("opening for slot {0:?} does not match its commitment")]
    CommitmentMismatch(Slot),
    #[error("claimed unmasking of slot {0:?} failed the pairing check")]
    RevealVerificationFailed(Slot),
    #[error("reveal window has closed")]
    RevealWindowClosed,
    #[error("reveal window is still open and the slot set is incomplete")]
    RevealWindowStillOpen,
    #[error(transparent)]
    Masking(#[from] MaskingError),
    #[error(transparent)]
    Cards(#[from] CardError),
    #[error(transparent)]
    Rank(#[from] RankError),
}

/// Commitment hash binding a hidden card to a deck entry:
/// `H(tag, channel, slot, deal_ref, card, salt)`.
pub fn commitment_hash(
    channel_id: ChannelId,
    slot: Slot,
    deal_ref: u8,
    card: u8,
    salt: &[u8; 32],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_COMMIT);
    hasher.update(&channel_id.to_be_bytes());
    hasher.update(&[slot.index() as u8, deal_ref, card]);
    hasher.update(salt);
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    bytes
}

/// A locked commitment: the hash and the deck entry it binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCommitment {
    pub hash: [u8; 32],
    pub deal_ref: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowdownState {
    pub channel_id: ChannelId,
    pub hand_id: HandId,
    pub initiator: Party,
    pub opponent: Party,
    pub deadline: DateTime<Utc>,
    /// Slots whose commitment and card value are irrevocably fixed.
    pub locked: SlotMask,
    pub commitments: [Option<SlotCommitment>; 9],
    /// Per-slot card bytes, `UNREVEALED` until opened.
    pub revealed: [u8; 9],
    /// Cosigned commitment hashes for the opponent's holes, held until the
    /// opponent opens them.
    pub opponent_hole_hashes: [Option<[u8; 32]>; 2],
    /// Highest submission sequence number observed.
    pub max_seq: Seq,
    pub pot: Chips,
    pub contributions: [Chips; 2],
    /// Set once the initiator's opening submission has been accepted.
    pub started: bool,
    pub settled: bool,
}

impl ShowdownState {
    /// Open the showdown record when a transcript reaches the showdown
    /// terminal state. The settling caller becomes the initiator.
    pub fn open(
        channel_id: ChannelId,
        hand_id: HandId,
        initiator: Party,
        pot: Chips,
        contributions: [Chips; 2],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            channel_id,
            hand_id,
            initiator,
            opponent: initiator.other(),
            deadline: now + reveal_window(),
            locked: SlotMask::EMPTY,
            commitments: [None; 9],
            revealed: [UNREVEALED; 9],
            opponent_hole_hashes: [None; 2],
            max_seq: 0,
            pot,
            contributions,
            started: false,
            settled: false,
        }
    }

    fn guard_context(&self, channel_id: ChannelId, hand_id: HandId) -> Result<(), ShowdownError> {
        if self.channel_id != channel_id || self.hand_id != hand_id {
            return Err(ShowdownError::ContextMismatch);
        }
        Ok(())
    }

    fn reserve_seq(&mut self, seq: Seq) -> Result<(), ShowdownError> {
        if seq <= self.max_seq {
            return Err(ShowdownError::StaleSequence {
                current: self.max_seq,
                submitted: seq,
            });
        }
        self.max_seq = seq;
        Ok(())
    }

    /// Initiator's own hole slots.
    fn initiator_holes(&self) -> [Slot; 2] {
        match self.initiator {
            Party::A => Slot::HOLES_A,
            Party::B => Slot::HOLES_B,
        }
    }

    /// Opponent's hole slots.
    fn opponent_holes(&self) -> [Slot; 2] {
        match self.initiator {
            Party::A => Slot::HOLES_B,
            Party::B => Slot::HOLES_A,
        }
    }

    fn cache_index(&self, slot: Slot) -> Option<usize> {
        self.opponent_holes().iter().position(|s| *s == slot)
    }

    pub fn is_complete(&self) -> bool {
        self.locked.is_full()
    }
}

// ---- Submission payloads --------------------------------------------------

/// One commitment entry of the cosigned nine-slot bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub slot: Slot,
    pub deal_ref: u8,
    pub hash: [u8; 32],
}

/// The full nine-slot commitment set both parties signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitBundle {
    pub channel_id: ChannelId,
    pub hand_id: HandId,
    pub seq: Seq,
    pub entries: Vec<CommitEntry>,
}

impl Signable for CommitBundle {
    fn domain_kind(&self) -> &'static str {
        "showdown/commit_bundle_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_u64(self.channel_id);
        builder.append_u64(self.hand_id);
        builder.append_u32(self.seq);
        builder.append_u32(self.entries.len() as u32);
        for entry in &self.entries {
            builder.append_u8(entry.slot.index() as u8);
            builder.append_u8(entry.deal_ref);
            builder.append_bytes(&entry.hash);
        }
    }
}

/// A commitment together with its opening, as submitted after the showdown
/// has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDisclosure {
    pub slot: Slot,
    pub deal_ref: u8,
    pub hash: [u8; 32],
    pub card: u8,
    pub salt: [u8; 32],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisclosureBundle {
    pub channel_id: ChannelId,
    pub hand_id: HandId,
    pub seq: Seq,
    pub on_behalf_of: Party,
    pub items: Vec<SlotDisclosure>,
}

impl Signable for DisclosureBundle {
    fn domain_kind(&self) -> &'static str {
        "showdown/disclosure_bundle_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_u64(self.channel_id);
        builder.append_u64(self.hand_id);
        builder.append_u32(self.seq);
        builder.append_u8(self.on_behalf_of.as_byte());
        builder.append_u32(self.items.len() as u32);
        for item in &self.items {
            builder.append_u8(item.slot.index() as u8);
            builder.append_u8(item.deal_ref);
            builder.append_bytes(&item.hash);
            builder.append_u8(item.card);
            builder.append_bytes(&item.salt);
        }
    }
}

/// Masking-variant disclosure: a claimed partial (or full) unmasking of a
/// slot's stored point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedSlot {
    pub slot: Slot,
    /// Compressed G1 encoding of the opened point.
    pub opened: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealBundle {
    pub channel_id: ChannelId,
    pub hand_id: HandId,
    pub seq: Seq,
    pub on_behalf_of: Party,
    pub items: Vec<RevealedSlot>,
}

impl Signable for RevealBundle {
    fn domain_kind(&self) -> &'static str {
        "showdown/reveal_bundle_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_u64(self.channel_id);
        builder.append_u64(self.hand_id);
        builder.append_u32(self.seq);
        builder.append_u8(self.on_behalf_of.as_byte());
        builder.append_u32(self.items.len() as u32);
        for item in &self.items {
            builder.append_u8(item.slot.index() as u8);
            builder.append_bytes(&item.opened);
        }
    }
}

/// Initiator's opening move: the cosigned commitment set plus openings for
/// the board and the initiator's own holes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartShowdownRequest {
    pub bundle: CommitBundle,
    /// One signature per party over the bundle transcript, indexed A then B.
    pub cosignatures: [SignatureBytes; 2],
    pub board_codes: [u8; 5],
    pub board_salts: [[u8; 32]; 5],
    pub hole_codes: [u8; 2],
    pub hole_salts: [[u8; 32]; 2],
}

/// Outcome of a finalized showdown, to be applied to the channel balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowdownSettlement {
    /// `None` on a tie: no chips move.
    pub winner: Option<Party>,
    /// Amount the loser forfeits to the winner.
    pub transfer: Chips,
    /// True when the pot defaulted to the initiator on an incomplete reveal.
    pub forfeited: bool,
}

// ---- Transitions ----------------------------------------------------------

fn reject_duplicates<I: Iterator<Item = Slot>>(slots: I) -> Result<SlotMask, ShowdownError> {
    let mut seen = SlotMask::EMPTY;
    for slot in slots {
        if seen.contains(slot) {
            return Err(ShowdownError::DuplicateSlot(slot));
        }
        seen.insert(slot);
    }
    Ok(seen)
}

fn checked_card(slot: Slot, byte: u8) -> Result<CardValue, ShowdownError> {
    CardValue::from_byte(byte).ok_or(ShowdownError::MalformedCard(slot))
}

fn verify_opening(
    channel_id: ChannelId,
    entry: &CommitEntry,
    card: u8,
    salt: &[u8; 32],
) -> Result<CardValue, ShowdownError> {
    let value = checked_card(entry.slot, card)?;
    let recomputed = commitment_hash(channel_id, entry.slot, entry.deal_ref, card, salt);
    if recomputed != entry.hash {
        return Err(ShowdownError::CommitmentMismatch(entry.slot));
    }
    Ok(value)
}

fn lock_open_slot(
    state: &mut ShowdownState,
    registry: &mut DeckRegistry,
    commitment: SlotCommitment,
    slot: Slot,
    card: CardValue,
) -> Result<(), ShowdownError> {
    state.commitments[slot.index()] = Some(commitment);
    state.revealed[slot.index()] = card.byte();
    state.locked.insert(slot);
    registry.record_revealed(state.channel_id, state.hand_id, slot, card)?;
    Ok(())
}

/// Accept the initiator's opening submission: verify the cosigned nine-slot
/// commitment set, open the board and the initiator's holes, and cache the
/// opponent's hole hashes.
pub fn start_showdown(
    state: &mut ShowdownState,
    channel: &Channel,
    registry: &mut DeckRegistry,
    validator: &dyn SignatureValidator,
    request: &StartShowdownRequest,
    now: DateTime<Utc>,
) -> Result<SlotMask, ShowdownError> {
    if state.settled {
        return Err(ShowdownError::AlreadySettled);
    }
    if state.started {
        return Err(ShowdownError::AlreadyStarted);
    }
    if now >= state.deadline {
        return Err(ShowdownError::RevealWindowClosed);
    }
    let bundle = &request.bundle;
    state.guard_context(bundle.channel_id, bundle.hand_id)?;

    if bundle.entries.len() != Slot::ALL.len() {
        return Err(ShowdownError::WrongCommitCount {
            expected: Slot::ALL.len(),
            got: bundle.entries.len(),
        });
    }
    let covered = reject_duplicates(bundle.entries.iter().map(|entry| entry.slot))?;
    debug_assert!(covered.is_full());
    for entry in &bundle.entries {
        if usize::from(entry.deal_ref) != entry.slot.index() {
            return Err(ShowdownError::DealRefMismatch(entry.slot));
        }
    }

    // Both parties must have signed the commitment set.
    let transcript = bundle.to_signing_bytes();
    for (party, signature) in [Party::A, Party::B].into_iter().zip(&request.cosignatures) {
        if !channel.is_authorized_signer(party, &transcript, signature, validator) {
            return Err(ShowdownError::Unauthorized);
        }
    }

    let entry_for = |slot: Slot| -> CommitEntry {
        bundle
            .entries
            .iter()
            .find(|entry| entry.slot == slot)
            .copied()
            .unwrap_or_else(|| unreachable!("all nine slots are covered"))
    };

    // Validate every opening before mutating anything.
    let mut opened: Vec<(CommitEntry, CardValue)> = Vec::new();
    for (slot, (code, salt)) in Slot::BOARD
        .into_iter()
        .zip(request.board_codes.iter().zip(&request.board_salts))
    {
        let entry = entry_for(slot);
        opened.push((entry, verify_opening(state.channel_id, &entry, *code, salt)?));
    }
    for (slot, (code, salt)) in state
        .initiator_holes()
        .into_iter()
        .zip(request.hole_codes.iter().zip(&request.hole_salts))
    {
        let entry = entry_for(slot);
        opened.push((entry, verify_opening(state.channel_id, &entry, *code, salt)?));
    }

    state.reserve_seq(bundle.seq)?;
    for (entry, card) in opened {
        let commitment = SlotCommitment {
            hash: entry.hash,
            deal_ref: entry.deal_ref,
        };
        lock_open_slot(state, registry, commitment, entry.slot, card)?;
    }
    for slot in state.opponent_holes() {
        let entry = entry_for(slot);
        if let Some(index) = state.cache_index(slot) {
            state.opponent_hole_hashes[index] = Some(entry.hash);
        }
    }
    state.started = true;

    tracing::info!(
        target: LOG_TARGET,
        channel = state.channel_id,
        hand = state.hand_id,
        mask = state.locked.bits(),
        "showdown started"
    );
    Ok(state.locked)
}

/// Merge a batch of commitment openings. Unlocked slots verify and lock;
/// already locked slots are silently left untouched whether the submission
/// matches or conflicts. That tolerance is the merge policy for redundant
/// and racing submissions, not an error path.
pub fn submit_additional_commits(
    state: &mut ShowdownState,
    channel: &Channel,
    registry: &mut DeckRegistry,
    validator: &dyn SignatureValidator,
    bundle: &DisclosureBundle,
    signature: &[u8],
    now: DateTime<Utc>,
) -> Result<SlotMask, ShowdownError> {
    if state.settled {
        return Err(ShowdownError::AlreadySettled);
    }
    state.guard_context(bundle.channel_id, bundle.hand_id)?;
    if now >= state.deadline {
        return Err(ShowdownError::RevealWindowClosed);
    }
    if !channel.is_authorized_signer(
        bundle.on_behalf_of,
        &bundle.to_signing_bytes(),
        signature,
        validator,
    ) {
        return Err(ShowdownError::Unauthorized);
    }
    reject_duplicates(bundle.items.iter().map(|item| item.slot))?;

    // Validate the whole batch before applying any of it.
    let mut verified: Vec<(SlotDisclosure, CardValue)> = Vec::new();
    for item in &bundle.items {
        if usize::from(item.deal_ref) != item.slot.index() {
            return Err(ShowdownError::DealRefMismatch(item.slot));
        }
        let entry = CommitEntry {
            slot: item.slot,
            deal_ref: item.deal_ref,
            hash: item.hash,
        };
        let card = verify_opening(state.channel_id, &entry, item.card, &item.salt)?;
        verified.push((*item, card));
    }

    state.reserve_seq(bundle.seq)?;
    for (item, card) in verified {
        if state.locked.contains(item.slot) {
            tracing::debug!(
                target: LOG_TARGET,
                slot = ?item.slot,
                "slot already locked; submission ignored"
            );
            continue;
        }
        // A cosigned hole hash is binding: a different commitment for that
        // slot is ignored rather than locked.
        if let Some(index) = state.cache_index(item.slot) {
            if let Some(expected) = state.opponent_hole_hashes[index] {
                if expected != item.hash {
                    tracing::warn!(
                        target: LOG_TARGET,
                        slot = ?item.slot,
                        "commitment conflicts with the cosigned hash; ignored"
                    );
                    continue;
                }
            }
        }
        let commitment = SlotCommitment {
            hash: item.hash,
            deal_ref: item.deal_ref,
        };
        lock_open_slot(state, registry, commitment, item.slot, card)?;
    }

    Ok(state.locked)
}

/// Masking-variant disclosure: pairing-verify claimed unmaskings against the
/// discloser's verification key, strip the verified layer in the registry,
/// and lock any slot whose point lands on a canonical card.
pub fn reveal_cards(
    state: &mut ShowdownState,
    channel: &Channel,
    registry: &mut DeckRegistry,
    validator: &dyn SignatureValidator,
    bundle: &RevealBundle,
    signature: &[u8],
    now: DateTime<Utc>,
) -> Result<SlotMask, ShowdownError> {
    if state.settled {
        return Err(ShowdownError::AlreadySettled);
    }
    state.guard_context(bundle.channel_id, bundle.hand_id)?;
    if now >= state.deadline {
        return Err(ShowdownError::RevealWindowClosed);
    }
    if !channel.is_authorized_signer(
        bundle.on_behalf_of,
        &bundle.to_signing_bytes(),
        signature,
        validator,
    ) {
        return Err(ShowdownError::Unauthorized);
    }
    reject_duplicates(bundle.items.iter().map(|item| item.slot))?;

    let discloser_key = channel
        .participant(bundle.on_behalf_of)
        .map_err(|_| ShowdownError::Unauthorized)?
        .masking_key;

    // Verify every claimed unmasking before applying any.
    let mut stripped = Vec::new();
    for item in &bundle.items {
        let opened = decode_g1(&item.opened)?;
        let stored = registry.encrypted_slot(state.channel_id, state.hand_id, item.slot)?;
        if !verify_partial_decrypt(&stored, &opened, &discloser_key) {
            return Err(ShowdownError::RevealVerificationFailed(item.slot));
        }
        stripped.push((item.slot, opened));
    }

    state.reserve_seq(bundle.seq)?;
    for (slot, opened) in stripped {
        if state.locked.contains(slot) {
            continue;
        }
        registry.replace_slot(state.channel_id, state.hand_id, slot, opened)?;
        if let Some(card) = registry.card_value_of(state.channel_id, state.hand_id, &opened)? {
            state.revealed[slot.index()] = card.byte();
            state.locked.insert(slot);
            registry.record_revealed(state.channel_id, state.hand_id, slot, card)?;
            tracing::debug!(target: LOG_TARGET, ?slot, %card, "slot revealed by unmasking");
        }
    }

    Ok(state.locked)
}

/// Settle the showdown. Before the deadline this succeeds only once all nine
/// slots are open (cooperative completion); after the deadline an incomplete
/// slot set forfeits the pot to the initiator, who demonstrably cooperated.
pub fn finalize_showdown(
    state: &mut ShowdownState,
    ranker: &dyn HandRanker,
    now: DateTime<Utc>,
) -> Result<ShowdownSettlement, ShowdownError> {
    if state.settled {
        return Err(ShowdownError::AlreadySettled);
    }

    let settlement = if state.is_complete() {
        let card = |slot: Slot| -> Result<CardValue, ShowdownError> {
            checked_card(slot, state.revealed[slot.index()])
        };
        let board = [
            card(Slot::Flop1)?,
            card(Slot::Flop2)?,
            card(Slot::Flop3)?,
            card(Slot::Turn)?,
            card(Slot::River)?,
        ];
        let seven = |holes: [Slot; 2]| -> Result<[CardValue; 7], ShowdownError> {
            Ok([
                card(holes[0])?,
                card(holes[1])?,
                board[0],
                board[1],
                board[2],
                board[3],
                board[4],
            ])
        };
        let score_a = ranker.rank_seven(seven(Slot::HOLES_A)?)?;
        let score_b = ranker.rank_seven(seven(Slot::HOLES_B)?)?;

        let winner = match score_a.cmp(&score_b) {
            std::cmp::Ordering::Greater => Some(Party::A),
            std::cmp::Ordering::Less => Some(Party::B),
            std::cmp::Ordering::Equal => None,
        };
        let transfer = winner
            .map(|winner| state.contributions[winner.other().index()])
            .unwrap_or(0);
        ShowdownSettlement {
            winner,
            transfer,
            forfeited: false,
        }
    } else {
        if now < state.deadline {
            return Err(ShowdownError::RevealWindowStillOpen);
        }
        ShowdownSettlement {
            winner: Some(state.initiator),
            transfer: state.contributions[state.opponent.index()],
            forfeited: true,
        }
    };

    state.settled = true;
    tracing::info!(
        target: LOG_TARGET,
        channel = state.channel_id,
        hand = state.hand_id,
        winner = ?settlement.winner,
        transfer = settlement.transfer,
        forfeited = settlement.forfeited,
        "showdown finalized"
    );
    Ok(settlement)
}

//! The adjudicator facade: every boundary operation is a single atomic
//! state transition against the keyed stores. Checks run in a fixed order
//! (malformed input, authorization, state preconditions, ordering, then
//! cryptographic verification) and nothing mutates on a rejected call.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::cards::{canonical_card_points, deck_digest, CardError, DeckRegistry};
use crate::channel::{Channel, ChannelError, ChannelStore, Participant};
use crate::config::{CANONICAL_DECK_SIZE, WORKING_DECK_SIZE};
use crate::engine::{validate_sequence, Action, DisputeState, EngineError, Outcome};
use crate::events::{EventSink, Notification};
use crate::force_reveal::{ForceAnswer, ForceRevealError, ForceRevealState, RevealStage};
use crate::masking::{decode_g1, CardPoint, MaskingError};
use crate::showdown::{
    self, DisclosureBundle, HandRanker, RevealBundle, ShowdownError, ShowdownSettlement,
    ShowdownState, StartShowdownRequest,
};
use crate::signing::SignatureValidator;
use crate::types::{ChannelId, Chips, HandId, Party, PublicKeyBytes, Seq, SignatureBytes};

const LOG_TARGET: &str = "headsup_channel::adjudicator";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdjudicatorError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("game not started")]
    GameNotStarted,
    #[error("a settled sequence must end in a fold or reach showdown")]
    NonTerminalSettlement,
    #[error("{party:?}'s contribution exceeds their balance")]
    ContributionExceedsBalance { party: Party },
    #[error("the canonical table does not match the derived card points")]
    CanonicalTableMismatch,
    #[error("a showdown is already open for this hand")]
    ShowdownAlreadyOpen,
    #[error("showdown not in progress")]
    ShowdownNotInProgress,
    #[error("no dispute in progress")]
    NoDispute,
    #[error("dispute window still open")]
    DisputeWindowOpen,
    #[error("dispute window closed")]
    DisputeWindowClosed,
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Cards(#[from] CardError),
    #[error(transparent)]
    Masking(#[from] MaskingError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Showdown(#[from] ShowdownError),
    #[error(transparent)]
    ForceReveal(#[from] ForceRevealError),
}

/// Read-only channel snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelView {
    pub id: ChannelId,
    pub joined: bool,
    pub balances: [Chips; 2],
    pub min_blind: Chips,
    pub slash_amount: Chips,
    pub hand_id: HandId,
    pub game_started: bool,
    pub hand_finalized: bool,
}

pub struct Adjudicator {
    channels: ChannelStore,
    decks: DeckRegistry,
    showdowns: HashMap<(ChannelId, HandId), ShowdownState>,
    force_reveals: HashMap<(ChannelId, HandId), ForceRevealState>,
    disputes: HashMap<(ChannelId, HandId), DisputeState>,
    validator: Arc<dyn SignatureValidator>,
    ranker: Arc<dyn HandRanker>,
    sink: Arc<dyn EventSink>,
}

impl Adjudicator {
    pub fn new(
        validator: Arc<dyn SignatureValidator>,
        ranker: Arc<dyn HandRanker>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            channels: ChannelStore::new(),
            decks: DeckRegistry::new(),
            showdowns: HashMap::new(),
            force_reveals: HashMap::new(),
            disputes: HashMap::new(),
            validator,
            ranker,
            sink,
        }
    }

    // ---- Channel lifecycle ------------------------------------------------

    pub fn open(
        &mut self,
        channel_id: ChannelId,
        opener: Participant,
        opponent_account: PublicKeyBytes,
        deposit: Chips,
        min_blind: Chips,
        slash_amount: Chips,
    ) -> Result<HandId, AdjudicatorError> {
        if min_blind == 0 {
            return Err(AdjudicatorError::InvalidParameter(
                "min blind must be positive",
            ));
        }
        if opener.account == opponent_account {
            return Err(AdjudicatorError::InvalidParameter(
                "opponent must differ from the opener",
            ));
        }
        let channel = Channel::open(
            channel_id,
            opener,
            opponent_account,
            deposit,
            min_blind,
            slash_amount,
        );
        let hand_id = channel.hand_id;
        self.channels.insert(channel)?;
        self.sink.emit(Notification::ChannelOpened {
            channel_id,
            min_blind,
        });
        Ok(hand_id)
    }

    pub fn join(
        &mut self,
        channel_id: ChannelId,
        joiner: Participant,
        deposit: Chips,
    ) -> Result<(), AdjudicatorError> {
        let channel = self.channels.get_mut(channel_id)?;
        channel.join(joiner, deposit)?;
        self.sink.emit(Notification::ChannelJoined { channel_id });
        Ok(())
    }

    pub fn top_up(
        &mut self,
        channel_id: ChannelId,
        party: Party,
        amount: Chips,
    ) -> Result<(), AdjudicatorError> {
        let channel = self.channels.get_mut(channel_id)?;
        channel.participant(party)?;
        channel.credit(party, amount);
        self.sink.emit(Notification::ChannelToppedUp {
            channel_id,
            party,
            amount,
        });
        Ok(())
    }

    pub fn withdraw(
        &mut self,
        channel_id: ChannelId,
        party: Party,
    ) -> Result<Chips, AdjudicatorError> {
        let channel = self.channels.get_mut(channel_id)?;
        Ok(channel.withdraw_all(party)?)
    }

    // ---- Hand setup -------------------------------------------------------

    /// Submit one party's deck for the upcoming hand. The hand starts once
    /// both parties have committed to the same digest; returns `true` at
    /// that point.
    pub fn start_game(
        &mut self,
        channel_id: ChannelId,
        party: Party,
        masked_deck: &[Vec<u8>],
        canonical_deck: &[Vec<u8>],
    ) -> Result<bool, AdjudicatorError> {
        if masked_deck.len() != WORKING_DECK_SIZE {
            return Err(CardError::WrongDeckLength {
                expected: WORKING_DECK_SIZE,
                got: masked_deck.len(),
            }
            .into());
        }
        if canonical_deck.len() != CANONICAL_DECK_SIZE {
            return Err(CardError::WrongDeckLength {
                expected: CANONICAL_DECK_SIZE,
                got: canonical_deck.len(),
            }
            .into());
        }
        let working = decode_points(masked_deck)?;
        let canonical = decode_points(canonical_deck)?;
        if canonical != canonical_card_points() {
            return Err(AdjudicatorError::CanonicalTableMismatch);
        }

        let channel = self.channels.get_mut(channel_id)?;
        if !channel.is_joined() {
            return Err(ChannelError::NotJoined.into());
        }
        let digest = deck_digest(&working, &canonical);
        let both_committed = channel.commit_deck(party, digest)?;
        let hand_id = channel.hand_id;

        if both_committed {
            // A new hand invalidates any prior per-hand reveal state.
            self.decks.reset_for_new_hand(channel_id);
            self.decks
                .store_deck(channel_id, hand_id, working, canonical)?;
            self.sink.emit(Notification::GameStarted {
                channel_id,
                hand_id,
            });
            tracing::info!(target: LOG_TARGET, channel = channel_id, hand = hand_id, "game started");
        }
        Ok(both_committed)
    }

    /// Readiness check: the current hand has a complete deck on record.
    pub fn deck_ready(&self, channel_id: ChannelId) -> bool {
        self.channels
            .get(channel_id)
            .map(|channel| self.decks.is_deck_complete(channel_id, channel.hand_id))
            .unwrap_or(false)
    }

    /// One party's deck commitment for the upcoming hand, if submitted.
    pub fn deck_commitment(
        &self,
        channel_id: ChannelId,
        party: Party,
    ) -> Result<Option<crate::types::StateHash>, AdjudicatorError> {
        Ok(self.channels.get(channel_id)?.deck_commitment(party))
    }

    // ---- Settlement and disputes ------------------------------------------

    /// Settle the hand directly from a full signed transcript. Fold pays
    /// out immediately; a showdown-terminal sequence opens the showdown with
    /// the settling caller as initiator; anything else is rejected.
    pub fn settle(
        &mut self,
        channel_id: ChannelId,
        as_party: Party,
        actions: &[Action],
        signatures: &[SignatureBytes],
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        let channel = self.channels.get(channel_id)?;
        if channel.hand_finalized {
            return Err(ChannelError::AlreadyFinalized.into());
        }
        if !channel.game_started {
            return Err(AdjudicatorError::GameNotStarted);
        }
        let hand_id = channel.hand_id;
        let outcome =
            validate_sequence(channel, hand_id, actions, signatures, self.validator.as_ref())?;

        match outcome {
            Outcome::Fold {
                winner,
                winnings,
                pot,
            } => {
                ensure_affordable(channel, winner.other(), winnings)?;
                let channel = self.channels.get_mut(channel_id)?;
                channel.transfer(winner.other(), winnings)?;
                channel.finish_hand();
                self.sink.emit(Notification::ActionsSettled {
                    channel_id,
                    hand_id,
                    action_count: actions.len() as Seq,
                    pot,
                });
            }
            Outcome::ShowdownReached { pot, contributions } => {
                self.open_showdown(channel_id, hand_id, as_party, pot, contributions, now)?;
                self.sink.emit(Notification::ActionsSettled {
                    channel_id,
                    hand_id,
                    action_count: actions.len() as Seq,
                    pot,
                });
            }
            Outcome::NonTerminal { .. } => return Err(AdjudicatorError::NonTerminalSettlement),
        }
        Ok(())
    }

    /// Open or extend a dispute with a (possibly non-terminal) sequence.
    /// A stored dispute is only ever replaced by a strictly longer valid one.
    pub fn dispute(
        &mut self,
        channel_id: ChannelId,
        as_party: Party,
        actions: &[Action],
        signatures: &[SignatureBytes],
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        let channel = self.channels.get(channel_id)?;
        if channel.hand_finalized {
            return Err(ChannelError::AlreadyFinalized.into());
        }
        if !channel.game_started {
            return Err(AdjudicatorError::GameNotStarted);
        }
        let hand_id = channel.hand_id;
        if self.showdowns.contains_key(&(channel_id, hand_id)) {
            return Err(AdjudicatorError::ShowdownAlreadyOpen);
        }
        let outcome =
            validate_sequence(channel, hand_id, actions, signatures, self.validator.as_ref())?;
        let action_count = actions.len() as Seq;

        match self.disputes.entry((channel_id, hand_id)) {
            Entry::Vacant(vacant) => {
                let state = DisputeState::open(action_count, outcome, as_party, now);
                let deadline = state.deadline;
                vacant.insert(state);
                self.sink.emit(Notification::DisputeOpened {
                    channel_id,
                    hand_id,
                    action_count,
                    deadline,
                });
            }
            Entry::Occupied(mut occupied) => {
                let dispute = occupied.get_mut();
                if dispute.resolved {
                    return Err(ChannelError::AlreadyFinalized.into());
                }
                if dispute.window_elapsed(now) {
                    return Err(AdjudicatorError::DisputeWindowClosed);
                }
                dispute.supersede(action_count, outcome, as_party)?;
                self.sink.emit(Notification::DisputeExtended {
                    channel_id,
                    hand_id,
                    action_count,
                });
            }
        }
        Ok(())
    }

    /// Resolve a dispute whose window has elapsed, applying the last
    /// accepted sequence's classification.
    pub fn finalize_dispute(
        &mut self,
        channel_id: ChannelId,
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        let channel = self.channels.get(channel_id)?;
        let hand_id = channel.hand_id;
        let dispute = self
            .disputes
            .get_mut(&(channel_id, hand_id))
            .ok_or(AdjudicatorError::NoDispute)?;
        if dispute.resolved {
            return Err(AdjudicatorError::NoDispute);
        }
        if !dispute.window_elapsed(now) {
            return Err(AdjudicatorError::DisputeWindowOpen);
        }
        dispute.resolved = true;
        let outcome = dispute.outcome.clone();
        let submitter = dispute.submitter;

        match outcome {
            Outcome::Fold {
                winner, winnings, ..
            } => {
                let channel = self.channels.get(channel_id)?;
                ensure_affordable(channel, winner.other(), winnings)?;
                let channel = self.channels.get_mut(channel_id)?;
                channel.transfer(winner.other(), winnings)?;
                channel.finish_hand();
            }
            Outcome::ShowdownReached { pot, contributions } => {
                self.open_showdown(channel_id, hand_id, submitter, pot, contributions, now)?;
            }
            Outcome::NonTerminal { .. } => {
                // Nothing was won: the hand dies and each side keeps its own
                // contribution.
                let channel = self.channels.get_mut(channel_id)?;
                channel.finish_hand();
            }
        }
        self.sink.emit(Notification::DisputeFinalized {
            channel_id,
            hand_id,
        });
        Ok(())
    }

    fn open_showdown(
        &mut self,
        channel_id: ChannelId,
        hand_id: HandId,
        initiator: Party,
        pot: Chips,
        contributions: [Chips; 2],
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        let channel = self.channels.get(channel_id)?;
        for party in [Party::A, Party::B] {
            ensure_affordable(channel, party, contributions[party.index()])?;
        }
        if self.showdowns.contains_key(&(channel_id, hand_id)) {
            return Err(AdjudicatorError::ShowdownAlreadyOpen);
        }
        let state = ShowdownState::open(channel_id, hand_id, initiator, pot, contributions, now);
        let deadline = state.deadline;
        self.showdowns.insert((channel_id, hand_id), state);
        self.sink.emit(Notification::ShowdownStarted {
            channel_id,
            hand_id,
            initiator,
            deadline,
        });
        Ok(())
    }

    // ---- Showdown disclosures ---------------------------------------------

    pub fn start_showdown(
        &mut self,
        channel_id: ChannelId,
        request: &StartShowdownRequest,
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        self.run_start_showdown(channel_id, None, request, now)
    }

    /// Third-party submission of the initiator's opening move; the cosigned
    /// bundle still carries the authorization.
    pub fn start_showdown_on_behalf_of(
        &mut self,
        channel_id: ChannelId,
        initiator: Party,
        request: &StartShowdownRequest,
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        self.run_start_showdown(channel_id, Some(initiator), request, now)
    }

    fn run_start_showdown(
        &mut self,
        channel_id: ChannelId,
        expected_initiator: Option<Party>,
        request: &StartShowdownRequest,
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        let channel = self.channels.get(channel_id)?;
        let hand_id = channel.hand_id;
        let state = self
            .showdowns
            .get_mut(&(channel_id, hand_id))
            .ok_or(AdjudicatorError::ShowdownNotInProgress)?;
        if let Some(initiator) = expected_initiator {
            if initiator != state.initiator {
                return Err(ShowdownError::NotTheInitiator.into());
            }
        }
        let mask = showdown::start_showdown(
            state,
            channel,
            &mut self.decks,
            self.validator.as_ref(),
            request,
            now,
        )?;
        self.sink.emit(Notification::CommitMaskUpdated {
            channel_id,
            hand_id,
            mask: mask.bits(),
        });
        self.maybe_autofinalize(channel_id, hand_id, now)
    }

    pub fn submit_additional_commits(
        &mut self,
        channel_id: ChannelId,
        bundle: &DisclosureBundle,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        let channel = self.channels.get(channel_id)?;
        let hand_id = channel.hand_id;
        let state = self
            .showdowns
            .get_mut(&(channel_id, hand_id))
            .ok_or(AdjudicatorError::ShowdownNotInProgress)?;
        let mask = showdown::submit_additional_commits(
            state,
            channel,
            &mut self.decks,
            self.validator.as_ref(),
            bundle,
            signature,
            now,
        )?;
        self.sink.emit(Notification::CommitMaskUpdated {
            channel_id,
            hand_id,
            mask: mask.bits(),
        });
        self.maybe_autofinalize(channel_id, hand_id, now)
    }

    /// Masking-variant disclosure path.
    pub fn reveal_cards(
        &mut self,
        channel_id: ChannelId,
        bundle: &RevealBundle,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        let channel = self.channels.get(channel_id)?;
        let hand_id = channel.hand_id;
        let state = self
            .showdowns
            .get_mut(&(channel_id, hand_id))
            .ok_or(AdjudicatorError::ShowdownNotInProgress)?;
        let mask = showdown::reveal_cards(
            state,
            channel,
            &mut self.decks,
            self.validator.as_ref(),
            bundle,
            signature,
            now,
        )?;
        self.sink.emit(Notification::RevealProgress {
            channel_id,
            hand_id,
            mask: mask.bits(),
        });
        self.maybe_autofinalize(channel_id, hand_id, now)
    }

    /// Finalize the current hand's showdown: cooperative completion at any
    /// time, or the forfeiture default once the deadline has elapsed.
    pub fn finalize_showdown(
        &mut self,
        channel_id: ChannelId,
        now: DateTime<Utc>,
    ) -> Result<ShowdownSettlement, AdjudicatorError> {
        let hand_id = self.channels.get(channel_id)?.hand_id;
        self.do_finalize_showdown(channel_id, hand_id, now)
    }

    fn maybe_autofinalize(
        &mut self,
        channel_id: ChannelId,
        hand_id: HandId,
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        let complete = self
            .showdowns
            .get(&(channel_id, hand_id))
            .map(|state| state.is_complete() && !state.settled)
            .unwrap_or(false);
        if complete {
            self.do_finalize_showdown(channel_id, hand_id, now)?;
        }
        Ok(())
    }

    fn do_finalize_showdown(
        &mut self,
        channel_id: ChannelId,
        hand_id: HandId,
        now: DateTime<Utc>,
    ) -> Result<ShowdownSettlement, AdjudicatorError> {
        let state = self
            .showdowns
            .get_mut(&(channel_id, hand_id))
            .ok_or(AdjudicatorError::ShowdownNotInProgress)?;
        let settlement = showdown::finalize_showdown(state, self.ranker.as_ref(), now)?;

        let channel = self.channels.get_mut(channel_id)?;
        if let Some(winner) = settlement.winner {
            if settlement.transfer > 0 {
                channel.transfer(winner.other(), settlement.transfer)?;
            }
        }
        channel.finish_hand();
        let balances = channel.balances;
        self.sink.emit(Notification::ShowdownFinalized {
            channel_id,
            hand_id,
            winner: settlement.winner,
            balances,
        });
        Ok(settlement)
    }

    // ---- Force reveal -----------------------------------------------------

    pub fn request_hole_a(
        &mut self,
        channel_id: ChannelId,
        requester: Party,
        helper: Party,
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        self.request_force_reveal(channel_id, RevealStage::HoleA, requester, helper, now)
    }

    pub fn request_hole_b(
        &mut self,
        channel_id: ChannelId,
        requester: Party,
        helper: Party,
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        self.request_force_reveal(channel_id, RevealStage::HoleB, requester, helper, now)
    }

    pub fn request_flop(
        &mut self,
        channel_id: ChannelId,
        requester: Party,
        helper: Party,
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        self.request_force_reveal(channel_id, RevealStage::Flop, requester, helper, now)
    }

    pub fn request_turn(
        &mut self,
        channel_id: ChannelId,
        requester: Party,
        helper: Party,
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        self.request_force_reveal(channel_id, RevealStage::Turn, requester, helper, now)
    }

    pub fn request_river(
        &mut self,
        channel_id: ChannelId,
        requester: Party,
        helper: Party,
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        self.request_force_reveal(channel_id, RevealStage::River, requester, helper, now)
    }

    pub fn request_force_reveal(
        &mut self,
        channel_id: ChannelId,
        stage: RevealStage,
        requester: Party,
        helper: Party,
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        let channel = self.channels.get(channel_id)?;
        if !channel.game_started {
            return Err(AdjudicatorError::GameNotStarted);
        }
        let hand_id = channel.hand_id;
        let state = self
            .force_reveals
            .entry((channel_id, hand_id))
            .or_insert_with(|| ForceRevealState::idle(channel_id, hand_id));
        state.request(stage, requester, helper, &self.decks, now)?;
        let deadline = state.deadline;
        self.sink.emit(Notification::ForceRevealRequested {
            channel_id,
            hand_id,
            stage,
            helper,
            deadline,
        });
        Ok(())
    }

    pub fn answer_hole_a(
        &mut self,
        channel_id: ChannelId,
        answer: &ForceAnswer,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        self.answer_stage(channel_id, RevealStage::HoleA, answer, signature, now)
    }

    pub fn answer_hole_b(
        &mut self,
        channel_id: ChannelId,
        answer: &ForceAnswer,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        self.answer_stage(channel_id, RevealStage::HoleB, answer, signature, now)
    }

    pub fn answer_flop(
        &mut self,
        channel_id: ChannelId,
        answer: &ForceAnswer,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        self.answer_stage(channel_id, RevealStage::Flop, answer, signature, now)
    }

    pub fn answer_turn(
        &mut self,
        channel_id: ChannelId,
        answer: &ForceAnswer,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        self.answer_stage(channel_id, RevealStage::Turn, answer, signature, now)
    }

    pub fn answer_river(
        &mut self,
        channel_id: ChannelId,
        answer: &ForceAnswer,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        self.answer_stage(channel_id, RevealStage::River, answer, signature, now)
    }

    fn answer_stage(
        &mut self,
        channel_id: ChannelId,
        stage: RevealStage,
        answer: &ForceAnswer,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        if answer.stage != stage {
            return Err(ForceRevealError::WrongStage.into());
        }
        let channel = self.channels.get(channel_id)?;
        let hand_id = channel.hand_id;
        let state = self
            .force_reveals
            .get_mut(&(channel_id, hand_id))
            .ok_or(ForceRevealError::NothingInProgress)?;
        state.answer(
            channel,
            &mut self.decks,
            self.validator.as_ref(),
            answer,
            signature,
            now,
        )?;
        self.sink.emit(Notification::ForceRevealAnswered {
            channel_id,
            hand_id,
            stage,
        });
        Ok(())
    }

    /// Penalize an obligated helper that let its deadline elapse unserved.
    pub fn slash_force_reveal(
        &mut self,
        channel_id: ChannelId,
        now: DateTime<Utc>,
    ) -> Result<(), AdjudicatorError> {
        let channel = self.channels.get(channel_id)?;
        let hand_id = channel.hand_id;
        let state = self
            .force_reveals
            .get_mut(&(channel_id, hand_id))
            .ok_or(ForceRevealError::NothingInProgress)?;
        let (helper, _requester) = state.slash(now)?;

        let channel = self.channels.get_mut(channel_id)?;
        let amount = channel.slash_amount.min(channel.balances[helper.index()]);
        if amount > 0 {
            channel.transfer(helper, amount)?;
        }
        self.sink.emit(Notification::ForceRevealSlashed {
            channel_id,
            hand_id,
            helper,
            amount,
        });
        Ok(())
    }

    // ---- Read-only views --------------------------------------------------

    pub fn channel_view(&self, channel_id: ChannelId) -> Result<ChannelView, AdjudicatorError> {
        let channel = self.channels.get(channel_id)?;
        Ok(ChannelView {
            id: channel.id,
            joined: channel.is_joined(),
            balances: channel.balances,
            min_blind: channel.min_blind,
            slash_amount: channel.slash_amount,
            hand_id: channel.hand_id,
            game_started: channel.game_started,
            hand_finalized: channel.hand_finalized,
        })
    }

    pub fn showdown_view(&self, channel_id: ChannelId, hand_id: HandId) -> Option<ShowdownState> {
        self.showdowns.get(&(channel_id, hand_id)).cloned()
    }

    pub fn force_reveal_view(
        &self,
        channel_id: ChannelId,
        hand_id: HandId,
    ) -> Option<ForceRevealState> {
        self.force_reveals.get(&(channel_id, hand_id)).cloned()
    }

    pub fn revealed_cards(
        &self,
        channel_id: ChannelId,
        hand_id: HandId,
    ) -> Result<[u8; WORKING_DECK_SIZE], AdjudicatorError> {
        Ok(self.decks.revealed_cards(channel_id, hand_id)?)
    }
}

fn decode_points(encoded: &[Vec<u8>]) -> Result<Vec<CardPoint>, MaskingError> {
    encoded.iter().map(|bytes| decode_g1(bytes)).collect()
}

fn ensure_affordable(
    channel: &Channel,
    party: Party,
    amount: Chips,
) -> Result<(), AdjudicatorError> {
    if amount > channel.balances[party.index()] {
        return Err(AdjudicatorError::ContributionExceedsBalance { party });
    }
    Ok(())
}

#[cfg(test)]
mod tests;

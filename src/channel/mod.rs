//! Channel records and the keyed store the adjudicator mutates. A channel
//! is the durable identity of two participants; hands come and go inside it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::masking::VerifyingKey;
use crate::signing::SignatureValidator;
use crate::types::{ChannelId, Chips, HandId, Party, PublicKeyBytes, StateHash};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel already exists")]
    AlreadyExists,
    #[error("unknown channel")]
    UnknownChannel,
    #[error("counterpart already joined")]
    AlreadyJoined,
    #[error("joining account is not the named opponent")]
    WrongOpponent,
    #[error("counterpart has not joined yet")]
    NotJoined,
    #[error("game not started")]
    GameNotStarted,
    #[error("a hand is still in progress")]
    HandInProgress,
    #[error("channel already finalized")]
    AlreadyFinalized,
    #[error("deck commitments do not match")]
    DeckCommitmentMismatch,
    #[error("deck commitment already submitted for this hand")]
    DeckAlreadyCommitted,
    #[error("insufficient balance")]
    InsufficientBalance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub account: PublicKeyBytes,
    /// Optional registered delegate allowed to sign on the account's behalf.
    pub delegate: Option<PublicKeyBytes>,
    /// G2 verification key for this participant's masking secret.
    #[serde(with = "crate::crypto_serde::canonical")]
    pub masking_key: VerifyingKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    participants: [Option<Participant>; 2],
    /// Account the opener named as their counterpart; only this account may
    /// join seat B.
    expected_opponent: PublicKeyBytes,
    pub balances: [Chips; 2],
    pub min_blind: Chips,
    /// Penalty applied when a force-reveal obligation is left unserved.
    pub slash_amount: Chips,
    /// Monotonic hand counter; the first playable hand is 1.
    pub hand_id: HandId,
    pub game_started: bool,
    /// Set once the current hand's funds have moved; guards double payout.
    pub hand_finalized: bool,
    deck_commitments: [Option<StateHash>; 2],
}

impl Channel {
    pub fn open(
        id: ChannelId,
        opener: Participant,
        expected_opponent: PublicKeyBytes,
        deposit: Chips,
        min_blind: Chips,
        slash_amount: Chips,
    ) -> Self {
        Self {
            id,
            participants: [Some(opener), None],
            expected_opponent,
            balances: [deposit, 0],
            min_blind,
            slash_amount,
            hand_id: 1,
            game_started: false,
            hand_finalized: false,
            deck_commitments: [None, None],
        }
    }

    pub fn join(&mut self, joiner: Participant, deposit: Chips) -> Result<(), ChannelError> {
        if self.participants[Party::B.index()].is_some() {
            return Err(ChannelError::AlreadyJoined);
        }
        if joiner.account != self.expected_opponent {
            return Err(ChannelError::WrongOpponent);
        }
        self.participants[Party::B.index()] = Some(joiner);
        self.balances[Party::B.index()] = deposit;
        Ok(())
    }

    pub fn is_joined(&self) -> bool {
        self.participants.iter().all(Option::is_some)
    }

    pub fn participant(&self, party: Party) -> Result<&Participant, ChannelError> {
        self.participants[party.index()]
            .as_ref()
            .ok_or(ChannelError::NotJoined)
    }

    /// Party whose registered account matches `account`, if any.
    pub fn party_of_account(&self, account: &[u8]) -> Option<Party> {
        [Party::A, Party::B].into_iter().find(|party| {
            self.participants[party.index()]
                .as_ref()
                .map(|p| p.account == account)
                .unwrap_or(false)
        })
    }

    /// Uniform capability check: does `signature` over `transcript` bind to
    /// the declared sender's account or their registered delegate?
    pub fn is_authorized_signer(
        &self,
        declared: Party,
        transcript: &[u8],
        signature: &[u8],
        validator: &dyn SignatureValidator,
    ) -> bool {
        let Ok(participant) = self.participant(declared) else {
            return false;
        };
        if validator.verify(&participant.account, transcript, signature) {
            return true;
        }
        participant
            .delegate
            .as_ref()
            .map(|delegate| validator.verify(delegate, transcript, signature))
            .unwrap_or(false)
    }

    /// Record one party's deck commitment for the upcoming hand. Returns
    /// `true` once both parties have committed to the same digest.
    pub fn commit_deck(&mut self, party: Party, digest: StateHash) -> Result<bool, ChannelError> {
        if self.game_started {
            return Err(ChannelError::HandInProgress);
        }
        if self.deck_commitments[party.index()].is_some() {
            return Err(ChannelError::DeckAlreadyCommitted);
        }
        if let Some(existing) = self.deck_commitments[party.other().index()] {
            if existing != digest {
                return Err(ChannelError::DeckCommitmentMismatch);
            }
        }
        self.deck_commitments[party.index()] = Some(digest);
        let both = self.deck_commitments.iter().all(Option::is_some);
        if both {
            self.game_started = true;
            self.hand_finalized = false;
        }
        Ok(both)
    }

    pub fn deck_commitment(&self, party: Party) -> Option<StateHash> {
        self.deck_commitments[party.index()]
    }

    /// Close the current hand and prepare the channel for the next one.
    pub fn finish_hand(&mut self) {
        self.hand_finalized = true;
        self.game_started = false;
        self.deck_commitments = [None, None];
        self.hand_id += 1;
    }

    /// Move `amount` from `from` to the counterpart, capped by nothing:
    /// callers validate affordability before settling.
    pub fn transfer(&mut self, from: Party, amount: Chips) -> Result<(), ChannelError> {
        let debited = self.balances[from.index()]
            .checked_sub(amount)
            .ok_or(ChannelError::InsufficientBalance)?;
        self.balances[from.index()] = debited;
        self.balances[from.other().index()] += amount;
        Ok(())
    }

    pub fn credit(&mut self, party: Party, amount: Chips) {
        self.balances[party.index()] += amount;
    }

    pub fn withdraw_all(&mut self, party: Party) -> Result<Chips, ChannelError> {
        if self.game_started && !self.hand_finalized {
            return Err(ChannelError::HandInProgress);
        }
        let amount = self.balances[party.index()];
        self.balances[party.index()] = 0;
        Ok(amount)
    }
}

/// Explicit keyed store: `channel id -> channel`. Create-on-open; channels
/// persist across hands.
#[derive(Debug, Default)]
pub struct ChannelStore {
    channels: HashMap<ChannelId, Channel>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: Channel) -> Result<(), ChannelError> {
        if self.channels.contains_key(&channel.id) {
            return Err(ChannelError::AlreadyExists);
        }
        self.channels.insert(channel.id, channel);
        Ok(())
    }

    pub fn get(&self, id: ChannelId) -> Result<&Channel, ChannelError> {
        self.channels.get(&id).ok_or(ChannelError::UnknownChannel)
    }

    pub fn get_mut(&mut self, id: ChannelId) -> Result<&mut Channel, ChannelError> {
        self.channels
            .get_mut(&id)
            .ok_or(ChannelError::UnknownChannel)
    }
}

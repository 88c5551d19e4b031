//! Action transcript engine: hash-chained, signed betting sequences and the
//! dispute arbitration that resolves competing submissions.

pub mod actions;
pub mod dispute;
pub mod replay;

pub use actions::{action_hash, genesis_hash, link_actions, Action, ActionKind};
pub use dispute::DisputeState;
pub use replay::{replay_actions, Outcome, ReplayError, Street};

use thiserror::Error;

use crate::channel::Channel;
use crate::signing::{Signable, SignatureValidator};
use crate::types::{HandId, Seq, SignatureBytes};

const LOG_TARGET: &str = "headsup_channel::engine";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("got {actions} actions but {signatures} signatures")]
    LengthMismatch { actions: usize, signatures: usize },
    #[error("an action sequence must not be empty")]
    EmptySequence,
    #[error("action {index}: channel or hand id does not match the call context")]
    ContextMismatch { index: usize },
    #[error("action {index}: sequence number must equal its position")]
    BadSequenceNumber { index: usize },
    #[error("action {index}: previous-action hash does not match")]
    BrokenChain { index: usize },
    #[error("action {index}: signature does not bind to the declared sender")]
    Unauthorized { index: usize },
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error("a dispute extension must exceed the accepted {current} actions, got {submitted}")]
    DisputeNotLonger { current: Seq, submitted: Seq },
}

/// Validate a full signed sequence against a hand's genesis and replay it.
///
/// Checks, in order: array shapes, per-action call context, hash-chain
/// integrity, sender authorization (account or registered delegate), then
/// the betting replay. Nothing is mutated; callers apply the returned
/// classification.
pub fn validate_sequence(
    channel: &Channel,
    hand_id: HandId,
    actions: &[Action],
    signatures: &[SignatureBytes],
    validator: &dyn SignatureValidator,
) -> Result<Outcome, EngineError> {
    if actions.len() != signatures.len() {
        return Err(EngineError::LengthMismatch {
            actions: actions.len(),
            signatures: signatures.len(),
        });
    }
    if actions.is_empty() {
        return Err(EngineError::EmptySequence);
    }

    let mut expected_prev = genesis_hash(channel.id, hand_id);
    for (index, (action, signature)) in actions.iter().zip(signatures).enumerate() {
        if action.channel_id != channel.id || action.hand_id != hand_id {
            return Err(EngineError::ContextMismatch { index });
        }
        if action.seq != index as Seq {
            return Err(EngineError::BadSequenceNumber { index });
        }
        if action.prev_hash != expected_prev {
            return Err(EngineError::BrokenChain { index });
        }
        if !channel.is_authorized_signer(action.sender, &action.to_signing_bytes(), signature, validator)
        {
            tracing::warn!(
                target: LOG_TARGET,
                index,
                sender = ?action.sender,
                "rejected sequence: unauthorized signature"
            );
            return Err(EngineError::Unauthorized { index });
        }
        expected_prev = action_hash(action);
    }

    Ok(replay_actions(channel.min_blind, actions)?)
}

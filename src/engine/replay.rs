//! Deterministic replay of a validated action sequence into the derived
//! betting state and its terminal classification.
//!
//! Heads-up conventions: party A holds the button, posts the small blind and
//! acts first preflop; party B posts the big blind and acts first on every
//! later street.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::actions::{Action, ActionKind};
use crate::types::{Chips, Party};

const LOG_TARGET: &str = "headsup_channel::engine::replay";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
}

impl Street {
    fn next(self) -> Option<Street> {
        match self {
            Street::Preflop => Some(Street::Flop),
            Street::Flop => Some(Street::Turn),
            Street::Turn => Some(Street::River),
            Street::River => None,
        }
    }
}

/// Terminal classification of a replayed sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Outcome {
    /// A fold ended the hand; the payout is immediately computable. The
    /// winner collects the folder's matched contribution, so any uncalled
    /// portion of the winner's last bet returns to them.
    Fold {
        winner: Party,
        winnings: Chips,
        pot: Chips,
    },
    /// Betting closed on the river; the hand moves to showdown.
    ShowdownReached {
        pot: Chips,
        contributions: [Chips; 2],
    },
    /// The sequence stops mid-hand. Only acceptable via the dispute path.
    NonTerminal {
        street: Street,
        to_act: Party,
        pot: Chips,
    },
}

impl Outcome {
    pub fn pot(&self) -> Chips {
        match self {
            Outcome::Fold { pot, .. } => *pot,
            Outcome::ShowdownReached { pot, .. } => *pot,
            Outcome::NonTerminal { pot, .. } => *pot,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("action {index}: expected the {expected:?} blind")]
    BlindExpected { index: usize, expected: ActionKind },
    #[error("action {index}: blind amount must be {expected}")]
    WrongBlindAmount { index: usize, expected: Chips },
    #[error("action {index}: blinds may only open the hand")]
    UnexpectedBlind { index: usize },
    #[error("action {index}: it is not {sender:?}'s turn")]
    OutOfTurn { index: usize, sender: Party },
    #[error("action {index}: call must match the outstanding {expected}, got {got}")]
    WrongCallAmount {
        index: usize,
        expected: Chips,
        got: Chips,
    },
    #[error("action {index}: a bet or raise must exceed the outstanding {outstanding}")]
    RaiseTooSmall { index: usize, outstanding: Chips },
    #[error("action {index}: the hand already ended")]
    ActionAfterTerminal { index: usize },
}

struct Replay {
    street: Street,
    to_act: Party,
    contributions: [Chips; 2],
    street_committed: [Chips; 2],
    acted: [bool; 2],
    folded: Option<Party>,
    showdown: bool,
}

impl Replay {
    fn new(small_blind: Chips) -> Self {
        Self {
            street: Street::Preflop,
            to_act: Party::A,
            contributions: [small_blind, small_blind * 2],
            street_committed: [small_blind, small_blind * 2],
            acted: [false, false],
            folded: None,
            showdown: false,
        }
    }

    fn deficit_for(&self, party: Party) -> Chips {
        let other = self.street_committed[party.other().index()];
        let own = self.street_committed[party.index()];
        other.saturating_sub(own)
    }

    fn commit(&mut self, party: Party, amount: Chips) {
        self.contributions[party.index()] += amount;
        self.street_committed[party.index()] += amount;
    }

    fn apply(&mut self, index: usize, action: &Action) -> Result<(), ReplayError> {
        if self.folded.is_some() || self.showdown {
            return Err(ReplayError::ActionAfterTerminal { index });
        }
        let sender = action.sender;
        if sender != self.to_act {
            return Err(ReplayError::OutOfTurn { index, sender });
        }

        match action.kind {
            ActionKind::SmallBlind | ActionKind::BigBlind => {
                return Err(ReplayError::UnexpectedBlind { index });
            }
            ActionKind::CheckCall => {
                let expected = self.deficit_for(sender);
                if action.amount != expected {
                    return Err(ReplayError::WrongCallAmount {
                        index,
                        expected,
                        got: action.amount,
                    });
                }
                self.commit(sender, action.amount);
                self.acted[sender.index()] = true;
            }
            ActionKind::BetRaise => {
                let outstanding = self.deficit_for(sender);
                if action.amount <= outstanding {
                    return Err(ReplayError::RaiseTooSmall { index, outstanding });
                }
                self.commit(sender, action.amount);
                self.acted[sender.index()] = true;
                // The counterpart must respond to the new price.
                self.acted[sender.other().index()] = false;
            }
            ActionKind::Fold => {
                self.folded = Some(sender);
                return Ok(());
            }
        }

        let matched = self.street_committed[0] == self.street_committed[1];
        if matched && self.acted == [true, true] {
            match self.street.next() {
                Some(next) => {
                    self.street = next;
                    self.street_committed = [0, 0];
                    self.acted = [false, false];
                    // Out of position acts first postflop.
                    self.to_act = Party::B;
                }
                None => self.showdown = true,
            }
        } else {
            self.to_act = sender.other();
        }
        Ok(())
    }

    fn classify(self) -> Outcome {
        let pot = self.contributions[0] + self.contributions[1];
        if let Some(folder) = self.folded {
            let winner = folder.other();
            return Outcome::Fold {
                winner,
                winnings: self.contributions[folder.index()],
                pot,
            };
        }
        if self.showdown {
            return Outcome::ShowdownReached {
                pot,
                contributions: self.contributions,
            };
        }
        Outcome::NonTerminal {
            street: self.street,
            to_act: self.to_act,
            pot,
        }
    }
}

fn expect_blind(
    index: usize,
    action: &Action,
    kind: ActionKind,
    sender: Party,
    amount: Chips,
) -> Result<(), ReplayError> {
    if action.kind != kind {
        return Err(ReplayError::BlindExpected {
            index,
            expected: kind,
        });
    }
    if action.sender != sender {
        return Err(ReplayError::OutOfTurn {
            index,
            sender: action.sender,
        });
    }
    if action.amount != amount {
        return Err(ReplayError::WrongBlindAmount {
            index,
            expected: amount,
        });
    }
    Ok(())
}

/// Replay a chain-validated sequence and classify its terminal state.
pub fn replay_actions(small_blind: Chips, actions: &[Action]) -> Result<Outcome, ReplayError> {
    match actions {
        [] => {
            return Ok(Outcome::NonTerminal {
                street: Street::Preflop,
                to_act: Party::A,
                pot: 0,
            })
        }
        [first, rest @ ..] => {
            expect_blind(0, first, ActionKind::SmallBlind, Party::A, small_blind)?;
            let Some(second) = rest.first() else {
                return Ok(Outcome::NonTerminal {
                    street: Street::Preflop,
                    to_act: Party::B,
                    pot: small_blind,
                });
            };
            expect_blind(1, second, ActionKind::BigBlind, Party::B, small_blind * 2)?;

            let mut replay = Replay::new(small_blind);
            for (offset, action) in rest[1..].iter().enumerate() {
                replay.apply(offset + 2, action)?;
            }
            let outcome = replay.classify();
            tracing::debug!(target: LOG_TARGET, ?outcome, actions = actions.len(), "replayed sequence");
            Ok(outcome)
        }
    }
}

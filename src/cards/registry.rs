//! Per-hand encrypted deck storage. Pure addressable memory for the
//! showdown and force-reveal engines; no verification logic lives here.

use std::collections::HashMap;

use thiserror::Error;

use crate::cards::{CardValue, Slot, UNREVEALED};
use crate::config::{CANONICAL_DECK_SIZE, WORKING_DECK_SIZE};
use crate::masking::CardPoint;
use crate::types::{ChannelId, HandId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CardError {
    #[error("no deck stored for this hand")]
    DeckMissing,
    #[error("expected {expected} deck entries, got {got}")]
    WrongDeckLength { expected: usize, got: usize },
    #[error("deck already stored for this hand")]
    DeckAlreadyStored,
}

#[derive(Debug, Clone)]
struct HandDeck {
    /// The 9-slot masked working deck, updated in place as verified
    /// openings strip masking layers.
    working: Vec<CardPoint>,
    /// 52-entry canonical plaintext-point table for this hand.
    canonical: Vec<CardPoint>,
    /// Per-slot revealed card bytes; `UNREVEALED` until a slot's point has
    /// been fully unmasked to a canonical entry.
    revealed: [u8; WORKING_DECK_SIZE],
}

/// Keyed store of every hand's deck state: `(channel, hand) -> deck`.
#[derive(Debug, Default)]
pub struct DeckRegistry {
    decks: HashMap<(ChannelId, HandId), HandDeck>,
}

impl DeckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_deck(
        &mut self,
        channel_id: ChannelId,
        hand_id: HandId,
        working: Vec<CardPoint>,
        canonical: Vec<CardPoint>,
    ) -> Result<(), CardError> {
        if working.len() != WORKING_DECK_SIZE {
            return Err(CardError::WrongDeckLength {
                expected: WORKING_DECK_SIZE,
                got: working.len(),
            });
        }
        if canonical.len() != CANONICAL_DECK_SIZE {
            return Err(CardError::WrongDeckLength {
                expected: CANONICAL_DECK_SIZE,
                got: canonical.len(),
            });
        }
        if self.decks.contains_key(&(channel_id, hand_id)) {
            return Err(CardError::DeckAlreadyStored);
        }
        self.decks.insert(
            (channel_id, hand_id),
            HandDeck {
                working,
                canonical,
                revealed: [UNREVEALED; WORKING_DECK_SIZE],
            },
        );
        Ok(())
    }

    pub fn is_deck_complete(&self, channel_id: ChannelId, hand_id: HandId) -> bool {
        self.decks
            .get(&(channel_id, hand_id))
            .map(|deck| {
                deck.working.len() == WORKING_DECK_SIZE
                    && deck.canonical.len() == CANONICAL_DECK_SIZE
            })
            .unwrap_or(false)
    }

    /// The currently stored (possibly still masked) point for a slot.
    pub fn encrypted_slot(
        &self,
        channel_id: ChannelId,
        hand_id: HandId,
        slot: Slot,
    ) -> Result<CardPoint, CardError> {
        self.deck(channel_id, hand_id)
            .map(|deck| deck.working[slot.index()])
    }

    /// Replace a slot's stored point with one that has one fewer masking
    /// layer. Callers verify the opening before calling this.
    pub fn replace_slot(
        &mut self,
        channel_id: ChannelId,
        hand_id: HandId,
        slot: Slot,
        point: CardPoint,
    ) -> Result<(), CardError> {
        let deck = self
            .decks
            .get_mut(&(channel_id, hand_id))
            .ok_or(CardError::DeckMissing)?;
        deck.working[slot.index()] = point;
        Ok(())
    }

    /// Look a fully unmasked point up in the hand's canonical table.
    pub fn card_value_of(
        &self,
        channel_id: ChannelId,
        hand_id: HandId,
        point: &CardPoint,
    ) -> Result<Option<CardValue>, CardError> {
        let deck = self.deck(channel_id, hand_id)?;
        Ok(deck
            .canonical
            .iter()
            .position(|candidate| candidate == point)
            .and_then(|index| CardValue::from_byte(index as u8)))
    }

    pub fn record_revealed(
        &mut self,
        channel_id: ChannelId,
        hand_id: HandId,
        slot: Slot,
        card: CardValue,
    ) -> Result<(), CardError> {
        let deck = self
            .decks
            .get_mut(&(channel_id, hand_id))
            .ok_or(CardError::DeckMissing)?;
        deck.revealed[slot.index()] = card.byte();
        Ok(())
    }

    pub fn revealed_cards(
        &self,
        channel_id: ChannelId,
        hand_id: HandId,
    ) -> Result<[u8; WORKING_DECK_SIZE], CardError> {
        self.deck(channel_id, hand_id).map(|deck| deck.revealed)
    }

    pub fn is_revealed(&self, channel_id: ChannelId, hand_id: HandId, slot: Slot) -> bool {
        self.deck(channel_id, hand_id)
            .map(|deck| deck.revealed[slot.index()] != UNREVEALED)
            .unwrap_or(false)
    }

    /// Wipe all per-hand reveal state for a channel so it can host the next
    /// hand.
    pub fn reset_for_new_hand(&mut self, channel_id: ChannelId) {
        self.decks.retain(|(channel, _), _| *channel != channel_id);
    }

    fn deck(&self, channel_id: ChannelId, hand_id: HandId) -> Result<&HandDeck, CardError> {
        self.decks
            .get(&(channel_id, hand_id))
            .ok_or(CardError::DeckMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{canonical_card_points, card_point};

    const CHANNEL: ChannelId = 1;
    const HAND: HandId = 1;

    fn sample_working() -> Vec<CardPoint> {
        canonical_card_points()[..WORKING_DECK_SIZE].to_vec()
    }

    fn stored_registry() -> DeckRegistry {
        let mut registry = DeckRegistry::new();
        registry
            .store_deck(
                CHANNEL,
                HAND,
                sample_working(),
                canonical_card_points().to_vec(),
            )
            .expect("store");
        registry
    }

    #[test]
    fn rejects_wrong_deck_lengths() {
        let mut registry = DeckRegistry::new();
        let result = registry.store_deck(CHANNEL, HAND, sample_working()[..5].to_vec(), vec![]);
        assert_eq!(
            result,
            Err(CardError::WrongDeckLength {
                expected: WORKING_DECK_SIZE,
                got: 5
            })
        );
        assert!(!registry.is_deck_complete(CHANNEL, HAND));
    }

    #[test]
    fn rejects_double_store_for_same_hand() {
        let mut registry = stored_registry();
        let result = registry.store_deck(
            CHANNEL,
            HAND,
            sample_working(),
            canonical_card_points().to_vec(),
        );
        assert_eq!(result, Err(CardError::DeckAlreadyStored));
    }

    #[test]
    fn slot_lookup_and_replacement() {
        let mut registry = stored_registry();
        assert!(registry.is_deck_complete(CHANNEL, HAND));

        let before = registry
            .encrypted_slot(CHANNEL, HAND, Slot::Turn)
            .expect("slot");
        let replacement = card_point(CardValue::from_byte(40).unwrap());
        assert_ne!(before, replacement);

        registry
            .replace_slot(CHANNEL, HAND, Slot::Turn, replacement)
            .expect("replace");
        assert_eq!(
            registry.encrypted_slot(CHANNEL, HAND, Slot::Turn).unwrap(),
            replacement
        );
    }

    #[test]
    fn canonical_lookup_identifies_cards() {
        let registry = stored_registry();
        let point = card_point(CardValue::from_byte(17).unwrap());
        let value = registry
            .card_value_of(CHANNEL, HAND, &point)
            .expect("deck present");
        assert_eq!(value, Some(CardValue::from_byte(17).unwrap()));

        let masked = point * ark_bn254::Fr::from(3u64);
        assert_eq!(registry.card_value_of(CHANNEL, HAND, &masked).unwrap(), None);
    }

    #[test]
    fn reveal_bookkeeping_and_reset() {
        let mut registry = stored_registry();
        assert!(!registry.is_revealed(CHANNEL, HAND, Slot::River));

        registry
            .record_revealed(CHANNEL, HAND, Slot::River, CardValue::from_byte(8).unwrap())
            .expect("record");
        assert!(registry.is_revealed(CHANNEL, HAND, Slot::River));
        assert_eq!(registry.revealed_cards(CHANNEL, HAND).unwrap()[8], 8);

        registry.reset_for_new_hand(CHANNEL);
        assert_eq!(
            registry.revealed_cards(CHANNEL, HAND),
            Err(CardError::DeckMissing)
        );
    }
}

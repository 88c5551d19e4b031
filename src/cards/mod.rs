//! Card positions, the 9-bit slot set, and the canonical card-to-point
//! mapping shared by every component that touches a hand's deck.

pub mod registry;

use ark_bn254::{Fr, G1Projective};
use ark_ec::PrimeGroup;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::CANONICAL_DECK_SIZE;
use crate::masking::{encode_g1, CardPoint};
use crate::types::StateHash;

pub use registry::{CardError, DeckRegistry};

/// Sentinel byte for "no card revealed in this slot yet".
pub const UNREVEALED: u8 = 0xFF;

/// The nine fixed card positions of a hand.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    HoleA1 = 0,
    HoleA2 = 1,
    HoleB1 = 2,
    HoleB2 = 3,
    Flop1 = 4,
    Flop2 = 5,
    Flop3 = 6,
    Turn = 7,
    River = 8,
}

impl Slot {
    pub const ALL: [Slot; 9] = [
        Slot::HoleA1,
        Slot::HoleA2,
        Slot::HoleB1,
        Slot::HoleB2,
        Slot::Flop1,
        Slot::Flop2,
        Slot::Flop3,
        Slot::Turn,
        Slot::River,
    ];

    /// Board positions in street order.
    pub const BOARD: [Slot; 5] = [Slot::Flop1, Slot::Flop2, Slot::Flop3, Slot::Turn, Slot::River];

    pub const HOLES_A: [Slot; 2] = [Slot::HoleA1, Slot::HoleA2];
    pub const HOLES_B: [Slot; 2] = [Slot::HoleB1, Slot::HoleB2];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn bit(self) -> u16 {
        1 << (self as u16)
    }

    pub fn from_index(index: u8) -> Option<Slot> {
        Slot::ALL.get(index as usize).copied()
    }
}

/// Fixed-width set of slots, used as the locked-commitment mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotMask(u16);

impl SlotMask {
    pub const EMPTY: SlotMask = SlotMask(0);
    pub const FULL: SlotMask = SlotMask(0x1FF);

    pub fn contains(self, slot: Slot) -> bool {
        self.0 & slot.bit() != 0
    }

    pub fn insert(&mut self, slot: Slot) {
        self.0 |= slot.bit();
    }

    pub fn is_full(self) -> bool {
        self == Self::FULL
    }

    pub fn len(self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u16 {
        self.0
    }
}

/// A plaintext card: 0..52, suit-major (0..13 clubs, .. , 39..52 spades),
/// rank within suit runs 2..14 with ace high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardValue(u8);

impl CardValue {
    pub fn from_byte(value: u8) -> Option<CardValue> {
        (usize::from(value) < CANONICAL_DECK_SIZE).then_some(CardValue(value))
    }

    pub fn byte(self) -> u8 {
        self.0
    }

    /// Rank 2..=14, ace high.
    pub fn rank(self) -> u8 {
        2 + self.0 % 13
    }

    /// Suit 0..=3: clubs, diamonds, hearts, spades.
    pub fn suit(self) -> u8 {
        self.0 / 13
    }
}

impl std::fmt::Display for CardValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const RANKS: [&str; 13] = [
            "2", "3", "4", "5", "6", "7", "8", "9", "T", "J", "Q", "K", "A",
        ];
        const SUITS: [&str; 4] = ["c", "d", "h", "s"];
        write!(
            f,
            "{}{}",
            RANKS[usize::from(self.0 % 13)],
            SUITS[usize::from(self.0 / 13)]
        )
    }
}

/// Canonical base point for card `k`: fixed-index scalar multiplication of
/// the G1 generator by `k + 1`. Injective over the deck and reproducible by
/// both parties and the adjudicator without shared setup.
pub fn card_point(card: CardValue) -> CardPoint {
    G1Projective::generator() * Fr::from(u64::from(card.byte()) + 1)
}

static CANONICAL_POINTS: Lazy<Vec<CardPoint>> = Lazy::new(|| {
    (0..CANONICAL_DECK_SIZE as u8)
        .map(|value| card_point(CardValue(value)))
        .collect()
});

/// The full 52-entry canonical plaintext-point table.
pub fn canonical_card_points() -> &'static [CardPoint] {
    &CANONICAL_POINTS
}

const DOMAIN_DECK: &[u8] = b"headsup/deck/v1";

/// Digest both parties must independently commit to in `start_game`.
pub fn deck_digest(masked: &[CardPoint], canonical: &[CardPoint]) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_DECK);
    hasher.update(&(masked.len() as u32).to_be_bytes());
    for point in masked {
        hasher.update(encode_g1(point));
    }
    hasher.update(&(canonical.len() as u32).to_be_bytes());
    for point in canonical {
        hasher.update(encode_g1(point));
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    StateHash::from(bytes)
}

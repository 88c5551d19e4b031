//! Hand ranking behind the `HandRanker` seam. The adjudicator treats the
//! ranker as an external collaborator and trusts its ordering; the default
//! implementation scores the best five of seven cards.

use thiserror::Error;

use crate::cards::CardValue;

/// Base-16 multipliers for packing (category, c1..c5) into a u32.
const M5: u32 = 1_048_576; // 16^5
const M4: u32 = 65_536; // 16^4
const M3: u32 = 4_096; // 16^3
const M2: u32 = 256; // 16^2
const M1: u32 = 16; // 16^1
const M0: u32 = 1; // 16^0

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandCategory {
    HighCard = 0,
    OnePair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
}

impl HandCategory {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RankError {
    #[error("duplicate card in the seven-card hand")]
    DuplicateCard,
}

/// Ranks a completed hand. Higher scores beat lower; equal scores tie.
pub trait HandRanker: Send + Sync {
    fn rank_seven(&self, cards: [CardValue; 7]) -> Result<u32, RankError>;
}

/// Pack (category, tiebreaks) into a totally ordered score.
fn pack_score(category: HandCategory, c: [u8; 5]) -> u32 {
    u32::from(category.as_u8()) * M5
        + u32::from(c[0]) * M4
        + u32::from(c[1]) * M3
        + u32::from(c[2]) * M2
        + u32::from(c[3]) * M1
        + u32::from(c[4]) * M0
}

fn is_run_desc(r: &[u8; 5]) -> bool {
    r.windows(2).all(|pair| pair[0] == pair[1] + 1)
}

fn is_wheel(r: &[u8; 5]) -> bool {
    *r == [14, 5, 4, 3, 2]
}

/// Category-specific tie-break vector over ranks grouped by multiplicity.
fn tiebreak_vector(category: HandCategory, r: &[u8; 5]) -> [u8; 5] {
    match category {
        HandCategory::StraightFlush | HandCategory::Straight => {
            let high = if is_wheel(r) { 5 } else { r[0] };
            [high, 0, 0, 0, 0]
        }
        HandCategory::FourOfAKind => [r[0], r[4], 0, 0, 0],
        HandCategory::FullHouse => [r[0], r[3], 0, 0, 0],
        HandCategory::Flush | HandCategory::HighCard => *r,
        HandCategory::ThreeOfAKind => [r[0], r[3], r[4], 0, 0],
        HandCategory::TwoPair => [r[0], r[2], r[4], 0, 0],
        HandCategory::OnePair => [r[0], r[2], r[3], r[4], 0],
    }
}

/// Score five distinct cards.
fn score_five(cards: [CardValue; 5]) -> u32 {
    let same_suit = cards.iter().all(|card| card.suit() == cards[0].suit());

    // Ranks sorted descending for straight/flush detection.
    let mut by_rank: [u8; 5] = [0; 5];
    for (slot, card) in by_rank.iter_mut().zip(cards.iter()) {
        *slot = card.rank();
    }
    by_rank.sort_unstable_by(|a, b| b.cmp(a));
    let is_straight = is_run_desc(&by_rank) || is_wheel(&by_rank);

    // Ranks regrouped by (multiplicity, rank) descending for pair categories.
    let mut counts = [0u8; 15];
    for rank in by_rank {
        counts[usize::from(rank)] += 1;
    }
    let mut grouped: Vec<u8> = by_rank.to_vec();
    grouped.sort_unstable_by(|a, b| {
        (counts[usize::from(*b)], *b).cmp(&(counts[usize::from(*a)], *a))
    });
    let grouped: [u8; 5] = grouped.try_into().expect("five ranks");

    let pattern: Vec<u8> = {
        let mut multiplicities: Vec<u8> = counts.iter().copied().filter(|c| *c > 0).collect();
        multiplicities.sort_unstable_by(|a, b| b.cmp(a));
        multiplicities
    };

    let category = match pattern.as_slice() {
        [4, 1] => HandCategory::FourOfAKind,
        [3, 2] => HandCategory::FullHouse,
        [3, 1, 1] => HandCategory::ThreeOfAKind,
        [2, 2, 1] => HandCategory::TwoPair,
        [2, 1, 1, 1] => HandCategory::OnePair,
        _ => match (same_suit, is_straight) {
            (true, true) => HandCategory::StraightFlush,
            (true, false) => HandCategory::Flush,
            (false, true) => HandCategory::Straight,
            (false, false) => HandCategory::HighCard,
        },
    };

    let ranks = match category {
        HandCategory::Flush
        | HandCategory::HighCard
        | HandCategory::Straight
        | HandCategory::StraightFlush => &by_rank,
        _ => &grouped,
    };
    pack_score(category, tiebreak_vector(category, ranks))
}

/// Best score over all 21 five-card subsets of seven cards.
pub fn score_seven(cards: [CardValue; 7]) -> Result<u32, RankError> {
    for (i, a) in cards.iter().enumerate() {
        if cards.iter().skip(i + 1).any(|b| b == a) {
            return Err(RankError::DuplicateCard);
        }
    }

    let mut best = 0u32;
    for skip_first in 0..6 {
        for skip_second in (skip_first + 1)..7 {
            let mut five = [cards[0]; 5];
            let mut cursor = 0;
            for (index, card) in cards.iter().enumerate() {
                if index != skip_first && index != skip_second {
                    five[cursor] = *card;
                    cursor += 1;
                }
            }
            best = best.max(score_five(five));
        }
    }
    Ok(best)
}

/// Default collaborator used when no external evaluator is plugged in.
#[derive(Debug, Default)]
pub struct DefaultRanker;

impl HandRanker for DefaultRanker {
    fn rank_seven(&self, cards: [CardValue; 7]) -> Result<u32, RankError> {
        score_seven(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Suit-major bytes: clubs 0..13, diamonds 13..26, hearts 26..39,
    // spades 39..52; rank byte = value - 2 within the suit block.
    fn card(rank: u8, suit: u8) -> CardValue {
        CardValue::from_byte(suit * 13 + (rank - 2)).expect("valid card")
    }

    fn seven(cards: [(u8, u8); 7]) -> [CardValue; 7] {
        cards.map(|(rank, suit)| card(rank, suit))
    }

    #[test]
    fn pair_of_aces_beats_high_card() {
        // Board: Ac 5d 3h 2s 7c
        let board = [(14, 0), (5, 1), (3, 2), (2, 3), (7, 0)];
        let mut with_ace = board.to_vec();
        with_ace.extend([(14, 3), (13, 3)]); // As Ks
        let mut with_queen = board.to_vec();
        with_queen.extend([(12, 2), (11, 2)]); // Qh Jh

        let aces = score_seven(seven(with_ace.try_into().unwrap())).unwrap();
        let queen_high = score_seven(seven(with_queen.try_into().unwrap())).unwrap();
        assert!(aces > queen_high);
        assert_eq!(aces / M5, u32::from(HandCategory::OnePair.as_u8()));
    }

    #[test]
    fn straight_flush_outranks_quads() {
        let sf = seven([(9, 0), (8, 0), (7, 0), (6, 0), (5, 0), (2, 1), (3, 2)]);
        let quads = seven([(9, 0), (9, 1), (9, 2), (9, 3), (5, 0), (2, 1), (3, 2)]);
        assert!(score_seven(sf).unwrap() > score_seven(quads).unwrap());
    }

    #[test]
    fn wheel_is_the_lowest_straight() {
        let wheel = seven([(14, 0), (2, 1), (3, 2), (4, 3), (5, 0), (9, 1), (11, 2)]);
        let six_high = seven([(2, 1), (3, 2), (4, 3), (5, 0), (6, 1), (9, 0), (11, 2)]);
        let wheel_score = score_seven(wheel).unwrap();
        let six_score = score_seven(six_high).unwrap();
        assert_eq!(wheel_score / M5, u32::from(HandCategory::Straight.as_u8()));
        assert!(six_score > wheel_score);
    }

    #[test]
    fn kickers_break_pair_ties() {
        let board = [(10, 0), (10, 1), (4, 2), (7, 3), (2, 0)];
        let mut ace_kicker = board.to_vec();
        ace_kicker.extend([(14, 2), (8, 1)]);
        let mut king_kicker = board.to_vec();
        king_kicker.extend([(13, 2), (8, 3)]);

        let ace = score_seven(seven(ace_kicker.try_into().unwrap())).unwrap();
        let king = score_seven(seven(king_kicker.try_into().unwrap())).unwrap();
        assert!(ace > king);
    }

    #[test]
    fn identical_boards_with_equal_holes_tie() {
        let board = [(14, 0), (13, 1), (12, 2), (11, 3), (9, 0)];
        // Both players play the board: any two low cards give the same hand.
        let mut first = board.to_vec();
        first.extend([(2, 1), (3, 2)]);
        let mut second = board.to_vec();
        second.extend([(2, 2), (3, 3)]);

        assert_eq!(
            score_seven(seven(first.try_into().unwrap())).unwrap(),
            score_seven(seven(second.try_into().unwrap())).unwrap()
        );
    }

    #[test]
    fn two_pair_reads_both_pairs_and_kicker() {
        let hand = seven([(10, 0), (10, 1), (4, 2), (4, 3), (9, 0), (2, 1), (3, 2)]);
        let score = score_seven(hand).unwrap();
        assert_eq!(score / M5, u32::from(HandCategory::TwoPair.as_u8()));
        // c1 = 10, c2 = 4, c3 = 9
        assert_eq!((score / M4) % 16, 10);
        assert_eq!((score / M3) % 16, 4);
        assert_eq!((score / M2) % 16, 9);
    }

    #[test]
    fn duplicate_cards_are_rejected() {
        let hand = seven([(10, 0), (10, 0), (4, 2), (4, 3), (9, 0), (2, 1), (3, 2)]);
        assert_eq!(score_seven(hand), Err(RankError::DuplicateCard));
    }
}

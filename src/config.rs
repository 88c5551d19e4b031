use chrono::Duration;

/// Number of card positions in a hand's working deck: two hole cards per
/// player, three flop cards, turn, river.
pub const WORKING_DECK_SIZE: usize = 9;

/// Number of entries in the canonical plaintext-point table.
pub const CANONICAL_DECK_SIZE: usize = 52;

/// Window during which a disputed action sequence may be superseded by a
/// strictly longer valid one.
pub fn dispute_window() -> Duration {
    Duration::hours(1)
}

/// Window during which showdown disclosures are accepted.
pub fn reveal_window() -> Duration {
    Duration::hours(1)
}

/// Window an obligated helper has to answer a force-reveal request.
pub fn force_reveal_window() -> Duration {
    Duration::hours(1)
}

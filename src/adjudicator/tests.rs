use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::*;
use crate::cards::{canonical_card_points, card_point, CardValue, Slot};
use crate::channel::test_support::{masking_secret, participant, ACCOUNT_A, ACCOUNT_B};
use crate::engine::{link_actions, ActionKind};
use crate::events::RecordingSink;
use crate::force_reveal::StageOpening;
use crate::masking::{encode_g1, mask, unmask_layer};
use crate::showdown::{
    commitment_hash, CommitBundle, CommitEntry, DefaultRanker, RevealedSlot, SlotDisclosure,
};
use crate::signing::{Signable, TranscriptSignatureValidator};
use crate::types::StateHash;

const CHANNEL: ChannelId = 1;

// A holds As Ks, B holds Qh Jh, board Ac 5d 3h 2s 7c: the initiator's pair
// of aces beats the opponent's queen high.
const CARDS: [u8; 9] = [51, 50, 36, 35, 12, 16, 27, 39, 5];

fn sign_as(party: Party, transcript: &[u8]) -> Vec<u8> {
    let account = match party {
        Party::A => ACCOUNT_A,
        Party::B => ACCOUNT_B,
    };
    TranscriptSignatureValidator::sign(account, transcript)
}

fn salt_for(slot: Slot) -> [u8; 32] {
    [slot.index() as u8 + 1; 32]
}

fn entry_for(slot: Slot) -> CommitEntry {
    let deal_ref = slot.index() as u8;
    CommitEntry {
        slot,
        deal_ref,
        hash: commitment_hash(CHANNEL, slot, deal_ref, CARDS[slot.index()], &salt_for(slot)),
    }
}

struct TestBed {
    adj: Adjudicator,
    sink: Arc<RecordingSink>,
    now: DateTime<Utc>,
}

impl TestBed {
    fn new() -> Self {
        let sink = Arc::new(RecordingSink::new());
        let adj = Adjudicator::new(
            Arc::new(TranscriptSignatureValidator),
            Arc::new(DefaultRanker),
            sink.clone(),
        );
        let mut bed = Self {
            adj,
            sink,
            now: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };
        bed.adj
            .open(CHANNEL, participant(Party::A), ACCOUNT_B.to_vec(), 100, 1, 10)
            .expect("open channel");
        bed.adj
            .join(CHANNEL, participant(Party::B), 100)
            .expect("join channel");
        bed
    }

    /// Working deck carrying a single masking layer from B over the fixed
    /// card layout, plus the canonical table.
    fn deck_bytes() -> (Vec<Vec<u8>>, Vec<Vec<u8>>) {
        let secret_b = masking_secret(Party::B);
        let working = CARDS
            .iter()
            .map(|&byte| {
                let point = card_point(CardValue::from_byte(byte).unwrap());
                encode_g1(&mask(&point, &secret_b))
            })
            .collect();
        let canonical = canonical_card_points().iter().map(encode_g1).collect();
        (working, canonical)
    }

    fn start_game(&mut self) {
        let (working, canonical) = Self::deck_bytes();
        let first = self
            .adj
            .start_game(CHANNEL, Party::A, &working, &canonical)
            .expect("first commitment");
        assert!(!first);
        let second = self
            .adj
            .start_game(CHANNEL, Party::B, &working, &canonical)
            .expect("second commitment");
        assert!(second);
    }

    fn hand_id(&self) -> HandId {
        self.adj.channel_view(CHANNEL).unwrap().hand_id
    }

    fn balances(&self) -> [Chips; 2] {
        self.adj.channel_view(CHANNEL).unwrap().balances
    }

    fn signed(&self, script: &[(ActionKind, Chips, Party)]) -> (Vec<Action>, Vec<SignatureBytes>) {
        let hand_id = self.hand_id();
        let mut actions: Vec<Action> = script
            .iter()
            .map(|&(kind, amount, sender)| Action {
                channel_id: CHANNEL,
                hand_id,
                seq: 0,
                kind,
                amount,
                prev_hash: StateHash::zero(),
                sender,
            })
            .collect();
        link_actions(&mut actions);
        let signatures = actions
            .iter()
            .map(|action| sign_as(action.sender, &action.to_signing_bytes()))
            .collect();
        (actions, signatures)
    }

    fn start_request(&self) -> StartShowdownRequest {
        let bundle = CommitBundle {
            channel_id: CHANNEL,
            hand_id: self.hand_id(),
            seq: 1,
            entries: Slot::ALL.into_iter().map(entry_for).collect(),
        };
        let transcript = bundle.to_signing_bytes();
        StartShowdownRequest {
            cosignatures: [
                sign_as(Party::A, &transcript),
                sign_as(Party::B, &transcript),
            ],
            bundle,
            board_codes: [CARDS[4], CARDS[5], CARDS[6], CARDS[7], CARDS[8]],
            board_salts: [
                salt_for(Slot::Flop1),
                salt_for(Slot::Flop2),
                salt_for(Slot::Flop3),
                salt_for(Slot::Turn),
                salt_for(Slot::River),
            ],
            hole_codes: [CARDS[0], CARDS[1]],
            hole_salts: [salt_for(Slot::HoleA1), salt_for(Slot::HoleA2)],
        }
    }

    fn opponent_disclosure(&self, seq: Seq) -> (DisclosureBundle, Vec<u8>) {
        let bundle = DisclosureBundle {
            channel_id: CHANNEL,
            hand_id: self.hand_id(),
            seq,
            on_behalf_of: Party::B,
            items: Slot::HOLES_B
                .into_iter()
                .map(|slot| SlotDisclosure {
                    slot,
                    deal_ref: slot.index() as u8,
                    hash: entry_for(slot).hash,
                    card: CARDS[slot.index()],
                    salt: salt_for(slot),
                })
                .collect(),
        };
        let signature = sign_as(Party::B, &bundle.to_signing_bytes());
        (bundle, signature)
    }
}

fn check_down() -> Vec<(ActionKind, Chips, Party)> {
    let mut script = vec![
        (ActionKind::SmallBlind, 1, Party::A),
        (ActionKind::BigBlind, 2, Party::B),
        (ActionKind::CheckCall, 1, Party::A),
        (ActionKind::CheckCall, 0, Party::B),
    ];
    for _ in 0..3 {
        script.push((ActionKind::CheckCall, 0, Party::B));
        script.push((ActionKind::CheckCall, 0, Party::A));
    }
    script
}

fn fold_line() -> Vec<(ActionKind, Chips, Party)> {
    vec![
        (ActionKind::SmallBlind, 1, Party::A),
        (ActionKind::BigBlind, 2, Party::B),
        (ActionKind::BetRaise, 4, Party::A),
        (ActionKind::Fold, 0, Party::B),
    ]
}

#[test]
fn channel_lifecycle_emits_notifications() {
    let mut bed = TestBed::new();
    bed.adj.top_up(CHANNEL, Party::B, 25).expect("top up");
    assert_eq!(bed.balances(), [100, 125]);

    let events = bed.sink.snapshot();
    assert!(matches!(events[0], Notification::ChannelOpened { .. }));
    assert!(matches!(events[1], Notification::ChannelJoined { .. }));
    assert!(matches!(
        events[2],
        Notification::ChannelToppedUp {
            party: Party::B,
            amount: 25,
            ..
        }
    ));

    let withdrawn = bed.adj.withdraw(CHANNEL, Party::B).expect("withdraw");
    assert_eq!(withdrawn, 125);
    assert_eq!(bed.balances(), [100, 0]);
}

#[test]
fn open_rejects_degenerate_parameters() {
    let mut bed = TestBed::new();
    let result = bed.adj.open(
        2,
        participant(Party::A),
        ACCOUNT_B.to_vec(),
        100,
        0,
        10,
    );
    assert!(matches!(result, Err(AdjudicatorError::InvalidParameter(_))));

    let result = bed.adj.open(
        2,
        participant(Party::A),
        ACCOUNT_A.to_vec(),
        100,
        1,
        10,
    );
    assert!(matches!(result, Err(AdjudicatorError::InvalidParameter(_))));
}

#[test]
fn start_game_requires_matching_decks() {
    let mut bed = TestBed::new();
    let (working, canonical) = TestBed::deck_bytes();
    assert!(!bed
        .adj
        .start_game(CHANNEL, Party::A, &working, &canonical)
        .expect("first"));

    // A different working deck digests differently and is rejected.
    let mut other = working.clone();
    other.swap(0, 1);
    assert_eq!(
        bed.adj.start_game(CHANNEL, Party::B, &other, &canonical),
        Err(AdjudicatorError::Channel(
            ChannelError::DeckCommitmentMismatch
        ))
    );
    assert!(!bed.adj.deck_ready(CHANNEL));

    assert!(bed
        .adj
        .start_game(CHANNEL, Party::B, &working, &canonical)
        .expect("second"));
    assert!(bed.adj.deck_ready(CHANNEL));
}

#[test]
fn start_game_rejects_malformed_and_foreign_tables() {
    let mut bed = TestBed::new();
    let (working, canonical) = TestBed::deck_bytes();

    let mut short = working.clone();
    short.pop();
    assert!(matches!(
        bed.adj.start_game(CHANNEL, Party::A, &short, &canonical),
        Err(AdjudicatorError::Cards(CardError::WrongDeckLength { .. }))
    ));

    let mut garbage = working.clone();
    garbage[0] = vec![1, 2, 3];
    assert!(matches!(
        bed.adj.start_game(CHANNEL, Party::A, &garbage, &canonical),
        Err(AdjudicatorError::Masking(_))
    ));

    // A shuffled canonical table no longer matches the derived mapping.
    let mut foreign = canonical.clone();
    foreign.swap(0, 51);
    assert_eq!(
        bed.adj.start_game(CHANNEL, Party::A, &working, &foreign),
        Err(AdjudicatorError::CanonicalTableMismatch)
    );
}

#[test]
fn settle_fold_pays_immediately_and_channel_is_reusable() {
    let mut bed = TestBed::new();
    bed.start_game();

    let (actions, signatures) = bed.signed(&fold_line());
    bed.adj
        .settle(CHANNEL, Party::A, &actions, &signatures, bed.now)
        .expect("settle fold");
    assert_eq!(bed.balances(), [102, 98]);

    // Settling the finalized hand again is the canonical double-payout guard.
    assert_eq!(
        bed.adj.settle(CHANNEL, Party::A, &actions, &signatures, bed.now),
        Err(AdjudicatorError::Channel(ChannelError::AlreadyFinalized))
    );

    // The channel hosts the next hand.
    bed.start_game();
    assert_eq!(bed.hand_id(), 2);
}

#[test]
fn settle_rejects_non_terminal_sequences() {
    let mut bed = TestBed::new();
    bed.start_game();

    let (actions, signatures) = bed.signed(&[
        (ActionKind::SmallBlind, 1, Party::A),
        (ActionKind::BigBlind, 2, Party::B),
    ]);
    assert_eq!(
        bed.adj.settle(CHANNEL, Party::A, &actions, &signatures, bed.now),
        Err(AdjudicatorError::NonTerminalSettlement)
    );
    assert_eq!(bed.balances(), [100, 100]);
}

#[test]
fn settle_requires_a_started_game() {
    let mut bed = TestBed::new();
    let (actions, signatures) = bed.signed(&fold_line());
    assert_eq!(
        bed.adj.settle(CHANNEL, Party::A, &actions, &signatures, bed.now),
        Err(AdjudicatorError::GameNotStarted)
    );
}

#[test]
fn check_down_showdown_pays_the_initiators_pair_of_aces() {
    let mut bed = TestBed::new();
    bed.start_game();
    let hand_id = bed.hand_id();

    let (actions, signatures) = bed.signed(&check_down());
    bed.adj
        .settle(CHANNEL, Party::A, &actions, &signatures, bed.now)
        .expect("settle to showdown");
    assert!(bed
        .sink
        .snapshot()
        .iter()
        .any(|event| matches!(event, Notification::ShowdownStarted { initiator: Party::A, .. })));

    let request = bed.start_request();
    bed.adj
        .start_showdown(CHANNEL, &request, bed.now)
        .expect("start showdown");

    // The opponent's openings complete the mask and finalize on the spot.
    let (bundle, signature) = bed.opponent_disclosure(2);
    bed.adj
        .submit_additional_commits(CHANNEL, &bundle, &signature, bed.now)
        .expect("opponent commits");

    assert_eq!(bed.balances(), [102, 98]);
    assert!(bed
        .sink
        .snapshot()
        .iter()
        .any(|event| matches!(
            event,
            Notification::ShowdownFinalized {
                winner: Some(Party::A),
                balances: [102, 98],
                ..
            }
        )));
    assert!(bed.adj.showdown_view(CHANNEL, hand_id).unwrap().settled);
    assert!(bed.adj.channel_view(CHANNEL).unwrap().hand_finalized);
}

#[test]
fn silent_opponent_forfeits_the_pot_to_the_initiator() {
    let mut bed = TestBed::new();
    bed.start_game();

    let (actions, signatures) = bed.signed(&check_down());
    bed.adj
        .settle(CHANNEL, Party::A, &actions, &signatures, bed.now)
        .expect("settle to showdown");
    let request = bed.start_request();
    bed.adj
        .start_showdown(CHANNEL, &request, bed.now)
        .expect("start showdown");

    // The window is still open and the opponent's holes are missing.
    assert_eq!(
        bed.adj.finalize_showdown(CHANNEL, bed.now),
        Err(AdjudicatorError::Showdown(
            ShowdownError::RevealWindowStillOpen
        ))
    );

    let late = bed.now + Duration::hours(2);
    let settlement = bed
        .adj
        .finalize_showdown(CHANNEL, late)
        .expect("forfeit finalize");
    assert!(settlement.forfeited);
    assert_eq!(settlement.winner, Some(Party::A));
    assert_eq!(bed.balances(), [102, 98]);
}

#[test]
fn masking_reveals_complete_a_showdown() {
    let mut bed = TestBed::new();
    bed.start_game();
    let hand_id = bed.hand_id();

    let (actions, signatures) = bed.signed(&check_down());
    bed.adj
        .settle(CHANNEL, Party::A, &actions, &signatures, bed.now)
        .expect("settle to showdown");
    let request = bed.start_request();
    bed.adj
        .start_showdown(CHANNEL, &request, bed.now)
        .expect("start showdown");

    // B opens their holes cryptographically instead of by commitment.
    let secret_b = masking_secret(Party::B);
    let items = Slot::HOLES_B
        .into_iter()
        .map(|slot| {
            let stored = mask(
                &card_point(CardValue::from_byte(CARDS[slot.index()]).unwrap()),
                &secret_b,
            );
            RevealedSlot {
                slot,
                opened: encode_g1(&unmask_layer(&stored, &secret_b)),
            }
        })
        .collect();
    let bundle = RevealBundle {
        channel_id: CHANNEL,
        hand_id,
        seq: 2,
        on_behalf_of: Party::B,
        items,
    };
    let signature = sign_as(Party::B, &bundle.to_signing_bytes());
    bed.adj
        .reveal_cards(CHANNEL, &bundle, &signature, bed.now)
        .expect("verified reveals");

    assert_eq!(bed.balances(), [102, 98]);
    assert_eq!(
        bed.adj.revealed_cards(CHANNEL, hand_id).unwrap().to_vec(),
        CARDS.to_vec()
    );
}

#[test]
fn dispute_extensions_are_monotonic_and_resolve_after_the_window() {
    let mut bed = TestBed::new();
    bed.start_game();

    // A disputes with a short non-terminal sequence.
    let (short, short_sigs) = bed.signed(&[
        (ActionKind::SmallBlind, 1, Party::A),
        (ActionKind::BigBlind, 2, Party::B),
    ]);
    bed.adj
        .dispute(CHANNEL, Party::A, &short, &short_sigs, bed.now)
        .expect("open dispute");

    // Resubmitting the same length is rejected.
    assert!(matches!(
        bed.adj.dispute(CHANNEL, Party::B, &short, &short_sigs, bed.now),
        Err(AdjudicatorError::Engine(EngineError::DisputeNotLonger { .. }))
    ));

    // B supersedes with the full fold line.
    let (longer, longer_sigs) = bed.signed(&fold_line());
    bed.adj
        .dispute(CHANNEL, Party::B, &longer, &longer_sigs, bed.now)
        .expect("extend dispute");

    assert_eq!(
        bed.adj.finalize_dispute(CHANNEL, bed.now),
        Err(AdjudicatorError::DisputeWindowOpen)
    );

    let late = bed.now + Duration::hours(1);
    bed.adj
        .finalize_dispute(CHANNEL, late)
        .expect("finalize dispute");
    assert_eq!(bed.balances(), [102, 98]);
    assert!(bed.adj.channel_view(CHANNEL).unwrap().hand_finalized);
}

#[test]
fn dispute_reaching_showdown_opens_one_for_the_submitter() {
    let mut bed = TestBed::new();
    bed.start_game();
    let hand_id = bed.hand_id();

    let (actions, signatures) = bed.signed(&check_down());
    bed.adj
        .dispute(CHANNEL, Party::B, &actions, &signatures, bed.now)
        .expect("dispute");

    let late = bed.now + Duration::hours(1);
    bed.adj.finalize_dispute(CHANNEL, late).expect("finalize");

    let showdown = bed.adj.showdown_view(CHANNEL, hand_id).expect("opened");
    assert_eq!(showdown.initiator, Party::B);
    assert!(!showdown.settled);
}

#[test]
fn force_reveal_flow_and_slash_semantics() {
    let mut bed = TestBed::new();
    bed.start_game();
    let hand_id = bed.hand_id();

    // Hole A first; B is the obligated helper and answers in time.
    bed.adj
        .request_hole_a(CHANNEL, Party::A, Party::B, bed.now)
        .expect("request hole A");

    let secret_b = masking_secret(Party::B);
    let openings = Slot::HOLES_A
        .into_iter()
        .map(|slot| {
            let stored = mask(
                &card_point(CardValue::from_byte(CARDS[slot.index()]).unwrap()),
                &secret_b,
            );
            StageOpening {
                slot,
                opened: encode_g1(&unmask_layer(&stored, &secret_b)),
            }
        })
        .collect();
    let answer = ForceAnswer {
        channel_id: CHANNEL,
        hand_id,
        stage: RevealStage::HoleA,
        helper: Party::B,
        openings,
    };
    let signature = sign_as(Party::B, &answer.to_signing_bytes());
    bed.adj
        .answer_hole_a(CHANNEL, &answer, &signature, bed.now + Duration::minutes(5))
        .expect("answer hole A");

    // Hole B requested; the helper stays silent.
    let request_time = bed.now + Duration::minutes(10);
    bed.adj
        .request_hole_b(CHANNEL, Party::A, Party::B, request_time)
        .expect("request hole B");

    assert_eq!(
        bed.adj
            .slash_force_reveal(CHANNEL, request_time + Duration::minutes(59)),
        Err(AdjudicatorError::ForceReveal(
            ForceRevealError::NotYetExpired
        ))
    );

    let expiry = request_time + Duration::hours(1);
    bed.adj
        .slash_force_reveal(CHANNEL, expiry)
        .expect("slash after expiry");
    assert_eq!(bed.balances(), [110, 90]);

    // Exactly once.
    assert_eq!(
        bed.adj.slash_force_reveal(CHANNEL, expiry),
        Err(AdjudicatorError::ForceReveal(
            ForceRevealError::NothingInProgress
        ))
    );

    let state = bed.adj.force_reveal_view(CHANNEL, hand_id).expect("state");
    assert!(state.slashed);
    assert!(!state.in_progress);
    assert!(state.served_stages.contains(&RevealStage::HoleA));
}

#[test]
fn force_reveal_requires_a_started_game() {
    let mut bed = TestBed::new();
    assert_eq!(
        bed.adj.request_hole_a(CHANNEL, Party::A, Party::B, bed.now),
        Err(AdjudicatorError::GameNotStarted)
    );
}

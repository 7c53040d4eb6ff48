//! Best-five hand evaluation over 5 to 7 cards.
//!
//! Enumerates every C(n,5) subset (at most 21), classifies each five-card
//! set into one of the ten categories, and keeps the best. Comparison is
//! lexicographic on `(category, kickers)`; the winning five cards ride
//! along for showdown display.

use crate::error::EngineError;
use felt_types::{Card, HandCategory, HandRank, Rank};

/// Evaluate the best five-card hand from hole cards plus community cards.
pub fn evaluate(hole: &[Card; 2], community: &[Card]) -> Result<HandRank, EngineError> {
    let mut cards = Vec::with_capacity(2 + community.len());
    cards.extend_from_slice(hole);
    cards.extend_from_slice(community);
    evaluate_cards(&cards)
}

/// Evaluate the best five-card hand from 5..=7 distinct cards.
pub fn evaluate_cards(cards: &[Card]) -> Result<HandRank, EngineError> {
    let n = cards.len();
    if !(5..=7).contains(&n) {
        return Err(EngineError::InvalidHand);
    }
    let mut indices: Vec<u8> = cards.iter().map(Card::index).collect();
    indices.sort_unstable();
    indices.dedup();
    if indices.len() != n {
        return Err(EngineError::InvalidHand);
    }

    let mut best: Option<HandRank> = None;
    for mask in 0u32..(1 << n) {
        if mask.count_ones() != 5 {
            continue;
        }
        let mut five = [cards[0]; 5];
        let mut filled = 0;
        for (index, &card) in cards.iter().enumerate() {
            if mask & (1 << index) != 0 {
                five[filled] = card;
                filled += 1;
            }
        }
        let rank = rank_five(five);
        if best.as_ref().map_or(true, |current| rank > *current) {
            best = Some(rank);
        }
    }
    best.ok_or(EngineError::InvalidHand)
}

/// Classify exactly five distinct cards.
pub fn rank_five(mut five: [Card; 5]) -> HandRank {
    // Descending by rank; suits within a rank are irrelevant to the result.
    five.sort_unstable_by(|a, b| b.rank.cmp(&a.rank));
    let ranks: [Rank; 5] = [
        five[0].rank,
        five[1].rank,
        five[2].rank,
        five[3].rank,
        five[4].rank,
    ];

    let is_flush = five.iter().all(|card| card.suit == five[0].suit);

    // Straight detection on descending distinct ranks; the wheel counts with
    // the five as its top card.
    let distinct = ranks.windows(2).all(|pair| pair[0] != pair[1]);
    let straight_top = if !distinct {
        None
    } else if ranks[0].value() - ranks[4].value() == 4 {
        Some(ranks[0])
    } else if ranks.map(|rank| rank.value()) == [14, 5, 4, 3, 2] {
        Some(Rank::FIVE)
    } else {
        None
    };

    if let Some(top) = straight_top {
        let category = if is_flush && top == Rank::ACE {
            HandCategory::RoyalFlush
        } else if is_flush {
            HandCategory::StraightFlush
        } else {
            HandCategory::Straight
        };
        return HandRank::new(category, vec![top], five);
    }

    // Count multiplicity per rank, grouped as (count, rank) sorted so the
    // biggest groups, then the highest ranks, come first.
    let mut groups: Vec<(u8, Rank)> = Vec::with_capacity(5);
    for &rank in &ranks {
        match groups.iter_mut().find(|(_, r)| *r == rank) {
            Some((count, _)) => *count += 1,
            None => groups.push((1, rank)),
        }
    }
    groups.sort_unstable_by(|a, b| b.cmp(a));

    let shape: Vec<u8> = groups.iter().map(|(count, _)| *count).collect();
    let (category, kickers) = match shape.as_slice() {
        [4, 1] => (
            HandCategory::FourOfAKind,
            vec![groups[0].1, groups[1].1],
        ),
        [3, 2] => (HandCategory::FullHouse, vec![groups[0].1, groups[1].1]),
        [3, 1, 1] => (
            HandCategory::ThreeOfAKind,
            vec![groups[0].1, groups[1].1, groups[2].1],
        ),
        [2, 2, 1] => (
            HandCategory::TwoPair,
            vec![groups[0].1, groups[1].1, groups[2].1],
        ),
        [2, 1, 1, 1] => (
            HandCategory::OnePair,
            vec![groups[0].1, groups[1].1, groups[2].1, groups[3].1],
        ),
        _ => {
            let category = if is_flush {
                HandCategory::Flush
            } else {
                HandCategory::HighCard
            };
            (category, ranks.to_vec())
        }
    };

    HandRank::new(category, kickers, five)
}

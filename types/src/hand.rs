//! Hand rankings.
//!
//! A [`HandRank`] totally orders five-card poker hands by `(category,
//! kickers)`; the retained best-five cards are informational (shown at
//! showdown) and do not participate in comparisons, so equal ranks built
//! from different suits still split a pot.

use crate::card::{Card, Rank};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The ten hand categories, weakest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl HandCategory {
    /// Human-readable name, as shown in hand results.
    pub fn name(&self) -> &'static str {
        match self {
            HandCategory::HighCard => "High Card",
            HandCategory::OnePair => "One Pair",
            HandCategory::TwoPair => "Two Pair",
            HandCategory::ThreeOfAKind => "Three of a Kind",
            HandCategory::Straight => "Straight",
            HandCategory::Flush => "Flush",
            HandCategory::FullHouse => "Full House",
            HandCategory::FourOfAKind => "Four of a Kind",
            HandCategory::StraightFlush => "Straight Flush",
            HandCategory::RoyalFlush => "Royal Flush",
        }
    }
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The rank of an evaluated five-card hand.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandRank {
    pub category: HandCategory,
    /// Tie-break ranks, most significant first. Length depends on category.
    pub kickers: Vec<Rank>,
    /// The five cards forming the hand, for display at showdown.
    pub best_five: [Card; 5],
}

impl HandRank {
    pub fn new(category: HandCategory, kickers: Vec<Rank>, best_five: [Card; 5]) -> Self {
        Self {
            category,
            kickers,
            best_five,
        }
    }
}

impl PartialEq for HandRank {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category && self.kickers == other.kickers
    }
}

impl Eq for HandRank {}

impl PartialOrd for HandRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HandRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then_with(|| self.kickers.cmp(&other.kickers))
    }
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.category)?;
        if let Some(high) = self.kickers.first() {
            write!(f, " ({high} high)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Suit;

    fn five(symbols: [&str; 5]) -> [Card; 5] {
        symbols.map(|s| s.parse().expect("card parses"))
    }

    #[test]
    fn test_category_ordering() {
        assert!(HandCategory::RoyalFlush > HandCategory::StraightFlush);
        assert!(HandCategory::Straight > HandCategory::ThreeOfAKind);
        assert!(HandCategory::OnePair > HandCategory::HighCard);
    }

    #[test]
    fn test_kickers_break_ties() {
        let aces = HandRank::new(
            HandCategory::OnePair,
            vec![Rank::ACE, Rank::KING, Rank::NINE, Rank::FOUR],
            five(["Ah", "As", "Kd", "9c", "4h"]),
        );
        let kings = HandRank::new(
            HandCategory::OnePair,
            vec![Rank::KING, Rank::ACE, Rank::NINE, Rank::FOUR],
            five(["Kh", "Ks", "Ad", "9c", "4h"]),
        );
        assert!(aces > kings);
    }

    #[test]
    fn test_suits_do_not_break_ties() {
        // Same category and kickers in different suits is a split.
        let hearts = HandRank::new(
            HandCategory::Flush,
            vec![Rank::ACE, Rank::JACK, Rank::NINE, Rank::SIX, Rank::TWO],
            five(["Ah", "Jh", "9h", "6h", "2h"]),
        );
        let spades = HandRank::new(
            HandCategory::Flush,
            vec![Rank::ACE, Rank::JACK, Rank::NINE, Rank::SIX, Rank::TWO],
            five(["As", "Js", "9s", "6s", "2s"]),
        );
        assert_eq!(hearts, spades);
        assert_eq!(hearts.cmp(&spades), Ordering::Equal);
        assert_eq!(hearts.best_five[0].suit, Suit::Hearts);
        assert_eq!(spades.best_five[0].suit, Suit::Spades);
    }
}

//! The 52-card domain: suits, ranks, and the card/integer bijection.
//!
//! Cards travel on the wire as two-character strings (`"Kh"`, `"Td"`, `"2s"`)
//! and map to the integers `0..52` via `index = suit * 13 + (rank - 2)`.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Card suits, in index order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    /// Index in `0..4`.
    pub fn index(&self) -> u8 {
        match self {
            Suit::Hearts => 0,
            Suit::Diamonds => 1,
            Suit::Clubs => 2,
            Suit::Spades => 3,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Suit::Hearts),
            1 => Some(Suit::Diamonds),
            2 => Some(Suit::Clubs),
            3 => Some(Suit::Spades),
            _ => None,
        }
    }

    /// Lowercase wire symbol.
    pub fn symbol(&self) -> char {
        match self {
            Suit::Hearts => 'h',
            Suit::Diamonds => 'd',
            Suit::Clubs => 'c',
            Suit::Spades => 's',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol.to_ascii_lowercase() {
            'h' => Some(Suit::Hearts),
            'd' => Some(Suit::Diamonds),
            'c' => Some(Suit::Clubs),
            's' => Some(Suit::Spades),
            _ => None,
        }
    }
}

/// A card rank in `2..=14`, with 14 standing for the ace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rank(u8);

impl Rank {
    pub const TWO: Rank = Rank(2);
    pub const THREE: Rank = Rank(3);
    pub const FOUR: Rank = Rank(4);
    pub const FIVE: Rank = Rank(5);
    pub const SIX: Rank = Rank(6);
    pub const SEVEN: Rank = Rank(7);
    pub const EIGHT: Rank = Rank(8);
    pub const NINE: Rank = Rank(9);
    pub const TEN: Rank = Rank(10);
    pub const JACK: Rank = Rank(11);
    pub const QUEEN: Rank = Rank(12);
    pub const KING: Rank = Rank(13);
    pub const ACE: Rank = Rank(14);

    pub fn new(value: u8) -> Option<Self> {
        if (2..=14).contains(&value) {
            Some(Rank(value))
        } else {
            None
        }
    }

    /// Numeric value in `2..=14`.
    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn symbol(&self) -> char {
        match self.0 {
            2..=9 => (b'0' + self.0) as char,
            10 => 'T',
            11 => 'J',
            12 => 'Q',
            13 => 'K',
            14 => 'A',
            _ => unreachable!("rank out of range"),
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol.to_ascii_uppercase() {
            '2'..='9' => Rank::new(symbol as u8 - b'0'),
            'T' => Some(Rank::TEN),
            'J' => Some(Rank::JACK),
            'Q' => Some(Rank::QUEEN),
            'K' => Some(Rank::KING),
            'A' => Some(Rank::ACE),
            _ => None,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A playing card. Immutable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    /// Bijective index in `0..52`: `suit * 13 + (rank - 2)`.
    pub fn index(&self) -> u8 {
        self.suit.index() * 13 + (self.rank.value() - 2)
    }

    pub fn from_index(index: u8) -> Option<Self> {
        if index >= 52 {
            return None;
        }
        let suit = Suit::from_index(index / 13)?;
        let rank = Rank::new(index % 13 + 2)?;
        Some(Card { rank, suit })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank.symbol(), self.suit.symbol())
    }
}

/// Error produced when parsing a card from its wire form.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid card: {0:?}")]
pub struct ParseCardError(pub String);

impl FromStr for Card {
    type Err = ParseCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(rank), Some(suit), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(ParseCardError(s.to_string()));
        };
        let rank = Rank::from_symbol(rank).ok_or_else(|| ParseCardError(s.to_string()))?;
        let suit = Suit::from_symbol(suit).ok_or_else(|| ParseCardError(s.to_string()))?;
        Ok(Card { rank, suit })
    }
}

impl Serialize for Card {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_bijection() {
        for index in 0..52u8 {
            let card = Card::from_index(index).expect("index in range");
            assert_eq!(card.index(), index);
        }
        assert_eq!(Card::from_index(52), None);
    }

    #[test]
    fn test_index_formula() {
        // index = suit * 13 + (rank - 2)
        let card = Card::new(Rank::ACE, Suit::Spades);
        assert_eq!(card.index(), 3 * 13 + 12);
        let card = Card::new(Rank::TWO, Suit::Hearts);
        assert_eq!(card.index(), 0);
    }

    #[test]
    fn test_wire_round_trip() {
        for index in 0..52u8 {
            let card = Card::from_index(index).expect("index in range");
            let parsed: Card = card.to_string().parse().expect("wire form parses");
            assert_eq!(parsed, card);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Card>().is_err());
        assert!("K".parse::<Card>().is_err());
        assert!("1h".parse::<Card>().is_err());
        assert!("Kx".parse::<Card>().is_err());
        assert!("Khh".parse::<Card>().is_err());
    }

    #[test]
    fn test_json_form() {
        let card: Card = "Qd".parse().expect("parses");
        let json = serde_json::to_string(&card).expect("serializes");
        assert_eq!(json, "\"Qd\"");
        let back: Card = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, card);
    }
}

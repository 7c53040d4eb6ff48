//! A 52-card deck with a deal cursor and a seedable shuffle.

use crate::error::EngineError;
use felt_types::Card;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// An ordered deck plus a cursor marking the next card to deal.
///
/// Seeding makes the entire shuffle/deal sequence reproducible, which the
/// engine tests lean on heavily. Production tables construct unseeded decks.
pub struct Deck {
    cards: [Card; 52],
    cursor: usize,
    rng: ChaCha20Rng,
}

fn canonical() -> [Card; 52] {
    let mut cards = [Card::from_index(0).expect("index 0 is a card"); 52];
    for (index, slot) in cards.iter_mut().enumerate() {
        *slot = Card::from_index(index as u8).expect("index in range");
    }
    cards
}

impl Deck {
    /// A deck with an entropy-seeded PRNG.
    pub fn new() -> Self {
        Self::from_rng(ChaCha20Rng::from_entropy())
    }

    /// A deck whose shuffles are fully determined by `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(ChaCha20Rng::seed_from_u64(seed))
    }

    fn from_rng(rng: ChaCha20Rng) -> Self {
        Self {
            cards: canonical(),
            cursor: 0,
            rng,
        }
    }

    /// Restore canonical order and rewind the cursor.
    pub fn reset(&mut self) {
        self.cards = canonical();
        self.cursor = 0;
    }

    /// Fisher-Yates over all 52 positions, then rewind the cursor. Every
    /// permutation is reachable.
    pub fn shuffle(&mut self) {
        for i in (1..self.cards.len()).rev() {
            let j = self.rng.gen_range(0..=i);
            self.cards.swap(i, j);
        }
        self.cursor = 0;
    }

    /// Deal the next card.
    pub fn deal(&mut self) -> Result<Card, EngineError> {
        let card = *self.cards.get(self.cursor).ok_or(EngineError::DeckExhausted)?;
        self.cursor += 1;
        Ok(card)
    }

    /// Advance past the next card without exposing it.
    pub fn burn(&mut self) -> Result<(), EngineError> {
        if self.cursor >= self.cards.len() {
            return Err(EngineError::DeckExhausted);
        }
        self.cursor += 1;
        Ok(())
    }

    /// Cards left to deal.
    pub fn remaining(&self) -> usize {
        self.cards.len() - self.cursor
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

//! Engine error taxonomy.
//!
//! Domain rejections leave the hand state untouched and are surfaced to the
//! offending client only. Invariant violations are fatal for the table.

use felt_types::HandPhase;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("not this player's turn")]
    NotYourTurn,
    #[error("no action is possible in phase {phase:?}")]
    WrongPhase { phase: HandPhase },
    #[error("cannot check while facing a bet")]
    CheckFacingBet,
    #[error("nothing to call")]
    NothingToCall,
    #[error("raise to {to} is below the minimum raise to {min}")]
    BelowMinimumRaise { to: u64, min: u64 },
    #[error("raise to {to} exceeds the player's {available} available")]
    RaiseExceedsStack { to: u64, available: u64 },
    #[error("seat {seat} is empty")]
    EmptySeat { seat: usize },
    #[error("player cannot act in state {state}")]
    PlayerNotActive { state: &'static str },
    #[error("not enough players with chips to start a hand")]
    NotEnoughPlayers,
    #[error("all seats are taken")]
    TableFull,
    #[error("player is already seated at this table")]
    AlreadySeated,
    #[error("insufficient chips")]
    InsufficientChips,
    /// Raising after an all-in below the minimum raise; the street's betting
    /// is capped and only calls, folds, or all-in pushes remain.
    #[error("raising is not reopened after an all-in under-raise")]
    RaiseNotReopened,
    /// Dealing or burning past the end of the deck. Never occurs in a legal
    /// hand; treated as fatal for the table.
    #[error("deck exhausted")]
    DeckExhausted,
    /// Evaluator input outside 5..=7 distinct cards.
    #[error("hand evaluation requires 5 to 7 distinct cards")]
    InvalidHand,
}

impl EngineError {
    /// Whether this error indicates corrupted engine state rather than a
    /// rejected request. The table owning the engine must be terminated.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, EngineError::DeckExhausted | EngineError::InvalidHand)
    }
}

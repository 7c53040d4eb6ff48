//! Game logic for the felt poker platform.
//!
//! This crate is pure and synchronous: the deck, the hand evaluator, the
//! per-hand betting state machine, pot math, and the bot policy. Everything
//! asynchronous (timers, sockets, fan-out) lives in the server crate, which
//! drives a [`HandEngine`] per table and consumes its event stream.

pub mod bot;
pub mod deck;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod pot;

pub use bot::{decide, BotView, Difficulty};
pub use deck::Deck;
pub use engine::{Blind, EngineEvent, HandEngine, Payout};
pub use error::EngineError;
pub use pot::{build_pots, split_amount, Contribution, Pot};

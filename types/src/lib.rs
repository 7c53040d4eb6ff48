//! Shared domain types and wire protocol for the felt poker platform.
//!
//! Everything here is transport-free: cards and hand ranks, seated-player
//! and table records, the JSON envelope protocol, and hand-history layouts.
//! The engine and server crates both build on this vocabulary.

pub mod card;
pub mod constants;
pub mod hand;
pub mod history;
pub mod player;
pub mod protocol;
pub mod table;

pub use card::{Card, ParseCardError, Rank, Suit};
pub use hand::{HandCategory, HandRank};
pub use history::{
    HandHistory, HistoryWinner, PhaseSnapshot, PlayerSnapshot, RecordedAction,
};
pub use player::{Action, ActionKind, LastAction, Player, PlayerState};
pub use protocol::{
    now_ms, ClientFrame, DealPhase, Envelope, Event, ProtocolError, Request, ServerFrame,
    WinnerSummary,
};
pub use table::{
    stake_tier, HandPhase, PotView, RoomInfo, SeatView, TableConfig, TableState, STAKE_TIERS,
};

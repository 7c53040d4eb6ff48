//! Table configuration and the public table views sent to clients.

use crate::card::Card;
use crate::constants;
use crate::player::{LastAction, Player, PlayerState};
use serde::{Deserialize, Serialize};

/// Phases of a single hand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandPhase {
    #[default]
    Waiting,
    Starting,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
    Finished,
}

impl HandPhase {
    /// Whether a hand is currently being played.
    pub fn in_hand(&self) -> bool {
        !matches!(self, HandPhase::Waiting | HandPhase::Finished)
    }
}

/// Static configuration of a table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableConfig {
    pub small_blind: u64,
    pub big_blind: u64,
    pub ante: u64,
    pub max_seats: usize,
    pub min_players: usize,
    /// Seconds a player has to act before being folded/checked.
    pub action_timeout_secs: u64,
    pub is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub auto_start: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            small_blind: constants::DEFAULT_SMALL_BLIND,
            big_blind: constants::DEFAULT_BIG_BLIND,
            ante: 0,
            max_seats: constants::DEFAULT_MAX_SEATS,
            min_players: constants::DEFAULT_MIN_PLAYERS,
            action_timeout_secs: constants::DEFAULT_ACTION_TIMEOUT_SECS,
            is_private: false,
            password: None,
            auto_start: true,
        }
    }
}

impl TableConfig {
    /// A config for the given blind pair with everything else defaulted.
    pub fn with_blinds(small_blind: u64, big_blind: u64) -> Self {
        Self {
            small_blind,
            big_blind,
            ..Self::default()
        }
    }
}

/// The fixed stake tiers offered by quick-match, as `(small, big)` blinds.
pub const STAKE_TIERS: [(u64, u64); 6] = [
    (5, 10),
    (10, 20),
    (25, 50),
    (50, 100),
    (100, 200),
    (250, 500),
];

/// Look up a stake tier by its big blind.
pub fn stake_tier(big_blind: u64) -> Option<(u64, u64)> {
    STAKE_TIERS.iter().copied().find(|(_, bb)| *bb == big_blind)
}

/// One seat as shown to clients. Hole cards are present only in private
/// snapshots for their owner, or at showdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    pub player_id: String,
    pub name: String,
    pub seat: usize,
    pub chips: u64,
    pub street_wager: u64,
    pub hand_wager: u64,
    pub state: PlayerState,
    pub last_action: LastAction,
    pub is_dealer: bool,
    pub is_small_blind: bool,
    pub is_big_blind: bool,
    pub is_bot: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hole_cards: Option<[Card; 2]>,
}

impl SeatView {
    /// Redacted view of a seated player.
    pub fn public(player: &Player) -> Self {
        let mut view = Self::private(player);
        view.hole_cards = None;
        view
    }

    /// View including the player's own hole cards.
    pub fn private(player: &Player) -> Self {
        Self {
            player_id: player.id.clone(),
            name: player.name.clone(),
            seat: player.seat,
            chips: player.chips,
            street_wager: player.street_wager,
            hand_wager: player.hand_wager,
            state: player.state,
            last_action: player.last_action,
            is_dealer: player.is_dealer,
            is_small_blind: player.is_small_blind,
            is_big_blind: player.is_big_blind,
            is_bot: player.is_bot,
            hole_cards: player.hole_cards,
        }
    }
}

/// One pot layer as shown to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PotView {
    pub amount: u64,
    pub eligible: Vec<String>,
    pub is_side: bool,
}

/// The full public state of a table, the `game_state` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    pub table_id: String,
    pub hand_number: u64,
    pub phase: HandPhase,
    pub community: Vec<Card>,
    pub pots: Vec<PotView>,
    pub current_bet: u64,
    pub min_raise: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dealer_seat: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_seat: Option<usize>,
    /// Unix millis deadline for the current actor, if a hand is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_deadline_ms: Option<i64>,
    pub config: TableConfig,
    pub players: Vec<SeatView>,
}

/// Summary of a table in listings and `room_joined` payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: String,
    pub small_blind: u64,
    pub big_blind: u64,
    pub max_seats: usize,
    pub seated: usize,
    pub is_private: bool,
    pub hand_in_progress: bool,
}

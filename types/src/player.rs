//! Seated-player state.

use crate::card::Card;
use serde::{Deserialize, Serialize};

/// Where a player stands within the current hand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// Seated but not dealt into the current hand.
    #[default]
    Waiting,
    /// Dealt in and still able to act.
    Active,
    /// Folded this hand.
    Folded,
    /// All chips committed; no further voluntary actions.
    AllIn,
    /// Sitting out; skipped when dealing.
    SittingOut,
}

/// The most recent thing a player did, for table display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastAction {
    #[default]
    None,
    Fold,
    Check,
    Call,
    Raise,
    AllIn,
    PostSmallBlind,
    PostBigBlind,
}

/// Action verbs as they appear on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Fold,
    Check,
    Call,
    Raise,
    AllIn,
}

/// A betting action submitted to the hand engine.
///
/// `Raise { to }` names the player's total street wager after the raise,
/// not the increment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Fold,
    Check,
    Call,
    Raise { to: u64 },
    AllIn,
}

impl Action {
    /// Split into the wire verb and amount.
    pub fn wire_parts(&self) -> (ActionKind, u64) {
        match self {
            Action::Fold => (ActionKind::Fold, 0),
            Action::Check => (ActionKind::Check, 0),
            Action::Call => (ActionKind::Call, 0),
            Action::Raise { to } => (ActionKind::Raise, *to),
            Action::AllIn => (ActionKind::AllIn, 0),
        }
    }

    /// Build from the wire verb and amount.
    pub fn from_wire(kind: ActionKind, amount: u64) -> Self {
        match kind {
            ActionKind::Fold => Action::Fold,
            ActionKind::Check => Action::Check,
            ActionKind::Call => Action::Call,
            ActionKind::Raise => Action::Raise { to: amount },
            ActionKind::AllIn => Action::AllIn,
        }
    }
}

/// A player occupying a seat. Persists across hands while seated;
/// [`Player::reset_for_hand`] clears the per-hand fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub seat: usize,
    pub chips: u64,
    /// Chips wagered on the current street.
    pub street_wager: u64,
    /// Chips wagered across the whole hand, antes included.
    pub hand_wager: u64,
    pub hole_cards: Option<[Card; 2]>,
    pub state: PlayerState,
    pub last_action: LastAction,
    pub is_dealer: bool,
    pub is_small_blind: bool,
    pub is_big_blind: bool,
    pub is_bot: bool,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>, seat: usize, chips: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            seat,
            chips,
            street_wager: 0,
            hand_wager: 0,
            hole_cards: None,
            state: PlayerState::Waiting,
            last_action: LastAction::None,
            is_dealer: false,
            is_small_blind: false,
            is_big_blind: false,
            is_bot: false,
        }
    }

    pub fn bot(id: impl Into<String>, name: impl Into<String>, seat: usize, chips: u64) -> Self {
        let mut player = Self::new(id, name, seat, chips);
        player.is_bot = true;
        player
    }

    /// Clear per-hand fields at hand start.
    pub fn reset_for_hand(&mut self) {
        self.street_wager = 0;
        self.hand_wager = 0;
        self.hole_cards = None;
        self.last_action = LastAction::None;
        self.is_dealer = false;
        self.is_small_blind = false;
        self.is_big_blind = false;
        if self.state != PlayerState::SittingOut {
            self.state = PlayerState::Waiting;
        }
    }

    /// Whether the player can be dealt into a new hand.
    pub fn can_be_dealt(&self) -> bool {
        self.chips > 0 && self.state != PlayerState::SittingOut
    }

    /// Whether the player still holds live cards (has not folded).
    pub fn in_hand(&self) -> bool {
        matches!(self.state, PlayerState::Active | PlayerState::AllIn)
    }
}

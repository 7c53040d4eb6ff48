//! Hand-history records. Retained in bounded in-memory stores; the layout
//! is plain JSON so an external store can be slotted in without re-mapping.

use crate::card::Card;
use crate::hand::HandCategory;
use crate::player::ActionKind;
use crate::table::HandPhase;
use serde::{Deserialize, Serialize};

/// A player's stack at hand start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub player_id: String,
    pub name: String,
    pub seat: usize,
    pub chips: u64,
    pub is_bot: bool,
}

/// One recorded action within a phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedAction {
    pub player_id: String,
    pub action: ActionKind,
    pub amount: u64,
}

/// The actions taken during one phase of the hand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSnapshot {
    pub phase: HandPhase,
    pub actions: Vec<RecordedAction>,
}

/// A pot award at hand end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryWinner {
    pub player_id: String,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand_type: Option<HandCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<Card>>,
}

/// A complete hand record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandHistory {
    pub id: String,
    pub room_id: String,
    pub hand_number: u64,
    pub start_time: i64,
    pub end_time: i64,
    /// `(small, big)` blinds in force for the hand.
    pub blinds: (u64, u64),
    pub player_snapshots: Vec<PlayerSnapshot>,
    pub phase_snapshots: Vec<PhaseSnapshot>,
    pub community_cards: Vec<Card>,
    pub winners: Vec<HistoryWinner>,
    pub final_pot: u64,
}

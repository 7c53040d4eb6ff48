//! The wire protocol: one JSON envelope per WebSocket frame.
//!
//! ```json
//! { "type": "player_action", "roomId": "…", "playerId": "…",
//!   "data": { "action": "raise", "amount": 60 }, "timestamp": 1700000000000 }
//! ```
//!
//! [`Request`] is the client→server vocabulary, [`Event`] the server→client
//! one. Both are adjacently tagged so the `type`/`data` pair round-trips
//! losslessly: `decode(encode(msg)) == msg` for every valid message.

use crate::card::Card;
use crate::hand::HandCategory;
use crate::player::ActionKind;
use crate::table::{HandPhase, RoomInfo, TableConfig, TableState};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, for envelope timestamps.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Error produced when a frame fails to encode or decode.
#[derive(Debug, thiserror::Error)]
#[error("malformed envelope: {0}")]
pub struct ProtocolError(#[from] serde_json::Error);

/// The JSON envelope wrapping every frame in either direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(flatten)]
    pub payload: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
}

/// A client→server frame.
pub type ClientFrame = Envelope<Request>;
/// A server→client frame.
pub type ServerFrame = Envelope<Event>;

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            room_id: None,
            player_id: None,
            timestamp: now_ms(),
        }
    }

    pub fn in_room(payload: T, room_id: impl Into<String>) -> Self {
        Self {
            room_id: Some(room_id.into()),
            ..Self::new(payload)
        }
    }

    pub fn from_player(payload: T, room_id: impl Into<String>, player_id: impl Into<String>) -> Self {
        Self {
            room_id: Some(room_id.into()),
            player_id: Some(player_id.into()),
            ..Self::new(payload)
        }
    }
}

impl<T: Serialize> Envelope<T> {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<T: for<'de> Deserialize<'de>> Envelope<T> {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Client→server requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Request {
    Ping,
    #[serde(rename_all = "camelCase")]
    Auth { token: String },
    #[serde(rename_all = "camelCase")]
    CreateRoom { config: TableConfig },
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    LeaveRoom,
    #[serde(rename_all = "camelCase")]
    QuickMatch { blind_level: u64 },
    CancelMatch,
    #[serde(rename_all = "camelCase")]
    PlayerAction {
        action: ActionKind,
        #[serde(default)]
        amount: u64,
    },
    #[serde(rename_all = "camelCase")]
    Chat { message: String },
    SitOut,
    SitIn,
    #[serde(rename_all = "camelCase")]
    BuyIn { amount: u64 },
}

/// Which deal a `deal_cards` event carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealPhase {
    /// Hole cards, delivered only to their owner.
    Hole,
    Flop,
    Turn,
    River,
    /// Hole cards revealed to the table at showdown.
    Showdown,
}

impl From<HandPhase> for DealPhase {
    fn from(phase: HandPhase) -> Self {
        match phase {
            HandPhase::Turn => DealPhase::Turn,
            HandPhase::River => DealPhase::River,
            HandPhase::Showdown => DealPhase::Showdown,
            // Community cards first appear on the flop.
            _ => DealPhase::Flop,
        }
    }
}

/// One winner entry in a `hand_result` event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerSummary {
    pub player_id: String,
    pub amount: u64,
    /// Absent when everyone else folded and no hands were evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand_type: Option<HandCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_five: Option<Vec<Card>>,
}

/// Server→client events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    Pong,
    #[serde(rename_all = "camelCase")]
    Connected {
        client_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AuthSuccess {
        player_id: String,
        name: String,
        chips: u64,
    },
    #[serde(rename_all = "camelCase")]
    AuthFailed { error: String },
    #[serde(rename_all = "camelCase")]
    RoomJoined { room_info: RoomInfo },
    RoomLeft,
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player_id: String,
        name: String,
        seat_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: String },
    #[serde(rename_all = "camelCase")]
    GameState { public_state: TableState },
    #[serde(rename_all = "camelCase")]
    YourTurn {
        call_amount: u64,
        min_raise: u64,
        max_raise: u64,
        /// Unix millis by which the player must act.
        deadline: i64,
    },
    #[serde(rename_all = "camelCase")]
    PlayerAction {
        player_id: String,
        action: ActionKind,
        amount: u64,
    },
    #[serde(rename_all = "camelCase")]
    DealCards { phase: DealPhase, cards: Vec<Card> },
    #[serde(rename_all = "camelCase")]
    HandResult { winners: Vec<WinnerSummary> },
    #[serde(rename_all = "camelCase")]
    Chat {
        player_id: String,
        player_name: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip_request(request: Request) {
        let frame = ClientFrame::new(request);
        let encoded = frame.encode().expect("encodes");
        let decoded = ClientFrame::decode(&encoded).expect("decodes");
        assert_eq!(decoded, frame);
    }

    fn round_trip_event(event: Event) {
        let frame = ServerFrame::in_room(event, "room-1");
        let encoded = frame.encode().expect("encodes");
        let decoded = ServerFrame::decode(&encoded).expect("decodes");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_request_round_trips() {
        round_trip_request(Request::Ping);
        round_trip_request(Request::Auth {
            token: "abc.def".into(),
        });
        round_trip_request(Request::CreateRoom {
            config: TableConfig::default(),
        });
        round_trip_request(Request::JoinRoom {
            room_id: "room-9".into(),
            password: Some("hunter2".into()),
        });
        round_trip_request(Request::LeaveRoom);
        round_trip_request(Request::QuickMatch { blind_level: 20 });
        round_trip_request(Request::CancelMatch);
        round_trip_request(Request::PlayerAction {
            action: ActionKind::Raise,
            amount: 60,
        });
        round_trip_request(Request::Chat {
            message: "nh".into(),
        });
        round_trip_request(Request::SitOut);
        round_trip_request(Request::SitIn);
        round_trip_request(Request::BuyIn { amount: 1_000 });
    }

    #[test]
    fn test_event_round_trips() {
        round_trip_event(Event::Pong);
        round_trip_event(Event::YourTurn {
            call_amount: 40,
            min_raise: 20,
            max_raise: 980,
            deadline: 1_700_000_000_000,
        });
        round_trip_event(Event::DealCards {
            phase: DealPhase::Flop,
            cards: vec![
                "2h".parse().unwrap(),
                "3h".parse().unwrap(),
                "4h".parse().unwrap(),
            ],
        });
        round_trip_event(Event::HandResult {
            winners: vec![WinnerSummary {
                player_id: "u1".into(),
                amount: 300,
                hand_type: Some(HandCategory::Flush),
                best_five: None,
            }],
        });
        round_trip_event(Event::Error {
            message: "not your turn".into(),
        });
    }

    #[test]
    fn test_wire_shape() {
        let frame = ClientFrame::new(Request::PlayerAction {
            action: ActionKind::AllIn,
            amount: 0,
        });
        let value: serde_json::Value =
            serde_json::from_str(&frame.encode().expect("encodes")).expect("valid json");
        assert_eq!(value["type"], "player_action");
        assert_eq!(value["data"]["action"], "all_in");
        assert!(value["timestamp"].is_i64());
    }

    #[test]
    fn test_unit_request_omits_data() {
        let frame = ClientFrame::new(Request::Ping);
        let value: serde_json::Value =
            serde_json::from_str(&frame.encode().expect("encodes")).expect("valid json");
        assert_eq!(value["type"], "ping");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        assert!(ClientFrame::decode(r#"{"type":"teleport","timestamp":0}"#).is_err());
        assert!(ClientFrame::decode("not json").is_err());
    }

    #[test]
    fn test_camel_case_fields() {
        let frame = ServerFrame::in_room(
            Event::PlayerJoined {
                player_id: "u1".into(),
                name: "Ada".into(),
                seat_index: 3,
            },
            "room-1",
        );
        let encoded = frame.encode().expect("encodes");
        assert!(encoded.contains("\"roomId\""));
        assert!(encoded.contains("\"playerId\""));
        assert!(encoded.contains("\"seatIndex\""));
    }
}

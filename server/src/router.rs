//! Per-client request dispatch.
//!
//! One [`ClientSession`] lives inside each connection task; requests arrive
//! in order and mutate it. Every reply to the client goes through the hub's
//! outbound queue so ordering with table broadcasts is preserved.

use crate::error::ServerError;
use crate::matchmaker::MatchNotice;
use crate::table::TableHandle;
use crate::AppState;
use felt_types::constants::MAX_CHAT_LENGTH;
use felt_types::{Action, Envelope, Event, Request, TableConfig};
use tokio::sync::mpsc;
use tracing::debug;

/// Minimum bankroll to sit, in big blinds.
const MIN_BUY_IN_BB: u64 = 20;
/// Default buy-in, in big blinds, clamped to the player's balance.
const BUY_IN_BB: u64 = 100;

/// The authenticated identity attached to a connection.
#[derive(Clone, Debug)]
pub struct UserIdentity {
    pub id: String,
    pub name: String,
}

/// Connection-local state.
pub struct ClientSession {
    pub client_id: String,
    pub user: Option<UserIdentity>,
    pub table: Option<TableHandle>,
}

impl ClientSession {
    pub fn new(client_id: String) -> Self {
        Self {
            client_id,
            user: None,
            table: None,
        }
    }

    fn user(&self) -> Result<&UserIdentity, ServerError> {
        self.user.as_ref().ok_or(ServerError::Unauthenticated)
    }

    fn table(&self) -> Result<&TableHandle, ServerError> {
        self.table.as_ref().ok_or(ServerError::NotAtTable)
    }
}

async fn send(state: &AppState, session: &ClientSession, event: Event) {
    state
        .hub
        .unicast(&session.client_id, Envelope::new(event))
        .await;
}

fn default_buy_in(balance: u64, big_blind: u64) -> Result<u64, ServerError> {
    if balance < big_blind * MIN_BUY_IN_BB {
        return Err(ServerError::InsufficientChips);
    }
    Ok(balance.min(big_blind * BUY_IN_BB))
}

fn sanitize_config(state: &AppState, mut config: TableConfig) -> Result<TableConfig, ServerError> {
    if config.small_blind == 0 || config.big_blind <= config.small_blind {
        return Err(ServerError::Protocol("invalid blinds".into()));
    }
    config.max_seats = config.max_seats.clamp(2, state.config.max_players_per_room);
    config.min_players = config.min_players.clamp(2, config.max_seats);
    if config.action_timeout_secs == 0 {
        config.action_timeout_secs = state.config.action_timeout_secs;
    }
    if config.password.is_some() {
        config.is_private = true;
    }
    Ok(config)
}

/// Handle one inbound request. An `Err` becomes an `error` event for this
/// client only; table/room traffic is emitted by the table actors.
pub async fn dispatch(
    state: &AppState,
    session: &mut ClientSession,
    notice_tx: &mpsc::Sender<MatchNotice>,
    request: Request,
) -> Result<(), ServerError> {
    match request {
        Request::Ping => {
            send(state, session, Event::Pong).await;
            Ok(())
        }
        Request::Auth { token } => handle_auth(state, session, &token).await,
        Request::CreateRoom { config } => {
            let user = session.user()?.clone();
            if session.table.is_some() {
                return Err(ServerError::AlreadyAtTable);
            }
            let config = sanitize_config(state, config)?;
            let balance = state
                .users
                .get(&user.id)
                .await
                .ok_or(ServerError::Unauthenticated)?
                .chips;
            let buy_in = default_buy_in(balance, config.big_blind)?;
            let handle = state.registry.create_table(config).await;
            let room_info = handle.join(&user.id, &user.name, buy_in, None).await?;
            enter_room(state, session, handle, room_info).await;
            Ok(())
        }
        Request::JoinRoom { room_id, password } => {
            let user = session.user()?.clone();
            if session.table.is_some() {
                return Err(ServerError::AlreadyAtTable);
            }
            let handle = state
                .registry
                .get(&room_id)
                .await
                .ok_or(ServerError::UnknownTable)?;
            let balance = state
                .users
                .get(&user.id)
                .await
                .ok_or(ServerError::Unauthenticated)?
                .chips;
            let buy_in = default_buy_in(balance, handle.config.big_blind)?;
            let room_info = handle.join(&user.id, &user.name, buy_in, password).await?;
            enter_room(state, session, handle, room_info).await;
            Ok(())
        }
        Request::LeaveRoom => {
            let user = session.user()?.clone();
            let handle = session.table()?.clone();
            handle.leave(&user.id).await?;
            state.hub.leave_room(&session.client_id).await;
            state.ledger.forget(&user.id);
            session.table = None;
            send(state, session, Event::RoomLeft).await;
            Ok(())
        }
        Request::QuickMatch { blind_level } => {
            let user = session.user()?.clone();
            if session.table.is_some() {
                return Err(ServerError::AlreadyAtTable);
            }
            state
                .matchmaker
                .enqueue(&user.id, &user.name, blind_level, notice_tx.clone())
                .await
        }
        Request::CancelMatch => {
            let user = session.user()?;
            state.matchmaker.cancel(&user.id);
            Ok(())
        }
        Request::PlayerAction { action, amount } => {
            let user = session.user()?.clone();
            let handle = session.table()?.clone();
            handle
                .action(&user.id, Action::from_wire(action, amount))
                .await
        }
        Request::Chat { message } => {
            let user = session.user()?.clone();
            let handle = session.table()?.clone();
            let message: String = message.chars().take(MAX_CHAT_LENGTH).collect();
            state
                .hub
                .room_cast(
                    &handle.id,
                    Envelope::from_player(
                        Event::Chat {
                            player_id: user.id.clone(),
                            player_name: user.name.clone(),
                            message,
                        },
                        &handle.id,
                        &user.id,
                    ),
                )
                .await;
            Ok(())
        }
        Request::SitOut => {
            let user = session.user()?.clone();
            session.table()?.clone().sit_out(&user.id).await
        }
        Request::SitIn => {
            let user = session.user()?.clone();
            session.table()?.clone().sit_in(&user.id).await
        }
        Request::BuyIn { amount } => {
            let user = session.user()?.clone();
            session.table()?.clone().buy_in(&user.id, amount).await
        }
    }
}

async fn handle_auth(
    state: &AppState,
    session: &mut ClientSession,
    token: &str,
) -> Result<(), ServerError> {
    let claims = match state.signer.verify(token) {
        Ok(claims) => claims,
        Err(err) => {
            send(
                state,
                session,
                Event::AuthFailed {
                    error: err.client_message(),
                },
            )
            .await;
            return Ok(());
        }
    };
    let Some(user) = state.users.get(&claims.sub).await else {
        send(
            state,
            session,
            Event::AuthFailed {
                error: "unknown user".into(),
            },
        )
        .await;
        return Ok(());
    };

    state.hub.bind_player(&session.client_id, &user.id).await;
    session.user = Some(UserIdentity {
        id: user.id.clone(),
        name: user.name.clone(),
    });
    send(
        state,
        session,
        Event::AuthSuccess {
            player_id: user.id.clone(),
            name: user.name.clone(),
            chips: user.chips,
        },
    )
    .await;

    // A held seat inside the reconnection window restores the table.
    if let Some(held) = state.ledger.claim(&user.id) {
        if let Some(handle) = state.registry.get(&held.table_id).await {
            let still_seated = handle
                .snapshot(None)
                .await
                .map(|s| s.players.iter().any(|p| p.player_id == user.id))
                .unwrap_or(false);
            if still_seated {
                debug!(user = %user.id, table = %held.table_id, seat = held.seat, "re-attached to held seat");
                state.hub.join_room(&session.client_id, &handle.id).await;
                if let Ok(info) = handle.info().await {
                    send(
                        state,
                        session,
                        Event::RoomJoined {
                            room_info: info.room_info,
                        },
                    )
                    .await;
                }
                handle.resend(&user.id).await;
                session.table = Some(handle);
            }
        }
    }
    Ok(())
}

async fn enter_room(
    state: &AppState,
    session: &mut ClientSession,
    handle: TableHandle,
    room_info: felt_types::RoomInfo,
) {
    state.hub.join_room(&session.client_id, &handle.id).await;
    state
        .hub
        .unicast(
            &session.client_id,
            Envelope::in_room(Event::RoomJoined { room_info }, &handle.id),
        )
        .await;
    if let Some(user) = &session.user {
        handle.resend(&user.id).await;
    }
    session.table = Some(handle);
}

/// Resolve a matchmaker notice delivered to this connection.
pub async fn handle_notice(state: &AppState, session: &mut ClientSession, notice: MatchNotice) {
    match notice {
        MatchNotice::Matched { room } => {
            let Some(handle) = state.registry.get(&room.room_id).await else {
                send(
                    state,
                    session,
                    Event::Error {
                        message: "matched table disappeared".into(),
                    },
                )
                .await;
                return;
            };
            enter_room(state, session, handle, room).await;
        }
        MatchNotice::Failed { error } => {
            send(state, session, Event::Error { message: error }).await;
        }
    }
}

/// Tear down a disconnected client: cancel matchmaking and, when seated,
/// hold the seat for the reconnection window instead of leaving the table.
pub async fn disconnect(state: &AppState, session: &ClientSession) {
    state.hub.unregister(&session.client_id).await;
    let Some(user) = &session.user else {
        return;
    };
    state.matchmaker.cancel(&user.id);
    let Some(table) = &session.table else {
        return;
    };
    let snapshot = table.snapshot(None).await.ok();
    let seat = snapshot.as_ref().and_then(|s| {
        s.players
            .iter()
            .find(|p| p.player_id == user.id)
            .map(|p| p.seat)
    });
    if let Some(seat) = seat {
        state.ledger.hold(&user.id, &table.id, seat, snapshot);
    }
}

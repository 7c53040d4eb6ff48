//! Table controller actors.
//!
//! Each table is one tokio task owning a [`HandEngine`]. Every mutation
//! (seat changes, player actions, timer firings) arrives through the
//! table's mailbox, so a hand can never race with itself. The actor
//! translates engine events into protocol broadcasts (redacting hole
//! cards), schedules bot turns and action deadlines, auto-starts hands,
//! and records hand histories.

use crate::error::ServerError;
use crate::history::HistoryStore;
use crate::hub::Hub;
use crate::users::UserStore;
use felt_engine::{bot, Difficulty, EngineEvent, HandEngine, Payout};
use felt_types::constants::{
    BOT_ACTION_DELAY_MAX_MS, BOT_ACTION_DELAY_MIN_MS, HAND_COOLDOWN_SECS,
};
use felt_types::{
    now_ms, Action, DealPhase, Envelope, Event, HandHistory, HandPhase, HistoryWinner,
    PhaseSnapshot, PlayerSnapshot, RecordedAction, RoomInfo, TableConfig, TableState,
    WinnerSummary,
};
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const BOT_NAMES: [&str; 12] = [
    "Mia", "Rex", "Ivy", "Ace", "Lou", "Sky", "Gus", "Zoe", "Max", "Fay", "Ned", "Kit",
];

/// An engine invariant violation buried in a command result, if any.
/// The table must be terminated when one surfaces.
fn fatal_message<T>(result: &Result<T, ServerError>) -> Option<String> {
    match result {
        Err(ServerError::Engine(err)) if err.is_invariant_violation() => Some(err.to_string()),
        _ => None,
    }
}

/// Registry-facing table status.
#[derive(Clone, Debug)]
pub struct TableInfo {
    pub room_info: RoomInfo,
    pub seated_humans: usize,
    pub empty_since: Option<Instant>,
}

pub enum TableCmd {
    Join {
        user_id: String,
        name: String,
        buy_in: u64,
        password: Option<String>,
        resp: oneshot::Sender<Result<RoomInfo, ServerError>>,
    },
    Leave {
        player_id: String,
        resp: oneshot::Sender<Result<(), ServerError>>,
    },
    SitOut {
        player_id: String,
        resp: oneshot::Sender<Result<(), ServerError>>,
    },
    SitIn {
        player_id: String,
        resp: oneshot::Sender<Result<(), ServerError>>,
    },
    BuyIn {
        player_id: String,
        amount: u64,
        resp: oneshot::Sender<Result<(), ServerError>>,
    },
    Action {
        player_id: String,
        action: Action,
        resp: oneshot::Sender<Result<(), ServerError>>,
    },
    Snapshot {
        player_id: Option<String>,
        resp: oneshot::Sender<TableState>,
    },
    Info {
        resp: oneshot::Sender<TableInfo>,
    },
    /// Push the current state (public + private hole cards) to one player;
    /// used when a dropped client re-attaches.
    Resend {
        player_id: String,
    },
    /// Fill empty seats with bots up to `target` seated players.
    FillBots {
        target: usize,
        difficulty: Difficulty,
    },
    StartHand {
        hand_number: u64,
    },
    Deadline {
        token: u64,
    },
    BotTurn {
        token: u64,
    },
    Shutdown,
}

/// Cloneable handle to one table actor.
#[derive(Clone)]
pub struct TableHandle {
    pub id: String,
    pub config: TableConfig,
    tx: mpsc::Sender<TableCmd>,
}

impl TableHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, ServerError>>) -> TableCmd,
    ) -> Result<T, ServerError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(build(resp))
            .await
            .map_err(|_| ServerError::TableClosed)?;
        rx.await.map_err(|_| ServerError::TableClosed)?
    }

    pub async fn join(
        &self,
        user_id: &str,
        name: &str,
        buy_in: u64,
        password: Option<String>,
    ) -> Result<RoomInfo, ServerError> {
        let user_id = user_id.to_string();
        let name = name.to_string();
        self.request(move |resp| TableCmd::Join {
            user_id,
            name,
            buy_in,
            password,
            resp,
        })
        .await
    }

    pub async fn leave(&self, player_id: &str) -> Result<(), ServerError> {
        let player_id = player_id.to_string();
        self.request(move |resp| TableCmd::Leave { player_id, resp })
            .await
    }

    pub async fn sit_out(&self, player_id: &str) -> Result<(), ServerError> {
        let player_id = player_id.to_string();
        self.request(move |resp| TableCmd::SitOut { player_id, resp })
            .await
    }

    pub async fn sit_in(&self, player_id: &str) -> Result<(), ServerError> {
        let player_id = player_id.to_string();
        self.request(move |resp| TableCmd::SitIn { player_id, resp })
            .await
    }

    pub async fn buy_in(&self, player_id: &str, amount: u64) -> Result<(), ServerError> {
        let player_id = player_id.to_string();
        self.request(move |resp| TableCmd::BuyIn {
            player_id,
            amount,
            resp,
        })
        .await
    }

    pub async fn action(&self, player_id: &str, action: Action) -> Result<(), ServerError> {
        let player_id = player_id.to_string();
        self.request(move |resp| TableCmd::Action {
            player_id,
            action,
            resp,
        })
        .await
    }

    pub async fn snapshot(&self, player_id: Option<&str>) -> Result<TableState, ServerError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(TableCmd::Snapshot {
                player_id: player_id.map(str::to_string),
                resp,
            })
            .await
            .map_err(|_| ServerError::TableClosed)?;
        rx.await.map_err(|_| ServerError::TableClosed)
    }

    pub async fn info(&self) -> Result<TableInfo, ServerError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(TableCmd::Info { resp })
            .await
            .map_err(|_| ServerError::TableClosed)?;
        rx.await.map_err(|_| ServerError::TableClosed)
    }

    pub async fn resend(&self, player_id: &str) {
        let _ = self
            .tx
            .send(TableCmd::Resend {
                player_id: player_id.to_string(),
            })
            .await;
    }

    pub async fn fill_bots(&self, target: usize, difficulty: Difficulty) {
        let _ = self
            .tx
            .send(TableCmd::FillBots { target, difficulty })
            .await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(TableCmd::Shutdown).await;
    }
}

/// Spawn a table actor and return its handle.
#[allow(clippy::too_many_arguments)]
pub fn spawn_table(
    id: String,
    config: TableConfig,
    action_timeout: Duration,
    hub: Hub,
    users: UserStore,
    histories: HistoryStore,
    on_closed: mpsc::UnboundedSender<String>,
    seed: Option<u64>,
) -> TableHandle {
    let (tx, rx) = mpsc::channel(256);
    let handle = TableHandle {
        id: id.clone(),
        config: config.clone(),
        tx: tx.clone(),
    };
    let actor = TableActor {
        id,
        engine: HandEngine::new(config, seed),
        action_timeout,
        hub,
        users,
        histories,
        self_tx: tx,
        on_closed,
        turn_token: 0,
        action_deadline_ms: None,
        start_scheduled: false,
        bot_difficulty: Difficulty::Medium,
        empty_since: Some(Instant::now()),
        history: None,
    };
    tokio::spawn(actor.run(rx));
    handle
}

/// In-flight hand-history accumulator.
struct HistoryBuilder {
    hand_number: u64,
    start_time: i64,
    player_snapshots: Vec<PlayerSnapshot>,
    phase_snapshots: Vec<PhaseSnapshot>,
}

struct TableActor {
    id: String,
    engine: HandEngine,
    action_timeout: Duration,
    hub: Hub,
    users: UserStore,
    histories: HistoryStore,
    self_tx: mpsc::Sender<TableCmd>,
    on_closed: mpsc::UnboundedSender<String>,
    /// Monotonic turn counter; a timer firing with a stale token is a no-op.
    turn_token: u64,
    action_deadline_ms: Option<i64>,
    start_scheduled: bool,
    bot_difficulty: Difficulty,
    empty_since: Option<Instant>,
    history: Option<HistoryBuilder>,
}

impl TableActor {
    async fn run(mut self, mut rx: mpsc::Receiver<TableCmd>) {
        info!(table = %self.id, "table actor started");
        while let Some(cmd) = rx.recv().await {
            match cmd {
                TableCmd::Join {
                    user_id,
                    name,
                    buy_in,
                    password,
                    resp,
                } => {
                    let result = self.handle_join(&user_id, &name, buy_in, password).await;
                    let _ = resp.send(result);
                }
                TableCmd::Leave { player_id, resp } => {
                    let result = self.handle_leave(&player_id).await;
                    let fatal = fatal_message(&result);
                    let _ = resp.send(result);
                    if let Some(message) = fatal {
                        self.fail_table(&message).await;
                        break;
                    }
                }
                TableCmd::SitOut { player_id, resp } => {
                    let result = match self.engine.seat_of(&player_id) {
                        Some(seat) => match self.engine.sit_out(seat) {
                            Ok(events) => {
                                self.publish_events(events).await;
                                Ok(())
                            }
                            Err(err) => Err(err.into()),
                        },
                        None => Err(ServerError::NotAtTable),
                    };
                    let fatal = fatal_message(&result);
                    let _ = resp.send(result);
                    if let Some(message) = fatal {
                        self.fail_table(&message).await;
                        break;
                    }
                }
                TableCmd::SitIn { player_id, resp } => {
                    let result = match self.engine.seat_of(&player_id) {
                        Some(seat) => self.engine.sit_in(seat).map_err(Into::into),
                        None => Err(ServerError::NotAtTable),
                    };
                    self.schedule_auto_start();
                    let _ = resp.send(result);
                }
                TableCmd::BuyIn {
                    player_id,
                    amount,
                    resp,
                } => {
                    let result = self.handle_buy_in(&player_id, amount).await;
                    let _ = resp.send(result);
                }
                TableCmd::Action {
                    player_id,
                    action,
                    resp,
                } => {
                    let result = self.handle_action(&player_id, action).await;
                    let fatal = fatal_message(&result);
                    let _ = resp.send(result);
                    if let Some(message) = fatal {
                        self.fail_table(&message).await;
                        break;
                    }
                }
                TableCmd::Snapshot { player_id, resp } => {
                    let state = match player_id {
                        Some(player_id) => self.engine.table_state_for(
                            &self.id,
                            &player_id,
                            self.action_deadline_ms,
                        ),
                        None => self.engine.table_state(&self.id, self.action_deadline_ms),
                    };
                    let _ = resp.send(state);
                }
                TableCmd::Info { resp } => {
                    let _ = resp.send(self.info());
                }
                TableCmd::Resend { player_id } => {
                    let state =
                        self.engine
                            .table_state_for(&self.id, &player_id, self.action_deadline_ms);
                    self.hub
                        .send_to_player(
                            &player_id,
                            Envelope::in_room(Event::GameState { public_state: state }, &self.id),
                        )
                        .await;
                }
                TableCmd::FillBots { target, difficulty } => {
                    self.handle_fill_bots(target, difficulty).await;
                }
                TableCmd::StartHand { hand_number } => {
                    self.start_scheduled = false;
                    if self.engine.hand_number() != hand_number {
                        continue;
                    }
                    if !self.engine.can_start() {
                        continue;
                    }
                    match self.engine.start_hand() {
                        Ok(events) => self.publish_events(events).await,
                        Err(err) if err.is_invariant_violation() => {
                            self.fail_table(&err.to_string()).await;
                            break;
                        }
                        Err(err) => warn!(table = %self.id, %err, "auto-start rejected"),
                    }
                }
                TableCmd::Deadline { token } => {
                    if token != self.turn_token {
                        continue;
                    }
                    if let Err(message) = self.handle_deadline().await {
                        self.fail_table(&message).await;
                        break;
                    }
                }
                TableCmd::BotTurn { token } => {
                    if token != self.turn_token {
                        continue;
                    }
                    if let Err(message) = self.handle_bot_turn().await {
                        self.fail_table(&message).await;
                        break;
                    }
                }
                TableCmd::Shutdown => {
                    debug!(table = %self.id, "table shutting down");
                    break;
                }
            }
        }
        let _ = self.on_closed.send(self.id.clone());
        info!(table = %self.id, "table actor stopped");
    }

    fn info(&self) -> TableInfo {
        TableInfo {
            room_info: RoomInfo {
                room_id: self.id.clone(),
                small_blind: self.engine.config().small_blind,
                big_blind: self.engine.config().big_blind,
                max_seats: self.engine.config().max_seats,
                seated: self.engine.seated_count(),
                is_private: self.engine.config().is_private,
                hand_in_progress: self.engine.phase().in_hand(),
            },
            seated_humans: self.engine.players().filter(|p| !p.is_bot).count(),
            empty_since: self.empty_since,
        }
    }

    fn update_occupancy(&mut self) {
        let humans = self.engine.players().filter(|p| !p.is_bot).count();
        if humans == 0 {
            if self.empty_since.is_none() {
                self.empty_since = Some(Instant::now());
            }
        } else {
            self.empty_since = None;
        }
    }

    async fn handle_join(
        &mut self,
        user_id: &str,
        name: &str,
        buy_in: u64,
        password: Option<String>,
    ) -> Result<RoomInfo, ServerError> {
        let config = self.engine.config();
        if config.is_private {
            if let Some(expected) = &config.password {
                if password.as_deref() != Some(expected.as_str()) {
                    return Err(ServerError::WrongPassword);
                }
            }
        }
        self.users.debit(user_id, buy_in).await?;
        let seat = match self.engine.add_player(user_id, name, buy_in, false) {
            Ok(seat) => seat,
            Err(err) => {
                self.users.credit(user_id, buy_in).await;
                return Err(err.into());
            }
        };
        self.update_occupancy();
        self.hub
            .room_cast(
                &self.id,
                Envelope::in_room(
                    Event::PlayerJoined {
                        player_id: user_id.to_string(),
                        name: name.to_string(),
                        seat_index: seat,
                    },
                    &self.id,
                ),
            )
            .await;
        self.schedule_auto_start();
        Ok(self.info().room_info)
    }

    async fn handle_leave(&mut self, player_id: &str) -> Result<(), ServerError> {
        let seat = self
            .engine
            .seat_of(player_id)
            .ok_or(ServerError::NotAtTable)?;
        let is_bot = self
            .engine
            .player(seat)
            .map(|p| p.is_bot)
            .unwrap_or_default();
        let (chips, events) = self.engine.remove_player(seat)?;
        if !is_bot {
            self.users.credit(player_id, chips).await;
        }
        self.publish_events(events).await;
        self.hub
            .room_cast(
                &self.id,
                Envelope::in_room(
                    Event::PlayerLeft {
                        player_id: player_id.to_string(),
                    },
                    &self.id,
                ),
            )
            .await;
        self.update_occupancy();
        Ok(())
    }

    async fn handle_buy_in(&mut self, player_id: &str, amount: u64) -> Result<(), ServerError> {
        let seat = self
            .engine
            .seat_of(player_id)
            .ok_or(ServerError::NotAtTable)?;
        self.users.debit(player_id, amount).await?;
        if let Err(err) = self.engine.buy_in(seat, amount) {
            self.users.credit(player_id, amount).await;
            return Err(err.into());
        }
        self.broadcast_state().await;
        Ok(())
    }

    async fn handle_action(
        &mut self,
        player_id: &str,
        action: Action,
    ) -> Result<(), ServerError> {
        let seat = self
            .engine
            .seat_of(player_id)
            .ok_or(ServerError::NotAtTable)?;
        let events = self.engine.apply(seat, action)?;
        self.publish_events(events).await;
        Ok(())
    }

    async fn handle_deadline(&mut self) -> Result<(), String> {
        let Some(seat) = self.engine.actor_seat() else {
            return Ok(());
        };
        debug!(table = %self.id, seat, "action deadline elapsed");
        match self.engine.timeout(seat) {
            Ok(events) => {
                self.publish_events(events).await;
                Ok(())
            }
            Err(err) if err.is_invariant_violation() => Err(err.to_string()),
            Err(err) => {
                warn!(table = %self.id, %err, "deadline resolution rejected");
                Ok(())
            }
        }
    }

    async fn handle_bot_turn(&mut self) -> Result<(), String> {
        let Some(seat) = self.engine.actor_seat() else {
            return Ok(());
        };
        let Some(player) = self.engine.player(seat) else {
            return Ok(());
        };
        if !player.is_bot {
            return Ok(());
        }
        let Some(hole) = player.hole_cards else {
            return Ok(());
        };
        let seats = self.engine.config().max_seats;
        let dealer = self
            .engine
            .players()
            .find(|p| p.is_dealer)
            .map(|p| p.seat)
            .unwrap_or(0);
        let in_hand = self.engine.players().filter(|p| p.in_hand()).count();
        let view = bot::BotView {
            hole,
            community: self.engine.community().to_vec(),
            chips: player.chips,
            street_wager: player.street_wager,
            current_bet: self.engine.current_bet(),
            min_raise: self.engine.min_raise(),
            pot: self.engine.pot_total(),
            big_blind: self.engine.config().big_blind,
            opponents: in_hand.saturating_sub(1),
            position: ((seat + seats - dealer) % seats) as f64 / seats as f64,
            raise_allowed: self.engine.raise_allowed(),
        };
        let action = bot::decide(self.bot_difficulty, &view, &mut rand::thread_rng());
        match self.engine.apply(seat, action) {
            Ok(events) => {
                self.publish_events(events).await;
                Ok(())
            }
            Err(err) if err.is_invariant_violation() => Err(err.to_string()),
            Err(err) => {
                // The decider clamps to legality, so a rejection here means
                // the turn moved on; resolve via the timeout path instead.
                warn!(table = %self.id, %err, "bot action rejected");
                self.handle_deadline().await
            }
        }
    }

    async fn handle_fill_bots(&mut self, target: usize, difficulty: Difficulty) {
        self.bot_difficulty = difficulty;
        let max_seats = self.engine.config().max_seats;
        let target = target.min(max_seats);
        let stake = self.engine.config().big_blind;
        let mut index = 0;
        while self.engine.seated_count() < target {
            let id = format!("bot-{}", &Uuid::new_v4().to_string()[..8]);
            let name = format!("{} (bot)", BOT_NAMES[index % BOT_NAMES.len()]);
            index += 1;
            let stack = stake * 100;
            match self.engine.add_player(&id, &name, stack, true) {
                Ok(seat) => {
                    self.hub
                        .room_cast(
                            &self.id,
                            Envelope::in_room(
                                Event::PlayerJoined {
                                    player_id: id,
                                    name,
                                    seat_index: seat,
                                },
                                &self.id,
                            ),
                        )
                        .await;
                }
                Err(err) => {
                    warn!(table = %self.id, %err, "bot fill stopped");
                    break;
                }
            }
        }
        self.broadcast_state().await;
        self.schedule_auto_start();
    }

    fn schedule_auto_start(&mut self) {
        if self.start_scheduled
            || !self.engine.config().auto_start
            || !self.engine.can_start()
        {
            return;
        }
        self.start_scheduled = true;
        let tx = self.self_tx.clone();
        let hand_number = self.engine.hand_number();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(HAND_COOLDOWN_SECS)).await;
            let _ = tx.send(TableCmd::StartHand { hand_number }).await;
        });
    }

    fn arm_deadline_timer(&self) {
        let tx = self.self_tx.clone();
        let token = self.turn_token;
        let timeout = self.action_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(TableCmd::Deadline { token }).await;
        });
    }

    fn arm_bot_timer(&self) {
        let tx = self.self_tx.clone();
        let token = self.turn_token;
        let delay =
            rand::thread_rng().gen_range(BOT_ACTION_DELAY_MIN_MS..=BOT_ACTION_DELAY_MAX_MS);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let _ = tx.send(TableCmd::BotTurn { token }).await;
        });
    }

    /// Turn one batch of engine events into protocol traffic, in order.
    async fn publish_events(&mut self, events: Vec<EngineEvent>) {
        if events.is_empty() {
            return;
        }
        for event in events {
            match event {
                EngineEvent::HandStarted { hand_number, .. } => {
                    self.begin_history(hand_number);
                }
                EngineEvent::BlindPosted { .. } => {}
                EngineEvent::HoleCards {
                    player_id, cards, ..
                } => {
                    self.hub
                        .send_to_player(
                            &player_id,
                            Envelope::from_player(
                                Event::DealCards {
                                    phase: DealPhase::Hole,
                                    cards: cards.to_vec(),
                                },
                                &self.id,
                                &player_id,
                            ),
                        )
                        .await;
                }
                EngineEvent::PhaseChanged { phase } => {
                    if let Some(history) = &mut self.history {
                        if matches!(
                            phase,
                            HandPhase::Preflop
                                | HandPhase::Flop
                                | HandPhase::Turn
                                | HandPhase::River
                        ) {
                            history.phase_snapshots.push(PhaseSnapshot {
                                phase,
                                actions: Vec::new(),
                            });
                        }
                    }
                }
                EngineEvent::CommunityDealt { phase, cards } => {
                    self.hub
                        .room_cast(
                            &self.id,
                            Envelope::in_room(
                                Event::DealCards {
                                    phase: DealPhase::from(phase),
                                    cards,
                                },
                                &self.id,
                            ),
                        )
                        .await;
                }
                EngineEvent::PlayerActed {
                    player_id,
                    action,
                    amount,
                    ..
                } => {
                    if let Some(history) = &mut self.history {
                        if let Some(phase) = history.phase_snapshots.last_mut() {
                            phase.actions.push(RecordedAction {
                                player_id: player_id.clone(),
                                action,
                                amount,
                            });
                        }
                    }
                    self.hub
                        .room_cast(
                            &self.id,
                            Envelope::from_player(
                                Event::PlayerAction {
                                    player_id: player_id.clone(),
                                    action,
                                    amount,
                                },
                                &self.id,
                                &player_id,
                            ),
                        )
                        .await;
                }
                EngineEvent::ActionOn {
                    seat,
                    player_id,
                    call_amount,
                    min_raise_to,
                    max_raise_to,
                } => {
                    self.turn_token += 1;
                    let deadline = now_ms() + self.action_timeout.as_millis() as i64;
                    self.action_deadline_ms = Some(deadline);
                    self.arm_deadline_timer();
                    let is_bot = self
                        .engine
                        .player(seat)
                        .map(|p| p.is_bot)
                        .unwrap_or_default();
                    if is_bot {
                        self.arm_bot_timer();
                    } else {
                        self.hub
                            .send_to_player(
                                &player_id,
                                Envelope::in_room(
                                    Event::YourTurn {
                                        call_amount,
                                        min_raise: min_raise_to,
                                        max_raise: max_raise_to,
                                        deadline,
                                    },
                                    &self.id,
                                ),
                            )
                            .await;
                    }
                }
                EngineEvent::ShowdownReveal {
                    player_id, cards, ..
                } => {
                    self.hub
                        .room_cast(
                            &self.id,
                            Envelope::from_player(
                                Event::DealCards {
                                    phase: DealPhase::Showdown,
                                    cards: cards.to_vec(),
                                },
                                &self.id,
                                &player_id,
                            ),
                        )
                        .await;
                }
                EngineEvent::HandFinished { payouts, pot_total } => {
                    self.turn_token += 1;
                    self.action_deadline_ms = None;
                    self.finish_hand(&payouts, pot_total).await;
                }
            }
        }
        self.broadcast_state().await;
    }

    fn begin_history(&mut self, hand_number: u64) {
        self.history = Some(HistoryBuilder {
            hand_number,
            start_time: now_ms(),
            player_snapshots: self
                .engine
                .players()
                .filter(|p| p.can_be_dealt() || p.in_hand())
                .map(|p| PlayerSnapshot {
                    player_id: p.id.clone(),
                    name: p.name.clone(),
                    seat: p.seat,
                    // Blinds may already be posted; reconstruct the
                    // pre-hand stack.
                    chips: p.chips + p.hand_wager,
                    is_bot: p.is_bot,
                })
                .collect(),
            phase_snapshots: Vec::new(),
        });
    }

    async fn finish_hand(&mut self, payouts: &[Payout], pot_total: u64) {
        // Record the history and stats before announcing the result, so a
        // client that reacts to `hand_result` by fetching its history reads
        // the finished hand.
        if let Some(builder) = self.history.take() {
            let history = HandHistory {
                id: Uuid::new_v4().to_string(),
                room_id: self.id.clone(),
                hand_number: builder.hand_number,
                start_time: builder.start_time,
                end_time: now_ms(),
                blinds: (
                    self.engine.config().small_blind,
                    self.engine.config().big_blind,
                ),
                player_snapshots: builder.player_snapshots.clone(),
                phase_snapshots: builder.phase_snapshots,
                community_cards: self.engine.community().to_vec(),
                winners: payouts
                    .iter()
                    .map(|payout| HistoryWinner {
                        player_id: payout.player_id.clone(),
                        amount: payout.amount,
                        hand_type: payout.hand.as_ref().map(|h| h.category),
                        cards: payout.hand.as_ref().map(|h| h.best_five.to_vec()),
                    })
                    .collect(),
                final_pot: pot_total,
            };
            self.histories.record(history);

            // Lifetime stats for the humans who were dealt in.
            for snapshot in builder
                .player_snapshots
                .iter()
                .filter(|snapshot| !snapshot.is_bot)
            {
                let won = payouts
                    .iter()
                    .find(|p| p.player_id == snapshot.player_id)
                    .map(|p| p.amount)
                    .unwrap_or(0);
                self.users
                    .record_hand(&snapshot.player_id, won, pot_total)
                    .await;
            }
        }

        let winners: Vec<WinnerSummary> = payouts
            .iter()
            .map(|payout| WinnerSummary {
                player_id: payout.player_id.clone(),
                amount: payout.amount,
                hand_type: payout.hand.as_ref().map(|h| h.category),
                best_five: payout.hand.as_ref().map(|h| h.best_five.to_vec()),
            })
            .collect();
        self.hub
            .room_cast(
                &self.id,
                Envelope::in_room(Event::HandResult { winners }, &self.id),
            )
            .await;

        self.update_occupancy();
        self.schedule_auto_start();
    }

    async fn broadcast_state(&self) {
        let state = self.engine.table_state(&self.id, self.action_deadline_ms);
        self.hub
            .room_cast(
                &self.id,
                Envelope::in_room(Event::GameState { public_state: state }, &self.id),
            )
            .await;
    }

    /// Invariant violation: log everything, tell the room, give chips back,
    /// and close.
    async fn fail_table(&mut self, message: &str) {
        let state = self.engine.table_state(&self.id, self.action_deadline_ms);
        error!(table = %self.id, %message, ?state, "table invariant violation; terminating");
        self.hub
            .room_cast(
                &self.id,
                Envelope::in_room(
                    Event::Error {
                        message: format!("table closed: {message}"),
                    },
                    &self.id,
                ),
            )
            .await;
        let refunds: Vec<(String, u64)> = self
            .engine
            .players()
            .filter(|p| !p.is_bot)
            .map(|p| (p.id.clone(), p.chips + p.hand_wager))
            .collect();
        for (user_id, chips) in refunds {
            self.users.credit(&user_id, chips).await;
        }
        self.hub
            .close_room(&self.id, Some(Envelope::in_room(Event::RoomLeft, &self.id)))
            .await;
    }
}

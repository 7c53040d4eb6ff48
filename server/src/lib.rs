//! The felt poker server: connection hub, table actors, registry,
//! matchmaker, reconnection ledger, auth, and the HTTP/WebSocket surface.
//!
//! Services are plain values constructed by [`AppState::new`] and passed by
//! handle; tests build fresh instances and drive them directly.

pub mod auth;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod hub;
pub mod matchmaker;
pub mod registry;
pub mod router;
pub mod session;
pub mod table;
pub mod users;
pub mod ws;

use crate::auth::TokenSigner;
use crate::config::ServerConfig;
use crate::history::HistoryStore;
use crate::hub::Hub;
use crate::matchmaker::Matchmaker;
use crate::registry::Registry;
use crate::session::ReconnectLedger;
use crate::users::UserStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Every service the handlers need, cloneable per request/connection.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub hub: Hub,
    pub users: UserStore,
    pub registry: Registry,
    pub matchmaker: Matchmaker,
    pub ledger: ReconnectLedger,
    pub histories: HistoryStore,
    pub signer: TokenSigner,
}

impl AppState {
    /// Construct every service and start the background tasks (hub
    /// coordinator, table reaper, matchmaker sweeper, session reaper).
    /// Must run inside a tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_intervals(config, Duration::from_secs(60), Duration::from_secs(1))
    }

    /// As [`AppState::new`] with explicit background cadences; tests shrink
    /// them to keep wall-clock time down.
    pub fn with_intervals(
        config: ServerConfig,
        reap_interval: Duration,
        sweep_interval: Duration,
    ) -> Self {
        let hub = Hub::spawn();
        let users = UserStore::new();
        let histories = HistoryStore::new();
        let registry = Registry::new(
            hub.clone(),
            users.clone(),
            histories.clone(),
            config.action_timeout(),
            config.empty_table_ttl(),
            reap_interval,
        );
        let matchmaker = Matchmaker::new(
            registry.clone(),
            users.clone(),
            config.max_players_per_room,
            config.matchmaking_timeout(),
            config.ai_fill_delay(),
            sweep_interval,
        );
        let ledger = ReconnectLedger::new(config.session_timeout());
        let signer = TokenSigner::new(&config.jwt_secret);
        let state = Self {
            config: Arc::new(config),
            hub,
            users,
            registry,
            matchmaker,
            ledger,
            histories,
            signer,
        };
        state.spawn_session_reaper(session::reap_interval());
        state
    }

    fn spawn_session_reaper(&self, interval: Duration) {
        let ledger = self.ledger.clone();
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for held in ledger.take_expired() {
                    info!(
                        user = %held.user_id,
                        table = %held.table_id,
                        "reconnection window expired; removing from table"
                    );
                    if let Some(handle) = registry.get(&held.table_id).await {
                        let _ = handle.leave(&held.user_id).await;
                    }
                }
            }
        });
    }
}

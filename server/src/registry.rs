//! The table registry: create, look up, enumerate, and reap tables.

use crate::error::ServerError;
use crate::history::HistoryStore;
use crate::hub::Hub;
use crate::table::{spawn_table, TableHandle, TableInfo};
use crate::users::UserStore;
use felt_types::{RoomInfo, TableConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct Registry {
    tables: Arc<RwLock<HashMap<String, TableHandle>>>,
    hub: Hub,
    users: UserStore,
    histories: HistoryStore,
    action_timeout: Duration,
    closed_tx: mpsc::UnboundedSender<String>,
}

impl Registry {
    /// Build the registry and start its background tasks: one listening for
    /// closed tables, one reaping tables empty past `empty_ttl`.
    pub fn new(
        hub: Hub,
        users: UserStore,
        histories: HistoryStore,
        action_timeout: Duration,
        empty_ttl: Duration,
        reap_interval: Duration,
    ) -> Self {
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        let registry = Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            hub,
            users,
            histories,
            action_timeout,
            closed_tx,
        };
        registry.spawn_closed_listener(closed_rx);
        registry.spawn_reaper(empty_ttl, reap_interval);
        registry
    }

    fn spawn_closed_listener(&self, mut closed_rx: mpsc::UnboundedReceiver<String>) {
        let tables = self.tables.clone();
        tokio::spawn(async move {
            while let Some(table_id) = closed_rx.recv().await {
                debug!(table = %table_id, "removing closed table");
                tables.write().await.remove(&table_id);
            }
        });
    }

    fn spawn_reaper(&self, empty_ttl: Duration, reap_interval: Duration) {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reap_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let handles: Vec<TableHandle> =
                    registry.tables.read().await.values().cloned().collect();
                for handle in handles {
                    let Ok(info) = handle.info().await else {
                        continue;
                    };
                    if let Some(empty_since) = info.empty_since {
                        if empty_since.elapsed() >= empty_ttl {
                            info!(table = %handle.id, "reaping empty table");
                            handle.shutdown().await;
                        }
                    }
                }
            }
        });
    }

    /// Create a table with explicit configuration.
    pub async fn create_table(&self, config: TableConfig) -> TableHandle {
        let id = Uuid::new_v4().to_string();
        let handle = spawn_table(
            id.clone(),
            config,
            self.action_timeout,
            self.hub.clone(),
            self.users.clone(),
            self.histories.clone(),
            self.closed_tx.clone(),
            None,
        );
        info!(table = %id, "table created");
        self.tables.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, table_id: &str) -> Option<TableHandle> {
        self.tables.read().await.get(table_id).cloned()
    }

    /// Seat a player at a named table.
    pub async fn join_table(
        &self,
        table_id: &str,
        user_id: &str,
        name: &str,
        buy_in: u64,
        password: Option<String>,
    ) -> Result<RoomInfo, ServerError> {
        let handle = self.get(table_id).await.ok_or(ServerError::UnknownTable)?;
        handle.join(user_id, name, buy_in, password).await
    }

    pub async fn leave_table(&self, table_id: &str, player_id: &str) -> Result<(), ServerError> {
        let handle = self.get(table_id).await.ok_or(ServerError::UnknownTable)?;
        handle.leave(player_id).await
    }

    /// Every public table, for the lobby browser.
    pub async fn list_public(&self) -> Vec<RoomInfo> {
        let handles: Vec<TableHandle> = self.tables.read().await.values().cloned().collect();
        let mut rooms = Vec::with_capacity(handles.len());
        for handle in handles {
            if handle.config.is_private {
                continue;
            }
            if let Ok(TableInfo { room_info, .. }) = handle.info().await {
                rooms.push(room_info);
            }
        }
        rooms.sort_by(|a, b| {
            a.big_blind
                .cmp(&b.big_blind)
                .then_with(|| a.room_id.cmp(&b.room_id))
        });
        rooms
    }

    pub async fn table_count(&self) -> usize {
        self.tables.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use felt_types::constants::STARTING_CHIPS;

    async fn fixture(empty_ttl: Duration, reap_interval: Duration) -> (Registry, UserStore) {
        let hub = Hub::spawn();
        let users = UserStore::new();
        let registry = Registry::new(
            hub,
            users.clone(),
            HistoryStore::new(),
            Duration::from_secs(30),
            empty_ttl,
            reap_interval,
        );
        (registry, users)
    }

    #[tokio::test]
    async fn test_create_join_leave() {
        let (registry, users) = fixture(Duration::from_secs(600), Duration::from_secs(600)).await;
        let user = users.register("ada", "pw").await.expect("registers");
        let handle = registry.create_table(TableConfig::default()).await;

        let room = registry
            .join_table(&handle.id, &user.id, &user.name, 2_000, None)
            .await
            .expect("joins");
        assert_eq!(room.seated, 1);
        assert_eq!(
            users.get(&user.id).await.expect("exists").chips,
            STARTING_CHIPS - 2_000
        );

        // Double join is rejected and the debit rolled back.
        let again = registry
            .join_table(&handle.id, &user.id, &user.name, 2_000, None)
            .await;
        assert!(again.is_err());
        assert_eq!(
            users.get(&user.id).await.expect("exists").chips,
            STARTING_CHIPS - 2_000
        );

        registry
            .leave_table(&handle.id, &user.id)
            .await
            .expect("leaves");
        assert_eq!(
            users.get(&user.id).await.expect("exists").chips,
            STARTING_CHIPS
        );
    }

    #[tokio::test]
    async fn test_join_unknown_table() {
        let (registry, users) = fixture(Duration::from_secs(600), Duration::from_secs(600)).await;
        let user = users.register("ada", "pw").await.expect("registers");
        assert_eq!(
            registry
                .join_table("missing", &user.id, &user.name, 1_000, None)
                .await,
            Err(ServerError::UnknownTable)
        );
    }

    #[tokio::test]
    async fn test_private_table_requires_password() {
        let (registry, users) = fixture(Duration::from_secs(600), Duration::from_secs(600)).await;
        let user = users.register("ada", "pw").await.expect("registers");
        let config = TableConfig {
            is_private: true,
            password: Some("sesame".into()),
            ..TableConfig::default()
        };
        let handle = registry.create_table(config).await;

        assert_eq!(
            registry
                .join_table(&handle.id, &user.id, &user.name, 1_000, None)
                .await,
            Err(ServerError::WrongPassword)
        );
        registry
            .join_table(&handle.id, &user.id, &user.name, 1_000, Some("sesame".into()))
            .await
            .expect("correct password joins");

        // Private tables stay out of the public listing.
        assert!(registry.list_public().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_public_orders_by_stakes() {
        let (registry, _) = fixture(Duration::from_secs(600), Duration::from_secs(600)).await;
        registry
            .create_table(TableConfig::with_blinds(50, 100))
            .await;
        registry
            .create_table(TableConfig::with_blinds(5, 10))
            .await;
        let rooms = registry.list_public().await;
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].big_blind, 10);
        assert_eq!(rooms[1].big_blind, 100);
    }

    #[tokio::test]
    async fn test_reaper_removes_empty_tables() {
        let (registry, users) = fixture(Duration::from_millis(50), Duration::from_millis(25)).await;
        let empty = registry.create_table(TableConfig::default()).await;
        let occupied = registry.create_table(TableConfig::default()).await;
        let user = users.register("ada", "pw").await.expect("registers");
        registry
            .join_table(&occupied.id, &user.id, &user.name, 1_000, None)
            .await
            .expect("joins");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(registry.get(&empty.id).await.is_none());
        assert!(registry.get(&occupied.id).await.is_some());
    }
}

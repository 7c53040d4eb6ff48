//! The quick-match matchmaker.
//!
//! Players queue into fixed stake buckets. A background sweeper wakes once
//! per second: buckets with two or more players are drained (up to a full
//! table) into a fresh table; a player who has waited past the matchmaking
//! timeout gets their own table, backfilled with bots after a short delay.
//! Enqueue and cancel share the bucket mutex with batch formation, so a
//! cancelled player can never be matched concurrently.

use crate::error::ServerError;
use crate::registry::Registry;
use crate::table::TableHandle;
use crate::users::UserStore;
use felt_engine::Difficulty;
use felt_types::{stake_tier, RoomInfo, TableConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Minimum balance to queue, in big blinds.
const MIN_BUY_IN_BB: u64 = 20;
/// Standard buy-in, in big blinds, clamped to the player's balance.
const BUY_IN_BB: u64 = 100;
/// Seats a solo player's table is topped up to with bots.
const BOT_FILL_TARGET: usize = 4;

/// Delivered to a queued client when its match resolves.
#[derive(Clone, Debug)]
pub enum MatchNotice {
    Matched { room: RoomInfo },
    Failed { error: String },
}

struct Waiting {
    user_id: String,
    name: String,
    enqueued_at: Instant,
    notify: mpsc::Sender<MatchNotice>,
}

#[derive(Default)]
struct Buckets {
    by_stake: HashMap<u64, Vec<Waiting>>,
}

impl Buckets {
    fn remove_everywhere(&mut self, user_id: &str) -> bool {
        let mut removed = false;
        for bucket in self.by_stake.values_mut() {
            let before = bucket.len();
            bucket.retain(|w| w.user_id != user_id);
            removed |= bucket.len() != before;
        }
        removed
    }
}

#[derive(Clone)]
pub struct Matchmaker {
    buckets: Arc<Mutex<Buckets>>,
    registry: Registry,
    users: UserStore,
    max_seats: usize,
    timeout: Duration,
    ai_fill_delay: Duration,
}

impl Matchmaker {
    /// Build the matchmaker and start its sweeper.
    pub fn new(
        registry: Registry,
        users: UserStore,
        max_seats: usize,
        timeout: Duration,
        ai_fill_delay: Duration,
        sweep_interval: Duration,
    ) -> Self {
        let matchmaker = Self {
            buckets: Arc::new(Mutex::new(Buckets::default())),
            registry,
            users,
            max_seats,
            timeout,
            ai_fill_delay,
        };
        matchmaker.spawn_sweeper(sweep_interval);
        matchmaker
    }

    /// Queue a player for the given stake (identified by big blind).
    /// Re-entry is idempotent; entering a different bucket moves the player.
    pub async fn enqueue(
        &self,
        user_id: &str,
        name: &str,
        big_blind: u64,
        notify: mpsc::Sender<MatchNotice>,
    ) -> Result<(), ServerError> {
        let (_, big_blind) = stake_tier(big_blind).ok_or(ServerError::UnknownStakeLevel)?;
        let balance = self
            .users
            .get(user_id)
            .await
            .ok_or(ServerError::InvalidCredentials)?
            .chips;
        if balance < big_blind * MIN_BUY_IN_BB {
            return Err(ServerError::InsufficientChips);
        }

        let mut buckets = self.buckets.lock().expect("bucket lock");
        let already_queued = buckets
            .by_stake
            .get(&big_blind)
            .is_some_and(|bucket| bucket.iter().any(|w| w.user_id == user_id));
        if already_queued {
            debug!(user = %user_id, big_blind, "already queued; enqueue is a no-op");
            return Ok(());
        }
        buckets.remove_everywhere(user_id);
        buckets.by_stake.entry(big_blind).or_default().push(Waiting {
            user_id: user_id.to_string(),
            name: name.to_string(),
            enqueued_at: Instant::now(),
            notify,
        });
        debug!(user = %user_id, big_blind, "queued for quick match");
        Ok(())
    }

    /// Remove a player from their bucket. A no-op when not queued.
    pub fn cancel(&self, user_id: &str) {
        let mut buckets = self.buckets.lock().expect("bucket lock");
        if buckets.remove_everywhere(user_id) {
            debug!(user = %user_id, "left matchmaking");
        }
    }

    pub fn queued_count(&self) -> usize {
        let buckets = self.buckets.lock().expect("bucket lock");
        buckets.by_stake.values().map(Vec::len).sum()
    }

    fn spawn_sweeper(&self, sweep_interval: Duration) {
        let matchmaker = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                matchmaker.sweep().await;
            }
        });
    }

    /// One pass over all buckets: batch full groups, rescue timed-out solo
    /// players with bot tables.
    async fn sweep(&self) {
        // Decide under the lock, act outside it.
        let mut batches: Vec<(u64, Vec<Waiting>)> = Vec::new();
        let mut solos: Vec<(u64, Waiting)> = Vec::new();
        {
            let mut buckets = self.buckets.lock().expect("bucket lock");
            for (&big_blind, bucket) in buckets.by_stake.iter_mut() {
                if bucket.len() >= 2 {
                    let take = bucket.len().min(self.max_seats);
                    batches.push((big_blind, bucket.drain(..take).collect()));
                } else if bucket
                    .first()
                    .is_some_and(|w| w.enqueued_at.elapsed() >= self.timeout)
                {
                    let waiting = bucket.remove(0);
                    solos.push((big_blind, waiting));
                }
            }
        }

        for (big_blind, group) in batches {
            self.open_table(big_blind, group, false).await;
        }
        for (big_blind, waiting) in solos {
            info!(user = %waiting.user_id, big_blind, "matchmaking timed out; building bot table");
            self.open_table(big_blind, vec![waiting], true).await;
        }
    }

    async fn open_table(&self, big_blind: u64, group: Vec<Waiting>, backfill_bots: bool) {
        let small_blind = big_blind / 2;
        let config = TableConfig {
            max_seats: self.max_seats,
            // Quick-match tables are not listed in the lobby browser.
            is_private: true,
            ..TableConfig::with_blinds(small_blind, big_blind)
        };
        let handle = self.registry.create_table(config).await;

        let mut seated = 0;
        for waiting in group {
            match self.seat(&handle, &waiting, big_blind).await {
                Ok(room) => {
                    seated += 1;
                    if waiting
                        .notify
                        .send(MatchNotice::Matched { room })
                        .await
                        .is_err()
                    {
                        // The client vanished between queueing and seating;
                        // free the seat again.
                        warn!(user = %waiting.user_id, "matched client gone; unseating");
                        let _ = handle.leave(&waiting.user_id).await;
                        seated -= 1;
                    }
                }
                Err(err) => {
                    let _ = waiting
                        .notify
                        .send(MatchNotice::Failed {
                            error: err.client_message(),
                        })
                        .await;
                }
            }
        }

        if seated == 0 {
            handle.shutdown().await;
            return;
        }
        if backfill_bots {
            let fill_delay = self.ai_fill_delay;
            let target = BOT_FILL_TARGET.min(self.max_seats);
            let handle = handle.clone();
            tokio::spawn(async move {
                tokio::time::sleep(fill_delay).await;
                handle.fill_bots(target, Difficulty::Medium).await;
            });
        }
    }

    async fn seat(
        &self,
        handle: &TableHandle,
        waiting: &Waiting,
        big_blind: u64,
    ) -> Result<RoomInfo, ServerError> {
        let balance = self
            .users
            .get(&waiting.user_id)
            .await
            .ok_or(ServerError::InvalidCredentials)?
            .chips;
        if balance < big_blind * MIN_BUY_IN_BB {
            return Err(ServerError::InsufficientChips);
        }
        let buy_in = balance.min(big_blind * BUY_IN_BB);
        handle
            .join(&waiting.user_id, &waiting.name, buy_in, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use crate::hub::Hub;

    fn services() -> (Registry, UserStore) {
        let hub = Hub::spawn();
        let users = UserStore::new();
        let registry = Registry::new(
            hub,
            users.clone(),
            HistoryStore::new(),
            Duration::from_secs(30),
            Duration::from_secs(600),
            Duration::from_secs(600),
        );
        (registry, users)
    }

    fn matchmaker(
        registry: Registry,
        users: UserStore,
        timeout: Duration,
        fill_delay: Duration,
    ) -> Matchmaker {
        Matchmaker::new(
            registry,
            users,
            6,
            timeout,
            fill_delay,
            Duration::from_millis(20),
        )
    }

    #[tokio::test]
    async fn test_two_players_get_batched() {
        let (registry, users) = services();
        let mm = matchmaker(
            registry.clone(),
            users.clone(),
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        let ada = users.register("ada", "pw").await.expect("registers");
        let bob = users.register("bob", "pw").await.expect("registers");
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);

        mm.enqueue(&ada.id, &ada.name, 20, tx_a).await.expect("queues");
        mm.enqueue(&bob.id, &bob.name, 20, tx_b).await.expect("queues");

        let notice = tokio::time::timeout(Duration::from_secs(2), rx_a.recv())
            .await
            .expect("matched in time")
            .expect("notice");
        let MatchNotice::Matched { room } = notice else {
            panic!("expected a match");
        };
        assert_eq!(room.big_blind, 20);
        let other = tokio::time::timeout(Duration::from_secs(2), rx_b.recv())
            .await
            .expect("matched in time")
            .expect("notice");
        let MatchNotice::Matched { room: other_room } = other else {
            panic!("expected a match");
        };
        assert_eq!(other_room.room_id, room.room_id);
        assert_eq!(mm.queued_count(), 0);

        // Both actually hold seats.
        let handle = registry.get(&room.room_id).await.expect("table exists");
        let info = handle.info().await.expect("info");
        assert_eq!(info.room_info.seated, 2);
    }

    #[tokio::test]
    async fn test_solo_timeout_builds_bot_table() {
        let (registry, users) = services();
        let mm = matchmaker(
            registry.clone(),
            users.clone(),
            Duration::from_millis(50),
            Duration::from_millis(20),
        );
        let ada = users.register("ada", "pw").await.expect("registers");
        let (tx, mut rx) = mpsc::channel(4);
        mm.enqueue(&ada.id, &ada.name, 10, tx).await.expect("queues");

        let notice = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("rescued in time")
            .expect("notice");
        let MatchNotice::Matched { room } = notice else {
            panic!("expected a match");
        };
        let handle = registry.get(&room.room_id).await.expect("table exists");

        // Bots arrive after the fill delay and a hand auto-starts.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let info = handle.info().await.expect("info");
        assert!(info.room_info.seated >= 2, "bots should have joined");
        assert_eq!(info.seated_humans, 1);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_race_free() {
        let (registry, users) = services();
        let mm = matchmaker(
            registry,
            users.clone(),
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        let ada = users.register("ada", "pw").await.expect("registers");
        let (tx, _rx) = mpsc::channel(4);

        // Cancelling a player who never queued is a no-op.
        mm.cancel(&ada.id);

        mm.enqueue(&ada.id, &ada.name, 20, tx.clone()).await.expect("queues");
        // Re-entry is idempotent.
        mm.enqueue(&ada.id, &ada.name, 20, tx).await.expect("queues");
        assert_eq!(mm.queued_count(), 1);

        mm.cancel(&ada.id);
        assert_eq!(mm.queued_count(), 0);
        mm.cancel(&ada.id);
    }

    #[tokio::test]
    async fn test_switching_buckets_moves_the_player() {
        let (registry, users) = services();
        let mm = matchmaker(
            registry,
            users.clone(),
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        let ada = users.register("ada", "pw").await.expect("registers");
        let (tx, _rx) = mpsc::channel(4);
        mm.enqueue(&ada.id, &ada.name, 10, tx.clone()).await.expect("queues");
        mm.enqueue(&ada.id, &ada.name, 20, tx).await.expect("queues");
        assert_eq!(mm.queued_count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_unknown_stake_and_short_bankroll() {
        let (registry, users) = services();
        let mm = matchmaker(
            registry,
            users.clone(),
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        let ada = users.register("ada", "pw").await.expect("registers");
        let (tx, _rx) = mpsc::channel(4);
        assert_eq!(
            mm.enqueue(&ada.id, &ada.name, 37, tx.clone()).await,
            Err(ServerError::UnknownStakeLevel)
        );
        // The 250/500 tier wants 20 big blinds behind; drain the bankroll
        // below that first.
        users.debit(&ada.id, 5_000).await.expect("debits");
        assert_eq!(
            mm.enqueue(&ada.id, &ada.name, 500, tx).await,
            Err(ServerError::InsufficientChips)
        );
    }
}

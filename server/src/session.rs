//! The reconnection ledger.
//!
//! When a seated client drops, its seat is held for a grace window keyed by
//! user id. Re-authenticating inside the window re-attaches the client to
//! the same table and seat; expiry hands the seat back to the table (fold +
//! leave), driven by a periodic reaper.

use felt_types::constants::{SESSION_REAP_INTERVAL_SECS, SESSION_TIMEOUT_SECS};
use felt_types::TableState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// A held seat for a disconnected player.
#[derive(Clone, Debug, PartialEq)]
pub struct HeldSeat {
    pub user_id: String,
    pub table_id: String,
    pub seat: usize,
    pub disconnect_at: Instant,
    pub expires_at: Instant,
    /// The table as the player last saw it, for diagnostics; re-attach
    /// always delivers a fresh snapshot.
    pub last_state: Option<TableState>,
}

#[derive(Clone)]
pub struct ReconnectLedger {
    inner: Arc<Mutex<HashMap<String, HeldSeat>>>,
    window: Duration,
}

impl ReconnectLedger {
    pub fn new(window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            window,
        }
    }

    /// Hold a seat for a player who just dropped.
    pub fn hold(&self, user_id: &str, table_id: &str, seat: usize, last_state: Option<TableState>) {
        let now = Instant::now();
        let held = HeldSeat {
            user_id: user_id.to_string(),
            table_id: table_id.to_string(),
            seat,
            disconnect_at: now,
            expires_at: now + self.window,
            last_state,
        };
        debug!(user = %user_id, table = %table_id, seat, "holding seat for reconnection");
        self.inner.lock().expect("ledger lock").insert(user_id.to_string(), held);
    }

    /// Claim a held seat on re-authentication. Returns `None` if no seat is
    /// held or the window has elapsed (the reaper will clean the latter up).
    pub fn claim(&self, user_id: &str) -> Option<HeldSeat> {
        let mut ledger = self.inner.lock().expect("ledger lock");
        let held = ledger.get(user_id)?;
        if held.expires_at <= Instant::now() {
            return None;
        }
        ledger.remove(user_id)
    }

    /// Drop a hold without claiming it (player left explicitly).
    pub fn forget(&self, user_id: &str) {
        self.inner.lock().expect("ledger lock").remove(user_id);
    }

    /// Remove and return every expired hold.
    pub fn take_expired(&self) -> Vec<HeldSeat> {
        let now = Instant::now();
        let mut ledger = self.inner.lock().expect("ledger lock");
        let expired: Vec<String> = ledger
            .values()
            .filter(|h| h.expires_at <= now)
            .map(|h| h.user_id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|user_id| ledger.remove(&user_id))
            .collect()
    }

    pub fn held_count(&self) -> usize {
        self.inner.lock().expect("ledger lock").len()
    }
}

impl Default for ReconnectLedger {
    fn default() -> Self {
        Self::new(Duration::from_secs(SESSION_TIMEOUT_SECS))
    }
}

/// Reap interval for the background sweeper.
pub fn reap_interval() -> Duration {
    Duration::from_secs(SESSION_REAP_INTERVAL_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_inside_window_restores_seat() {
        let ledger = ReconnectLedger::new(Duration::from_secs(60));
        ledger.hold("u1", "t1", 3, None);
        let held = ledger.claim("u1").expect("seat held");
        assert_eq!(held.table_id, "t1");
        assert_eq!(held.seat, 3);
        // Claim consumes the hold.
        assert!(ledger.claim("u1").is_none());
    }

    #[test]
    fn test_expired_hold_cannot_be_claimed() {
        let ledger = ReconnectLedger::new(Duration::from_millis(0));
        ledger.hold("u1", "t1", 3, None);
        assert!(ledger.claim("u1").is_none());
        let expired = ledger.take_expired();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].user_id, "u1");
        assert_eq!(ledger.held_count(), 0);
    }

    #[test]
    fn test_reap_leaves_fresh_holds() {
        let ledger = ReconnectLedger::new(Duration::from_secs(60));
        ledger.hold("u1", "t1", 0, None);
        assert!(ledger.take_expired().is_empty());
        assert_eq!(ledger.held_count(), 1);
    }

    #[test]
    fn test_forget_is_idempotent() {
        let ledger = ReconnectLedger::new(Duration::from_secs(60));
        ledger.hold("u1", "t1", 0, None);
        ledger.forget("u1");
        ledger.forget("u1");
        assert_eq!(ledger.held_count(), 0);
    }
}

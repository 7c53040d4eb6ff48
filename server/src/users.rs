//! In-memory user accounts: registration, login, guests, chip balances,
//! per-user stats, the daily bonus, and the leaderboard query.
//!
//! The store is the single owner of off-table chip balances. Seating at a
//! table debits the buy-in; leaving credits the stack back. Table actors
//! never touch balances directly while holding their own state.

use crate::error::ServerError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use felt_types::constants::{DAILY_BONUS_CHIPS, MAX_NAME_LENGTH, STARTING_CHIPS};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Per-user lifetime statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub hands_played: u64,
    pub hands_won: u64,
    pub biggest_pot: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    password_hash: Option<String>,
    pub chips: u64,
    pub stats: UserStats,
    pub is_guest: bool,
    pub created_at: i64,
    last_daily: Option<i64>,
}

/// A leaderboard row.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub player_id: String,
    pub name: String,
    pub chips: u64,
    pub hands_won: u64,
}

#[derive(Clone, Default)]
pub struct UserStore {
    inner: Arc<RwLock<HashMap<String, UserRecord>>>,
}

fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn validate_name(name: &str) -> Result<(), ServerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_NAME_LENGTH {
        return Err(ServerError::InvalidName);
    }
    Ok(())
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named account with a starting chip grant.
    pub async fn register(&self, name: &str, password: &str) -> Result<UserRecord, ServerError> {
        validate_name(name)?;
        let mut users = self.inner.write().await;
        if users.values().any(|u| u.name == name) {
            return Err(ServerError::NameTaken);
        }
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            password_hash: Some(hash_password(password)),
            chips: STARTING_CHIPS,
            stats: UserStats::default(),
            is_guest: false,
            created_at: unix_now(),
            last_daily: None,
        };
        users.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    pub async fn login(&self, name: &str, password: &str) -> Result<UserRecord, ServerError> {
        let users = self.inner.read().await;
        users
            .values()
            .find(|u| u.name == name && u.password_hash.as_deref() == Some(&hash_password(password)))
            .cloned()
            .ok_or(ServerError::InvalidCredentials)
    }

    /// Issue a throwaway guest account.
    pub async fn guest(&self, name: Option<&str>) -> Result<UserRecord, ServerError> {
        let id = Uuid::new_v4().to_string();
        let name = match name {
            Some(name) => {
                validate_name(name)?;
                name.trim().to_string()
            }
            None => format!("Guest-{}", &id[..8]),
        };
        let record = UserRecord {
            id: id.clone(),
            name,
            password_hash: None,
            chips: STARTING_CHIPS,
            stats: UserStats::default(),
            is_guest: true,
            created_at: unix_now(),
            last_daily: None,
        };
        self.inner.write().await.insert(id, record.clone());
        Ok(record)
    }

    pub async fn get(&self, user_id: &str) -> Option<UserRecord> {
        self.inner.read().await.get(user_id).cloned()
    }

    pub async fn rename(&self, user_id: &str, name: &str) -> Result<UserRecord, ServerError> {
        validate_name(name)?;
        let mut users = self.inner.write().await;
        if users.values().any(|u| u.name == name && u.id != user_id) {
            return Err(ServerError::NameTaken);
        }
        let record = users
            .get_mut(user_id)
            .ok_or(ServerError::InvalidCredentials)?;
        record.name = name.trim().to_string();
        Ok(record.clone())
    }

    /// Reserve chips for a table buy-in.
    pub async fn debit(&self, user_id: &str, amount: u64) -> Result<u64, ServerError> {
        let mut users = self.inner.write().await;
        let record = users
            .get_mut(user_id)
            .ok_or(ServerError::InvalidCredentials)?;
        if record.chips < amount {
            return Err(ServerError::InsufficientChips);
        }
        record.chips -= amount;
        Ok(record.chips)
    }

    /// Return chips to a balance (leaving a table, table teardown).
    pub async fn credit(&self, user_id: &str, amount: u64) {
        if let Some(record) = self.inner.write().await.get_mut(user_id) {
            record.chips += amount;
        }
    }

    /// Grant the daily bonus once per 24 hours.
    pub async fn claim_daily(&self, user_id: &str) -> Result<Option<u64>, ServerError> {
        let mut users = self.inner.write().await;
        let record = users
            .get_mut(user_id)
            .ok_or(ServerError::InvalidCredentials)?;
        let now = unix_now();
        if let Some(last) = record.last_daily {
            if now - last < 24 * 60 * 60 {
                return Ok(None);
            }
        }
        record.last_daily = Some(now);
        record.chips += DAILY_BONUS_CHIPS;
        Ok(Some(record.chips))
    }

    /// Record the outcome of one hand for a (human) participant.
    pub async fn record_hand(&self, user_id: &str, won: u64, pot: u64) {
        if let Some(record) = self.inner.write().await.get_mut(user_id) {
            record.stats.hands_played += 1;
            if won > 0 {
                record.stats.hands_won += 1;
            }
            if pot > record.stats.biggest_pot {
                record.stats.biggest_pot = pot;
            }
        }
    }

    /// Top `limit` balances. Seated chips are out of the balance while a
    /// player sits, so the board reflects bankable chips only.
    pub async fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let users = self.inner.read().await;
        let mut entries: Vec<LeaderboardEntry> = users
            .values()
            .map(|u| LeaderboardEntry {
                player_id: u.id.clone(),
                name: u.name.clone(),
                chips: u.chips,
                hands_won: u.stats.hands_won,
            })
            .collect();
        entries.sort_by(|a, b| b.chips.cmp(&a.chips).then_with(|| a.name.cmp(&b.name)));
        entries.truncate(limit);
        entries
    }
}

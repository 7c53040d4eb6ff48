//! Bounded in-memory hand-history retention, per table and per user.

use felt_types::constants::MAX_HISTORIES;
use felt_types::HandHistory;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct HistoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    by_table: HashMap<String, VecDeque<HandHistory>>,
    by_user: HashMap<String, VecDeque<HandHistory>>,
}

fn push_bounded(queue: &mut VecDeque<HandHistory>, history: HandHistory) {
    if queue.len() >= MAX_HISTORIES {
        queue.pop_front();
    }
    queue.push_back(history);
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished hand under its table and each participant.
    pub fn record(&self, history: HandHistory) {
        let mut inner = self.inner.lock().expect("history lock");
        for snapshot in &history.player_snapshots {
            if snapshot.is_bot {
                continue;
            }
            push_bounded(
                inner.by_user.entry(snapshot.player_id.clone()).or_default(),
                history.clone(),
            );
        }
        push_bounded(
            inner.by_table.entry(history.room_id.clone()).or_default(),
            history,
        );
    }

    pub fn for_table(&self, table_id: &str) -> Vec<HandHistory> {
        let inner = self.inner.lock().expect("history lock");
        inner
            .by_table
            .get(table_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn for_user(&self, user_id: &str) -> Vec<HandHistory> {
        let inner = self.inner.lock().expect("history lock");
        inner
            .by_user
            .get(user_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }
}

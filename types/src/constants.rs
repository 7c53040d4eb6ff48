//! Platform-wide defaults. Server configuration may override the
//! deployment-tunable ones; the rest are protocol constants.

/// Maximum display-name length accepted at registration.
pub const MAX_NAME_LENGTH: usize = 32;

/// Maximum chat message length; longer messages are truncated.
pub const MAX_CHAT_LENGTH: usize = 256;

/// Chips granted to a new (or guest) account.
pub const STARTING_CHIPS: u64 = 10_000;

/// Chips granted by the daily bonus.
pub const DAILY_BONUS_CHIPS: u64 = 1_000;

/// Default blinds for tables created without explicit configuration.
pub const DEFAULT_SMALL_BLIND: u64 = 10;
pub const DEFAULT_BIG_BLIND: u64 = 20;

/// Default seat count per table.
pub const DEFAULT_MAX_SEATS: usize = 9;

/// Minimum players required to start a hand.
pub const DEFAULT_MIN_PLAYERS: usize = 2;

/// Seconds a player has to act before the engine folds/checks for them.
pub const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 30;

/// Seconds a queued player waits before the matchmaker builds a bot table.
pub const DEFAULT_MATCHMAKING_TIMEOUT_SECS: u64 = 60;

/// Bounds of the delay before bots fill a quick-match table, in seconds.
pub const AI_FILL_DELAY_MIN_SECS: u64 = 5;
pub const AI_FILL_DELAY_MAX_SECS: u64 = 10;

/// Bounds of the humanizing delay before a bot acts, in milliseconds.
pub const BOT_ACTION_DELAY_MIN_MS: u64 = 500;
pub const BOT_ACTION_DELAY_MAX_MS: u64 = 1_500;

/// Cooldown between a finished hand and the automatic next deal, in seconds.
pub const HAND_COOLDOWN_SECS: u64 = 3;

/// Seconds a disconnected player's seat is retained for reconnection.
pub const SESSION_TIMEOUT_SECS: u64 = 5 * 60;

/// Period of the reconnection-ledger reaper, in seconds.
pub const SESSION_REAP_INTERVAL_SECS: u64 = 30;

/// Seconds an empty table survives before the registry reaps it.
pub const EMPTY_TABLE_TTL_SECS: u64 = 10 * 60;

/// Server ping interval and pong deadline, in seconds.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 54;
pub const PONG_DEADLINE_SECS: u64 = 60;

/// Bound of each client's outbound queue; a full queue closes the client.
pub const CLIENT_SEND_QUEUE: usize = 256;

/// Hand histories retained per table and per user.
pub const MAX_HISTORIES: usize = 50;

/// Seconds allowed for in-flight sends to drain at shutdown.
pub const SHUTDOWN_DRAIN_SECS: u64 = 30;

//! Server configuration.
//!
//! Every deployment knob arrives through the environment (or the matching
//! CLI flag); defaults come from the shared platform constants.

use clap::Parser;
use felt_types::constants;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "felt poker server", long_about = None)]
pub struct ServerConfig {
    /// Socket address the server binds.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:8080")]
    pub server_addr: String,

    /// HMAC secret for bearer tokens. Override in any real deployment.
    #[arg(long, env = "JWT_SECRET", default_value = "felt-dev-secret")]
    pub jwt_secret: String,

    /// Blinds for tables created without explicit configuration.
    #[arg(long, env = "DEFAULT_SMALL_BLIND", default_value_t = constants::DEFAULT_SMALL_BLIND)]
    pub default_small_blind: u64,
    #[arg(long, env = "DEFAULT_BIG_BLIND", default_value_t = constants::DEFAULT_BIG_BLIND)]
    pub default_big_blind: u64,

    /// Seats per table.
    #[arg(long, env = "MAX_PLAYERS_PER_ROOM", default_value_t = constants::DEFAULT_MAX_SEATS)]
    pub max_players_per_room: usize,

    /// Seconds a player has to act before being folded or checked.
    #[arg(long, env = "ACTION_TIMEOUT", default_value_t = constants::DEFAULT_ACTION_TIMEOUT_SECS)]
    pub action_timeout_secs: u64,

    /// Seconds a queued player waits before bots fill a table for them.
    #[arg(long, env = "MATCHMAKING_TIMEOUT", default_value_t = constants::DEFAULT_MATCHMAKING_TIMEOUT_SECS)]
    pub matchmaking_timeout_secs: u64,

    /// Seconds between a solo match timing out and bots joining.
    #[arg(long, env = "AI_FILL_DELAY", default_value_t = constants::AI_FILL_DELAY_MIN_SECS)]
    pub ai_fill_delay_secs: u64,

    /// Seconds a disconnected player's seat is retained.
    #[arg(long, env = "SESSION_TIMEOUT", default_value_t = constants::SESSION_TIMEOUT_SECS)]
    pub session_timeout_secs: u64,

    /// Seconds an empty table survives before being reaped.
    #[arg(long, env = "EMPTY_TABLE_TTL", default_value_t = constants::EMPTY_TABLE_TTL_SECS)]
    pub empty_table_ttl_secs: u64,
}

impl ServerConfig {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    pub fn matchmaking_timeout(&self) -> Duration {
        Duration::from_secs(self.matchmaking_timeout_secs)
    }

    pub fn ai_fill_delay(&self) -> Duration {
        Duration::from_secs(self.ai_fill_delay_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn empty_table_ttl(&self) -> Duration {
        Duration::from_secs(self.empty_table_ttl_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        // Defaults only; used by tests that construct services directly.
        Self::parse_from(["felt-server"])
    }
}

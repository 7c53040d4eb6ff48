//! Server-side error taxonomy.
//!
//! Everything a client can trigger maps onto one of these; the dispatch
//! layer turns them into `error` events for the offending client only.
//! Engine invariant violations are detected separately and terminate the
//! affected table.

use felt_engine::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    // Protocol errors.
    #[error("malformed message: {0}")]
    Protocol(String),

    // Authorization errors.
    #[error("authentication required")]
    Unauthenticated,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("name already taken")]
    NameTaken,
    #[error("invalid name")]
    InvalidName,

    // Domain rejections.
    #[error("unknown table")]
    UnknownTable,
    #[error("wrong password")]
    WrongPassword,
    #[error("not seated at a table")]
    NotAtTable,
    #[error("already seated at a table")]
    AlreadyAtTable,
    #[error("insufficient chips")]
    InsufficientChips,
    #[error("unknown stake level")]
    UnknownStakeLevel,
    #[error("table is closed")]
    TableClosed,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ServerError {
    /// The message carried by the protocol `error` event.
    pub fn client_message(&self) -> String {
        self.to_string()
    }
}

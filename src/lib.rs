//! Ledgerbook is a local-first credit book for tracking informal credit
//! between a shop owner and their customers.
//!
//! The local SQLite store is the single source of truth for all reads:
//! every mutation commits locally first and is then replicated, best
//! effort, to a per-user remote document tree. The app works fully offline;
//! without an authenticated user every sync operation is a silent no-op.

#![warn(missing_docs)]

/// Customer account records and their derived balance counters.
pub mod account;
/// Process-wide composition root shared by the CLI.
pub mod app_state;
/// AI chat assistant answering questions over the recorded ledger.
pub mod assistant;
/// Chat transcript storage.
pub mod chat;
/// Entity id generation.
pub mod database_id;
/// Date normalization and display formatting.
pub mod dates;
/// CSV report generation and report metadata records.
pub mod export;
/// Payment (credit-reducing) transaction records.
pub mod payment;
/// Purchase (credit-incurring) transaction records.
pub mod purchase;
/// Interfaces to the remote identity, document, and blob collaborators.
pub mod remote;
/// Generated report metadata storage.
pub mod report;
/// Locally persisted user session and preferences.
pub mod session;
/// The local entity store and its transactional balance maintenance.
pub mod store;
/// Best-effort replication between the local store and the remote tree.
pub mod sync;

pub use account::{Account, AccountId};
pub use app_state::AppState;
pub use chat::ChatMessage;
pub use payment::Payment;
pub use purchase::Purchase;
pub use report::Report;
pub use session::{Session, Theme};
pub use store::{LedgerStore, LiveQuery};
pub use sync::{RestoreSummary, SyncManager};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A row with a caller-generated id already exists in the database.
    ///
    /// Entity ids are generated locally with no central allocator, so a
    /// collision is rare but possible and must reach the caller rather than
    /// silently dropping the write.
    #[error("a record with this id already exists in the database")]
    DuplicateId,

    /// The requested record could not be found.
    ///
    /// Point lookups return `Option` instead; this error marks operations
    /// that require the row to exist, such as the balance counter updates.
    #[error("the requested record could not be found")]
    NotFound,

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLock,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    Sql(rusqlite::Error),

    /// A remote request failed (transport error or non-success status).
    #[error("remote request failed: {0}")]
    Remote(String),

    /// A document could not be serialized or deserialized as JSON.
    #[error("could not convert to or from JSON: {0}")]
    Json(String),

    /// A local file operation failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// A report file could not be written.
    #[error("could not write report file: {0}")]
    Csv(String),
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        match error {
            rusqlite::Error::SqliteFailure(code, _)
                if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Error::DuplicateId
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {error}");
                Error::Sql(error)
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json(error.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Remote(error.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Error::Csv(error.to_string())
    }
}

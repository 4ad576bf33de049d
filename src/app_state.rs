//! Implements a struct that holds the shared state of the application.

use std::sync::Arc;

use crate::{assistant::ChatAssistant, session::Session, store::LedgerStore, sync::SyncManager};

/// The state shared by every command of the application.
///
/// Built once at startup with its collaborators injected, then passed by
/// reference (the store and assistant are cheap clones over shared
/// handles).
#[derive(Clone)]
pub struct AppState {
    /// The local entity store.
    pub store: LedgerStore,

    /// The persisted user session.
    pub session: Arc<Session>,

    /// The remote sync manager.
    pub sync: Arc<SyncManager>,

    /// The ledger chat assistant.
    pub assistant: ChatAssistant,
}

impl AppState {
    /// Create a new [AppState] from its collaborators.
    pub fn new(
        store: LedgerStore,
        session: Arc<Session>,
        sync: Arc<SyncManager>,
        assistant: ChatAssistant,
    ) -> Self {
        Self {
            store,
            session,
            sync,
            assistant,
        }
    }
}

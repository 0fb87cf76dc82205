//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every request handler.

use crate::adapters::{DataUriReader, SqliteKvStore, SystemClock};
use crate::config::Config;
use crate::error::ApiError;
use progress_journal_core::{Clock, JournalPorts, KeyValueStore, MediaJournal};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    /// The journal is single-writer: every command and query goes through this lock.
    /// Uploads decode before taking it.
    pub journal: Mutex<MediaJournal>,
    pub config: Arc<Config>,
    /// Fired on shutdown so uploads still being decoded are abandoned.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(journal: MediaJournal, config: Arc<Config>) -> Self {
        Self {
            journal: Mutex::new(journal),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Wires the journal to an arbitrary store with the production reader and clock,
    /// then rehydrates it.
    pub async fn with_store(config: Arc<Config>, store: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        Self::with_clock(config, store, Arc::new(SystemClock)).await
    }

    /// Like `with_store`, but reads the time from `clock`.
    pub async fn with_clock(
        config: Arc<Config>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ApiError> {
        let ports = JournalPorts {
            store,
            reader: Arc::new(DataUriReader::new(config.max_upload_bytes)),
            clock,
        };
        let journal = MediaJournal::load(ports, config.journal_settings()).await?;
        Ok(Self::new(journal, config))
    }

    /// Connects to the configured database, applies migrations and loads the journal.
    pub async fn connect(config: Arc<Config>) -> Result<Self, ApiError> {
        info!("Connecting to database...");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;
        let store = SqliteKvStore::new(pool);
        info!("Running database migrations...");
        store.run_migrations().await?;
        info!("Database migrations complete.");

        Self::with_store(config, Arc::new(store)).await
    }
}

/// Public library interface for the PulmoPulse sync engine
///
/// This module wires the local store, the health data source and the document
/// store into a `SyncOrchestrator`, and exposes the stdio tool server that
/// drives it.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

pub mod domain;
pub mod aggregation;
pub mod health;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod config;
pub mod tools;
mod mcp;

// Re-export public modules and types
pub use domain::*;
pub use config::Config;
pub use storage::{LocalStore, PatientStorage, QuestionnaireStorage, SqliteStorage, StorageError};
pub use sync::{CancelFlag, SyncEvent, SyncOrchestrator, SyncRun, SyncStatus, SyncSummary};

use health::{FileHealthSource, HealthSource};
use remote::{DocumentStore, HttpDocumentStore, SqliteDocumentStore};
use sync::StaticIdentity;

/// Errors that can occur while setting up or serving
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] storage::StorageError),

    #[error("Domain validation error: {0}")]
    Domain(#[from] domain::DomainError),

    #[error("Document store error: {0}")]
    Remote(#[from] remote::RemoteError),

    #[error("Health data source error: {0}")]
    Source(#[from] health::SourceError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The sync engine with its stores, shared by the tool server and the CLI
pub struct PulmoSyncApp {
    storage: Arc<SqliteStorage>,
    orchestrator: Arc<SyncOrchestrator>,
    cancel: CancelFlag,
    /// Held for the duration of a run so syncs never overlap
    sync_lock: Arc<Mutex<()>>,
}

impl PulmoSyncApp {
    /// Open the local database and build the pipeline described by `config`
    ///
    /// Documents go to the HTTP store when `remote.url` is set and into the
    /// local database otherwise. Without a health export the source grants no
    /// access, so only questionnaires are sent.
    pub async fn new(db_path: PathBuf, config: &Config) -> Result<Self, AppError> {
        tracing::info!("Initializing PulmoPulse sync with database: {:?}", db_path);

        let storage = Arc::new(SqliteStorage::new(db_path.clone())?);

        let documents: Arc<dyn DocumentStore> = match &config.remote.url {
            Some(url) => {
                tracing::info!("Uploading to remote document store at {}", url);
                Arc::new(HttpDocumentStore::new(url, config.remote.token.clone())?)
            }
            None => {
                tracing::info!("No remote configured; documents are kept in the local database");
                Arc::new(SqliteDocumentStore::open(&db_path)?)
            }
        };

        let source: Arc<dyn HealthSource> = match &config.health_export {
            Some(path) => Arc::new(FileHealthSource::load(path)?),
            None => {
                tracing::warn!("No health export configured; health data access is not granted");
                Arc::new(FileHealthSource::empty())
            }
        };

        let identity = Arc::new(StaticIdentity::new(config.user()));
        let orchestrator = SyncOrchestrator::new(
            identity,
            storage.clone(),
            source,
            documents,
            config.sync_settings(),
        );

        Ok(Self::with_parts(storage, orchestrator))
    }

    /// Assemble an app from already built parts
    pub fn with_parts(storage: Arc<SqliteStorage>, orchestrator: SyncOrchestrator) -> Self {
        Self {
            storage,
            orchestrator: Arc::new(orchestrator),
            cancel: CancelFlag::new(),
            sync_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Run the MCP server, handling JSON-RPC requests over stdin/stdout
    ///
    /// Returns once stdin is closed and any running sync has finished.
    pub async fn run(self) -> Result<(), AppError> {
        let pending = self.storage.load_questionnaires()?;
        tracing::info!(
            "Starting MCP server, {} questionnaire(s) waiting for upload",
            pending.len()
        );

        mcp::McpServer::serve(Arc::new(self)).await
    }

    /// Claim the right to run a sync; `None` while another one is running
    pub fn try_begin_sync(&self) -> Option<OwnedMutexGuard<()>> {
        self.sync_lock.clone().try_lock_owned().ok()
    }

    /// Clear the cancel flag and create the context for a new run
    pub fn begin_run(&self) -> (SyncRun, mpsc::UnboundedReceiver<SyncEvent>) {
        self.cancel.reset();
        SyncRun::new(self.cancel.clone())
    }

    /// Run one full sync to completion
    ///
    /// Waits for a running sync to finish first. The run is dropped at the end,
    /// which closes its event channel.
    pub async fn sync_once(&self, run: SyncRun) -> SyncSummary {
        let _guard = self.sync_lock.lock().await;
        self.orchestrator.run_full_sync(&run).await
    }

    /// Ask a running sync to stop
    pub fn cancel_sync(&self) {
        self.cancel.cancel();
    }

    /// Get a reference to the storage layer (useful for testing)
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }
}

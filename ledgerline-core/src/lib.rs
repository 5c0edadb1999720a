//! Ledgerline Core - sync and categorization pipeline for personal finance
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Business entities plus the pure pipeline stages
//!   (normalization, flow classification)
//! - **ports**: Trait definitions for external dependencies (ProviderAdapter)
//! - **services**: Business logic orchestration (sync, categorization,
//!   connections, manual ledger edits)
//! - **adapters**: Concrete implementations (DuckDB, Plaid, Teller)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use adapters::duckdb::LedgerRepository;
use config::Config;
use services::{
    CategorizationService, ConnectionService, LedgerService, SyncService, TokenCipher,
};

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result};
pub use domain::{
    Account, AccountType, CategorizationRule, Category, Connection, Flow, Provider, SubCategory,
    Transaction, User,
};
pub use services::SyncSummary;

/// Main context for Ledgerline operations
///
/// This is the primary entry point for all business logic. It holds
/// the database connection, configuration, and all services.
pub struct LedgerlineContext {
    pub config: Config,
    pub repository: Arc<LedgerRepository>,
    pub sync_service: Arc<SyncService>,
    pub connection_service: ConnectionService,
    pub categorization_service: Arc<CategorizationService>,
    pub ledger_service: LedgerService,
}

impl LedgerlineContext {
    /// Create a new Ledgerline context rooted at the given data directory
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;

        let db_path = data_dir.join("ledgerline.duckdb");
        let repository = Arc::new(LedgerRepository::new(&db_path)?);
        repository.ensure_schema()?;

        let cipher = Arc::new(TokenCipher::from_env()?);
        let categorization_service =
            Arc::new(CategorizationService::new(Arc::clone(&repository)));
        let sync_service = Arc::new(SyncService::new(
            Arc::clone(&repository),
            Arc::clone(&categorization_service),
            Arc::clone(&cipher),
            config.clone(),
        ));
        let connection_service = ConnectionService::new(
            Arc::clone(&repository),
            Arc::clone(&cipher),
            Arc::clone(&sync_service),
        );
        let ledger_service = LedgerService::new(Arc::clone(&repository));

        Ok(Self {
            config,
            repository,
            sync_service,
            connection_service,
            categorization_service,
            ledger_service,
        })
    }

    /// The single local user, created on first use. Every service call
    /// still takes the user id explicitly so ownership checks stay real.
    pub fn local_user(&self) -> Result<User> {
        const LOCAL_EMAIL: &str = "local@ledgerline";
        if let Some(user) = self.repository.get_user_by_email(LOCAL_EMAIL)? {
            return Ok(user);
        }
        let user = User::new(LOCAL_EMAIL);
        self.repository.insert_user(&user)?;
        Ok(user)
    }
}

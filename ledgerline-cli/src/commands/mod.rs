//! CLI command implementations

pub mod accounts;
pub mod categories;
pub mod connections;
pub mod recategorize;
pub mod rules;
pub mod sync;
pub mod transactions;

use std::path::PathBuf;

use anyhow::{Context, Result};
use ledgerline_core::LedgerlineContext;
use uuid::Uuid;

/// Get the ledgerline directory from environment or default
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LEDGERLINE_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ledgerline")
    }
}

/// Get or create the ledgerline context
pub fn get_context() -> Result<LedgerlineContext> {
    let data_dir = get_data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;
    Ok(LedgerlineContext::new(&data_dir)?)
}

/// Parse a UUID argument with a friendlier error than the default
pub fn parse_id(s: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("'{s}' is not a valid {what} id"))
}

//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the ledger repository
//! - Plaid HTTP client for the cursor-incremental ProviderAdapter
//! - Teller HTTP client for the full-refetch ProviderAdapter

pub mod duckdb;
pub mod plaid;
pub mod teller;

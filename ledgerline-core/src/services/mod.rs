//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod categorize;
mod connection;
pub mod encryption;
mod ledger;
mod sync;

pub use categorize::{CategorizationService, RecategorizeResult};
pub use connection::{ConnectionService, ConnectionView};
pub use encryption::TokenCipher;
pub use ledger::LedgerService;
pub use sync::{SyncService, SyncSummary};

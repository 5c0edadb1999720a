//! Core domain entities and pure logic
//!
//! Business entities plus the two pure pipeline stages (normalization and
//! flow classification). No I/O or external dependencies here.

mod account;
mod category;
mod connection;
pub mod flow;
pub mod normalize;
pub mod result;
mod transaction;

pub use account::{Account, AccountType};
pub use category::{
    CategorizationRule, Category, SubCategory, FALLBACK_CATEGORY, SYSTEM_CATEGORIES,
};
pub use connection::{Connection, Provider, User};
pub use transaction::{Flow, Transaction};

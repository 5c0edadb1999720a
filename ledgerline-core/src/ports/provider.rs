//! Provider adapter port
//!
//! Defines the interface for fetching raw account and transaction data from
//! external aggregation providers. The sync service uses this trait to sync
//! data without knowing the specifics of each provider; it branches on the
//! connection's provider tag exactly once, at adapter selection.

use crate::domain::result::Result;
use crate::domain::Provider;

/// How a provider delivers transaction history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Opaque cursor, pages of added/modified deltas, `has_more` pagination
    CursorIncremental,
    /// Complete current history per account on every call, no cursor
    FullRefetch,
}

/// Input for one transactions fetch, shaped by the strategy
#[derive(Debug, Clone, Copy)]
pub enum PageRequest<'a> {
    /// Cursor-incremental: last persisted cursor, None on first sync
    Cursor(Option<&'a str>),
    /// Full-refetch: provider-native id of the account to refetch
    Account(&'a str),
}

/// An account in the provider's native shape.
///
/// Type/subtype stay in provider vocabulary here; the normalizer owns the
/// mapping. Balance fields carry whatever the provider reported, the sync
/// picks the configured source field.
#[derive(Debug, Clone)]
pub struct RawAccount {
    pub provider_account_id: String,
    pub name: String,
    pub mask: Option<String>,
    pub raw_type: String,
    pub raw_subtype: String,
    pub current_balance: Option<String>,
    pub available_balance: Option<String>,
    pub currency: String,
    pub institution_name: String,
}

/// A transaction in the provider's native shape.
///
/// `amount` stays a signed string until the normalizer parses it, so a
/// malformed amount surfaces as a per-transaction skip instead of a
/// deserialization failure taking down the whole page.
#[derive(Debug, Clone)]
pub struct RawTransaction {
    pub provider_transaction_id: String,
    pub provider_account_id: String,
    /// Signed, provider sign convention
    pub amount: String,
    pub currency: String,
    /// ISO date string, provider-local
    pub date: String,
    pub description: String,
    pub merchant_name: Option<String>,
    /// Provider transaction-type hint ("payment", "bill_payment", ...)
    pub type_hint: Option<String>,
    /// Provider category label ("TRANSFER_IN", "LOAN_PAYMENTS", ...)
    pub category_hint: Option<String>,
    pub pending: bool,
}

/// An account the adapter could not fetch; the sync skips it and moves on
#[derive(Debug, Clone)]
pub struct SkippedAccount {
    pub provider_account_id: String,
    pub reason: String,
}

/// Result of fetching the account list from a provider
#[derive(Debug, Default)]
pub struct FetchedAccounts {
    pub accounts: Vec<RawAccount>,
    pub skipped: Vec<SkippedAccount>,
}

/// One page of transactions from a provider
#[derive(Debug, Default)]
pub struct TransactionsPage {
    pub added: Vec<RawTransaction>,
    pub modified: Vec<RawTransaction>,
    /// Next cursor to persist; full-refetch providers leave it None
    pub next_cursor: Option<String>,
    /// More pages pending for this cursor; always false for full-refetch
    pub has_more: bool,
}

/// Provider adapter trait
///
/// Implementations fetch raw data from one external provider. Account-scoped
/// failures (a closed account's balance call answering 4xx) are reported via
/// `FetchedAccounts::skipped`, never as an `Err` - only failures that poison
/// the whole connection return errors.
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter talks to
    fn provider(&self) -> Provider;

    /// How this provider delivers transaction history
    fn strategy(&self) -> SyncStrategy;

    /// Fetch the current account list for a credential
    fn fetch_accounts(&self, access_token: &str) -> Result<FetchedAccounts>;

    /// Fetch one page of transactions
    ///
    /// Cursor-incremental adapters answer `PageRequest::Cursor` and set
    /// `next_cursor`/`has_more`; full-refetch adapters answer
    /// `PageRequest::Account` with the complete history in `added`.
    fn fetch_transactions_page(
        &self,
        access_token: &str,
        request: PageRequest<'_>,
    ) -> Result<TransactionsPage>;
}

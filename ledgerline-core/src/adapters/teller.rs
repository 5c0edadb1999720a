//! Teller API client
//!
//! Full-refetch adapter. Teller has no sync cursor: every call returns the
//! account's complete current transaction history, and the ledger's keyed
//! upserts make re-ingesting it idempotent.
//!
//! Authentication is HTTP basic with the access token as the username and
//! an empty password.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::domain::result::{Error, Result};
use crate::domain::Provider;
use crate::ports::{
    FetchedAccounts, PageRequest, ProviderAdapter, RawAccount, RawTransaction, SkippedAccount,
    SyncStrategy, TransactionsPage,
};

// =============================================================================
// API Response Models (matching the Teller API spec)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TellerAccount {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub last_four: Option<String>,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub currency: String,
    pub institution: TellerInstitution,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TellerInstitution {
    pub name: String,
}

/// Teller reports balances as decimal strings
#[derive(Debug, Clone, Deserialize)]
pub struct TellerBalance {
    #[serde(default)]
    pub available: Option<String>,
    #[serde(default)]
    pub ledger: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TellerTransaction {
    pub id: String,
    pub description: String,
    /// Signed decimal string; negative means money left the account
    pub amount: String,
    /// ISO date YYYY-MM-DD
    pub date: String,
    /// "debit" or "credit", plus richer labels like "bill_payment"
    #[serde(rename = "type", default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// =============================================================================
// Teller HTTP Client
// =============================================================================

/// Default production API URL
const TELLER_PRODUCTION_URL: &str = "https://api.teller.io";

/// Environment variable to override the Teller API base URL.
pub const TELLER_BASE_URL_ENV: &str = "TELLER_BASE_URL";

/// Get the Teller base URL, checking environment variable first
pub fn get_base_url() -> String {
    std::env::var(TELLER_BASE_URL_ENV).unwrap_or_else(|_| TELLER_PRODUCTION_URL.to_string())
}

/// Teller API client
#[derive(Debug)]
pub struct TellerAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl TellerAdapter {
    /// Create a new Teller adapter.
    ///
    /// Uses the `TELLER_BASE_URL` environment variable if set,
    /// otherwise defaults to the production API.
    pub fn new() -> Result<Self> {
        Self::new_with_base_url(&get_base_url())
    }

    /// Create a new Teller adapter with a custom base URL.
    pub fn new_with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, access_token: &str, path: &str) -> Result<reqwest::blocking::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .basic_auth(access_token, Some(""))
            .send()
            .map_err(|e| self.map_request_error(e))?;
        self.check_response_status(&response)?;
        Ok(response)
    }

    /// Map transport-level errors to user-friendly messages
    fn map_request_error(&self, error: reqwest::Error) -> Error {
        let message = if error.is_timeout() {
            "Connection timed out after 120 seconds".to_string()
        } else if error.is_connect() {
            "Unable to connect to Teller servers".to_string()
        } else {
            format!("Teller request failed: {error}")
        };
        Error::provider("teller", None, message)
    }

    /// Check response status and return appropriate errors
    fn check_response_status(&self, response: &reqwest::blocking::Response) -> Result<()> {
        let status = response.status().as_u16();
        let message = match status {
            200 => return Ok(()),
            401 => "Teller authentication failed. The access token may be revoked.",
            404 => "Teller resource not found.",
            429 => "Teller rate limit exceeded. Please wait a moment and try again.",
            _ => return Err(Error::provider("teller", Some(status), format!("HTTP {status}"))),
        };
        Err(Error::provider("teller", Some(status), message))
    }

    /// Fetch the balance for a single account. This is the call that most
    /// commonly fails account-scoped (closed or restricted accounts answer
    /// 4xx here while still appearing in the account list).
    fn fetch_balance(&self, access_token: &str, account_id: &str) -> Result<TellerBalance> {
        let response = self.get(access_token, &format!("/accounts/{account_id}/balances"))?;
        response.json().map_err(|e| {
            Error::provider("teller", None, format!("Failed to parse balance response: {e}"))
        })
    }

    fn map_account(&self, account: &TellerAccount, balance: &TellerBalance) -> RawAccount {
        RawAccount {
            provider_account_id: account.id.clone(),
            name: account.name.clone(),
            mask: account.last_four.clone(),
            raw_type: account.account_type.clone(),
            raw_subtype: account.subtype.clone().unwrap_or_default(),
            current_balance: balance.ledger.clone(),
            available_balance: balance.available.clone(),
            currency: account.currency.clone(),
            institution_name: account.institution.name.clone(),
        }
    }

    fn map_transaction(&self, account_id: &str, txn: &TellerTransaction) -> RawTransaction {
        RawTransaction {
            provider_transaction_id: txn.id.clone(),
            provider_account_id: account_id.to_string(),
            amount: txn.amount.clone(),
            currency: "USD".to_string(),
            date: txn.date.clone(),
            description: txn.description.clone(),
            merchant_name: None,
            type_hint: txn.transaction_type.clone(),
            // Teller has no category labels; the flow classifier relies on
            // the sign table for this provider.
            category_hint: None,
            pending: txn.status.as_deref() == Some("pending"),
        }
    }
}

impl ProviderAdapter for TellerAdapter {
    fn provider(&self) -> Provider {
        Provider::Teller
    }

    fn strategy(&self) -> SyncStrategy {
        SyncStrategy::FullRefetch
    }

    fn fetch_accounts(&self, access_token: &str) -> Result<FetchedAccounts> {
        let response = self.get(access_token, "/accounts")?;
        let accounts: Vec<TellerAccount> = response.json().map_err(|e| {
            Error::provider("teller", None, format!("Failed to parse accounts response: {e}"))
        })?;

        let mut result = FetchedAccounts::default();
        for account in &accounts {
            // A client error on one account's balance must not sink its
            // siblings; report it as a skip and keep going.
            match self.fetch_balance(access_token, &account.id) {
                Ok(balance) => result.accounts.push(self.map_account(account, &balance)),
                Err(e) => {
                    warn!(account_id = %account.id, error = %e, "skipping account: balance fetch failed");
                    result.skipped.push(SkippedAccount {
                        provider_account_id: account.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }

    fn fetch_transactions_page(
        &self,
        access_token: &str,
        request: PageRequest<'_>,
    ) -> Result<TransactionsPage> {
        let account_id = match request {
            PageRequest::Account(id) => id,
            PageRequest::Cursor(_) => {
                return Err(Error::provider(
                    "teller",
                    None,
                    "Teller refetches by account, not by cursor",
                ))
            }
        };

        let response = self.get(access_token, &format!("/accounts/{account_id}/transactions"))?;
        let transactions: Vec<TellerTransaction> = response.json().map_err(|e| {
            Error::provider(
                "teller",
                None,
                format!("Failed to parse transactions response: {e}"),
            )
        })?;

        // Full refetch: the complete history arrives as "added" every time
        // and the ledger's keyed upserts absorb the repeats.
        Ok(TransactionsPage {
            added: transactions
                .iter()
                .map(|t| self.map_transaction(account_id, t))
                .collect(),
            modified: Vec::new(),
            next_cursor: None,
            has_more: false,
        })
    }
}

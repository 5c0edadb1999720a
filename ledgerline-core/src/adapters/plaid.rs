//! Plaid API client
//!
//! Cursor-incremental adapter. Plaid's `/transactions/sync` endpoint is
//! stateful: it hands back an opaque cursor that advances with every call,
//! and the sync service pages with `has_more` until the delta is exhausted.
//! A null cursor means "start from the beginning".
//!
//! Plaid's sign convention is the inverse of a bank statement:
//! positive amount means money left the account.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::result::{Error, Result};
use crate::domain::Provider;
use crate::ports::{
    FetchedAccounts, PageRequest, ProviderAdapter, RawAccount, RawTransaction, SyncStrategy,
    TransactionsPage,
};

// =============================================================================
// API Request/Response Models (matching the Plaid API spec)
// =============================================================================

#[derive(Debug, Serialize)]
struct AccountsGetRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    access_token: &'a str,
}

#[derive(Debug, Serialize)]
struct TransactionsSyncRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AccountsGetResponse {
    accounts: Vec<PlaidAccount>,
    #[serde(default)]
    item: Option<PlaidItem>,
}

#[derive(Debug, Deserialize)]
struct PlaidItem {
    #[serde(default)]
    institution_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaidAccount {
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub balances: PlaidBalances,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaidBalances {
    #[serde(default, deserialize_with = "deserialize_optional_number_string")]
    pub current: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_string")]
    pub available: Option<String>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionsSyncResponse {
    added: Vec<PlaidTransaction>,
    modified: Vec<PlaidTransaction>,
    next_cursor: String,
    has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaidTransaction {
    pub transaction_id: String,
    pub account_id: String,
    /// Signed; positive means money left the account
    #[serde(deserialize_with = "deserialize_number_string")]
    pub amount: String,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    /// ISO date YYYY-MM-DD
    pub date: String,
    pub name: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub personal_finance_category: Option<PersonalFinanceCategory>,
    #[serde(default)]
    pub pending: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonalFinanceCategory {
    #[serde(default)]
    pub primary: Option<String>,
}

/// Deserialize a JSON number (or string) into its exact decimal text.
/// Keeping amounts as text defers parsing to the normalizer, so one bad
/// amount skips one transaction instead of failing the whole page.
fn deserialize_number_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: JsonValue = Deserialize::deserialize(deserializer)?;
    match value {
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::String(s) => Ok(s),
        _ => Err(D::Error::custom("expected number or string for amount")),
    }
}

fn deserialize_optional_number_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    match value {
        Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
        Some(JsonValue::String(s)) => Ok(Some(s)),
        Some(JsonValue::Null) | None => Ok(None),
        _ => Err(D::Error::custom("expected number or string for balance")),
    }
}

// =============================================================================
// Plaid HTTP Client
// =============================================================================

/// Default sandbox API URL
const PLAID_SANDBOX_URL: &str = "https://sandbox.plaid.com";

/// Environment variable to override the Plaid API base URL.
/// Set this to point at the development or production environment.
pub const PLAID_BASE_URL_ENV: &str = "PLAID_BASE_URL";

/// Get the Plaid base URL, checking environment variable first
pub fn get_base_url() -> String {
    std::env::var(PLAID_BASE_URL_ENV).unwrap_or_else(|_| PLAID_SANDBOX_URL.to_string())
}

/// Plaid API client
#[derive(Debug)]
pub struct PlaidAdapter {
    client: Client,
    client_id: String,
    secret: String,
    base_url: String,
}

impl PlaidAdapter {
    /// Create a new Plaid adapter with API credentials.
    ///
    /// Uses the `PLAID_BASE_URL` environment variable if set,
    /// otherwise defaults to the sandbox environment.
    pub fn new(client_id: &str, secret: &str) -> Result<Self> {
        Self::new_with_base_url(client_id, secret, &get_base_url())
    }

    /// Create a new Plaid adapter with a custom base URL.
    pub fn new_with_base_url(client_id: &str, secret: &str, base_url: &str) -> Result<Self> {
        if client_id.is_empty() || secret.is_empty() {
            return Err(Error::Config(
                "Plaid client id and secret cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            client_id: client_id.to_string(),
            secret: secret.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::blocking::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
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
            "Unable to connect to Plaid servers".to_string()
        } else {
            format!("Plaid request failed: {error}")
        };
        Error::provider("plaid", None, message)
    }

    /// Check response status and return appropriate errors
    fn check_response_status(&self, response: &reqwest::blocking::Response) -> Result<()> {
        let status = response.status().as_u16();
        let message = match status {
            200 => return Ok(()),
            400 => "Plaid rejected the request. The access token may be malformed.",
            401 => "Plaid authentication failed. Check your client id and secret.",
            429 => "Plaid rate limit exceeded. Please wait a moment and try again.",
            _ => return Err(Error::provider("plaid", Some(status), format!("HTTP {status}"))),
        };
        Err(Error::provider("plaid", Some(status), message))
    }

    fn map_account(&self, acct: &PlaidAccount, institution_name: &str) -> RawAccount {
        RawAccount {
            provider_account_id: acct.account_id.clone(),
            name: acct.name.clone(),
            mask: acct.mask.clone(),
            raw_type: acct.account_type.clone(),
            raw_subtype: acct.subtype.clone().unwrap_or_default(),
            current_balance: acct.balances.current.clone(),
            available_balance: acct.balances.available.clone(),
            currency: acct
                .balances
                .iso_currency_code
                .clone()
                .unwrap_or_else(|| "USD".to_string()),
            institution_name: institution_name.to_string(),
        }
    }

    fn map_transaction(&self, txn: &PlaidTransaction) -> RawTransaction {
        RawTransaction {
            provider_transaction_id: txn.transaction_id.clone(),
            provider_account_id: txn.account_id.clone(),
            amount: txn.amount.clone(),
            currency: txn
                .iso_currency_code
                .clone()
                .unwrap_or_else(|| "USD".to_string()),
            date: txn.date.clone(),
            description: txn.name.clone(),
            merchant_name: txn.merchant_name.clone(),
            type_hint: txn.transaction_type.clone(),
            category_hint: txn
                .personal_finance_category
                .as_ref()
                .and_then(|c| c.primary.clone()),
            pending: txn.pending,
        }
    }
}

impl ProviderAdapter for PlaidAdapter {
    fn provider(&self) -> Provider {
        Provider::Plaid
    }

    fn strategy(&self) -> SyncStrategy {
        SyncStrategy::CursorIncremental
    }

    fn fetch_accounts(&self, access_token: &str) -> Result<FetchedAccounts> {
        let response = self.post(
            "/accounts/get",
            &AccountsGetRequest {
                client_id: &self.client_id,
                secret: &self.secret,
                access_token,
            },
        )?;

        let api_response: AccountsGetResponse = response.json().map_err(|e| {
            Error::provider("plaid", None, format!("Failed to parse accounts response: {e}"))
        })?;

        let institution_name = api_response
            .item
            .and_then(|i| i.institution_name)
            .unwrap_or_default();

        let accounts = api_response
            .accounts
            .iter()
            .map(|a| self.map_account(a, &institution_name))
            .collect();

        // Plaid reports balances inline with the account list, so there is
        // no per-account call here that could fail independently.
        Ok(FetchedAccounts {
            accounts,
            skipped: Vec::new(),
        })
    }

    fn fetch_transactions_page(
        &self,
        access_token: &str,
        request: PageRequest<'_>,
    ) -> Result<TransactionsPage> {
        let cursor = match request {
            PageRequest::Cursor(cursor) => cursor,
            PageRequest::Account(_) => {
                return Err(Error::provider(
                    "plaid",
                    None,
                    "Plaid syncs by cursor, not by account",
                ))
            }
        };

        let response = self.post(
            "/transactions/sync",
            &TransactionsSyncRequest {
                client_id: &self.client_id,
                secret: &self.secret,
                access_token,
                cursor,
            },
        )?;

        let api_response: TransactionsSyncResponse = response.json().map_err(|e| {
            Error::provider("plaid", None, format!("Failed to parse sync response: {e}"))
        })?;

        Ok(TransactionsPage {
            added: api_response.added.iter().map(|t| self.map_transaction(t)).collect(),
            modified: api_response
                .modified
                .iter()
                .map(|t| self.map_transaction(t))
                .collect(),
            next_cursor: Some(api_response.next_cursor),
            has_more: api_response.has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_accounts_response() {
        let json = r#"{
            "accounts": [{
                "account_id": "acc-1",
                "name": "Plaid Checking",
                "mask": "0000",
                "type": "depository",
                "subtype": "checking",
                "balances": {
                    "current": 110.0,
                    "available": 100.5,
                    "iso_currency_code": "USD"
                }
            }],
            "item": { "institution_name": "First Platypus Bank" }
        }"#;

        let parsed: AccountsGetResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.accounts.len(), 1);
        let acct = &parsed.accounts[0];
        assert_eq!(acct.account_type, "depository");
        assert_eq!(acct.balances.current.as_deref(), Some("110.0"));
        assert_eq!(acct.balances.available.as_deref(), Some("100.5"));
    }

    #[test]
    fn test_deserialize_sync_response_preserves_sign() {
        let json = r#"{
            "added": [{
                "transaction_id": "txn-1",
                "account_id": "acc-1",
                "amount": -50,
                "iso_currency_code": "USD",
                "date": "2025-03-01",
                "name": "PAYROLL DEPOSIT",
                "pending": false,
                "personal_finance_category": { "primary": "INCOME" }
            }],
            "modified": [],
            "removed": [],
            "next_cursor": "abc",
            "has_more": false
        }"#;

        let parsed: TransactionsSyncResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.added[0].amount, "-50");
        assert_eq!(parsed.next_cursor, "abc");
        assert!(!parsed.has_more);
    }

    #[test]
    fn test_map_transaction_carries_hints() {
        let adapter = PlaidAdapter::new_with_base_url("id", "secret", "http://localhost").unwrap();
        let txn = PlaidTransaction {
            transaction_id: "txn-9".to_string(),
            account_id: "acc-1".to_string(),
            amount: "25.75".to_string(),
            iso_currency_code: None,
            date: "2025-03-02".to_string(),
            name: "ACH TRANSFER".to_string(),
            merchant_name: None,
            transaction_type: Some("special".to_string()),
            personal_finance_category: Some(PersonalFinanceCategory {
                primary: Some("TRANSFER_OUT".to_string()),
            }),
            pending: true,
        };

        let raw = adapter.map_transaction(&txn);
        assert_eq!(raw.category_hint.as_deref(), Some("TRANSFER_OUT"));
        assert_eq!(raw.type_hint.as_deref(), Some("special"));
        assert_eq!(raw.currency, "USD");
        assert!(raw.pending);
    }

    #[test]
    fn test_empty_credentials_rejected() {
        assert!(PlaidAdapter::new_with_base_url("", "secret", "http://localhost").is_err());
    }
}

//! Normalization of provider-native account and transaction fields
//!
//! Each provider speaks its own type/subtype vocabulary and sign
//! convention. Everything downstream of this module sees only the
//! canonical [`AccountType`] and non-negative amounts.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::domain::account::AccountType;
use crate::domain::connection::Provider;
use crate::domain::result::{Error, Result};

/// Map a provider's (type, subtype) pair onto the canonical vocabulary.
/// Unmapped combinations fall back to `Other` rather than failing.
pub fn normalize_account_type(provider: Provider, raw_type: &str, raw_subtype: &str) -> AccountType {
    let t = raw_type.to_lowercase();
    let sub = raw_subtype.to_lowercase();
    match provider {
        Provider::Plaid => match t.as_str() {
            "credit" => AccountType::Credit,
            "depository" => {
                if sub == "savings" {
                    AccountType::Savings
                } else {
                    AccountType::Checking
                }
            }
            "investment" => AccountType::Investment,
            "loan" => AccountType::Loan,
            _ => AccountType::parse(if sub.is_empty() { &t } else { &sub }),
        },
        Provider::Teller => match t.as_str() {
            "depository" => {
                if sub == "savings" {
                    AccountType::Savings
                } else {
                    AccountType::Checking
                }
            }
            "credit" => AccountType::Credit,
            _ => AccountType::Other,
        },
    }
}

/// Parse a provider amount string and strip the sign.
///
/// The signed value is consumed by the flow classifier before this runs;
/// the ledger only ever stores the magnitude. An unparseable amount is a
/// data-scoped error the orchestrator turns into a per-transaction skip.
pub fn normalize_amount(raw: &str) -> Result<Decimal> {
    let parsed = Decimal::from_str(raw.trim())
        .map_err(|e| Error::validation(format!("unparseable amount '{raw}': {e}")))?;
    Ok(parsed.abs())
}

/// Parse a provider amount string keeping the sign, for the classifier
pub fn parse_signed_amount(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|e| Error::validation(format!("unparseable amount '{raw}': {e}")))
}

//! Cash-flow direction classification
//!
//! Sign conventions differ per provider and per account type, so the
//! direction is never inferred from the amount alone. An explicit provider
//! transfer label always beats the sign table. `Unrecognized` is a valid
//! terminal answer surfaced to the user, not an error.

use rust_decimal::Decimal;

use crate::domain::account::AccountType;
use crate::domain::transaction::Flow;

/// Provider category hints that settle classification outright
const HINT_TRANSFER_IN: &str = "TRANSFER_IN";
const HINT_TRANSFER_OUT: &str = "TRANSFER_OUT";
const HINT_LOAN_PAYMENTS: &str = "LOAN_PAYMENTS";

/// Type hints that mark a negative credit-account amount as a transfer
const CREDIT_TRANSFER_HINTS: &[&str] = &["payment", "transfer"];
/// Type hints that mark a negative depository amount as a transfer
const DEPOSITORY_TRANSFER_HINTS: &[&str] = &["bill_payment", "transfer"];

/// Classify a transaction's direction from its signed amount, the account
/// it posted to, and the provider's own hints.
pub fn classify(
    signed_amount: Decimal,
    account_type: AccountType,
    type_hint: Option<&str>,
    category_hint: Option<&str>,
) -> Flow {
    // Explicit provider labels win regardless of sign
    match category_hint {
        Some(HINT_TRANSFER_IN) => return Flow::Income,
        Some(HINT_TRANSFER_OUT) | Some(HINT_LOAN_PAYMENTS) => return Flow::Transfer,
        _ => {}
    }

    if signed_amount.is_zero() {
        return Flow::Unrecognized;
    }

    let hint = type_hint.map(str::to_lowercase);
    let hint = hint.as_deref();

    match account_type {
        AccountType::Credit => {
            if signed_amount > Decimal::ZERO {
                Flow::Expense
            } else if hint.is_some_and(|h| CREDIT_TRANSFER_HINTS.contains(&h)) {
                Flow::Transfer
            } else {
                // Negative on a credit account is a refund or statement credit
                Flow::Income
            }
        }
        t if t.is_depository() => {
            if signed_amount < Decimal::ZERO {
                if hint.is_some_and(|h| DEPOSITORY_TRANSFER_HINTS.contains(&h)) {
                    Flow::Transfer
                } else {
                    Flow::Expense
                }
            } else {
                Flow::Income
            }
        }
        _ => Flow::Unrecognized,
    }
}

//! Transaction domain model

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of money relative to the user, derived once at ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Income,
    Expense,
    Transfer,
    /// Sign/type combination the classifier could not interpret
    Unrecognized,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Income => "income",
            Flow::Expense => "expense",
            Flow::Transfer => "transfer",
            Flow::Unrecognized => "unrecognized",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "income" => Flow::Income,
            "expense" => Flow::Expense,
            "transfer" => Flow::Transfer,
            _ => Flow::Unrecognized,
        }
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized ledger transaction
///
/// `amount` is always non-negative; direction lives in `flow`. The raw
/// provider sign is consumed by the classifier and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    /// Upsert key, unique per provider. `manual_<uuid>` for manual entries.
    pub provider_transaction_id: String,
    /// Absolute magnitude, never negative
    pub amount: Decimal,
    pub currency: String,
    pub date: NaiveDate,
    pub description: String,
    pub merchant_name: Option<String>,
    pub flow: Flow,
    /// Resolved category; None only when resolution produced nothing
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub pending: bool,
    pub is_manual: bool,
    /// Hidden from reports, still stored and synced
    pub hidden: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a manual transaction with a synthetic provider id
    pub fn manual(
        user_id: Uuid,
        account_id: Uuid,
        amount: Decimal,
        date: NaiveDate,
        description: impl Into<String>,
        flow: Flow,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            account_id,
            provider_transaction_id: format!("manual_{}", Uuid::new_v4()),
            amount: amount.abs(),
            currency: "USD".to_string(),
            date,
            description: description.into(),
            merchant_name: None,
            flow,
            category_id: None,
            subcategory_id: None,
            pending: false,
            is_manual: true,
            hidden: false,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.amount.is_sign_negative() {
            return Err("transaction amount must be non-negative");
        }
        if self.description.trim().is_empty() {
            return Err("transaction description cannot be empty");
        }
        Ok(())
    }
}

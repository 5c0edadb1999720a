//! Account domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical account type vocabulary, provider-agnostic.
///
/// Providers expose their own type/subtype strings; the normalizer maps
/// them here and nothing downstream ever sees a provider vocabulary again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
    Credit,
    Investment,
    Loan,
    Cash,
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::Credit => "credit",
            AccountType::Investment => "investment",
            AccountType::Loan => "loan",
            AccountType::Cash => "cash",
            AccountType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "checking" => AccountType::Checking,
            "savings" => AccountType::Savings,
            "credit" => AccountType::Credit,
            "investment" => AccountType::Investment,
            "loan" => AccountType::Loan,
            "cash" => AccountType::Cash,
            _ => AccountType::Other,
        }
    }

    /// Depository accounts share a sign convention in the flow table
    pub fn is_depository(&self) -> bool {
        matches!(self, AccountType::Checking | AccountType::Savings)
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A financial account owned by a user
///
/// Exactly one of {connection-linked, manual} holds: linked accounts carry
/// the provider's native account id, manual ones a synthetic
/// `manual_<uuid>` placeholder so the unique upsert key stays total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    /// None for manually entered accounts
    pub connection_id: Option<Uuid>,
    /// Upsert key, unique per provider
    pub provider_account_id: String,
    pub name: String,
    /// Last digits shown in the UI ("1234")
    pub mask: Option<String>,
    pub account_type: AccountType,
    pub balance: Decimal,
    /// Available balance or credit limit, when the provider reports one
    pub available_balance: Option<Decimal>,
    /// ISO 4217 currency code; stored, never converted
    pub currency: String,
    pub institution_name: String,
    pub is_manual: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a linked account shell; the sync fills the rest in
    pub fn linked(
        user_id: Uuid,
        connection_id: Uuid,
        provider_account_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            connection_id: Some(connection_id),
            provider_account_id: provider_account_id.into(),
            name: name.into(),
            mask: None,
            account_type: AccountType::Other,
            balance: Decimal::ZERO,
            available_balance: None,
            currency: "USD".to_string(),
            institution_name: String::new(),
            is_manual: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a manual account with a synthetic placeholder provider id
    pub fn manual(user_id: Uuid, name: impl Into<String>, account_type: AccountType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            connection_id: None,
            provider_account_id: format!("manual_{}", Uuid::new_v4()),
            name: name.into(),
            mask: None,
            account_type,
            balance: Decimal::ZERO,
            available_balance: None,
            currency: "USD".to_string(),
            institution_name: String::new(),
            is_manual: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("account name cannot be empty");
        }
        if self.currency.trim().is_empty() {
            return Err("currency cannot be empty");
        }
        // A linked account must reference a connection, a manual one must not
        if self.is_manual == self.connection_id.is_some() {
            return Err("account must be either connection-linked or manual");
        }
        Ok(())
    }
}

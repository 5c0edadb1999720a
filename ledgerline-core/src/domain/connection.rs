//! Connection domain model - a user's link to one aggregation provider

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported data-aggregation providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Cursor-incremental sync via `/transactions/sync`
    Plaid,
    /// Full re-fetch per account on every sync
    Teller,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Plaid => "plaid",
            Provider::Teller => "teller",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "plaid" => Some(Provider::Plaid),
            "teller" => Some(Provider::Teller),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One link between a user and one provider enrollment
///
/// `access_token` is always the encrypted form; the plaintext token exists
/// only inside a sync run, between decrypt and the provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: Provider,
    pub institution_name: String,
    /// Encrypted access token (hex-packed, see the encryption service)
    #[serde(skip_serializing)]
    pub access_token: String,
    /// Incremental sync cursor; None until the first sync completes.
    /// Only the cursor-incremental provider ever sets it.
    pub cursor: Option<String>,
    /// Set while a sync run holds the advisory in-progress flag
    pub sync_started_at: Option<DateTime<Utc>>,
    /// Stamped after every successful sync run
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(
        user_id: Uuid,
        provider: Provider,
        institution_name: impl Into<String>,
        encrypted_token: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            provider,
            institution_name: institution_name.into(),
            access_token: encrypted_token.into(),
            cursor: None,
            sync_started_at: None,
            last_synced_at: None,
            created_at: Utc::now(),
        }
    }
}

/// A user record. Identity resolution is out of scope; the CLI creates a
/// single local user on demand, but every operation still takes an explicit
/// user id so ownership checks stay real.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

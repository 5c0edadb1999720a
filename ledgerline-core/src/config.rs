//! Configuration management
//!
//! settings.json format:
//! ```json
//! {
//!   "providers": {
//!     "plaid": { "clientId": "...", "secret": "...", "balanceSource": "current" },
//!     "teller": { "balanceSource": "available" }
//!   }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::Provider;

/// Which provider balance field feeds the canonical account balance.
/// Providers disagreed on field naming across API revisions, so this is
/// table-driven per provider rather than hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BalanceSource {
    #[default]
    Current,
    Available,
}

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    providers: ProvidersSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvidersSettings {
    #[serde(default)]
    plaid: PlaidSettings,
    #[serde(default)]
    teller: TellerSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaidSettings {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    secret: Option<String>,
    #[serde(default)]
    balance_source: Option<BalanceSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TellerSettings {
    #[serde(default)]
    balance_source: Option<BalanceSource>,
}

/// Ledgerline configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub plaid_client_id: Option<String>,
    pub plaid_secret: Option<String>,
    plaid_balance_source: BalanceSource,
    teller_balance_source: BalanceSource,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plaid_client_id: None,
            plaid_secret: None,
            // Plaid's "current" is the settled balance; Teller's "ledger"
            // lags, so its "available" field is the usable default.
            plaid_balance_source: BalanceSource::Current,
            teller_balance_source: BalanceSource::Available,
        }
    }
}

impl Config {
    /// Load config from the data directory. Plaid credentials can also come
    /// from `PLAID_CLIENT_ID` / `PLAID_SECRET`, which win over the file.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let defaults = Self::default();
        Ok(Self {
            plaid_client_id: std::env::var("PLAID_CLIENT_ID")
                .ok()
                .or(raw.providers.plaid.client_id),
            plaid_secret: std::env::var("PLAID_SECRET")
                .ok()
                .or(raw.providers.plaid.secret),
            plaid_balance_source: raw
                .providers
                .plaid
                .balance_source
                .unwrap_or(defaults.plaid_balance_source),
            teller_balance_source: raw
                .providers
                .teller
                .balance_source
                .unwrap_or(defaults.teller_balance_source),
        })
    }

    /// Save the managed provider settings
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings = SettingsFile {
            providers: ProvidersSettings {
                plaid: PlaidSettings {
                    client_id: self.plaid_client_id.clone(),
                    secret: self.plaid_secret.clone(),
                    balance_source: Some(self.plaid_balance_source),
                },
                teller: TellerSettings {
                    balance_source: Some(self.teller_balance_source),
                },
            },
        };
        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(data_dir.join("settings.json"), content)?;
        Ok(())
    }

    /// The balance field that feeds the canonical balance for a provider
    pub fn balance_source(&self, provider: Provider) -> BalanceSource {
        match provider {
            Provider::Plaid => self.plaid_balance_source,
            Provider::Teller => self.teller_balance_source,
        }
    }

    /// Plaid API credentials, required before a Plaid connection can sync
    pub fn plaid_credentials(&self) -> Result<(&str, &str)> {
        match (&self.plaid_client_id, &self.plaid_secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(Error::Config(
                "Plaid credentials missing: set PLAID_CLIENT_ID and PLAID_SECRET".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_provider() {
        let config = Config::default();
        assert_eq!(config.balance_source(Provider::Plaid), BalanceSource::Current);
        assert_eq!(config.balance_source(Provider::Teller), BalanceSource::Available);
    }

    #[test]
    fn test_settings_file_overrides_balance_source() {
        let json = r#"{
            "providers": {
                "plaid": { "clientId": "id", "secret": "sec", "balanceSource": "available" },
                "teller": { "balanceSource": "current" }
            }
        }"#;
        let raw: SettingsFile = serde_json::from_str(json).unwrap();
        assert_eq!(raw.providers.plaid.balance_source, Some(BalanceSource::Available));
        assert_eq!(raw.providers.teller.balance_source, Some(BalanceSource::Current));
        assert_eq!(raw.providers.plaid.client_id.as_deref(), Some("id"));
    }

    #[test]
    fn test_missing_plaid_credentials_is_config_error() {
        let config = Config::default();
        assert!(config.plaid_credentials().is_err());
    }
}

//! Connection service - link providers and manage existing connections

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::adapters::duckdb::LedgerRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{Connection, Provider};
use crate::services::{SyncService, TokenCipher};

/// Connection shape returned to callers: never includes the token,
/// even encrypted.
#[derive(Debug, Serialize)]
pub struct ConnectionView {
    pub id: Uuid,
    pub provider: Provider,
    pub institution_name: String,
    pub has_synced: bool,
}

impl From<&Connection> for ConnectionView {
    fn from(c: &Connection) -> Self {
        Self {
            id: c.id,
            provider: c.provider,
            institution_name: c.institution_name.clone(),
            has_synced: c.last_synced_at.is_some(),
        }
    }
}

pub struct ConnectionService {
    repository: Arc<LedgerRepository>,
    cipher: Arc<TokenCipher>,
    sync_service: Arc<SyncService>,
}

impl ConnectionService {
    pub fn new(
        repository: Arc<LedgerRepository>,
        cipher: Arc<TokenCipher>,
        sync_service: Arc<SyncService>,
    ) -> Self {
        Self {
            repository,
            cipher,
            sync_service,
        }
    }

    /// Create a connection from a freshly obtained provider access token
    /// and kick off the initial sync.
    ///
    /// The initial sync is best-effort: if it fails the connection still
    /// exists, just without data, and the user can retry manually. Its
    /// errors are logged and swallowed, never surfaced as a link failure.
    pub fn link(
        &self,
        user_id: Uuid,
        provider: Provider,
        institution_name: &str,
        access_token: &str,
    ) -> Result<ConnectionView> {
        if access_token.trim().is_empty() {
            return Err(Error::validation("access token cannot be empty"));
        }

        let encrypted = self.cipher.encrypt(access_token)?;
        let connection = Connection::new(user_id, provider, institution_name, encrypted);
        self.repository.insert_connection(&connection)?;

        if let Err(e) = self.sync_service.sync_connection(connection.id, user_id) {
            warn!(
                connection_id = %connection.id,
                error = %e,
                "initial sync after linking failed; connection kept"
            );
        }

        // Re-read so the view reflects the cursor the sync may have set
        let connection = self
            .repository
            .get_connection(connection.id)?
            .unwrap_or(connection);
        Ok(ConnectionView::from(&connection))
    }

    /// List a user's connections without token material
    pub fn list(&self, user_id: Uuid) -> Result<Vec<ConnectionView>> {
        let connections = self.repository.get_connections_for_user(user_id)?;
        Ok(connections.iter().map(ConnectionView::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::User;
    use crate::services::CategorizationService;

    const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn service() -> (ConnectionService, Arc<LedgerRepository>, User) {
        let repository = Arc::new(LedgerRepository::in_memory().unwrap());
        repository.ensure_schema().unwrap();
        let cipher = Arc::new(TokenCipher::new(TEST_KEY).unwrap());
        let categorizer = Arc::new(CategorizationService::new(Arc::clone(&repository)));
        let sync_service = Arc::new(SyncService::new(
            Arc::clone(&repository),
            categorizer,
            Arc::clone(&cipher),
            Config::default(),
        ));
        let user = User::new("link@example.com");
        repository.insert_user(&user).unwrap();
        (
            ConnectionService::new(Arc::clone(&repository), cipher, sync_service),
            repository,
            user,
        )
    }

    #[test]
    fn test_link_survives_failing_initial_sync() {
        // No Plaid adapter is configured, so the initial sync fails;
        // the connection must exist anyway.
        let (service, repository, user) = service();
        let view = service
            .link(user.id, Provider::Plaid, "Chase", "public-token")
            .unwrap();

        let stored = repository.get_connection(view.id).unwrap().unwrap();
        assert_eq!(stored.institution_name, "Chase");
        assert!(stored.cursor.is_none());
    }

    #[test]
    fn test_stored_token_is_encrypted_and_views_omit_it() {
        let (service, repository, user) = service();
        let view = service
            .link(user.id, Provider::Teller, "WF", "token-plaintext")
            .unwrap();

        let stored = repository.get_connection(view.id).unwrap().unwrap();
        assert_ne!(stored.access_token, "token-plaintext");

        let json = serde_json::to_value(service.list(user.id).unwrap()).unwrap();
        assert!(json.to_string().find("token").is_none() || !json.to_string().contains("plaintext"));
    }

    #[test]
    fn test_empty_token_rejected() {
        let (service, _, user) = service();
        assert!(matches!(
            service.link(user.id, Provider::Plaid, "Chase", ""),
            Err(Error::Validation(_))
        ));
    }
}

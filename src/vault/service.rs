use super::endpoints::VaultEndpoints;
use crate::config::{ConnectionSecrets, VaultConfig};
use crate::error::TodoError;
use tokio::sync::OnceCell;
use tracing::info;

/// Resolves named secrets from the vault.
///
/// The access token is acquired on first use and reused for every
/// subsequent lookup made through the same resolver. Nothing is retried:
/// the first failure is returned to the caller.
pub struct SecretResolver {
    config: VaultConfig,
    http_client: reqwest::Client,
    access_token: OnceCell<String>,
}

impl SecretResolver {
    pub fn new(config: VaultConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
            access_token: OnceCell::new(),
        }
    }

    pub async fn access_token(&self) -> Result<&str, TodoError> {
        self.access_token
            .get_or_try_init(|| VaultEndpoints::acquire_token(&self.config, &self.http_client))
            .await
            .map(String::as_str)
    }

    pub async fn get_secret(&self, name: &str) -> Result<String, TodoError> {
        let token = self.access_token().await?;
        let bundle =
            VaultEndpoints::fetch_secret(&self.config, token, name, &self.http_client).await?;
        bundle
            .value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| TodoError::EmptySecret(name.to_string()))
    }

    /// Fetch the four connection secrets, one after another, in a fixed order.
    pub async fn resolve_connection_secrets(&self) -> Result<ConnectionSecrets, TodoError> {
        let names = &self.config.secret_names;

        let account_uri = self.get_secret(&names.account_uri).await?;
        let key = self.get_secret(&names.key).await?;
        let database_name = self.get_secret(&names.database_name).await?;
        let container_name = self.get_secret(&names.container_name).await?;

        info!(
            vault = %self.config.base_uri,
            database = %database_name,
            container = %container_name,
            "Connection secrets resolved"
        );
        Ok(ConnectionSecrets {
            account_uri,
            key,
            database_name,
            container_name,
        })
    }
}

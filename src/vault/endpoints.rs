use crate::config::VaultConfig;
use crate::error::TodoError;
use crate::vault::SecretBundle;

use oauth2::{
    AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, Scope, TokenResponse,
    TokenUrl, basic::BasicClient,
};
use tracing::{debug, info};

/// Stateless secret-store endpoints.
pub(super) struct VaultEndpoints;

impl VaultEndpoints {
    /// Client-credential grant against the configured authority.
    pub(super) async fn acquire_token(
        cfg: &VaultConfig,
        http_client: &reqwest::Client,
    ) -> Result<String, TodoError> {
        let client = build_oauth2_client(cfg)?;
        let token_result = client
            .exchange_client_credentials()
            .add_scope(Scope::new(cfg.scope.clone()))
            .request_async(http_client)
            .await?;

        let access_token = token_result.access_token().secret();
        if access_token.trim().is_empty() {
            return Err(TodoError::MissingAccessToken);
        }
        info!(client_id = %cfg.client_id, "Vault access token acquired");
        Ok(access_token.clone())
    }

    pub(super) async fn fetch_secret(
        cfg: &VaultConfig,
        access_token: &str,
        name: &str,
        http_client: &reqwest::Client,
    ) -> Result<SecretBundle, TodoError> {
        let url = cfg.secret_url(name)?;
        let resp = http_client
            .get(url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TodoError::VaultStatus {
                name: name.to_string(),
                status,
            });
        }
        let bundle: SecretBundle = resp.json().await?;
        debug!(secret = name, id = ?bundle.id, "Secret bundle fetched");
        Ok(bundle)
    }
}

fn build_oauth2_client(cfg: &VaultConfig) -> Result<VaultOauth2Client, TodoError> {
    let client = BasicClient::new(ClientId::new(cfg.client_id.clone()))
        .set_client_secret(ClientSecret::new(cfg.client_secret.clone()))
        .set_auth_type(AuthType::RequestBody)
        .set_token_uri(TokenUrl::from_url(cfg.token_url()?));
    Ok(client)
}

type VaultOauth2Client =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

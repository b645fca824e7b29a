use crate::error::TodoError;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use url::Url;

/// Process-wide configuration, read once on first access.
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().expect("FATAL: failed to load configuration from environment")
});

/// Partition key path every provisioned container is declared with.
pub const PARTITION_KEY_PATH: &str = "/id";

/// REST API version sent to the Cosmos gateway.
pub const COSMOS_API_VERSION: &str = "2018-12-31";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub vault: VaultConfig,
    pub cosmos_db: CosmosDbSection,
    pub bootstrap: BootstrapConfig,
    pub http: HttpConfig,
}

impl Config {
    /// Defaults overlaid with `TODO_*` environment variables (`__` separates sections).
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("TODO_").split("__"))
    }

    pub fn load() -> Result<Self, TodoError> {
        Self::extract_from(Self::figment())
    }

    pub fn extract_from(figment: Figment) -> Result<Self, TodoError> {
        Ok(figment.extract()?)
    }

    /// Checks the settings the active bootstrap source needs, before any network call.
    pub fn validate(&self) -> Result<(), TodoError> {
        match self.bootstrap.source {
            SecretSource::Vault => {
                if self.vault.client_id.trim().is_empty() {
                    return Err(TodoError::Config("vault.client_id is not set".into()));
                }
                if self.vault.client_secret.trim().is_empty() {
                    return Err(TodoError::Config("vault.client_secret is not set".into()));
                }
            }
            SecretSource::Config => {
                self.cosmos_db.connection_secrets()?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        matches!(self, Environment::Development)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub loglevel: String,
    pub environment: Environment,
    pub static_dir: String,
    /// HTTPS port to redirect plain requests to. Redirection is skipped when unset.
    pub https_port: Option<u16>,
    pub hsts_max_age_secs: u64,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            loglevel: "info".to_string(),
            environment: Environment::default(),
            static_dir: "wwwroot".to_string(),
            https_port: None,
            hsts_max_age_secs: 30 * 24 * 60 * 60,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub base_uri: Url,
    pub authority: Url,
    pub tenant: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub api_version: String,
    pub secret_names: SecretNames,
}

impl VaultConfig {
    /// `{authority}/{tenant}/oauth2/v2.0/token`
    pub fn token_url(&self) -> Result<Url, url::ParseError> {
        let authority = ensure_trailing_slash(self.authority.clone());
        authority.join(&format!("{}/oauth2/v2.0/token", self.tenant))
    }

    /// `{base_uri}/secrets/{name}?api-version=...`
    pub fn secret_url(&self, name: &str) -> Result<Url, url::ParseError> {
        let base = ensure_trailing_slash(self.base_uri.clone());
        let mut url = base.join(&format!("secrets/{name}"))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            base_uri: Url::parse("https://cosmosdbkeys.vault.azure.net/")
                .expect("static vault url is valid"),
            authority: Url::parse("https://login.microsoftonline.com/")
                .expect("static authority url is valid"),
            tenant: "common".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            scope: "https://vault.azure.net/.default".to_string(),
            api_version: "7.4".to_string(),
            secret_names: SecretNames::default(),
        }
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("base_uri", &self.base_uri.as_str())
            .field("authority", &self.authority.as_str())
            .field("tenant", &self.tenant)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("api_version", &self.api_version)
            .field("secret_names", &self.secret_names)
            .finish()
    }
}

/// Logical secret names holding the Cosmos connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretNames {
    pub account_uri: String,
    pub key: String,
    pub database_name: String,
    pub container_name: String,
}

impl Default for SecretNames {
    fn default() -> Self {
        Self {
            account_uri: "cosmosdbURI".to_string(),
            key: "cosmosdbKeys".to_string(),
            database_name: "cosmosDBDatabaseName".to_string(),
            container_name: "cosmosDBContainerName".to_string(),
        }
    }
}

/// The `CosmosDb` section: direct connection parameters, used when
/// `bootstrap.source = "config"`.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmosDbSection {
    pub account: Option<String>,
    pub key: Option<String>,
    pub database_name: Option<String>,
    pub container_name: Option<String>,
}

impl CosmosDbSection {
    pub fn connection_secrets(&self) -> Result<ConnectionSecrets, TodoError> {
        fn required(value: &Option<String>, key: &str) -> Result<String, TodoError> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| TodoError::Config(format!("cosmos_db.{key} is not set")))
        }

        Ok(ConnectionSecrets {
            account_uri: required(&self.account, "account")?,
            key: required(&self.key, "key")?,
            database_name: required(&self.database_name, "database_name")?,
            container_name: required(&self.container_name, "container_name")?,
        })
    }
}

impl fmt::Debug for CosmosDbSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosmosDbSection")
            .field("account", &self.account)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("database_name", &self.database_name)
            .field("container_name", &self.container_name)
            .finish()
    }
}

/// Resolved connection parameters. Lives only for the duration of startup.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSecrets {
    pub account_uri: String,
    pub key: String,
    pub database_name: String,
    pub container_name: String,
}

impl fmt::Debug for ConnectionSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSecrets")
            .field("account_uri", &self.account_uri)
            .field("key", &"<redacted>")
            .field("database_name", &self.database_name)
            .field("container_name", &self.container_name)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretSource {
    #[default]
    Vault,
    Config,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub source: SecretSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub proxy: Option<Url>,
    /// Attempts made on HTTP 429 before a Cosmos call gives up.
    pub max_throttle_retries: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            timeout_secs: 30,
            proxy: None,
            max_throttle_retries: 9,
        }
    }
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

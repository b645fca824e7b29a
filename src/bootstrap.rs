//! Startup sequence that turns configuration into a ready `CosmosDbService`.
//!
//! Stages run strictly in order:
//! `Uninitialized -> AuthenticatingSecrets -> ClientConstructed ->
//! DatabaseEnsured -> ContainerEnsured -> Ready`.
//! A failing step ends the sequence with `TodoError::Startup`, naming the
//! stage it was trying to reach, and no handle is produced.

use crate::config::{Config, ConnectionSecrets, SecretSource};
use crate::cosmos::{CosmosClient, CosmosDbService};
use crate::error::TodoError;
use crate::http_client::build_http_client;
use crate::vault::SecretResolver;
use std::fmt;
use tracing::{error, info, warn};

const USER_AGENT: &str = concat!("todo-cosmos/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InitStage {
    Uninitialized,
    AuthenticatingSecrets,
    ClientConstructed,
    DatabaseEnsured,
    ContainerEnsured,
    Ready,
}

impl InitStage {
    fn next(self) -> Option<InitStage> {
        match self {
            InitStage::Uninitialized => Some(InitStage::AuthenticatingSecrets),
            InitStage::AuthenticatingSecrets => Some(InitStage::ClientConstructed),
            InitStage::ClientConstructed => Some(InitStage::DatabaseEnsured),
            InitStage::DatabaseEnsured => Some(InitStage::ContainerEnsured),
            InitStage::ContainerEnsured => Some(InitStage::Ready),
            InitStage::Ready => None,
        }
    }
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InitStage::Uninitialized => "initializing",
            InitStage::AuthenticatingSecrets => "authenticating secrets",
            InitStage::ClientConstructed => "constructing client",
            InitStage::DatabaseEnsured => "ensuring database",
            InitStage::ContainerEnsured => "ensuring container",
            InitStage::Ready => "ready",
        };
        f.write_str(text)
    }
}

/// Drives the startup stages. Consumed by `run`, so a failed bootstrap
/// cannot be resumed.
#[derive(Debug)]
pub struct Bootstrap {
    stage: InitStage,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}

impl Bootstrap {
    pub fn new() -> Self {
        Self {
            stage: InitStage::Uninitialized,
        }
    }

    pub fn stage(&self) -> InitStage {
        self.stage
    }

    pub async fn run(mut self, cfg: &Config) -> Result<CosmosDbService, TodoError> {
        let http_client = build_http_client(&cfg.http, USER_AGENT)?;

        let secrets = self
            .advance(resolve_secrets(cfg, http_client.clone()))
            .await?;

        let client = self
            .advance(async {
                CosmosClient::new(
                    &secrets.account_uri,
                    &secrets.key,
                    http_client,
                    cfg.http.max_throttle_retries,
                )
            })
            .await?;
        let ConnectionSecrets {
            database_name,
            container_name,
            ..
        } = secrets;
        let service = CosmosDbService::new(client, database_name, container_name);

        self.advance(service.ensure_database()).await?;
        self.advance(service.ensure_container()).await?;
        self.advance(async { Ok(()) }).await?;

        info!(
            endpoint = %service.client().endpoint(),
            database = service.database_name(),
            container = service.container_name(),
            "Cosmos DB service ready"
        );
        Ok(service)
    }

    /// Run the work that establishes the next stage, then record it.
    async fn advance<T, F>(&mut self, work: F) -> Result<T, TodoError>
    where
        F: Future<Output = Result<T, TodoError>>,
    {
        let Some(target) = self.stage.next() else {
            return Err(TodoError::Config("startup already completed".into()));
        };
        match work.await {
            Ok(value) => {
                info!(from = ?self.stage, to = ?target, "Startup stage reached");
                self.stage = target;
                Ok(value)
            }
            Err(e) => {
                error!(stage = %target, error = %e, "Startup failed");
                Err(TodoError::Startup {
                    stage: target,
                    source: Box::new(e),
                })
            }
        }
    }
}

async fn resolve_secrets(
    cfg: &Config,
    http_client: reqwest::Client,
) -> Result<ConnectionSecrets, TodoError> {
    cfg.validate()?;
    match cfg.bootstrap.source {
        SecretSource::Vault => {
            SecretResolver::new(cfg.vault.clone(), http_client)
                .resolve_connection_secrets()
                .await
        }
        SecretSource::Config => {
            warn!("Reading connection parameters from the cosmos_db section; vault is not consulted");
            cfg.cosmos_db.connection_secrets()
        }
    }
}

/// Resolve secrets, build the client and provision the database and container.
pub async fn initialize_cosmos_client_instance(
    cfg: &Config,
) -> Result<CosmosDbService, TodoError> {
    Bootstrap::new().run(cfg).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_follow_a_single_chain() {
        let mut stage = InitStage::Uninitialized;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            seen.push(next);
            stage = next;
        }
        assert_eq!(
            seen,
            vec![
                InitStage::Uninitialized,
                InitStage::AuthenticatingSecrets,
                InitStage::ClientConstructed,
                InitStage::DatabaseEnsured,
                InitStage::ContainerEnsured,
                InitStage::Ready,
            ]
        );
    }

    #[tokio::test]
    async fn advance_records_success_and_tags_failure() {
        let mut boot = Bootstrap::new();
        boot.advance(async { Ok(()) }).await.unwrap();
        assert_eq!(boot.stage(), InitStage::AuthenticatingSecrets);

        let err = boot
            .advance(async { Err::<(), _>(TodoError::MissingAccessToken) })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TodoError::Startup {
                stage: InitStage::ClientConstructed,
                ..
            }
        ));
        assert_eq!(boot.stage(), InitStage::AuthenticatingSecrets);
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_network_call() {
        let cfg = Config::default();
        let err = initialize_cosmos_client_instance(&cfg).await.unwrap_err();
        match err {
            TodoError::Startup { stage, source } => {
                assert_eq!(stage, InitStage::AuthenticatingSecrets);
                assert!(matches!(*source, TodoError::Config(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

use super::auth::{MasterKey, rfc1123};
use super::models::{
    ConnectionMode, ContainerDefinition, CosmosErrorBody, DatabaseDefinition, DocumentFeed,
    PartitionKeyDefinition, Provisioned, QuerySpec,
};
use crate::config::COSMOS_API_VERSION;
use crate::error::TodoError;
use backon::{ExponentialBuilder, Retryable};
use chrono::Utc;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const CONTINUATION_HEADER: &str = "x-ms-continuation";

fn throttle_retry_policy(max_times: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(max_times)
        .with_jitter()
}

/// Gateway-mode client for one Cosmos account.
///
/// Every call is signed with the account master key. Only HTTP 429 is
/// retried; any other failure is returned as is.
#[derive(Debug, Clone)]
pub struct CosmosClient {
    endpoint: Url,
    key: MasterKey,
    http_client: reqwest::Client,
    max_throttle_retries: usize,
}

/// One signed call against the gateway.
struct CosmosRequest<'a> {
    operation: &'static str,
    method: Method,
    url: Url,
    resource_type: &'static str,
    resource_link: String,
    partition_key: Option<&'a str>,
    body: Option<(Vec<u8>, &'static str)>,
    is_query: bool,
    continuation: Option<String>,
}

impl CosmosClient {
    pub fn new(
        account_uri: &str,
        key: &str,
        http_client: reqwest::Client,
        max_throttle_retries: usize,
    ) -> Result<Self, TodoError> {
        let endpoint = Url::parse(account_uri.trim())?;
        if endpoint.cannot_be_a_base() {
            return Err(TodoError::Config(format!(
                "account uri `{account_uri}` is not a base url"
            )));
        }
        let key = MasterKey::from_base64(key)?;
        info!(endpoint = %endpoint, mode = ?ConnectionMode::Gateway, "Cosmos client constructed");
        Ok(Self {
            endpoint,
            key,
            http_client,
            max_throttle_retries,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn connection_mode(&self) -> ConnectionMode {
        ConnectionMode::Gateway
    }

    pub async fn create_database_if_not_exists(
        &self,
        database: &str,
    ) -> Result<Provisioned, TodoError> {
        let body = serde_json::to_vec(&DatabaseDefinition { id: database })?;
        let req = CosmosRequest::new(
            "create database",
            Method::POST,
            self.resource_url(&["dbs"])?,
            "dbs",
            String::new(),
        )
        .with_json(body);

        let resp = self.send(&req).await?;
        let outcome = provision_outcome(req.operation, resp).await?;
        info!(database, ?outcome, "Database ensured");
        Ok(outcome)
    }

    /// Create the container if absent. An existing container must already
    /// be partitioned on `partition_key_path`.
    pub async fn create_container_if_not_exists(
        &self,
        database: &str,
        container: &str,
        partition_key_path: &str,
    ) -> Result<Provisioned, TodoError> {
        let body = serde_json::to_vec(&ContainerDefinition {
            id: container,
            partition_key: PartitionKeyDefinition::hash(partition_key_path),
        })?;
        let req = CosmosRequest::new(
            "create container",
            Method::POST,
            self.resource_url(&["dbs", database, "colls"])?,
            "colls",
            format!("dbs/{database}"),
        )
        .with_json(body);

        let resp = self.send(&req).await?;
        let outcome = provision_outcome(req.operation, resp).await?;
        if outcome == Provisioned::AlreadyExists {
            let existing = self.read_container_partition_key(database, container).await?;
            if existing.paths.first().map(String::as_str) != Some(partition_key_path) {
                return Err(TodoError::PartitionKeyMismatch {
                    container: container.to_string(),
                    expected: partition_key_path.to_string(),
                    actual: existing.paths.join(","),
                });
            }
        }
        info!(database, container, partition_key_path, ?outcome, "Container ensured");
        Ok(outcome)
    }

    async fn read_container_partition_key(
        &self,
        database: &str,
        container: &str,
    ) -> Result<PartitionKeyDefinition, TodoError> {
        #[derive(serde::Deserialize)]
        struct ContainerProperties {
            #[serde(rename = "partitionKey")]
            partition_key: PartitionKeyDefinition,
        }

        let req = CosmosRequest::new(
            "read container",
            Method::GET,
            self.resource_url(&["dbs", database, "colls", container])?,
            "colls",
            format!("dbs/{database}/colls/{container}"),
        );
        let resp = self.send(&req).await?;
        let resp = ensure_success(req.operation, resp).await?;
        let props: ContainerProperties = resp.json().await?;
        Ok(props.partition_key)
    }

    /// Run a SQL query across partitions, following continuation tokens to the end.
    pub async fn query_documents<T: DeserializeOwned>(
        &self,
        database: &str,
        container: &str,
        query: &str,
    ) -> Result<Vec<T>, TodoError> {
        let body = serde_json::to_vec(&QuerySpec {
            query,
            parameters: Vec::new(),
        })?;
        let mut req = CosmosRequest::new(
            "query documents",
            Method::POST,
            self.resource_url(&["dbs", database, "colls", container, "docs"])?,
            "docs",
            format!("dbs/{database}/colls/{container}"),
        )
        .with_body(body, "application/query+json");
        req.is_query = true;

        let mut results = Vec::new();
        loop {
            let resp = self.send(&req).await?;
            let resp = ensure_success(req.operation, resp).await?;
            let continuation = resp
                .headers()
                .get(CONTINUATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            let page: DocumentFeed<T> = resp.json().await?;
            debug!(count = page.documents.len(), "Query page received");
            results.extend(page.documents);

            match continuation {
                Some(token) => req.continuation = Some(token),
                None => break,
            }
        }
        Ok(results)
    }

    /// Point read. `Ok(None)` when the document does not exist.
    pub async fn read_document<T: DeserializeOwned>(
        &self,
        database: &str,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<Option<T>, TodoError> {
        let req = CosmosRequest::new(
            "read document",
            Method::GET,
            self.resource_url(&["dbs", database, "colls", container, "docs", id])?,
            "docs",
            format!("dbs/{database}/colls/{container}/docs/{id}"),
        )
        .with_partition_key(partition_key);

        let resp = self.send(&req).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = ensure_success(req.operation, resp).await?;
        Ok(Some(resp.json().await?))
    }

    pub async fn create_document<T: Serialize>(
        &self,
        database: &str,
        container: &str,
        partition_key: &str,
        document: &T,
    ) -> Result<(), TodoError> {
        let req = CosmosRequest::new(
            "create document",
            Method::POST,
            self.resource_url(&["dbs", database, "colls", container, "docs"])?,
            "docs",
            format!("dbs/{database}/colls/{container}"),
        )
        .with_partition_key(partition_key)
        .with_json(serde_json::to_vec(document)?);

        let resp = self.send(&req).await?;
        ensure_success(req.operation, resp).await?;
        Ok(())
    }

    /// Replace an existing document. `Ok(false)` when it does not exist.
    pub async fn replace_document<T: Serialize>(
        &self,
        database: &str,
        container: &str,
        id: &str,
        partition_key: &str,
        document: &T,
    ) -> Result<bool, TodoError> {
        let req = CosmosRequest::new(
            "replace document",
            Method::PUT,
            self.resource_url(&["dbs", database, "colls", container, "docs", id])?,
            "docs",
            format!("dbs/{database}/colls/{container}/docs/{id}"),
        )
        .with_partition_key(partition_key)
        .with_json(serde_json::to_vec(document)?);

        let resp = self.send(&req).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        ensure_success(req.operation, resp).await?;
        Ok(true)
    }

    /// Delete a document. `Ok(false)` when it does not exist.
    pub async fn delete_document(
        &self,
        database: &str,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<bool, TodoError> {
        let req = CosmosRequest::new(
            "delete document",
            Method::DELETE,
            self.resource_url(&["dbs", database, "colls", container, "docs", id])?,
            "docs",
            format!("dbs/{database}/colls/{container}/docs/{id}"),
        )
        .with_partition_key(partition_key);

        let resp = self.send(&req).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        ensure_success(req.operation, resp).await?;
        Ok(true)
    }

    fn resource_url(&self, segments: &[&str]) -> Result<Url, TodoError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| TodoError::Config("account uri is not a base url".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, req: &CosmosRequest<'_>) -> Result<reqwest::Response, TodoError> {
        (|| async {
            let date = rfc1123(Utc::now());
            let auth = self.key.authorization(
                req.method.as_str(),
                req.resource_type,
                &req.resource_link,
                &date,
            );

            let mut builder = self
                .http_client
                .request(req.method.clone(), req.url.clone())
                .header(AUTHORIZATION, auth)
                .header("x-ms-date", &date)
                .header("x-ms-version", COSMOS_API_VERSION)
                .header(ACCEPT, "application/json");
            if let Some(pk) = req.partition_key {
                builder = builder.header("x-ms-documentdb-partitionkey", serde_json::to_string(&[pk])?);
            }
            if req.is_query {
                builder = builder
                    .header("x-ms-documentdb-isquery", "True")
                    .header("x-ms-documentdb-query-enablecrosspartition", "True");
            }
            if let Some(token) = req.continuation.as_deref() {
                builder = builder.header(CONTINUATION_HEADER, token);
            }
            if let Some((body, content_type)) = req.body.as_ref() {
                builder = builder.header(CONTENT_TYPE, *content_type).body(body.clone());
            }

            let resp = builder.send().await?;
            if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                return Err(status_error(req.operation, resp).await);
            }
            Ok(resp)
        })
        .retry(throttle_retry_policy(self.max_throttle_retries))
        .when(TodoError::is_throttled)
        .notify(|err, dur: Duration| {
            warn!(operation = req.operation, "Cosmos throttled ({}), sleeping {:?}", err, dur);
        })
        .await
    }
}

impl<'a> CosmosRequest<'a> {
    fn new(
        operation: &'static str,
        method: Method,
        url: Url,
        resource_type: &'static str,
        resource_link: String,
    ) -> Self {
        Self {
            operation,
            method,
            url,
            resource_type,
            resource_link,
            partition_key: None,
            body: None,
            is_query: false,
            continuation: None,
        }
    }

    fn with_partition_key(mut self, partition_key: &'a str) -> Self {
        self.partition_key = Some(partition_key);
        self
    }

    fn with_json(self, body: Vec<u8>) -> Self {
        self.with_body(body, "application/json")
    }

    fn with_body(mut self, body: Vec<u8>, content_type: &'static str) -> Self {
        self.body = Some((body, content_type));
        self
    }
}

async fn provision_outcome(
    operation: &'static str,
    resp: reqwest::Response,
) -> Result<Provisioned, TodoError> {
    match resp.status() {
        StatusCode::CONFLICT => Ok(Provisioned::AlreadyExists),
        status if status.is_success() => Ok(Provisioned::Created),
        _ => Err(status_error(operation, resp).await),
    }
}

async fn ensure_success(
    operation: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, TodoError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(status_error(operation, resp).await)
    }
}

async fn status_error(operation: &'static str, resp: reqwest::Response) -> TodoError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<CosmosErrorBody>(&text) {
        Ok(body) if !body.code.is_empty() => format!("{}: {}", body.code, body.message),
        Ok(body) => body.message,
        Err(_) => text,
    };
    TodoError::CosmosStatus {
        operation,
        status,
        message,
    }
}

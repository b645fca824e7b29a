use serde::{Deserialize, Serialize};

/// A to-do entry as stored in the container. `id` doubles as the partition key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "isComplete", default)]
    pub completed: bool,
}

/// Outcome of an idempotent create-if-absent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Created,
    AlreadyExists,
}

/// How requests reach the account. Only the HTTPS gateway is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    Gateway,
}

#[derive(Debug, Serialize)]
pub(crate) struct DatabaseDefinition<'a> {
    pub id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ContainerDefinition<'a> {
    pub id: &'a str,
    #[serde(rename = "partitionKey")]
    pub partition_key: PartitionKeyDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionKeyDefinition {
    pub paths: Vec<String>,
    pub kind: String,
}

impl PartitionKeyDefinition {
    pub fn hash(path: &str) -> Self {
        Self {
            paths: vec![path.to_string()],
            kind: "Hash".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuerySpec<'a> {
    pub query: &'a str,
    pub parameters: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentFeed<T> {
    #[serde(rename = "Documents")]
    pub documents: Vec<T>,
}

/// Error payload returned by the gateway.
#[derive(Debug, Deserialize)]
pub(crate) struct CosmosErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

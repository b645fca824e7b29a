use super::client::CosmosClient;
use super::models::{Item, Provisioned};
use crate::config::PARTITION_KEY_PATH;
use crate::error::TodoError;

/// Item store bound to one database and container.
#[derive(Debug)]
pub struct CosmosDbService {
    client: CosmosClient,
    database_name: String,
    container_name: String,
}

impl CosmosDbService {
    pub fn new(
        client: CosmosClient,
        database_name: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            database_name: database_name.into(),
            container_name: container_name.into(),
        }
    }

    pub fn client(&self) -> &CosmosClient {
        &self.client
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub async fn ensure_database(&self) -> Result<Provisioned, TodoError> {
        self.client
            .create_database_if_not_exists(&self.database_name)
            .await
    }

    /// Always partitioned on `/id`.
    pub async fn ensure_container(&self) -> Result<Provisioned, TodoError> {
        self.client
            .create_container_if_not_exists(
                &self.database_name,
                &self.container_name,
                PARTITION_KEY_PATH,
            )
            .await
    }

    pub async fn get_items(&self, query: &str) -> Result<Vec<Item>, TodoError> {
        self.client
            .query_documents(&self.database_name, &self.container_name, query)
            .await
    }

    pub async fn get_item(&self, id: &str) -> Result<Option<Item>, TodoError> {
        self.client
            .read_document(&self.database_name, &self.container_name, id, id)
            .await
    }

    pub async fn add_item(&self, item: &Item) -> Result<(), TodoError> {
        self.client
            .create_document(&self.database_name, &self.container_name, &item.id, item)
            .await
    }

    pub async fn update_item(&self, id: &str, item: &Item) -> Result<(), TodoError> {
        let replaced = self
            .client
            .replace_document(&self.database_name, &self.container_name, id, id, item)
            .await?;
        if replaced {
            Ok(())
        } else {
            Err(TodoError::ItemNotFound(id.to_string()))
        }
    }

    pub async fn delete_item(&self, id: &str) -> Result<(), TodoError> {
        let deleted = self
            .client
            .delete_document(&self.database_name, &self.container_name, id, id)
            .await?;
        if deleted {
            Ok(())
        } else {
            Err(TodoError::ItemNotFound(id.to_string()))
        }
    }
}

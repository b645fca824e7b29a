use crate::cosmos::Item;
use crate::{TodoError, router::TodoState};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

/// The index lists only items still to be done.
const INDEX_QUERY: &str = "SELECT * FROM c WHERE c.isComplete = false";

/// Editable fields of an item. The id always comes from the route or is generated.
#[derive(Debug, Deserialize)]
pub struct ItemForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "isComplete", default)]
    pub completed: bool,
}

impl ItemForm {
    fn into_item(self, id: String) -> Result<Item, TodoError> {
        if self.name.trim().is_empty() {
            return Err(TodoError::InvalidItem("name must not be empty".into()));
        }
        Ok(Item {
            id,
            name: self.name,
            description: self.description,
            completed: self.completed,
        })
    }
}

/// GET / | /Item | /Item/Index
pub async fn index(State(state): State<TodoState>) -> Result<Json<Vec<Item>>, TodoError> {
    Ok(Json(state.cosmos.get_items(INDEX_QUERY).await?))
}

/// GET /Item/Details/{id}
pub async fn details(
    State(state): State<TodoState>,
    Path(id): Path<String>,
) -> Result<Json<Item>, TodoError> {
    state
        .cosmos
        .get_item(&id)
        .await?
        .map(Json)
        .ok_or(TodoError::ItemNotFound(id))
}

/// POST /Item/Create
pub async fn create(
    State(state): State<TodoState>,
    Json(form): Json<ItemForm>,
) -> Result<impl IntoResponse, TodoError> {
    let item = form.into_item(uuid::Uuid::new_v4().to_string())?;
    state.cosmos.add_item(&item).await?;
    info!(id = %item.id, "Item created");
    Ok((StatusCode::CREATED, Json(item)))
}

/// POST /Item/Edit/{id}
pub async fn edit(
    State(state): State<TodoState>,
    Path(id): Path<String>,
    Json(form): Json<ItemForm>,
) -> Result<Json<Item>, TodoError> {
    let item = form.into_item(id)?;
    state.cosmos.update_item(&item.id, &item).await?;
    info!(id = %item.id, "Item updated");
    Ok(Json(item))
}

/// POST /Item/Delete/{id}
pub async fn delete(
    State(state): State<TodoState>,
    Path(id): Path<String>,
) -> Result<StatusCode, TodoError> {
    state.cosmos.delete_item(&id).await?;
    info!(id = %id, "Item deleted");
    Ok(StatusCode::NO_CONTENT)
}

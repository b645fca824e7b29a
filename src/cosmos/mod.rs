//! Cosmos DB over the REST gateway.
//!
//! Layout:
//! - `auth.rs`: master-key request signing
//! - `client.rs`: `CosmosClient`, provisioning and document calls
//! - `models.rs`: `Item` and resource payloads
//! - `service.rs`: `CosmosDbService`, the handle the web layer uses

pub mod auth;
pub mod client;
pub mod models;
pub mod service;

pub use client::CosmosClient;
pub use models::{ConnectionMode, Item, Provisioned};
pub use service::CosmosDbService;

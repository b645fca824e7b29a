pub mod bootstrap;
pub mod config;
pub mod cosmos;
pub mod error;
pub mod handlers;
pub mod http_client;
pub mod middleware;
pub mod router;
pub mod shutdown;
pub mod vault;

pub use bootstrap::{InitStage, initialize_cosmos_client_instance};
pub use cosmos::CosmosDbService;
pub use error::TodoError;
pub use vault::SecretResolver;

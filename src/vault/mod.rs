//! Secret store access: client-credential authentication and secret lookup.
//!
//! Layout:
//! - `endpoints.rs`: raw token and secret calls
//! - `service.rs`: `SecretResolver`, which reuses one access token per startup

mod endpoints;
pub mod service;

pub use service::SecretResolver;

use serde::Deserialize;
use std::fmt;

/// A secret as returned by the vault. Only `value` is used.
#[derive(Deserialize)]
pub struct SecretBundle {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "contentType")]
    pub content_type: Option<String>,
}

impl fmt::Debug for SecretBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBundle")
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .field("id", &self.id)
            .field("content_type", &self.content_type)
            .finish()
    }
}

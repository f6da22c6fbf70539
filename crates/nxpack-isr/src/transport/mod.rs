//! Transports for the outbound invalidation call

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RevalidateError;

pub mod memory;

#[cfg(feature = "http")]
pub mod http;

/// Body of an invalidation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationRequest {
    pub paths: Vec<String>,
    /// Host the paths were requested on
    pub domain: String,
}

/// Platform answer to an invalidation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationResponse {
    pub ok: bool,
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

impl InvalidationResponse {
    pub fn success() -> Self {
        Self {
            ok: true,
            code: None,
            message: None,
        }
    }
}

/// Trait for invalidation transports
///
/// One call per revalidation request. Implementations do not retry.
#[async_trait]
pub trait InvalidationTransport: Send + Sync {
    async fn invalidate(
        &self,
        request: &InvalidationRequest,
    ) -> Result<InvalidationResponse, RevalidateError>;

    /// Get transport name
    fn name(&self) -> &'static str;
}

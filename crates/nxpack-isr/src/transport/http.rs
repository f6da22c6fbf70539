//! HTTP transport: the platform's on-demand builder refresh endpoint

use async_trait::async_trait;
use tracing::debug;

use super::{InvalidationRequest, InvalidationResponse, InvalidationTransport};
use crate::config::RevalidateConfig;
use crate::error::RevalidateError;

/// POSTs `{paths, domain}` to `<api>/sites/<site>/refresh_on_demand_builders`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpTransport {
    pub fn new(config: &RevalidateConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint(),
            token: config.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl InvalidationTransport for HttpTransport {
    async fn invalidate(
        &self,
        request: &InvalidationRequest,
    ) -> Result<InvalidationResponse, RevalidateError> {
        debug!(endpoint = %self.endpoint, paths = ?request.paths, "sending invalidation");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(RevalidateError::transport)?;

        let status = response.status();
        let body = response.text().await.map_err(RevalidateError::transport)?;

        match serde_json::from_str::<InvalidationResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if status.is_success() => Err(RevalidateError::transport(format!(
                "unexpected response body: {}",
                body
            ))),
            Err(_) => Err(RevalidateError::Rejected {
                code: status.as_u16(),
                message: body,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

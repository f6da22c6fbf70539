//! Revalidation request handling
//!
//! A page triggers revalidation by requesting itself with the
//! `x-prerender-revalidate` header. The handler resolves the artifacts of
//! that path and asks the platform to drop them. Whatever happens, the
//! normal response is still served.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::RevalidateError;
use crate::resolver::RevalidationResolver;
use crate::transport::{InvalidationRequest, InvalidationTransport};

pub const REVALIDATE_HEADER: &str = "x-prerender-revalidate";

/// What happened to the revalidation part of a request
#[derive(Debug)]
pub enum RevalidationOutcome {
    /// Not a revalidation request
    NotRequested,
    Revalidated { paths: Vec<String> },
    Failed(RevalidateError),
}

impl RevalidationOutcome {
    pub fn is_revalidated(&self) -> bool {
        matches!(self, RevalidationOutcome::Revalidated { .. })
    }
}

pub struct Revalidator<T: InvalidationTransport> {
    resolver: RevalidationResolver,
    transport: T,
    timeout: Option<Duration>,
}

impl<T: InvalidationTransport> Revalidator<T> {
    pub fn new(resolver: RevalidationResolver, transport: T) -> Self {
        Self {
            resolver,
            transport,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether a request carrying `header` asks for revalidation
    ///
    /// The header must carry the build's preview mode id; without one in
    /// the manifest, no request qualifies.
    pub fn is_revalidation_request(&self, header: Option<&str>) -> bool {
        match (header, self.resolver.manifest().preview_mode_id()) {
            (Some(value), Some(secret)) => value == secret,
            _ => false,
        }
    }

    /// Resolves `path` and invalidates its artifacts on `domain`
    pub async fn revalidate(
        &self,
        path: &str,
        domain: &str,
    ) -> Result<Vec<String>, RevalidateError> {
        let paths = self.resolver.paths_for(path)?;
        let request = InvalidationRequest {
            paths: paths.clone(),
            domain: domain.to_string(),
        };

        let call = self.transport.invalidate(&request);
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| RevalidateError::Timeout(limit))??,
            None => call.await?,
        };

        if !response.ok {
            return Err(RevalidateError::Rejected {
                code: response.code.unwrap_or(500),
                message: response.message.unwrap_or_default(),
            });
        }

        info!(transport = self.transport.name(), ?paths, %domain, "revalidated");
        Ok(paths)
    }

    /// Request-handler entry point; never fails the request
    pub async fn handle(
        &self,
        path: &str,
        domain: &str,
        header: Option<&str>,
    ) -> RevalidationOutcome {
        if !self.is_revalidation_request(header) {
            return RevalidationOutcome::NotRequested;
        }

        match self.revalidate(path, domain).await {
            Ok(paths) => RevalidationOutcome::Revalidated { paths },
            Err(error) => {
                warn!(%path, %error, "revalidation failed, serving the response anyway");
                RevalidationOutcome::Failed(error)
            }
        }
    }
}

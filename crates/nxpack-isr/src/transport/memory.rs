//! In-memory transport
//!
//! Records every request and answers with a canned response. Useful for
//! local development, where no platform API is reachable.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{InvalidationRequest, InvalidationResponse, InvalidationTransport};
use crate::error::RevalidateError;

#[derive(Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<RwLock<Vec<InvalidationRequest>>>,
    responses: Arc<RwLock<VecDeque<InvalidationResponse>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the answer for the next call; with none queued, calls succeed
    pub async fn respond_with(&self, response: InvalidationResponse) {
        self.responses.write().await.push_back(response);
    }

    /// Requests received so far, oldest first
    pub async fn sent(&self) -> Vec<InvalidationRequest> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl InvalidationTransport for MemoryTransport {
    async fn invalidate(
        &self,
        request: &InvalidationRequest,
    ) -> Result<InvalidationResponse, RevalidateError> {
        self.sent.write().await.push(request.clone());
        let queued = self.responses.write().await.pop_front();
        Ok(queued.unwrap_or_else(InvalidationResponse::success))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

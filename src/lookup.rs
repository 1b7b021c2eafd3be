//! Dictionary and translation lookups
//!
//! The reader can look up a word or translate a selection while the previous lookup is still
//! in flight. Each kind of lookup runs on its own token channel so only the most recent
//! request of that kind commits; how requests reach a backend is up to the provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::token::{Channel, OperationOutcome, OperationTokens};

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("No entry for: {0}")]
    NotFound(String),

    #[error("Lookup failed: {0}")]
    Failed(String),
}

/// A lookup request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LookupRequest {
    Define {
        word: String,
    },
    #[serde(rename_all = "camelCase")]
    Translate {
        text: String,
        target_language: String,
    },
}

/// A lookup response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    /// The text that was looked up
    pub query: String,
    /// Definition or translation
    pub content: String,
    /// Backend that answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Lookup backend
#[async_trait]
pub trait LookupProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    async fn lookup(&self, request: &LookupRequest) -> Result<LookupResponse, LookupError>;
}

/// Runs lookups on the dictionary and translation channels
pub struct LookupCoordinator {
    provider: Arc<dyn LookupProvider>,
    tokens: Arc<OperationTokens>,
}

impl LookupCoordinator {
    pub fn new(provider: Arc<dyn LookupProvider>, tokens: Arc<OperationTokens>) -> Self {
        Self { provider, tokens }
    }

    pub async fn define(&self, word: &str) -> OperationOutcome<Result<LookupResponse, LookupError>> {
        let request = LookupRequest::Define {
            word: word.trim().to_string(),
        };
        self.run(Channel::Dictionary, request).await
    }

    pub async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> OperationOutcome<Result<LookupResponse, LookupError>> {
        let request = LookupRequest::Translate {
            text: text.to_string(),
            target_language: target_language.to_string(),
        };
        self.run(Channel::Translation, request).await
    }

    async fn run(
        &self,
        channel: Channel,
        request: LookupRequest,
    ) -> OperationOutcome<Result<LookupResponse, LookupError>> {
        let outcome = self
            .tokens
            .channel(channel)
            .run_latest(self.provider.lookup(&request))
            .await;

        match &outcome {
            OperationOutcome::Committed(Err(e)) => {
                warn!(provider = self.provider.name(), ?channel, error = %e, "Lookup failed");
            }
            OperationOutcome::Superseded => {
                debug!(provider = self.provider.name(), ?channel, "Lookup superseded");
            }
            OperationOutcome::Committed(Ok(_)) => {}
        }
        outcome
    }
}

//! Client for the retrieval-augmented conversational engine.
//!
//! The engine is stateless from the bridge's point of view: it receives the
//! project identifier and the bounded history, and answers with reply text
//! (plus an optional image the voice channel ignores).

use crate::config::EngineConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use estatebot_types::HistoryWindow;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineReply {
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[async_trait]
pub trait ConversationEngine: Send + Sync {
    async fn generate(
        &self,
        config_id: &str,
        history: &HistoryWindow,
    ) -> Result<EngineReply, VoiceError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    project: &'a str,
    history: &'a HistoryWindow,
    /// Asks for the spoken-style answer: one short paragraph, numbers
    /// written out, ending in a follow-up question.
    voice_mode: bool,
}

/// Calls the engine over HTTP with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpConversationEngine {
    client: reqwest::Client,
    url: String,
}

impl HttpConversationEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VoiceError::Engine(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl ConversationEngine for HttpConversationEngine {
    async fn generate(
        &self,
        config_id: &str,
        history: &HistoryWindow,
    ) -> Result<EngineReply, VoiceError> {
        let body = GenerateRequest {
            project: config_id,
            history,
            voice_mode: true,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Engine(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Engine(format!(
                "engine returned {status}: {detail}"
            )));
        }

        let reply: EngineReply = response
            .json()
            .await
            .map_err(|e| VoiceError::Engine(format!("invalid engine response: {e}")))?;

        if reply.text.trim().is_empty() {
            return Err(VoiceError::Engine("engine returned an empty reply".to_string()));
        }
        Ok(reply)
    }
}

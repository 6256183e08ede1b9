use crate::error::Result;
use crate::llm::types::CompletionRequest;
use async_trait::async_trait;
use std::sync::Arc;

/// The external completion service: one request in, text out.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Whether a call could be attempted at all. Checked before any dataset
    /// fetch so a misconfigured service fails fast.
    fn is_configured(&self) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[async_trait]
impl<T: CompletionGateway + ?Sized> CompletionGateway for Arc<T> {
    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        (**self).complete(request).await
    }
}

#[cfg(feature = "remote")]
pub use self::openai::OpenAiCompletionClient;

#[cfg(feature = "remote")]
mod openai {
    use super::*;
    use crate::config::InsightConfig;
    use crate::error::InsightError;
    use crate::llm::types::{ChatCompletionPayload, ChatCompletionResponse};
    use log::debug;
    use reqwest::Client;

    /// Client for OpenAI-compatible `chat/completions` endpoints.
    ///
    /// Every call is a single attempt: no retries and no client-side timeout.
    #[derive(Clone)]
    pub struct OpenAiCompletionClient {
        client: Client,
        api_key: Option<String>,
        base_url: String,
        temperature: f32,
    }

    impl OpenAiCompletionClient {
        pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
            Self {
                client: Client::new(),
                api_key: api_key.filter(|key| !key.trim().is_empty()),
                base_url: base_url.into(),
                temperature: 0.3,
            }
        }

        pub fn from_config(config: &InsightConfig) -> Self {
            Self::new(config.api_key.clone(), config.completion_base_url.clone())
                .with_temperature(config.temperature)
        }

        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = temperature;
            self
        }
    }

    #[async_trait]
    impl CompletionGateway for OpenAiCompletionClient {
        fn is_configured(&self) -> bool {
            self.api_key.is_some()
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            let api_key = self.api_key.as_deref().ok_or_else(|| {
                InsightError::Configuration("completion service API key is not set".to_string())
            })?;

            let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
            let payload = ChatCompletionPayload {
                model: request.model.clone(),
                messages: request.messages(),
                temperature: self.temperature,
            };
            debug!(
                "Requesting completion from model {} ({} messages)",
                payload.model,
                payload.messages.len()
            );

            let res = self
                .client
                .post(&url)
                .bearer_auth(api_key.trim())
                .json(&payload)
                .send()
                .await?;
            let status = res.status();
            let body = res.text().await?;

            if !status.is_success() {
                return Err(InsightError::Upstream {
                    status: status.as_u16(),
                    body,
                });
            }

            let parsed: ChatCompletionResponse =
                serde_json::from_str(&body).map_err(|_| InsightError::Upstream {
                    status: status.as_u16(),
                    body: body.clone(),
                })?;

            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or(InsightError::Upstream {
                    status: status.as_u16(),
                    body,
                })
        }
    }
}

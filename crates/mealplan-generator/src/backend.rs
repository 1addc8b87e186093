//! Completion backends.

use async_trait::async_trait;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, JsonSpec};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ClientConfig};
use genai::{ModelIden, ServiceTarget, adapter::AdapterKind};
use tracing::debug;

use crate::error::GenerationError;

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// The external text-completion call behind every generation attempt.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, GenerationError>;
}

/// Settings for [`GenaiBackend`].
#[derive(Debug, Clone)]
pub struct GenaiConfig {
    pub model: String,
    /// OpenAI-compatible endpoint overriding the model's default provider
    pub api_base_url: Option<String>,
    pub temperature: f64,
    /// JSON schema requested as the response format, if any
    pub response_schema: Option<serde_json::Value>,
}

impl Default for GenaiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base_url: None,
            temperature: DEFAULT_TEMPERATURE,
            response_schema: None,
        }
    }
}

/// Chat-completion backend built on the `genai` client.
pub struct GenaiBackend {
    client: Client,
    model: String,
}

impl GenaiBackend {
    pub fn new(config: GenaiConfig) -> Self {
        let mut chat_options = ChatOptions::default()
            .with_temperature(config.temperature)
            .with_normalize_reasoning_content(true);
        if let Some(schema) = config.response_schema {
            chat_options = chat_options.with_response_format(JsonSpec::new("meal_plan", schema));
        }

        let mut client_builder = Client::builder().with_config(ClientConfig::default().with_chat_options(chat_options));

        if let Some(base_url) = config.api_base_url.as_deref() {
            client_builder = client_builder.with_service_target_resolver(create_target_resolver(base_url));
        }

        Self {
            client: client_builder.build(),
            model: config.model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn create_target_resolver(base_url: &str) -> ServiceTargetResolver {
    let base_url_owned = base_url.to_string();

    ServiceTargetResolver::from_resolver_fn(
        move |service_target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let ServiceTarget { model, .. } = service_target;

            // A custom base URL is assumed to speak the OpenAI protocol
            let endpoint = Endpoint::from_owned(base_url_owned.clone());
            let model = ModelIden::new(AdapterKind::OpenAI, model.model_name);
            let auth = AuthData::from_env("OPENAI_API_KEY");

            Ok(ServiceTarget {
                endpoint,
                auth,
                model,
            })
        },
    )
}

#[async_trait]
impl CompletionBackend for GenaiBackend {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, GenerationError> {
        let chat_req = ChatRequest::new(vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)]);

        debug!("Sending completion request to {}", self.model);
        let chat_res = self
            .client
            .exec_chat(&self.model, chat_req, None)
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        chat_res
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| GenerationError::MalformedResult("completion contained no text".to_string()))
    }
}

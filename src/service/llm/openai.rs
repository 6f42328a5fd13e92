//! Integration with the OpenAI chat completions API.
//!
//! This module provides a thin wrapper around `async-openai` that turns a
//! normalized prompt into a chat completion request, and hands back the
//! content of the first choice.

use std::sync::Arc;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::base::{
    config::Config,
    types::{PromptMessage, PromptRole, Res},
};

use super::{GenericLlmClient, LlmClient};

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(config: &Config) -> Self {
        let client = OpenAiLlmClient::new(config);
        Self { inner: Arc::new(client) }
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let mut cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());

        if let Some(base_url) = &config.openai_base_url {
            info!("Using OpenAI base URL: {}", base_url);
            cfg = cfg.with_api_base(base_url.clone());
        }

        Self {
            client: Client::with_config(cfg),
            model: config.openai_model.clone(),
        }
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::complete", skip_all, fields(model = %self.model, messages = messages.len()))]
    async fn complete(&self, messages: Vec<PromptMessage>) -> Res<Option<String>> {
        let request = CreateChatCompletionRequestArgs::default().model(&self.model).messages(to_openai_messages(messages)?).build()?;

        let response = self.client.chat().create(request).await?;

        debug!("LLM response has {} choices.", response.choices.len());

        Ok(response.choices.into_iter().next().and_then(|choice| choice.message.content))
    }
}

/// Map prompt messages onto OpenAI request messages, keeping their order.
pub fn to_openai_messages(messages: Vec<PromptMessage>) -> Res<Vec<ChatCompletionRequestMessage>> {
    messages
        .into_iter()
        .map(|message| {
            let result: ChatCompletionRequestMessage = match message.role {
                PromptRole::System => ChatCompletionRequestSystemMessageArgs::default().content(message.content).build()?.into(),
                PromptRole::User => ChatCompletionRequestUserMessageArgs::default().content(message.content).build()?.into(),
                PromptRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default().content(message.content).build()?.into(),
            };

            Ok(result)
        })
        .collect()
}

// Tests.

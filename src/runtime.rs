//! Runtime services and shared state for thread-gpt.

use tracing::instrument;

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::dispatch::Dispatcher,
    service::{chat::ChatClient, llm::LlmClient},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the LLM client, chat client, and configuration.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The LLM client instance.
    pub llm: LlmClient,
    /// The chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the LLM client.
        let llm = LlmClient::openai(&config);

        // Initialize the slack client.
        let chat = ChatClient::slack(&config).await?;

        Ok(Self { config, llm, chat })
    }

    /// The dispatcher every transport hands its events to.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.config.clone(), self.llm.clone(), self.chat.clone())
    }

    /// Listen for chat events until the process stops.
    pub async fn start(&self) -> Void {
        self.chat.start(self.dispatcher()).await
    }
}

pub mod slack;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::{
    base::types::{ChatMessage, Res, Void},
    interaction::dispatch::Dispatcher,
};

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the core functionality for interacting with chat platforms
/// like Slack. Implementing this trait allows different chat services to be used
/// with thread-gpt.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Get the bot user ID.
    ///
    /// Returns the unique identifier for the bot in the chat platform,
    /// which is used to detect mentions and the bot's own messages.
    fn bot_user_id(&self) -> &str;

    /// Start the chat client listener.
    ///
    /// Receives events from the chat platform and hands each of them to the
    /// dispatcher. Runs until the process is stopped.
    async fn start(&self, dispatcher: Dispatcher) -> Void;

    /// Post a reply into a channel thread.
    async fn post_reply(&self, channel_id: &str, thread_ts: &str, text: &str) -> Void;

    /// Fetch every message of a thread, oldest first.
    async fn fetch_thread(&self, channel_id: &str, thread_ts: &str) -> Res<Vec<ChatMessage>>;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}

//! Decides whether to answer an event, and answers it in-thread.
//!
//! Mentions are answered from the mention text alone. Replies inside an
//! existing channel thread are answered from the full thread history.

use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{ChatMessage, InboundEvent, InboundMessage, Void},
    },
    interaction::thread::normalize_thread,
    service::{chat::ChatClient, llm::LlmClient},
};

/// Dispatches inbound events to the LLM, and posts replies.
///
/// It is designed to be trivially cloneable, so every hosting transport can
/// hold one and hand events to it.
#[derive(Clone)]
pub struct Dispatcher {
    config: Config,
    llm: LlmClient,
    chat: ChatClient,
}

impl Dispatcher {
    pub fn new(config: Config, llm: LlmClient, chat: ChatClient) -> Self {
        Self { config, llm, chat }
    }

    /// Handle an event on its own task.
    ///
    /// Errors are logged, and never reach the caller or the user.
    #[instrument(skip_all, fields(kind = event.kind()))]
    pub fn dispatch(&self, event: InboundEvent) {
        let dispatcher = self.clone();

        tokio::spawn(
            async move {
                // Process the event.
                let result = dispatcher.handle(event).await;

                // Log any errors.
                if let Err(err) = &result {
                    error!("Error while handling: {}", err);
                }
            }
            .in_current_span(),
        );
    }

    /// Handle an event to completion.
    pub async fn handle(&self, event: InboundEvent) -> Void {
        match event {
            InboundEvent::Mention(message) => self.handle_app_mention(message).await,
            InboundEvent::Message(message) => self.handle_message(message).await,
        }
    }

    #[instrument(skip_all, fields(channel = %event.channel, ts = %event.ts))]
    async fn handle_app_mention(&self, event: InboundMessage) -> Void {
        info!("Handling app mention ...");

        let thread = vec![ChatMessage::new(event.user.clone().unwrap_or_default(), event.text.clone())];

        self.reply_with_completion(&event.channel, reply_anchor(&event), &thread).await
    }

    #[instrument(skip_all, fields(channel = %event.channel, ts = %event.ts))]
    async fn handle_message(&self, event: InboundMessage) -> Void {
        if !should_reply_to_message(&event, self.chat.bot_user_id()) {
            debug!("Skipping message event.");
            return Ok(());
        }

        info!("Handling thread reply ...");

        let thread_ts = reply_anchor(&event);
        let thread = self.chat.fetch_thread(&event.channel, thread_ts).await?;

        info!("Fetched {} thread messages.", thread.len());

        self.reply_with_completion(&event.channel, thread_ts, &thread).await
    }

    /// Run the completion for a thread, and post the result into it.
    async fn reply_with_completion(&self, channel_id: &str, thread_ts: &str, thread: &[ChatMessage]) -> Void {
        let prompt = normalize_thread(thread, self.chat.bot_user_id(), &self.config.system_directive);

        let Some(reply) = self.llm.complete(prompt).await? else {
            warn!("LLM returned no choices; not replying.");
            return Ok(());
        };

        if reply.trim().is_empty() {
            warn!("LLM returned an empty reply; not replying.");
            return Ok(());
        }

        self.chat.post_reply(channel_id, thread_ts, &reply).await
    }
}

/// Whether a generic message event should be answered.
///
/// Only replies inside an existing public channel thread qualify, and never
/// the bot's own messages.
pub fn should_reply_to_message(event: &InboundMessage, bot_user_id: &str) -> bool {
    event.channel_type.as_deref() == Some("channel") && event.thread_ts.is_some() && event.user.as_deref() != Some(bot_user_id)
}

/// The thread a reply belongs in: the parent thread, or the event itself.
pub fn reply_anchor(event: &InboundMessage) -> &str {
    event.thread_ts.as_deref().unwrap_or(&event.ts)
}

// Tests.

//! Slack integration for thread-gpt.
//!
//! This module provides functionality for interacting with Slack:
//! - Receiving events over Socket Mode or the Events API (HTTP push)
//! - Posting threaded replies
//! - Retrieving thread history
//!
//! Both transports convert Slack events into `InboundEvent`s and hand them to
//! the same `Dispatcher`.

use crate::{
    base::{
        config::{Config, SlackTransport},
        types::{ChatMessage, InboundEvent, InboundMessage, Res, Void},
    },
    interaction::dispatch::Dispatcher,
};
use async_trait::async_trait;
use axum::{
    Extension, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use slack_morphism::prelude::*;
use tracing::{debug, error, info, instrument, warn};

use std::sync::Arc;

use super::{ChatClient, GenericChatClient};

// Type aliases.

type FullConnector = SlackClientHyperConnector<HttpsConnector<HttpConnector>>;
type FullClient = slack_morphism::SlackClient<FullConnector>;

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config) -> Res<Self> {
        let client = SlackChatClient::new(config).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    dispatcher: Dispatcher,
}

/// Slack client implementation.
#[derive(Clone)]
struct SlackChatClient {
    pub app_token: SlackApiToken,
    pub bot_token: SlackApiToken,
    pub bot_user_id: String,
    pub client: Arc<FullClient>,
    pub config: Config,
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config) -> Res<Self> {
        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Get the bot's user ID.

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;
        let bot_user_id = bot_user.user_id.0;

        info!("Slack bot user ID: {}", bot_user_id);

        Ok(Self {
            app_token,
            bot_token,
            bot_user_id,
            client,
            config: config.clone(),
        })
    }

    /// Receive events over a Socket Mode websocket.
    async fn start_socket_mode(&self, dispatcher: Dispatcher) -> Void {
        info!("Starting Slack Socket Mode listener ...");

        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_event);

        // Initialize the socket mode listener environment.

        let listener_environment = Arc::new(
            SlackClientEventsListenerEnvironment::new(self.client.clone())
                .with_error_handler(handle_listener_error)
                .with_user_state(SlackUserState { dispatcher }),
        );

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment.clone(),
            socket_mode_callbacks,
        ));

        // Register an app token to listen for events,
        socket_mode_listener.listen_for(&self.app_token).await?;

        // Start WS connections calling Slack API to get WS url for the token,
        // and wait for Ctrl-C to shutdown.
        socket_mode_listener.serve().await;

        Ok(())
    }

    /// Receive events as signed HTTP push requests.
    async fn start_http(&self, dispatcher: Dispatcher) -> Void {
        let addr = self.config.http_socket_addr()?;

        info!("Starting Slack Events API listener on {}{} ...", addr, self.config.http_events_path);

        let listener_environment = Arc::new(SlackClientEventsListenerEnvironment::new(self.client.clone()).with_error_handler(handle_listener_error));
        let signing_secret: SlackSigningSecret = self.config.slack_signing_secret.clone().into();

        let listener: SlackEventsAxumListener<HttpsConnector<HttpConnector>> = SlackEventsAxumListener::new(listener_environment);

        let app = Router::new()
            .route(
                &self.config.http_events_path,
                post(handle_http_push_event).layer(listener.events_layer(&signing_secret).with_event_extractor(SlackEventsExtractors::push_event())),
            )
            .with_state(dispatcher);

        let tcp_listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(tcp_listener, app).await?;

        Ok(())
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn start(&self, dispatcher: Dispatcher) -> Void {
        match self.config.slack_transport {
            SlackTransport::Socket => self.start_socket_mode(dispatcher).await,
            SlackTransport::Http => self.start_http(dispatcher).await,
        }
    }

    #[instrument(skip(self, text))]
    async fn post_reply(&self, channel_id: &str, thread_ts: &str, text: &str) -> Void {
        let request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel_id.to_string()), reply_content(text)).with_thread_ts(SlackTs(thread_ts.to_string()));

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_post_message(&request).await.map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_thread(&self, channel_id: &str, thread_ts: &str) -> Res<Vec<ChatMessage>> {
        let session = self.client.open_session(&self.bot_token);

        let mut messages = Vec::new();
        let mut cursor: Option<SlackCursorId> = None;

        // Follow the cursor until Slack has returned the whole thread.
        loop {
            let mut request = SlackApiConversationsRepliesRequest::new(SlackChannelId(channel_id.to_string()), SlackTs(thread_ts.to_string()));

            if let Some(cursor) = cursor.take() {
                request = request.with_cursor(cursor);
            }

            let response = session
                .conversations_replies(&request)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to fetch thread replies: {}", e))?;

            messages.extend(response.messages.iter().map(chat_message_from_history));

            cursor = response.response_metadata.and_then(|metadata| metadata.next_cursor).filter(|next| !next.0.is_empty());

            if cursor.is_none() {
                break;
            }
        }

        Ok(messages)
    }
}

// Conversions.

/// The reply payload: one `mrkdwn` section holding the raw completion.
fn reply_content(text: &str) -> SlackMessageContent {
    SlackMessageContent::new().with_blocks(vec![SlackBlock::Section(
        SlackSectionBlock::new().with_text(SlackBlockText::MarkDown(SlackBlockMarkDownText::new(text.to_string()))),
    )])
}

/// Convert a message from `conversations.replies` into a `ChatMessage`.
fn chat_message_from_history(message: &SlackHistoryMessage) -> ChatMessage {
    ChatMessage::new(
        message.sender.user.as_ref().map(|user| user.0.clone()).unwrap_or_default(),
        message.content.text.clone().unwrap_or_default(),
    )
}

/// Convert a Slack push event into an event the dispatcher understands.
///
/// Returns `None` for events the bot does not handle.
fn inbound_event_from_push(event: &SlackEventCallbackBody) -> Option<InboundEvent> {
    match event {
        SlackEventCallbackBody::AppMention(mention) => Some(InboundEvent::Mention(InboundMessage {
            user: Some(mention.user.0.clone()),
            text: mention.content.text.clone().unwrap_or_default(),
            channel: mention.channel.0.clone(),
            ts: mention.origin.ts.0.clone(),
            thread_ts: mention.origin.thread_ts.as_ref().map(|ts| ts.0.clone()),
            channel_type: mention.origin.channel_type.as_ref().map(|channel_type| channel_type.0.clone()),
        })),
        SlackEventCallbackBody::Message(message) => {
            let Some(channel) = &message.origin.channel else {
                warn!("Skipping message event without a channel.");
                return None;
            };

            Some(InboundEvent::Message(InboundMessage {
                user: message.sender.user.as_ref().map(|user| user.0.clone()),
                text: message.content.as_ref().and_then(|content| content.text.clone()).unwrap_or_default(),
                channel: channel.0.clone(),
                ts: message.origin.ts.0.clone(),
                thread_ts: message.origin.thread_ts.as_ref().map(|ts| ts.0.clone()),
                channel_type: message.origin.channel_type.as_ref().map(|channel_type| channel_type.0.clone()),
            }))
        }
        _ => {
            debug!("Received unhandled push event.");
            None
        }
    }
}

// Listener callbacks for Slack.

/// Handles Socket Mode push events from Slack.
#[instrument(skip_all)]
async fn handle_push_event(event_callback: SlackPushEventCallback, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    if let Some(event) = inbound_event_from_push(&event_callback.event) {
        info!("Received {} event ...", event.kind());
        user_state.dispatcher.dispatch(event);
    }

    Ok(())
}

/// Handles Events API push requests from Slack.
///
/// The signature has already been checked by the events layer.
#[instrument(skip_all)]
async fn handle_http_push_event(State(dispatcher): State<Dispatcher>, Extension(event): Extension<SlackPushEvent>) -> Response {
    match event {
        SlackPushEvent::UrlVerification(url_verification) => {
            info!("Answering URL verification challenge ...");
            url_verification.challenge.into_response()
        }
        SlackPushEvent::EventCallback(event_callback) => {
            if let Some(event) = inbound_event_from_push(&event_callback.event) {
                info!("Received {} event ...", event.kind());
                dispatcher.dispatch(event);
            }

            StatusCode::OK.into_response()
        }
        _ => {
            debug!("Received unhandled push request.");
            StatusCode::OK.into_response()
        }
    }
}

/// Logs listener errors (bad signatures, malformed payloads, ...).
fn handle_listener_error(err: Box<dyn std::error::Error + Send + Sync>, _client: Arc<SlackHyperClient>, _states: SlackClientEventsUserState) -> StatusCode {
    error!("Slack listener error: {}", err);
    StatusCode::BAD_REQUEST
}

// Tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::mock;
    use serde_json::json;

    use super::*;
    use crate::{
        base::{
            config::ConfigInner,
            types::{PromptMessage, PromptRole},
        },
        service::llm::{GenericLlmClient, LlmClient},
    };

    mock! {
        pub Chat {}

        #[async_trait]
        impl GenericChatClient for Chat {
            fn bot_user_id(&self) -> &str;
            async fn start(&self, dispatcher: Dispatcher) -> Void;
            async fn post_reply(&self, channel_id: &str, thread_ts: &str, text: &str) -> Void;
            async fn fetch_thread(&self, channel_id: &str, thread_ts: &str) -> Res<Vec<ChatMessage>>;
        }
    }

    mock! {
        pub Llm {}

        #[async_trait]
        impl GenericLlmClient for Llm {
            async fn complete(&self, messages: Vec<PromptMessage>) -> Res<Option<String>>;
        }
    }

    fn get_dispatcher(chat: MockChat, llm: MockLlm) -> Dispatcher {
        let config = Config::from(ConfigInner {
            system_directive: "Use mrkdwn.".to_string(),
            ..Default::default()
        });

        Dispatcher::new(config, LlmClient::new(Arc::new(llm)), ChatClient::new(Arc::new(chat)))
    }

    fn get_silent_dispatcher() -> Dispatcher {
        let mut chat = MockChat::new();
        chat.expect_bot_user_id().return_const("BOT123".to_string());
        chat.expect_fetch_thread().never();
        chat.expect_post_reply().never();

        let mut llm = MockLlm::new();
        llm.expect_complete().never();

        get_dispatcher(chat, llm)
    }

    fn push_request(value: serde_json::Value) -> SlackPushEvent {
        serde_json::from_value(value).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn push_event(value: serde_json::Value) -> SlackEventCallbackBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_app_mention_converts_to_mention() {
        let body = push_event(json!({
            "type": "app_mention",
            "user": "U1544",
            "text": "<@BOT123> what is 2+2?",
            "ts": "1700000000.000100",
            "channel": "C01TEST",
            "event_ts": "1700000000.000100"
        }));

        let Some(InboundEvent::Mention(message)) = inbound_event_from_push(&body) else {
            panic!("Expected a mention event");
        };

        assert_eq!(message.user.as_deref(), Some("U1544"));
        assert_eq!(message.text, "<@BOT123> what is 2+2?");
        assert_eq!(message.channel, "C01TEST");
        assert_eq!(message.ts, "1700000000.000100");
        assert_eq!(message.thread_ts, None);
    }

    #[test]
    fn test_thread_reply_converts_to_message() {
        let body = push_event(json!({
            "type": "message",
            "user": "U1544",
            "text": "and then?",
            "ts": "1700000001.000200",
            "thread_ts": "1700000000.000100",
            "channel": "C01TEST",
            "channel_type": "channel"
        }));

        let Some(InboundEvent::Message(message)) = inbound_event_from_push(&body) else {
            panic!("Expected a message event");
        };

        assert_eq!(message.user.as_deref(), Some("U1544"));
        assert_eq!(message.text, "and then?");
        assert_eq!(message.thread_ts.as_deref(), Some("1700000000.000100"));
        assert_eq!(message.channel_type.as_deref(), Some("channel"));
    }

    #[test]
    fn test_history_message_without_user_has_empty_author() {
        let message: SlackHistoryMessage = serde_json::from_value(json!({
            "ts": "1700000000.000100",
            "text": "posted by an integration"
        }))
        .unwrap();

        assert_eq!(chat_message_from_history(&message), ChatMessage::new("", "posted by an integration"));
    }

    #[test]
    fn test_reply_content_is_a_single_mrkdwn_section() {
        let content = serde_json::to_value(reply_content("*bold* answer")).unwrap();

        assert_eq!(
            content["blocks"],
            json!([
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": "*bold* answer" }
                }
            ])
        );
    }

    #[tokio::test]
    async fn test_http_url_verification_returns_challenge() {
        let request = push_request(json!({
            "type": "url_verification",
            "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"
        }));

        let response = handle_http_push_event(State(get_silent_dispatcher()), Extension(request)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P");
    }

    #[tokio::test]
    async fn test_http_app_mention_is_answered() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let mut chat = MockChat::new();
        chat.expect_bot_user_id().return_const("BOT123".to_string());
        chat.expect_fetch_thread().never();
        chat.expect_post_reply().times(1).returning(move |channel_id, thread_ts, text| {
            tx.send((channel_id.to_string(), thread_ts.to_string(), text.to_string())).unwrap();
            Ok(())
        });

        let mut llm = MockLlm::new();
        llm.expect_complete()
            .times(1)
            .withf(|messages| messages.last() == Some(&PromptMessage::new(PromptRole::User, "what is 2+2?")))
            .returning(|_| Ok(Some("4".to_string())));

        let request = push_request(json!({
            "type": "event_callback",
            "team_id": "T01TEST",
            "api_app_id": "A01TEST",
            "event_id": "Ev01TEST",
            "event_time": 1700000000,
            "event": {
                "type": "app_mention",
                "user": "U1544",
                "text": "<@BOT123> what is 2+2?",
                "ts": "1700000000.000100",
                "channel": "C01TEST",
                "event_ts": "1700000000.000100"
            }
        }));

        let response = handle_http_push_event(State(get_dispatcher(chat, llm)), Extension(request)).await;

        assert_eq!(response.status(), StatusCode::OK);

        let reply = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();

        assert_eq!(reply, ("C01TEST".to_string(), "1700000000.000100".to_string(), "4".to_string()));
    }

    #[tokio::test]
    async fn test_http_unhandled_event_is_acknowledged() {
        let request = push_request(json!({
            "type": "event_callback",
            "team_id": "T01TEST",
            "api_app_id": "A01TEST",
            "event_id": "Ev01TEST",
            "event_time": 1700000000,
            "event": {
                "type": "message",
                "user": "U1544",
                "text": "no channel attached",
                "ts": "1700000000.000100"
            }
        }));

        let response = handle_http_push_event(State(get_silent_dispatcher()), Extension(request)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.is_empty());
    }
}

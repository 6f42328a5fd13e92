//! Library root for `thread-gpt`.
//!
//! Thread-gpt is an OpenAI-powered assistant for Slack that:
//! - Answers when it is @-mentioned
//! - Keeps answering replies in threads, using the whole thread as context
//! - Replies in-thread using Slack's `mrkdwn` formatting
//!
//! The bot integrates with Slack for chat, and OpenAI for responses. The
//! architecture is built around traits that allow for different
//! implementations of each service.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the thread-gpt runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with LLM and chat clients
/// - Starts listening for chat events
pub async fn start(config: Config) -> Void {
    info!("Starting thread-gpt ...");

    // Start the crypto provider.
    crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install the rustls crypto provider"))?;

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}

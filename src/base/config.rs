//! Load configuration via `config` crate with env-override support.

use std::{net::SocketAddr, ops::Deref, path::Path, sync::Arc};

use serde::Deserialize;

use crate::base::prompts;

use super::types::Res;

/// Default OpenAI model to use.
fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

/// Default system directive.
fn default_system_directive() -> String {
    prompts::SYSTEM_DIRECTIVE.to_string()
}

fn default_http_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_http_events_path() -> String {
    "/slack/events".to_string()
}

/// How the bot receives events from Slack.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlackTransport {
    /// Persistent Socket Mode websocket (needs an app-level token).
    #[default]
    Socket,
    /// Events API push requests over HTTP (needs the signing secret).
    Http,
}

/// Configuration for the thread-gpt application.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// OpenAI API key (`OPENAI_API_KEY`).
    pub openai_api_key: String,
    /// Optional OpenAI-compatible base URL (`OPENAI_BASE_URL`).
    #[serde(default)]
    pub openai_base_url: Option<String>,
    /// OpenAI model to use (`OPENAI_MODEL`).
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// System directive prepended to every prompt (`SYSTEM_DIRECTIVE`).
    #[serde(default = "default_system_directive")]
    pub system_directive: String,
    /// Slack bot token (`SLACK_BOT_TOKEN`).
    pub slack_bot_token: String,
    /// Slack event transport (`SLACK_TRANSPORT`), `socket` or `http`.
    #[serde(default)]
    pub slack_transport: SlackTransport,
    /// Slack app token (`SLACK_APP_TOKEN`), used by the socket transport.
    #[serde(default)]
    pub slack_app_token: String,
    /// Slack signing secret (`SLACK_SIGNING_SECRET`), used by the http transport.
    #[serde(default)]
    pub slack_signing_secret: String,
    /// Listen address for the http transport (`HTTP_BIND_ADDRESS`).
    #[serde(default = "default_http_bind_address")]
    pub http_bind_address: String,
    /// Path Slack pushes events to for the http transport (`HTTP_EVENTS_PATH`).
    #[serde(default = "default_http_events_path")]
    pub http_events_path: String,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>) -> Res<Self> {
        Self::load_with_env(explicit_path, config::Environment::default().prefix("THREAD_GPT"))
    }

    /// Load from the file (if any), then let `env` override it.
    fn load_with_env(explicit_path: Option<&Path>, env: config::Environment) -> Res<Self> {
        let mut cfg = config::Config::builder();

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.add_source(env).build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check the settings that the selected transport depends on.
    pub fn validate(&self) -> Res<()> {
        if self.openai_model.trim().is_empty() {
            return Err(anyhow::anyhow!("OpenAI model must not be empty."));
        }

        if self.system_directive.trim().is_empty() {
            return Err(anyhow::anyhow!("System directive must not be empty."));
        }

        if self.slack_bot_token.is_empty() {
            return Err(anyhow::anyhow!("Slack bot token must be set."));
        }

        match self.slack_transport {
            SlackTransport::Socket => {
                if self.slack_app_token.is_empty() {
                    return Err(anyhow::anyhow!("Slack app token must be set for the socket transport."));
                }
            }
            SlackTransport::Http => {
                if self.slack_signing_secret.is_empty() {
                    return Err(anyhow::anyhow!("Slack signing secret must be set for the http transport."));
                }

                self.http_socket_addr()?;

                if !self.http_events_path.starts_with('/') {
                    return Err(anyhow::anyhow!("HTTP events path must start with `/`."));
                }
            }
        }

        Ok(())
    }

    /// Parse the http transport listen address.
    pub fn http_socket_addr(&self) -> Res<SocketAddr> {
        self.http_bind_address
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP bind address `{}`: {}", self.http_bind_address, e))
    }
}

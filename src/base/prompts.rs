//! System directives for LLM usage.

/// Default system directive prepended to every prompt.
///
/// Slack renders `mrkdwn`, not CommonMark, so the model is told to use it.
pub const SYSTEM_DIRECTIVE: &str = "You are a Slack bot. Make sure to format your messages using mrkdwn syntax.";

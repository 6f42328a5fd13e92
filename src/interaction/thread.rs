//! Turns chat threads into completion prompts.
//!
//! Every chat message becomes one prompt entry: the bot's own messages are
//! `assistant` turns, everything else is a `user` turn. Mentions of the bot
//! are stripped so the model does not see its own handle in every question.

use crate::base::types::{ChatMessage, PromptMessage, PromptRole};

/// The Slack mention token for a user ID (e.g., `<@U12345>`).
pub fn mention_token(bot_user_id: &str) -> String {
    format!("<@{bot_user_id}>")
}

/// Remove every mention of the bot from `text`, and trim the result.
///
/// Removal repeats until no token is left, so a token spliced together by a
/// previous removal (`<@BOT<@BOT>>`) is removed too.
pub fn strip_mention(text: &str, bot_user_id: &str) -> String {
    let token = mention_token(bot_user_id);
    let mut text = text.to_string();

    while text.contains(&token) {
        text = text.replace(&token, "");
    }

    text.trim().to_string()
}

/// The prompt role of a message written by `user`.
pub fn infer_role(user: &str, bot_user_id: &str) -> PromptRole {
    if user == bot_user_id { PromptRole::Assistant } else { PromptRole::User }
}

/// Normalize a chat thread into a prompt, prefixed by the system directive.
///
/// Input order is preserved, and nothing is dropped or deduplicated.
pub fn normalize_thread(messages: &[ChatMessage], bot_user_id: &str, system_directive: &str) -> Vec<PromptMessage> {
    let mut prompt = Vec::with_capacity(messages.len() + 1);

    prompt.push(PromptMessage::new(PromptRole::System, system_directive));

    prompt.extend(
        messages
            .iter()
            .map(|message| PromptMessage::new(infer_role(&message.user, bot_user_id), strip_mention(&message.text, bot_user_id))),
    );

    prompt
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "BOT123";
    const DIRECTIVE: &str = "Use mrkdwn.";

    #[test]
    fn test_normalize_example_question() {
        let messages = vec![ChatMessage::new("U1544", "<@BOT123> what is 2+2?")];

        let prompt = normalize_thread(&messages, BOT, DIRECTIVE);

        assert_eq!(
            prompt,
            vec![
                PromptMessage::new(PromptRole::System, DIRECTIVE),
                PromptMessage::new(PromptRole::User, "what is 2+2?"),
            ]
        );
    }

    #[test]
    fn test_normalize_preserves_length_and_order() {
        let messages = vec![
            ChatMessage::new("U1", "first"),
            ChatMessage::new(BOT, "second"),
            ChatMessage::new("U2", "third <@BOT123>"),
            ChatMessage::new("U1", "first"),
        ];

        let prompt = normalize_thread(&messages, BOT, DIRECTIVE);

        assert_eq!(prompt.len(), messages.len() + 1);
        assert_eq!(prompt[0].role, PromptRole::System);

        let contents = prompt[1..].iter().map(|p| p.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["first", "second", "third", "first"]);
    }

    #[test]
    fn test_normalize_empty_thread_is_just_the_directive() {
        let prompt = normalize_thread(&[], BOT, DIRECTIVE);

        assert_eq!(prompt, vec![PromptMessage::new(PromptRole::System, DIRECTIVE)]);
    }

    #[test]
    fn test_infer_role() {
        assert_eq!(infer_role(BOT, BOT), PromptRole::Assistant);
        assert_eq!(infer_role("U1", BOT), PromptRole::User);
        assert_eq!(infer_role("", BOT), PromptRole::User);
        assert_eq!(infer_role("bot123", BOT), PromptRole::User);
    }

    #[test]
    fn test_strip_mention_removes_every_occurrence() {
        assert_eq!(strip_mention("<@BOT123> hi <@BOT123> there <@BOT123>", BOT), "hi  there");
        assert_eq!(strip_mention("  <@U999> hi  ", BOT), "<@U999> hi");
        assert_eq!(strip_mention("<@BOT123>", BOT), "");
    }

    #[test]
    fn test_strip_mention_is_idempotent() {
        let inputs = ["<@BOT123> what is 2+2?", "  plain  ", "<@BOT123><@BOT123>", "a <@BOT123> b", "<@BOT<@BOT123>123> x", ""];

        for input in inputs {
            let once = strip_mention(input, BOT);
            assert_eq!(strip_mention(&once, BOT), once, "input: {input:?}");
        }
    }
}

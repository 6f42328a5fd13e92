//! Event handling and user interactions for thread-gpt.
//!
//! This module provides functionality for handling chat events:
//! - Normalizing chat threads into completion prompts
//! - Deciding which events get answered
//! - Coordinating responses between services (LLM, chat)

pub mod dispatch;
pub mod thread;

//! Core components, types, and utilities for thread-gpt.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - The default system directive for LLM interactions.
//! - Common types and result handling.

pub mod config;
pub mod prompts;
pub mod types;

//! LLM provider abstraction.
//!
//! The agent talks to a language model through [`LlmApi`]. The production
//! implementation is an OpenAI-compatible chat completions client with
//! function calling.

mod client;
mod error;
mod http;
mod openai_compat;
mod types;

pub use client::LlmApi;
pub use error::{Error, format_api_error};
pub use openai_compat::OpenAICompatClient;
pub use types::*;

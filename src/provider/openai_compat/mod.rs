//! OpenAI-compatible chat completions client.

mod client;
mod request;
mod response;

pub use client::OpenAICompatClient;

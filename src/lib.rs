#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod agent;
pub mod cli;
pub mod config;
pub mod credential;
pub mod error;
pub mod mcp;
pub mod provider;
pub mod server;
pub mod session;

pub use error::{Error, Result};

use std::any::Any;
use thiserror::Error;

/// Failures that end a top-level command.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Execute(#[from] crate::session::ExecuteError),

    #[error("Server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

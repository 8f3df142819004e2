use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("tag not found: {0}")]
    TagNotFound(String),

    #[error("cannot move tag '{dragged}' to '{target}': {reason}")]
    InvalidMove {
        dragged: String,
        target: String,
        reason: &'static str,
    },

    #[error("tag name must not be empty")]
    InvalidName,

    #[error("duplicate tag id: {0}")]
    DuplicateTagId(String),

    #[error("prompt not found: {0}")]
    PromptNotFound(String),

    #[error("prompt id already in use: {0}")]
    DuplicatePromptId(String),

    /// A required field was blank.
    #[error("{0} must not be empty")]
    InvalidPrompt(&'static str),

    #[error("{0} must not be empty")]
    InvalidUser(&'static str),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("no user is signed in")]
    NotSignedIn,

    #[error("only the author can change prompt {0}")]
    NotAuthor(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

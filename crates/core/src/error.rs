use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    /// A handle was used after the page it came from was replaced.
    #[error("stale element reference: handle from page generation {handle}, session is at {current}")]
    StaleReference { handle: u64, current: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Entry link not found: {0}")]
    EntryLinkNotFound(String),

    #[error("Semester selector not found: {0}")]
    SelectorNotFound(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn is_stale(&self) -> bool {
        matches!(self, Error::StaleReference { .. })
    }

    /// Errors that end the run instead of being recorded and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::EntryLinkNotFound(_) | Error::SelectorNotFound(_) | Error::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Unexpected content type: {0}")]
    ContentType(String),

    #[error("Scrape error: {0}")]
    Scrape(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration keys in [{section}]: {}", keys.join(", "))]
    MissingConfigKeys { section: String, keys: Vec<String> },

    #[error("Store connection error: {0}")]
    StoreConnection(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid: {0}")]
    Invalid(String),
}

impl Error {
    /// Failures that mean the store itself is unusable, as opposed to one
    /// statement being rejected.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::StoreConnection(_) => true,
            Error::Database(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::FeedParse(_) => "FEED_PARSE",
            Error::HttpError(_) => "HTTP_ERROR",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Timeout(_) => "TIMEOUT",
            Error::ContentType(_) => "CONTENT_TYPE",
            Error::Scrape(_) => "SCRAPE",
            Error::Io(_) => "IO_ERROR",
            Error::Config(_) => "CONFIG",
            Error::MissingConfigKeys { .. } => "CONFIG_MISSING_KEYS",
            Error::StoreConnection(_) => "STORE_CONNECTION",
            Error::Database(_) => "DATABASE",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Invalid(_) => "INVALID",
        }
    }
}

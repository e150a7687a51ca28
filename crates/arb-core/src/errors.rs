/// Core error type for the relay bot.
///
/// Adapter crates map their specific errors into this type so the core flows
/// can tell a dead recipient apart from a transient failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// The key-value store or the user directory could not be reached.
    #[error("store unavailable: {0}")]
    Store(String),

    /// The recipient blocked the bot, was deactivated or cannot be messaged.
    #[error("recipient unreachable: {0}")]
    Unreachable(String),

    #[error("malformed callback token: {0}")]
    MalformedToken(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::Unreachable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use shell_game::ShellError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::CodecError),
    #[error("timed out waiting for websocket frame")]
    Timeout,
    #[error("server returned {code} for {syscall}: {message}")]
    ServerError { syscall: String, code: String, message: String },
    #[error("unexpected frame: {0}")]
    UnexpectedFrame(String),
    #[error("only the GM can {0}")]
    NotGm(&'static str),
    #[error("invalid settings: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Server-side error code, if the server rejected the request.
    #[must_use]
    pub fn server_code(&self) -> Option<&str> {
        match self {
            Self::ServerError { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WsConnect(Box::new(error))
    }
}

impl From<CliError> for ShellError {
    fn from(error: CliError) -> Self {
        match error {
            CliError::WsClosed | CliError::WsConnect(_) => Self::Relay(error.to_string()),
            other => Self::Host(other.to_string()),
        }
    }
}

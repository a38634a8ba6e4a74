use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered the request with an error status.
    #[error("request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The server reported that the interviewer failed mid-turn.
    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("stream closed before the reply was done")]
    ClosedWithoutDone,

    #[error("turn aborted")]
    Aborted,

    #[error("a turn is already streaming")]
    Busy,

    #[error("no conversation attached")]
    Detached,
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

use crate::types::SessionState;

/// Errors that can occur when driving a camera control session.
#[derive(Debug, thiserror::Error)]
pub enum NetcamError {
    #[error("command timed out waiting for completion")]
    Timeout,

    #[error("engine returned error {code}: {message}")]
    Protocol { code: i32, message: String },

    #[error("no stream profiles available from device")]
    NoStreamsAvailable,

    #[error("requested stream was not found")]
    UnknownProfile,

    #[error("session description has no media sections")]
    MalformedDescription,

    #[error("response is not a numeric value: {0:?}")]
    MalformedValue(String),

    #[error("failed to reach device: {0}")]
    ServerUnreachable(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("{op} not valid in state {state:?}")]
    InvalidState {
        op: &'static str,
        state: SessionState,
    },

    #[error("session is closed")]
    SessionClosed,
}

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// The gateway refused the game; the view must be left, not retried.
    #[error("not authorized for this game")]
    Unauthorized,
    #[error("gateway unreachable: {0}")]
    Transport(String),
    #[error("unexpected gateway response: {0}")]
    Malformed(String),
    #[error("controller has been closed")]
    Detached,
    #[error("replay sessions are read-only")]
    ReplayMutation,
}

impl ControllerError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ControllerError::Transport(_))
    }
}

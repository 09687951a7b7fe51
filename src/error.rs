use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("bookmaker line is empty")]
    Empty,
    #[error("bookmaker line is not a number")]
    NotNumeric,
    #[error("bookmaker line is not finite")]
    NotFinite,
    #[error("bookmaker line must be greater than zero")]
    NotPositive,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("transport failure: {0}")]
    Transport(String),

    // Caught before dispatch; the request is never sent.
    #[error("malformed input: {0}")]
    MalformedInput(#[from] LineError),

    #[error("no player selected")]
    NoPlayer,

    #[error("projection for the current matchup is not ready")]
    ProjectionPending,
}

impl QueryError {
    pub fn transport(err: &anyhow::Error) -> Self {
        Self::Transport(format!("{err:#}"))
    }
}

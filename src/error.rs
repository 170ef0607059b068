use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BlissError {
    #[error("'{0}' is not a valid selector")]
    InvalidSelector(String),
    #[error("the new child element contains the parent")]
    HierarchyRequest,
    #[error("the reference node has no parent")]
    Detached,
    #[error("{handler}: expected {expected}")]
    InvalidValue {
        handler: &'static str,
        expected: &'static str,
    },
    #[error("no tokio runtime is available to schedule timers")]
    NoRuntime,
    #[error("every resolver was dropped before settling")]
    Abandoned,
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("URL parameter is mandatory and cannot be {0}")]
    MissingUrl(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Status(String),
    #[error("Network Error")]
    Network,
}

impl BlissError {
    pub(crate) fn invalid(handler: &'static str, expected: &'static str) -> Self {
        BlissError::InvalidValue { handler, expected }
    }
}

pub type Result<T, E = BlissError> = std::result::Result<T, E>;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sitehook_core_types::SiteError;

#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    #[error("{0} not found")]
    ElementNotFound(String),
    #[error("lifecycle violation: {0}")]
    Lifecycle(String),
    #[error("host '{0}' is not supported by this adapter")]
    UnsupportedHost(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("render error: {0}")]
    Render(String),
    #[error("dom error: {0}")]
    Dom(#[from] SiteError),
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Failure kinds reported on `tool:execution-failed`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ElementNotFound,
    OperationException,
}

impl AdapterError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AdapterError::ElementNotFound(_) => FailureKind::ElementNotFound,
            _ => FailureKind::OperationException,
        }
    }
}

impl From<AdapterError> for SiteError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Dom(inner) => inner,
            other => SiteError::new(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_elements_map_to_element_not_found() {
        assert_eq!(
            AdapterError::ElementNotFound("chat input".into()).failure_kind(),
            FailureKind::ElementNotFound
        );
        assert_eq!(
            AdapterError::Dom(SiteError::new("boom")).failure_kind(),
            FailureKind::OperationException
        );
    }
}

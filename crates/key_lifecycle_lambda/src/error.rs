use key_lifecycle_core::contract::RequestError;

use crate::adapters::key_service::KeyServiceError;

/// Errors that reject a whole invocation before any key is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("Execution not allowed in account {account_id}")]
    PolicyViolation { account_id: String },
    #[error("Failed to resolve caller account: {0}")]
    AccountLookup(#[source] KeyServiceError),
}

impl DispatchError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Request(_) => 400,
            Self::PolicyViolation { .. } => 403,
            Self::AccountLookup(_) => 502,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request(RequestError::Validation(_)) => "validation_error",
            Self::Request(RequestError::UnsupportedAction(_)) => "unsupported_action",
            Self::PolicyViolation { .. } => "policy_violation",
            Self::AccountLookup(_) => "account_lookup_failed",
        }
    }
}

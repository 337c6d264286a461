use super::key_service::KeyServiceError;

/// Resolves the account the handler is running in.
pub trait AccountResolver {
    fn caller_account_id(&self) -> Result<String, KeyServiceError>;
}

use key_lifecycle_core::key_state::KeyState;

pub const NOT_FOUND_CODE: &str = "NotFoundException";
pub const ALREADY_EXISTS_CODE: &str = "AlreadyExistsException";

/// Failure reported by the key-management service, keeping the provider's
/// error code when one was returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct KeyServiceError {
    pub code: Option<String>,
    pub message: String,
}

impl KeyServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code.as_deref() == Some(NOT_FOUND_CODE)
    }

    pub fn is_already_exists(&self) -> bool {
        self.code.as_deref() == Some(ALREADY_EXISTS_CODE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

pub fn tag_value<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|tag| tag.key == key)
        .map(|tag| tag.value.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSpec {
    pub replica_region: String,
    pub policy: String,
    pub tags: Vec<Tag>,
    pub description: String,
}

/// Control-plane calls against the key-management service. Every call names
/// the region it targets; `key_id` accepts a key ARN or an `alias/` name.
pub trait KeyService {
    fn describe_key_state(&self, region: &str, key_id: &str) -> Result<KeyState, KeyServiceError>;

    fn disable_key(&self, region: &str, key_id: &str) -> Result<(), KeyServiceError>;

    fn enable_key(&self, region: &str, key_id: &str) -> Result<(), KeyServiceError>;

    fn list_tags(&self, region: &str, key_id: &str) -> Result<Vec<Tag>, KeyServiceError>;

    fn tag_key(&self, region: &str, key_id: &str, tags: &[Tag]) -> Result<(), KeyServiceError>;

    fn untag_key(&self, region: &str, key_id: &str, tag_keys: &[&str])
        -> Result<(), KeyServiceError>;

    fn schedule_deletion(
        &self,
        region: &str,
        key_id: &str,
        pending_window_days: i32,
    ) -> Result<(), KeyServiceError>;

    fn cancel_deletion(&self, region: &str, key_id: &str) -> Result<(), KeyServiceError>;

    fn list_aliases(&self, region: &str, key_id: &str) -> Result<Vec<String>, KeyServiceError>;

    fn create_alias(
        &self,
        region: &str,
        alias_name: &str,
        target_key_id: &str,
    ) -> Result<(), KeyServiceError>;

    fn get_key_policy(&self, region: &str, key_id: &str) -> Result<String, KeyServiceError>;

    /// Replicates a multi-region key and returns the replica's ARN.
    fn replicate_key(
        &self,
        region: &str,
        key_id: &str,
        spec: &ReplicaSpec,
    ) -> Result<String, KeyServiceError>;
}

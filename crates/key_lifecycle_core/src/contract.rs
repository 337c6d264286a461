use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const RESPONSE_SCHEMA_VERSION: &str = "v1";
pub const DEFAULT_PENDING_WINDOW_DAYS: i32 = 30;
pub const MIN_PENDING_WINDOW_DAYS: i32 = 7;
pub const MAX_PENDING_WINDOW_DAYS: i32 = 30;

pub const DISABLED_ON_TAG: &str = "DisabledOn";
pub const MIGRATION_STATUS_TAG: &str = "MigrationStatus";
pub const MIGRATION_STATUS_COMPLETED: &str = "completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Disable,
    Enable,
    ScheduleDeletion,
    CancelDeletion,
    ReplicateIreland,
    TagSrkMigration,
    RemoveTagSrkMigration,
}

impl KeyAction {
    pub const ALL: [KeyAction; 7] = [
        Self::Disable,
        Self::Enable,
        Self::ScheduleDeletion,
        Self::CancelDeletion,
        Self::ReplicateIreland,
        Self::TagSrkMigration,
        Self::RemoveTagSrkMigration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Enable => "enable",
            Self::ScheduleDeletion => "schedule_deletion",
            Self::CancelDeletion => "cancel_deletion",
            Self::ReplicateIreland => "replicate_ireland",
            Self::TagSrkMigration => "tag_srk_migration",
            Self::RemoveTagSrkMigration => "remove_tag_srk_migration",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == name.trim())
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw invocation payload. Every field is optional at the serde level so that
/// shape problems surface as [`RequestError::Validation`] with a readable
/// message instead of a deserializer error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyActionRequest {
    #[serde(default)]
    pub aws_region: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub key_arns: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub deletion_schedule_days: Option<i64>,
    #[serde(default)]
    pub override_excluded_services: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedKeyActionRequest {
    pub aws_region: String,
    pub action: KeyAction,
    pub key_arns: Vec<String>,
    pub dry_run: bool,
    pub pending_window_days: i32,
    pub override_excluded_services: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("{0}")]
    Validation(String),
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),
}

impl RequestError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub fn normalize_request(
    payload: KeyActionRequest,
) -> Result<NormalizedKeyActionRequest, RequestError> {
    let aws_region = payload
        .aws_region
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if aws_region.is_empty() {
        return Err(RequestError::validation("aws_region is required"));
    }

    if payload.key_arns.is_empty() {
        return Err(RequestError::validation("No key ARNs specified"));
    }

    let mut key_arns = Vec::with_capacity(payload.key_arns.len());
    for key_arn in payload.key_arns {
        let key_arn = key_arn.trim().to_string();
        if key_arn.is_empty() {
            return Err(RequestError::validation(
                "key_arns must not contain blank entries",
            ));
        }
        if !is_full_key_arn(&key_arn) {
            return Err(RequestError::validation(format!(
                "key_arns must contain full key ARNs, got '{key_arn}'"
            )));
        }
        key_arns.push(key_arn);
    }

    let action_name = payload.action.unwrap_or_default();
    if action_name.trim().is_empty() {
        return Err(RequestError::validation("action is required"));
    }
    let action = KeyAction::parse(&action_name)
        .ok_or_else(|| RequestError::UnsupportedAction(action_name.trim().to_string()))?;

    Ok(NormalizedKeyActionRequest {
        aws_region,
        action,
        key_arns,
        dry_run: payload.dry_run,
        pending_window_days: clamp_pending_window(
            payload
                .deletion_schedule_days
                .unwrap_or(i64::from(DEFAULT_PENDING_WINDOW_DAYS)),
        ),
        override_excluded_services: payload.override_excluded_services,
    })
}

/// Clamps a requested deletion window to the range the provider accepts.
pub fn clamp_pending_window(days: i64) -> i32 {
    let clamped = days.clamp(
        i64::from(MIN_PENDING_WINDOW_DAYS),
        i64::from(MAX_PENDING_WINDOW_DAYS),
    );
    i32::try_from(clamped).unwrap_or(DEFAULT_PENDING_WINDOW_DAYS)
}

fn is_full_key_arn(value: &str) -> bool {
    let mut parts = value.splitn(6, ':');
    let (Some("arn"), Some(partition), Some("kms"), Some(region), Some(account), Some(resource)) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };

    !partition.is_empty()
        && !region.is_empty()
        && !account.is_empty()
        && resource
            .strip_prefix("key/")
            .is_some_and(|key_id| !key_id.is_empty())
}

/// The ARN a multi-Region replica of `key_arn` carries in `region`.
///
/// Replicas share the primary's key ID, so only the region segment changes.
pub fn key_arn_in_region(key_arn: &str, region: &str) -> Option<String> {
    if !is_full_key_arn(key_arn) || region.is_empty() {
        return None;
    }
    let parts: Vec<&str> = key_arn.splitn(6, ':').collect();
    Some(format!(
        "{}:{}:{}:{region}:{}:{}",
        parts[0], parts[1], parts[2], parts[4], parts[5]
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyResult {
    pub key_arn: String,
    pub status: ResultStatus,
    pub message: String,
}

impl KeyResult {
    pub fn success(key_arn: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(key_arn, ResultStatus::Success, message)
    }

    pub fn skipped(key_arn: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(key_arn, ResultStatus::Skipped, message)
    }

    pub fn error(key_arn: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(key_arn, ResultStatus::Error, message)
    }

    fn new(key_arn: impl Into<String>, status: ResultStatus, message: impl Into<String>) -> Self {
        Self {
            key_arn: key_arn.into(),
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ResultSummary {
    pub fn from_results(results: &[KeyResult]) -> Self {
        results
            .iter()
            .fold(Self::default(), |mut summary, result| {
                match result.status {
                    ResultStatus::Success => summary.succeeded += 1,
                    ResultStatus::Skipped => summary.skipped += 1,
                    ResultStatus::Error => summary.failed += 1,
                }
                summary
            })
    }
}

/// Body returned for every invocation. `success` is false only when the
/// request was rejected as a whole; per-key failures live in `results`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionResponse {
    pub action: Option<String>,
    pub success: bool,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_fingerprint: Option<String>,
    pub summary: ResultSummary,
    pub results: Vec<KeyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub schema_version: String,
}

impl ActionResponse {
    pub fn processed(
        request: &NormalizedKeyActionRequest,
        request_fingerprint: String,
        results: Vec<KeyResult>,
    ) -> Self {
        Self {
            action: Some(request.action.as_str().to_string()),
            success: true,
            dry_run: request.dry_run,
            request_fingerprint: Some(request_fingerprint),
            summary: ResultSummary::from_results(&results),
            results,
            error: None,
            message: None,
            schema_version: RESPONSE_SCHEMA_VERSION.to_string(),
        }
    }

    pub fn rejected(
        action: Option<String>,
        dry_run: bool,
        error: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            action,
            success: false,
            dry_run,
            request_fingerprint: None,
            summary: ResultSummary::default(),
            results: Vec::new(),
            error: Some(error.to_string()),
            message: Some(message.into()),
            schema_version: RESPONSE_SCHEMA_VERSION.to_string(),
        }
    }
}

pub fn request_fingerprint(request: &NormalizedKeyActionRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(request));
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ARN: &str =
        "arn:aws:kms:ca-central-1:444455556666:key/mrk-1234abcd12ab34cd56ef1234567890ab";

    fn request(action: &str) -> KeyActionRequest {
        KeyActionRequest {
            aws_region: Some("ca-central-1".to_string()),
            action: Some(action.to_string()),
            key_arns: vec![KEY_ARN.to_string()],
            ..KeyActionRequest::default()
        }
    }

    #[test]
    fn parses_every_supported_action_name() {
        for action in KeyAction::ALL {
            assert_eq!(KeyAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(KeyAction::parse("rotate"), None);
    }

    #[test]
    fn normalize_request_applies_defaults() {
        let normalized = normalize_request(request("disable")).expect("request should normalize");
        assert_eq!(normalized.action, KeyAction::Disable);
        assert_eq!(normalized.pending_window_days, DEFAULT_PENDING_WINDOW_DAYS);
        assert!(!normalized.dry_run);
        assert!(!normalized.override_excluded_services);
    }

    #[test]
    fn normalize_request_rejects_empty_key_list() {
        let mut payload = request("disable");
        payload.key_arns.clear();

        let error = normalize_request(payload).expect_err("request should fail");
        assert_eq!(error, RequestError::validation("No key ARNs specified"));
    }

    #[test]
    fn normalize_request_rejects_missing_region() {
        let mut payload = request("disable");
        payload.aws_region = Some("  ".to_string());

        let error = normalize_request(payload).expect_err("request should fail");
        assert_eq!(error, RequestError::validation("aws_region is required"));
    }

    #[test]
    fn normalize_request_rejects_bare_key_ids() {
        let mut payload = request("disable");
        payload.key_arns = vec!["1234abcd-12ab-34cd-56ef-1234567890ab".to_string()];

        let error = normalize_request(payload).expect_err("request should fail");
        assert!(matches!(error, RequestError::Validation(message) if message.contains("full key ARNs")));
    }

    #[test]
    fn normalize_request_rejects_alias_arns() {
        let mut payload = request("disable");
        payload.key_arns = vec!["arn:aws:kms:ca-central-1:444455556666:alias/app_ca-central-1".to_string()];

        assert!(normalize_request(payload).is_err());
    }

    #[test]
    fn normalize_request_reports_unsupported_action() {
        let error = normalize_request(request("rotate_keys")).expect_err("request should fail");
        assert_eq!(
            error,
            RequestError::UnsupportedAction("rotate_keys".to_string())
        );
        assert_eq!(error.to_string(), "Unsupported action: rotate_keys");
    }

    #[test]
    fn shape_errors_take_precedence_over_unknown_action() {
        let mut payload = request("rotate_keys");
        payload.key_arns.clear();

        let error = normalize_request(payload).expect_err("request should fail");
        assert!(matches!(error, RequestError::Validation(_)));
    }

    #[test]
    fn replica_arn_swaps_only_the_region_segment() {
        assert_eq!(
            key_arn_in_region("arn:aws:kms:ca-central-1:444455556666:key/mrk-1", "eu-west-1")
                .as_deref(),
            Some("arn:aws:kms:eu-west-1:444455556666:key/mrk-1")
        );
        assert_eq!(
            key_arn_in_region("arn:aws:kms:eu-west-1:444455556666:key/mrk-1", "eu-west-1")
                .as_deref(),
            Some("arn:aws:kms:eu-west-1:444455556666:key/mrk-1")
        );
        assert_eq!(key_arn_in_region("mrk-1", "eu-west-1"), None);
    }

    #[test]
    fn pending_window_is_clamped_to_provider_range() {
        assert_eq!(clamp_pending_window(1), 7);
        assert_eq!(clamp_pending_window(-5), 7);
        assert_eq!(clamp_pending_window(14), 14);
        assert_eq!(clamp_pending_window(365), 30);
        assert_eq!(clamp_pending_window(i64::MAX), 30);
    }

    #[test]
    fn request_deserializes_from_invocation_json() {
        let payload: KeyActionRequest = serde_json::from_value(serde_json::json!({
            "aws_region": "ca-central-1",
            "action": "schedule_deletion",
            "key_arns": [KEY_ARN],
            "dry_run": true,
            "deletion_schedule_days": 3
        }))
        .expect("payload should parse");

        let normalized = normalize_request(payload).expect("request should normalize");
        assert_eq!(normalized.action, KeyAction::ScheduleDeletion);
        assert_eq!(normalized.pending_window_days, 7);
        assert!(normalized.dry_run);
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive_to_dry_run() {
        let first = normalize_request(request("enable")).expect("request should normalize");
        let second = normalize_request(request("enable")).expect("request should normalize");
        assert_eq!(request_fingerprint(&first), request_fingerprint(&second));

        let mut dry = request("enable");
        dry.dry_run = true;
        let dry = normalize_request(dry).expect("request should normalize");
        assert_ne!(request_fingerprint(&first), request_fingerprint(&dry));
    }

    #[test]
    fn summary_counts_each_status() {
        let results = vec![
            KeyResult::success("k1", "disabled"),
            KeyResult::skipped("k2", "already disabled"),
            KeyResult::error("k3", "access denied"),
            KeyResult::success("k4", "disabled"),
        ];

        assert_eq!(
            ResultSummary::from_results(&results),
            ResultSummary {
                succeeded: 2,
                skipped: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn result_status_serializes_as_snake_case() {
        let value = serde_json::to_value(KeyResult::skipped("k1", "already enabled"))
            .expect("result should serialize");
        assert_eq!(value["status"], "skipped");
    }
}

use serde::{Deserialize, Serialize};

pub const BLOCKED_ACCOUNTS_ENV: &str = "KEY_LIFECYCLE_BLOCKED_ACCOUNTS";
pub const EXCLUDED_SERVICES_ENV: &str = "KEY_LIFECYCLE_EXCLUDED_SERVICES";
pub const SERVICE_TAG_ENV: &str = "KEY_LIFECYCLE_SERVICE_TAG";
pub const REPLICATION_SOURCE_REGION_ENV: &str = "KEY_LIFECYCLE_REPLICATION_SOURCE_REGION";
pub const REPLICATION_TARGET_REGION_ENV: &str = "KEY_LIFECYCLE_REPLICATION_TARGET_REGION";

pub const DEFAULT_BLOCKED_ACCOUNTS: &[&str] = &["111122223333"];
pub const DEFAULT_EXCLUDED_SERVICES: &[&str] = &["dynamodb", "efs", "elasticache", "rds", "s3"];
pub const DEFAULT_SERVICE_TAG: &str = "service_name";
pub const DEFAULT_REPLICATION_SOURCE_REGION: &str = "ca-central-1";
pub const DEFAULT_REPLICATION_TARGET_REGION: &str = "eu-west-1";

/// Safety rules handed to the dispatcher at construction time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SafetyPolicy {
    /// Accounts in which no action may run at all.
    pub blocked_accounts: Vec<String>,
    /// Service names whose keys are never scheduled for deletion without an override.
    pub excluded_services: Vec<String>,
    /// Tag naming the service that uses a key.
    pub service_tag: String,
    pub replication_source_region: String,
    pub replication_target_region: String,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            blocked_accounts: to_owned_list(DEFAULT_BLOCKED_ACCOUNTS),
            excluded_services: to_owned_list(DEFAULT_EXCLUDED_SERVICES),
            service_tag: DEFAULT_SERVICE_TAG.to_string(),
            replication_source_region: DEFAULT_REPLICATION_SOURCE_REGION.to_string(),
            replication_target_region: DEFAULT_REPLICATION_TARGET_REGION.to_string(),
        }
    }
}

impl SafetyPolicy {
    /// Builds a policy from a variable lookup, keeping the default for any
    /// variable that is unset or blank.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            blocked_accounts: read(BLOCKED_ACCOUNTS_ENV)
                .map(|value| split_list(&value))
                .unwrap_or(defaults.blocked_accounts),
            excluded_services: read(EXCLUDED_SERVICES_ENV)
                .map(|value| {
                    split_list(&value)
                        .into_iter()
                        .map(|service| service.to_ascii_lowercase())
                        .collect()
                })
                .unwrap_or(defaults.excluded_services),
            service_tag: read(SERVICE_TAG_ENV).unwrap_or(defaults.service_tag),
            replication_source_region: read(REPLICATION_SOURCE_REGION_ENV)
                .unwrap_or(defaults.replication_source_region),
            replication_target_region: read(REPLICATION_TARGET_REGION_ENV)
                .unwrap_or(defaults.replication_target_region),
        }
    }

    pub fn is_blocked_account(&self, account_id: &str) -> bool {
        self.blocked_accounts
            .iter()
            .any(|blocked| blocked == account_id.trim())
    }

    /// Returns the excluded service named by `service`, compared without case.
    /// A missing service tag is never excluded.
    pub fn excluded_service<'a>(&'a self, service: Option<&str>) -> Option<&'a str> {
        let service = service?.trim();
        self.excluded_services
            .iter()
            .find(|excluded| excluded.eq_ignore_ascii_case(service))
            .map(String::as_str)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn to_owned_list(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

use key_lifecycle_core::aliases::replica_alias_names;
use key_lifecycle_core::contract::{
    key_arn_in_region, normalize_request, request_fingerprint, KeyAction, KeyActionRequest,
    KeyResult, NormalizedKeyActionRequest, RequestError, DISABLED_ON_TAG,
    MIGRATION_STATUS_COMPLETED, MIGRATION_STATUS_TAG,
};
use key_lifecycle_core::key_state::KeyState;
use key_lifecycle_core::policy::SafetyPolicy;
use tracing::{error, info, warn};

use crate::adapters::account::AccountResolver;
use crate::adapters::key_service::{tag_value, KeyService, KeyServiceError, ReplicaSpec, Tag};
use crate::error::DispatchError;

const REPLICA_DESCRIPTION: &str = "Replica key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub policy: SafetyPolicy,
    /// Value written to the `DisabledOn` tag, `%Y-%m-%d`.
    pub today: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub request: NormalizedKeyActionRequest,
    pub request_fingerprint: String,
    pub results: Vec<KeyResult>,
}

pub struct ActionDispatcher<'a> {
    config: &'a DispatcherConfig,
    keys: &'a dyn KeyService,
    accounts: &'a dyn AccountResolver,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(
        config: &'a DispatcherConfig,
        keys: &'a dyn KeyService,
        accounts: &'a dyn AccountResolver,
    ) -> Self {
        Self {
            config,
            keys,
            accounts,
        }
    }

    /// Validates the request, enforces the account blocklist, then applies the
    /// action to every key in order. Per-key failures are reported in the
    /// returned results and never abort the batch.
    pub fn execute(&self, payload: KeyActionRequest) -> Result<DispatchReport, DispatchError> {
        let request = normalize_request(payload)?;
        self.check_replication_region(&request)?;
        self.check_account()?;

        let request_fingerprint = request_fingerprint(&request);
        info!(
            component = "dispatcher",
            event = "dispatch_started",
            action = request.action.as_str(),
            region = request.aws_region.as_str(),
            key_count = request.key_arns.len(),
            dry_run = request.dry_run,
            request_fingerprint = request_fingerprint.as_str(),
        );

        let results: Vec<KeyResult> = request
            .key_arns
            .iter()
            .map(|key_arn| self.process_key(&request, key_arn))
            .collect();

        info!(
            component = "dispatcher",
            event = "dispatch_completed",
            action = request.action.as_str(),
            key_count = results.len(),
            request_fingerprint = request_fingerprint.as_str(),
        );

        Ok(DispatchReport {
            request,
            request_fingerprint,
            results,
        })
    }

    fn check_replication_region(
        &self,
        request: &NormalizedKeyActionRequest,
    ) -> Result<(), DispatchError> {
        let source_region = &self.config.policy.replication_source_region;
        if request.action == KeyAction::ReplicateIreland && request.aws_region != *source_region {
            return Err(RequestError::validation(format!(
                "replicate_ireland requires aws_region={source_region}, got {}",
                request.aws_region
            ))
            .into());
        }
        Ok(())
    }

    fn check_account(&self) -> Result<(), DispatchError> {
        let account_id = self
            .accounts
            .caller_account_id()
            .map_err(DispatchError::AccountLookup)?;

        if self.config.policy.is_blocked_account(&account_id) {
            warn!(
                component = "dispatcher",
                event = "execution_blocked",
                account_id = account_id.as_str(),
            );
            return Err(DispatchError::PolicyViolation { account_id });
        }
        Ok(())
    }

    fn process_key(&self, request: &NormalizedKeyActionRequest, key_arn: &str) -> KeyResult {
        let outcome = match request.action {
            KeyAction::Disable => self.disable(request, key_arn),
            KeyAction::Enable => self.enable(request, key_arn),
            KeyAction::ScheduleDeletion => self.schedule_deletion(request, key_arn),
            KeyAction::CancelDeletion => self.cancel_deletion(request, key_arn),
            KeyAction::ReplicateIreland => self.replicate(request, key_arn),
            KeyAction::TagSrkMigration => self.tag_migration(request, key_arn),
            KeyAction::RemoveTagSrkMigration => self.remove_migration_tag(request, key_arn),
        };

        let result = outcome.unwrap_or_else(|service_error| {
            let message = if service_error.is_not_found() {
                format!("key not found: {service_error}")
            } else {
                service_error.to_string()
            };
            error!(
                component = "dispatcher",
                event = "key_action_failed",
                action = request.action.as_str(),
                key_arn,
                error_code = service_error.code.as_deref().unwrap_or("unknown"),
                error = message.as_str(),
            );
            KeyResult::error(key_arn, message)
        });

        info!(
            component = "dispatcher",
            event = "key_processed",
            action = request.action.as_str(),
            key_arn,
            status = ?result.status,
            message = result.message.as_str(),
            dry_run = request.dry_run,
        );
        result
    }

    fn disable(
        &self,
        request: &NormalizedKeyActionRequest,
        key_arn: &str,
    ) -> Result<KeyResult, KeyServiceError> {
        let region = request.aws_region.as_str();
        let state = self.keys.describe_key_state(region, key_arn)?;
        if state == KeyState::Disabled {
            return Ok(KeyResult::skipped(key_arn, "already disabled"));
        }

        let disabled_on = Tag::new(DISABLED_ON_TAG, self.config.today.as_str());
        if request.dry_run {
            return Ok(simulated(
                request,
                key_arn,
                format!("would disable and tag {DISABLED_ON_TAG}={}", disabled_on.value),
            ));
        }

        self.keys.disable_key(region, key_arn)?;
        self.keys.tag_key(region, key_arn, &[disabled_on])?;
        Ok(KeyResult::success(key_arn, "disabled"))
    }

    fn enable(
        &self,
        request: &NormalizedKeyActionRequest,
        key_arn: &str,
    ) -> Result<KeyResult, KeyServiceError> {
        let region = request.aws_region.as_str();
        let state = self.keys.describe_key_state(region, key_arn)?;
        if state == KeyState::Enabled {
            return Ok(KeyResult::skipped(key_arn, "already enabled"));
        }
        if state.is_pending_deletion() {
            return Ok(KeyResult::skipped(
                key_arn,
                format!(
                    "scheduled for deletion; cancel deletion before enabling (current state: {state})"
                ),
            ));
        }

        if request.dry_run {
            let tags = self.keys.list_tags(region, key_arn)?;
            let message = if tag_value(&tags, DISABLED_ON_TAG).is_some() {
                format!("would enable and remove {DISABLED_ON_TAG} tag")
            } else {
                "would enable".to_string()
            };
            return Ok(simulated(request, key_arn, message));
        }

        self.keys.enable_key(region, key_arn)?;
        let tags = self.keys.list_tags(region, key_arn)?;
        if tag_value(&tags, DISABLED_ON_TAG).is_some() {
            self.keys.untag_key(region, key_arn, &[DISABLED_ON_TAG])?;
        }
        Ok(KeyResult::success(key_arn, "enabled"))
    }

    fn schedule_deletion(
        &self,
        request: &NormalizedKeyActionRequest,
        key_arn: &str,
    ) -> Result<KeyResult, KeyServiceError> {
        let region = request.aws_region.as_str();
        let state = self.keys.describe_key_state(region, key_arn)?;
        if state.is_pending_deletion() {
            return Ok(KeyResult::skipped(key_arn, "already scheduled for deletion"));
        }
        if !state.can_schedule_deletion() {
            return Ok(KeyResult::skipped(
                key_arn,
                format!("key must be disabled first (current state: {state})"),
            ));
        }

        let tags = self.keys.list_tags(region, key_arn)?;
        let policy = &self.config.policy;
        if let Some(service) = policy.excluded_service(tag_value(&tags, &policy.service_tag)) {
            if !request.override_excluded_services {
                return Ok(KeyResult::skipped(
                    key_arn,
                    format!("in use by {service}; skipping deletion"),
                ));
            }
            warn!(
                component = "dispatcher",
                event = "excluded_service_overridden",
                key_arn,
                service,
            );
        }

        let days = request.pending_window_days;
        if request.dry_run {
            return Ok(simulated(
                request,
                key_arn,
                format!("would schedule deletion in {days} days"),
            ));
        }

        self.keys.schedule_deletion(region, key_arn, days)?;
        Ok(KeyResult::success(
            key_arn,
            format!("scheduled for deletion in {days} days"),
        ))
    }

    fn cancel_deletion(
        &self,
        request: &NormalizedKeyActionRequest,
        key_arn: &str,
    ) -> Result<KeyResult, KeyServiceError> {
        let region = request.aws_region.as_str();
        let state = self.keys.describe_key_state(region, key_arn)?;
        if !state.can_cancel_deletion() {
            return Ok(KeyResult::skipped(
                key_arn,
                format!("not scheduled for deletion (current state: {state})"),
            ));
        }

        if request.dry_run {
            return Ok(simulated(request, key_arn, "would cancel deletion"));
        }

        self.keys.cancel_deletion(region, key_arn)?;
        Ok(KeyResult::success(
            key_arn,
            "deletion cancelled; key is now disabled",
        ))
    }

    fn replicate(
        &self,
        request: &NormalizedKeyActionRequest,
        key_arn: &str,
    ) -> Result<KeyResult, KeyServiceError> {
        let region = request.aws_region.as_str();
        let policy = &self.config.policy;
        let source_region = policy.replication_source_region.as_str();
        let target_region = policy.replication_target_region.as_str();

        let aliases = self.keys.list_aliases(region, key_arn)?;
        let replica_aliases = replica_alias_names(
            aliases.iter().map(String::as_str),
            source_region,
            target_region,
        );
        if replica_aliases.is_empty() {
            return Ok(KeyResult::skipped(
                key_arn,
                format!("no alias with suffix _{source_region}; skipping replication"),
            ));
        }

        let mut missing_aliases = Vec::new();
        for alias in &replica_aliases {
            match self.keys.describe_key_state(target_region, alias) {
                Ok(_) => {}
                Err(lookup_error) if lookup_error.is_not_found() => {
                    missing_aliases.push(alias.as_str())
                }
                Err(lookup_error) => return Err(lookup_error),
            }
        }
        if missing_aliases.is_empty() {
            return Ok(KeyResult::skipped(
                key_arn,
                format!(
                    "replica already exists in {target_region} ({})",
                    replica_aliases.join(", ")
                ),
            ));
        }

        let spec = ReplicaSpec {
            replica_region: target_region.to_string(),
            policy: self.keys.get_key_policy(region, key_arn)?,
            tags: self.keys.list_tags(region, key_arn)?,
            description: REPLICA_DESCRIPTION.to_string(),
        };
        let alias_list = missing_aliases.join(", ");

        if request.dry_run {
            return Ok(simulated(
                request,
                key_arn,
                format!("would replicate to {target_region} with alias {alias_list}"),
            ));
        }

        let (replica_arn, replicated) = match self.keys.replicate_key(region, key_arn, &spec) {
            Ok(arn) => (arn, true),
            Err(replicate_error) if replicate_error.is_already_exists() => {
                let Some(existing_arn) = key_arn_in_region(key_arn, target_region) else {
                    return Err(replicate_error);
                };
                // The replica must be visible before aliases can point at it.
                self.keys.describe_key_state(target_region, &existing_arn)?;
                (existing_arn, false)
            }
            Err(replicate_error) => return Err(replicate_error),
        };

        for alias in &missing_aliases {
            self.keys.create_alias(target_region, alias, &replica_arn)?;
        }

        let message = if replicated {
            format!("replicated to {target_region} as {replica_arn} with alias {alias_list}")
        } else {
            format!("replica {replica_arn} already existed; created alias {alias_list}")
        };
        Ok(KeyResult::success(key_arn, message))
    }

    fn tag_migration(
        &self,
        request: &NormalizedKeyActionRequest,
        key_arn: &str,
    ) -> Result<KeyResult, KeyServiceError> {
        let region = request.aws_region.as_str();
        if request.dry_run {
            self.keys.describe_key_state(region, key_arn)?;
            return Ok(simulated(
                request,
                key_arn,
                format!("would tag {MIGRATION_STATUS_TAG}={MIGRATION_STATUS_COMPLETED}"),
            ));
        }

        self.keys.tag_key(
            region,
            key_arn,
            &[Tag::new(MIGRATION_STATUS_TAG, MIGRATION_STATUS_COMPLETED)],
        )?;
        Ok(KeyResult::success(
            key_arn,
            format!("tagged {MIGRATION_STATUS_TAG}={MIGRATION_STATUS_COMPLETED}"),
        ))
    }

    fn remove_migration_tag(
        &self,
        request: &NormalizedKeyActionRequest,
        key_arn: &str,
    ) -> Result<KeyResult, KeyServiceError> {
        let region = request.aws_region.as_str();
        let tags = self.keys.list_tags(region, key_arn)?;
        if tag_value(&tags, MIGRATION_STATUS_TAG).is_none() {
            return Ok(KeyResult::skipped(
                key_arn,
                format!("{MIGRATION_STATUS_TAG} tag not present"),
            ));
        }

        if request.dry_run {
            return Ok(simulated(
                request,
                key_arn,
                format!("would remove {MIGRATION_STATUS_TAG} tag"),
            ));
        }

        self.keys
            .untag_key(region, key_arn, &[MIGRATION_STATUS_TAG])?;
        Ok(KeyResult::success(
            key_arn,
            format!("removed {MIGRATION_STATUS_TAG} tag"),
        ))
    }
}

fn simulated(
    request: &NormalizedKeyActionRequest,
    key_arn: &str,
    intent: impl Into<String>,
) -> KeyResult {
    let intent = intent.into();
    info!(
        component = "dispatcher",
        event = "dry_run_mutation_suppressed",
        action = request.action.as_str(),
        key_arn,
        intent = intent.as_str(),
    );
    KeyResult::success(key_arn, format!("{intent} (dry run)"))
}

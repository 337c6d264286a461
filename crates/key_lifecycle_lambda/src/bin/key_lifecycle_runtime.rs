use std::future::Future;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_kms::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use chrono::Utc;
use key_lifecycle_core::key_state::KeyState;
use key_lifecycle_core::policy::SafetyPolicy;
use key_lifecycle_lambda::adapters::account::AccountResolver;
use key_lifecycle_lambda::adapters::key_service::{
    KeyService, KeyServiceError, ReplicaSpec, Tag,
};
use key_lifecycle_lambda::handlers::dispatcher::{ActionDispatcher, DispatcherConfig};
use key_lifecycle_lambda::handlers::event::{handle_event, ApiGatewayResponse};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const DEFAULT_KEY_POLICY_NAME: &str = "default";

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

fn service_error<E, R>(operation: &str, error: SdkError<E, R>) -> KeyServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&error).to_string());
    let message = format!("failed to {operation}: {detail}");
    match error.code() {
        Some(code) => KeyServiceError::with_code(code, message),
        None => KeyServiceError::new(message),
    }
}

struct AwsKmsKeyService {
    sdk_config: SdkConfig,
}

impl AwsKmsKeyService {
    fn client(&self, region: &str) -> aws_sdk_kms::Client {
        let config = aws_sdk_kms::config::Builder::from(&self.sdk_config)
            .region(Region::new(region.to_string()))
            .build();
        aws_sdk_kms::Client::from_conf(config)
    }
}

fn to_sdk_tags(tags: &[Tag]) -> Result<Vec<aws_sdk_kms::types::Tag>, KeyServiceError> {
    tags.iter()
        .map(|tag| {
            aws_sdk_kms::types::Tag::builder()
                .tag_key(tag.key.as_str())
                .tag_value(tag.value.as_str())
                .build()
                .map_err(|error| KeyServiceError::new(format!("invalid tag {}: {error}", tag.key)))
        })
        .collect()
}

impl KeyService for AwsKmsKeyService {
    fn describe_key_state(&self, region: &str, key_id: &str) -> Result<KeyState, KeyServiceError> {
        let client = self.client(region);
        let output = block_on(client.describe_key().key_id(key_id).send())
            .map_err(|error| service_error("describe key", error))?;

        output
            .key_metadata()
            .and_then(|metadata| metadata.key_state())
            .map(|state| KeyState::from_provider(state.as_str()))
            .ok_or_else(|| KeyServiceError::new(format!("no key state returned for {key_id}")))
    }

    fn disable_key(&self, region: &str, key_id: &str) -> Result<(), KeyServiceError> {
        let client = self.client(region);
        block_on(client.disable_key().key_id(key_id).send())
            .map(|_| ())
            .map_err(|error| service_error("disable key", error))
    }

    fn enable_key(&self, region: &str, key_id: &str) -> Result<(), KeyServiceError> {
        let client = self.client(region);
        block_on(client.enable_key().key_id(key_id).send())
            .map(|_| ())
            .map_err(|error| service_error("enable key", error))
    }

    fn list_tags(&self, region: &str, key_id: &str) -> Result<Vec<Tag>, KeyServiceError> {
        let client = self.client(region);
        let mut tags = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = block_on(
                client
                    .list_resource_tags()
                    .key_id(key_id)
                    .set_marker(marker.take())
                    .send(),
            )
            .map_err(|error| service_error("list tags", error))?;

            tags.extend(
                output
                    .tags()
                    .iter()
                    .map(|tag| Tag::new(tag.tag_key(), tag.tag_value())),
            );

            match output.next_marker() {
                Some(next) => marker = Some(next.to_string()),
                None => break,
            }
        }

        Ok(tags)
    }

    fn tag_key(&self, region: &str, key_id: &str, tags: &[Tag]) -> Result<(), KeyServiceError> {
        let client = self.client(region);
        let sdk_tags = to_sdk_tags(tags)?;
        block_on(
            client
                .tag_resource()
                .key_id(key_id)
                .set_tags(Some(sdk_tags))
                .send(),
        )
        .map(|_| ())
        .map_err(|error| service_error("tag key", error))
    }

    fn untag_key(
        &self,
        region: &str,
        key_id: &str,
        tag_keys: &[&str],
    ) -> Result<(), KeyServiceError> {
        let client = self.client(region);
        let tag_keys = tag_keys.iter().map(|key| (*key).to_string()).collect();
        block_on(
            client
                .untag_resource()
                .key_id(key_id)
                .set_tag_keys(Some(tag_keys))
                .send(),
        )
        .map(|_| ())
        .map_err(|error| service_error("untag key", error))
    }

    fn schedule_deletion(
        &self,
        region: &str,
        key_id: &str,
        pending_window_days: i32,
    ) -> Result<(), KeyServiceError> {
        let client = self.client(region);
        block_on(
            client
                .schedule_key_deletion()
                .key_id(key_id)
                .pending_window_in_days(pending_window_days)
                .send(),
        )
        .map(|_| ())
        .map_err(|error| service_error("schedule key deletion", error))
    }

    fn cancel_deletion(&self, region: &str, key_id: &str) -> Result<(), KeyServiceError> {
        let client = self.client(region);
        block_on(client.cancel_key_deletion().key_id(key_id).send())
            .map(|_| ())
            .map_err(|error| service_error("cancel key deletion", error))
    }

    fn list_aliases(&self, region: &str, key_id: &str) -> Result<Vec<String>, KeyServiceError> {
        let client = self.client(region);
        let mut aliases = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = block_on(
                client
                    .list_aliases()
                    .key_id(key_id)
                    .set_marker(marker.take())
                    .send(),
            )
            .map_err(|error| service_error("list aliases", error))?;

            aliases.extend(
                output
                    .aliases()
                    .iter()
                    .filter_map(|entry| entry.alias_name())
                    .map(str::to_string),
            );

            match output.next_marker() {
                Some(next) => marker = Some(next.to_string()),
                None => break,
            }
        }

        Ok(aliases)
    }

    fn create_alias(
        &self,
        region: &str,
        alias_name: &str,
        target_key_id: &str,
    ) -> Result<(), KeyServiceError> {
        let client = self.client(region);
        block_on(
            client
                .create_alias()
                .alias_name(alias_name)
                .target_key_id(target_key_id)
                .send(),
        )
        .map(|_| ())
        .map_err(|error| service_error("create alias", error))
    }

    fn get_key_policy(&self, region: &str, key_id: &str) -> Result<String, KeyServiceError> {
        let client = self.client(region);
        let output = block_on(
            client
                .get_key_policy()
                .key_id(key_id)
                .policy_name(DEFAULT_KEY_POLICY_NAME)
                .send(),
        )
        .map_err(|error| service_error("get key policy", error))?;

        output
            .policy()
            .map(str::to_string)
            .ok_or_else(|| KeyServiceError::new(format!("no key policy returned for {key_id}")))
    }

    fn replicate_key(
        &self,
        region: &str,
        key_id: &str,
        spec: &ReplicaSpec,
    ) -> Result<String, KeyServiceError> {
        let client = self.client(region);
        let sdk_tags = to_sdk_tags(&spec.tags)?;
        let output = block_on(
            client
                .replicate_key()
                .key_id(key_id)
                .replica_region(spec.replica_region.as_str())
                .policy(spec.policy.as_str())
                .description(spec.description.as_str())
                .set_tags((!sdk_tags.is_empty()).then_some(sdk_tags))
                .send(),
        )
        .map_err(|error| service_error("replicate key", error))?;

        output
            .replica_key_metadata()
            .and_then(|metadata| metadata.arn())
            .map(str::to_string)
            .ok_or_else(|| KeyServiceError::new(format!("no replica ARN returned for {key_id}")))
    }
}

struct StsAccountResolver {
    sts_client: aws_sdk_sts::Client,
}

impl AccountResolver for StsAccountResolver {
    fn caller_account_id(&self) -> Result<String, KeyServiceError> {
        let output = block_on(self.sts_client.get_caller_identity().send())
            .map_err(|error| service_error("get caller identity", error))?;

        output
            .account()
            .map(str::to_string)
            .ok_or_else(|| KeyServiceError::new("caller identity did not include an account"))
    }
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<ApiGatewayResponse, Error> {
    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let config = DispatcherConfig {
        policy: SafetyPolicy::from_lookup(|name| std::env::var(name).ok()),
        today: Utc::now().format("%Y-%m-%d").to_string(),
    };
    let keys = AwsKmsKeyService {
        sdk_config: sdk_config.clone(),
    };
    let accounts = StsAccountResolver {
        sts_client: aws_sdk_sts::Client::new(&sdk_config),
    };

    let dispatcher = ActionDispatcher::new(&config, &keys, &accounts);
    Ok(handle_event(event.payload, &dispatcher))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(false)
        .with_current_span(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    lambda_runtime::run(service_fn(handle_request)).await
}

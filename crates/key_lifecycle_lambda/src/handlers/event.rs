use key_lifecycle_core::contract::{ActionResponse, KeyActionRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::handlers::dispatcher::ActionDispatcher;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

/// Handles a direct invocation payload or an API Gateway proxy event.
pub fn handle_event(event: Value, dispatcher: &ActionDispatcher<'_>) -> ApiGatewayResponse {
    let payload = match normalize_apigw_event(event) {
        Ok(value) => value,
        Err(message) => return validation_error_response(None, false, &message),
    };

    let action = payload
        .get("action")
        .and_then(Value::as_str)
        .map(str::to_string);
    let dry_run = payload
        .get("dry_run")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let request = match serde_json::from_value::<KeyActionRequest>(payload) {
        Ok(value) => value,
        Err(error) => {
            return validation_error_response(action, dry_run, &format!("Malformed request: {error}"))
        }
    };

    match dispatcher.execute(request) {
        Ok(report) => response(
            200,
            &ActionResponse::processed(&report.request, report.request_fingerprint, report.results),
        ),
        Err(error) => {
            warn!(
                component = "event_handler",
                event = "request_rejected",
                error_kind = error.kind(),
                error = %error,
            );
            response(
                error.status_code(),
                &ActionResponse::rejected(action, dry_run, error.kind(), error.to_string()),
            )
        }
    }
}

fn normalize_apigw_event(event: Value) -> Result<Value, String> {
    let Some(object) = event.as_object() else {
        return Err("Request payload must be a JSON object".to_string());
    };

    let Some(body) = object.get("body") else {
        return Ok(event);
    };

    match body {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(body.clone()),
        Value::String(text) => {
            serde_json::from_str(text).map_err(|error| format!("Malformed JSON body: {error}"))
        }
        _ => Err("Request body must be a JSON object".to_string()),
    }
}

fn validation_error_response(
    action: Option<String>,
    dry_run: bool,
    message: &str,
) -> ApiGatewayResponse {
    warn!(
        component = "event_handler",
        event = "request_rejected",
        error_kind = "validation_error",
        error = message,
    );
    response(
        400,
        &ActionResponse::rejected(action, dry_run, "validation_error", message),
    )
}

fn response(status_code: u16, payload: &ActionResponse) -> ApiGatewayResponse {
    let body = serde_json::to_string(payload).unwrap_or_else(|error| {
        json!({
            "success": false,
            "error": "serialization_error",
            "message": error.to_string(),
        })
        .to_string()
    });

    ApiGatewayResponse {
        status_code,
        headers: json!({"Content-Type": "application/json"}),
        body,
    }
}

#[cfg(test)]
mod tests {
    use key_lifecycle_core::contract::ResultStatus;
    use key_lifecycle_core::key_state::KeyState;

    use super::*;
    use crate::handlers::dispatcher::tests::{
        sample_config, FakeKeyService, FixedAccount, K1, K2,
    };

    fn body_of(response: &ApiGatewayResponse) -> ActionResponse {
        serde_json::from_str(&response.body).expect("body should parse")
    }

    fn dispatch(event: Value, keys: &FakeKeyService, account: &'static str) -> ApiGatewayResponse {
        let config = sample_config();
        let account = FixedAccount(account);
        let dispatcher = ActionDispatcher::new(&config, keys, &account);
        handle_event(event, &dispatcher)
    }

    #[test]
    fn processes_direct_invocation_payload() {
        let keys = FakeKeyService::default()
            .with_key(K1, KeyState::Enabled)
            .with_key(K2, KeyState::Disabled);

        let response = dispatch(
            json!({
                "aws_region": "ca-central-1",
                "action": "disable",
                "key_arns": [K1, K2]
            }),
            &keys,
            "444455556666",
        );

        assert_eq!(response.status_code, 200);
        let body = body_of(&response);
        assert!(body.success);
        assert_eq!(body.action.as_deref(), Some("disable"));
        assert_eq!(body.summary.succeeded, 1);
        assert_eq!(body.summary.skipped, 1);
        assert_eq!(body.results[1].status, ResultStatus::Skipped);
        assert!(body.request_fingerprint.is_some());
    }

    #[test]
    fn accepts_api_gateway_string_body() {
        let keys = FakeKeyService::default().with_key(K1, KeyState::Enabled);
        let inner = json!({
            "aws_region": "ca-central-1",
            "action": "tag_srk_migration",
            "key_arns": [K1],
            "dry_run": true
        });

        let response = dispatch(json!({ "body": inner.to_string() }), &keys, "444455556666");

        assert_eq!(response.status_code, 200);
        let body = body_of(&response);
        assert!(body.dry_run);
        assert_eq!(body.results[0].status, ResultStatus::Success);
        assert!(keys.mutations().is_empty());
    }

    #[test]
    fn blocked_account_returns_forbidden_without_results() {
        let keys = FakeKeyService::default().with_key(K1, KeyState::Enabled);

        let response = dispatch(
            json!({
                "aws_region": "ca-central-1",
                "action": "disable",
                "key_arns": [K1]
            }),
            &keys,
            "111122223333",
        );

        assert_eq!(response.status_code, 403);
        let body = body_of(&response);
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("policy_violation"));
        assert!(body.results.is_empty());
        assert!(keys.mutations().is_empty());
    }

    #[test]
    fn unsupported_action_returns_bad_request() {
        let keys = FakeKeyService::default().with_key(K1, KeyState::Enabled);

        let response = dispatch(
            json!({
                "aws_region": "ca-central-1",
                "action": "rotate",
                "key_arns": [K1]
            }),
            &keys,
            "444455556666",
        );

        assert_eq!(response.status_code, 400);
        let body = body_of(&response);
        assert_eq!(body.error.as_deref(), Some("unsupported_action"));
        assert_eq!(body.message.as_deref(), Some("Unsupported action: rotate"));
    }

    #[test]
    fn empty_key_list_is_a_validation_error() {
        let keys = FakeKeyService::default();

        let response = dispatch(
            json!({
                "aws_region": "ca-central-1",
                "action": "disable",
                "key_arns": []
            }),
            &keys,
            "444455556666",
        );

        assert_eq!(response.status_code, 400);
        assert_eq!(body_of(&response).error.as_deref(), Some("validation_error"));
    }

    #[test]
    fn malformed_body_is_rejected() {
        let keys = FakeKeyService::default();

        let non_object = dispatch(json!(["disable"]), &keys, "444455556666");
        let bad_json = dispatch(json!({ "body": "{not json" }), &keys, "444455556666");
        let wrong_type = dispatch(
            json!({ "aws_region": "ca-central-1", "action": "disable", "key_arns": "k1" }),
            &keys,
            "444455556666",
        );

        for response in [non_object, bad_json, wrong_type] {
            assert_eq!(response.status_code, 400);
            assert_eq!(body_of(&response).error.as_deref(), Some("validation_error"));
        }
    }
}

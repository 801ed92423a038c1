//! API key authentication middleware
//!
//! Front gate for protected endpoints. The static set from configuration
//! is consulted first; everything else goes through the temporary-key
//! pipeline, which consumes one use on success.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{error, warn};

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::{KeyRecord, ValidationOutcome};
use crate::infrastructure::api_key::{hash_identifier, KEY_HASH_PREFIX_LEN};

pub const API_KEY_HEADER: &str = "x-api-key";

/// The identity attached to an authorized request.
#[derive(Debug, Clone)]
pub enum AuthenticatedKey {
    /// Configuration-provided key; no usage tracking, no expiry.
    Static(String),
    /// Temporary key with the record as it looked after this consume.
    Temporary(KeyRecord),
}

/// Extractor that requires a valid API key in `X-API-Key`.
#[derive(Debug, Clone)]
pub struct RequireApiKey(pub AuthenticatedKey);

impl FromRequestParts<AppState> for RequireApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = match parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => {
                warn!(
                    method = %parts.method,
                    path = %parts.uri.path(),
                    "missing api key",
                );
                return Err(ApiError::unauthorized("unauthorized"));
            }
        };

        if state.static_keys.contains(&api_key) {
            return Ok(Self(AuthenticatedKey::Static(api_key)));
        }

        let Some(key_service) = &state.key_service else {
            warn!(
                method = %parts.method,
                path = %parts.uri.path(),
                "unknown api key",
            );
            return Err(ApiError::unauthorized("unauthorized"));
        };

        match key_service.validate_and_consume(&api_key).await {
            Ok(record) => Ok(Self(AuthenticatedKey::Temporary(record))),
            Err(ValidationOutcome::Error) => {
                error!(
                    api_key_hash = %hash_identifier(&api_key, KEY_HASH_PREFIX_LEN),
                    "store validation failure",
                );
                Err(ApiError::from(ValidationOutcome::Error).with_retry_after(state.retry_after))
            }
            Err(outcome) => {
                warn!(
                    outcome = %outcome,
                    api_key_hash = %hash_identifier(&api_key, KEY_HASH_PREFIX_LEN),
                    "inactive api key",
                );
                Err(outcome.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::ApiErrorBody;
    use crate::domain::api_key::MockKeyRepository;
    use crate::infrastructure::api_key::{IssueRequest, KeyService};
    use crate::infrastructure::render::{ConvertService, StubOpener, DEFAULT_JPEG_QUALITY};
    use axum::{body::Body, http::Request, http::StatusCode, routing::get, Router};
    use http_body_util::BodyExt;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    async fn protected(RequireApiKey(key): RequireApiKey) -> &'static str {
        match key {
            AuthenticatedKey::Static(_) => "static",
            AuthenticatedKey::Temporary(_) => "temporary",
        }
    }

    fn test_state(key_service: Option<Arc<KeyService>>) -> AppState {
        AppState::new(
            HashSet::from(["static-key".to_string()]),
            HashSet::new(),
            key_service,
            ConvertService::new(Arc::new(StubOpener { pages: 1 }), DEFAULT_JPEG_QUALITY),
        )
    }

    fn test_router(state: AppState) -> Router {
        Router::new()
            .route("/protected", get(protected))
            .with_state(state)
    }

    fn request(key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/protected");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_error(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice::<ApiErrorBody>(&bytes).unwrap().error
    }

    #[tokio::test]
    async fn test_missing_key_is_unauthorized() {
        let app = test_router(test_state(None));

        let response = app.oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_error(response).await, "unauthorized");
    }

    #[tokio::test]
    async fn test_static_key_passes() {
        let app = test_router(test_state(None));

        let response = app.oneshot(request(Some("static-key"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"static");
    }

    #[tokio::test]
    async fn test_unknown_key_without_service_is_unauthorized() {
        let app = test_router(test_state(None));

        let response = app.oneshot(request(Some("whatever"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_temporary_key_authorizes_and_consumes() {
        let service = Arc::new(KeyService::new(Arc::new(MockKeyRepository::new())));
        let issued = service
            .issue_temporary_key(IssueRequest {
                label: "trial".to_string(),
                usage_limit: 2,
                ttl: Duration::from_secs(3600),
                operator: "op".to_string(),
            })
            .await
            .unwrap();
        let app = test_router(test_state(Some(service.clone())));

        let response = app
            .clone()
            .oneshot(request(Some(&issued.key)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request(Some(&issued.key)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Usage limit reached on the third call.
        let response = app.oneshot(request(Some(&issued.key))).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_error(response).await, "usage limit reached");
    }

    #[tokio::test]
    async fn test_revoked_key_is_forbidden() {
        let service = Arc::new(KeyService::new(Arc::new(MockKeyRepository::new())));
        let issued = service
            .issue_temporary_key(IssueRequest {
                label: "trial".to_string(),
                usage_limit: 1,
                ttl: Duration::from_secs(3600),
                operator: "op".to_string(),
            })
            .await
            .unwrap();
        service.revoke(&issued.key, "op").await.unwrap();
        let app = test_router(test_state(Some(service)));

        let response = app.oneshot(request(Some(&issued.key))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_error(response).await, "key inactive");
    }

    #[tokio::test]
    async fn test_store_failure_sets_retry_after() {
        let repo = Arc::new(MockKeyRepository::new());
        repo.set_should_fail(true).await;
        let service = Arc::new(KeyService::new(repo));
        let app = test_router(test_state(Some(service)));

        let response = app.oneshot(request(Some("some-key"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get("retry-after").unwrap().to_str().unwrap(),
            "5"
        );
        assert_eq!(body_error(response).await, "service unavailable");
    }

    #[tokio::test]
    async fn test_static_key_works_when_feature_disabled() {
        // key_service None models ENABLE_TEMPORARY_KEYS=false.
        let app = test_router(test_state(None));

        let response = app.oneshot(request(Some("static-key"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

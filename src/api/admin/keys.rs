//! Temporary key management admin endpoints

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::KeyStatus;
use crate::domain::DomainError;
use crate::infrastructure::api_key::{IssueRequest, KeyService, DEFAULT_CLEANUP_LIMIT};

const DEFAULT_USAGE_LIMIT: i64 = 10;
const DEFAULT_TTL_MINUTES: i64 = 10080;
const MIN_USAGE_LIMIT: i64 = 1;
const MAX_USAGE_LIMIT: i64 = 1000;
const MIN_TTL_MINUTES: i64 = 15;
const MAX_TTL_MINUTES: i64 = 10080;
const MAX_LABEL_CHARS: usize = 64;

/// Request to issue a new temporary key. An empty body is valid and means
/// all defaults.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueKeyRequest {
    pub label: Option<String>,
    pub usage_limit: Option<i64>,
    pub ttl_minutes: Option<i64>,
}

/// Issue response; the only place the raw key is ever returned.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueKeyResponse {
    pub key: String,
    pub label: String,
    pub created_at: String,
    pub expires_at: String,
    pub max_usage: u32,
    pub remaining_usage: u32,
    pub status: KeyStatus,
}

/// Record metadata, raw key excluded.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDetailsResponse {
    pub label: String,
    pub created_at: String,
    pub expires_at: String,
    pub max_usage: u32,
    pub remaining_usage: u32,
    pub status: KeyStatus,
    pub revoked_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeKeyResponse {
    pub label: String,
    pub revoked_at: Option<String>,
    pub remaining_usage: u32,
    pub status: KeyStatus,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    pub limit: Option<String>,
}

/// POST /admin/api-keys
pub async fn issue_key(
    State(state): State<AppState>,
    RequireAdmin(operator): RequireAdmin,
    body: Bytes,
) -> Result<(StatusCode, Json<IssueKeyResponse>), ApiError> {
    let service = key_service(&state)?;

    let request: IssueKeyRequest = if body.is_empty() {
        IssueKeyRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("invalid json body"))?
    };

    let usage_limit = request.usage_limit.unwrap_or(DEFAULT_USAGE_LIMIT);
    if !(MIN_USAGE_LIMIT..=MAX_USAGE_LIMIT).contains(&usage_limit) {
        return Err(ApiError::bad_request("usageLimit out of range"));
    }

    let ttl_minutes = request.ttl_minutes.unwrap_or(DEFAULT_TTL_MINUTES);
    if !(MIN_TTL_MINUTES..=MAX_TTL_MINUTES).contains(&ttl_minutes) {
        return Err(ApiError::bad_request("ttlMinutes out of range"));
    }

    let label = request.label.unwrap_or_default();
    if label.chars().count() > MAX_LABEL_CHARS {
        return Err(ApiError::bad_request("label too long"));
    }

    let response = service
        .issue_temporary_key(IssueRequest {
            label,
            usage_limit: usage_limit as u32,
            ttl: Duration::from_secs(ttl_minutes as u64 * 60),
            operator,
        })
        .await
        .map_err(|err| {
            error!(error = %err, "failed to issue temporary key");
            ApiError::internal("failed to issue key")
        })?;

    let now = Utc::now();
    Ok((
        StatusCode::CREATED,
        Json(IssueKeyResponse {
            key: response.key,
            label: response.record.label.clone(),
            created_at: rfc3339(response.record.created_at),
            expires_at: rfc3339(response.record.expires_at),
            max_usage: response.record.max_usage,
            remaining_usage: response.record.remaining_usage,
            status: response.record.status(now),
        }),
    ))
}

/// GET /admin/api-keys/{key}
pub async fn get_key(
    State(state): State<AppState>,
    RequireAdmin(_operator): RequireAdmin,
    Path(key): Path<String>,
) -> Result<Json<KeyDetailsResponse>, ApiError> {
    let service = key_service(&state)?;

    let record = match service.get(&key).await {
        Ok(record) => record,
        Err(DomainError::KeyNotFound) => return Err(ApiError::not_found("not found")),
        Err(err) => {
            error!(error = %err, "failed to fetch key");
            return Err(ApiError::internal("failed to fetch key"));
        }
    };

    Ok(Json(KeyDetailsResponse {
        label: record.label.clone(),
        created_at: rfc3339(record.created_at),
        expires_at: rfc3339(record.expires_at),
        max_usage: record.max_usage,
        remaining_usage: record.remaining_usage,
        status: record.status(Utc::now()),
        revoked_at: record.revoked_at.map(rfc3339),
    }))
}

/// POST /admin/api-keys/{key}/revoke
pub async fn revoke_key(
    State(state): State<AppState>,
    RequireAdmin(operator): RequireAdmin,
    Path(key): Path<String>,
) -> Result<Json<RevokeKeyResponse>, ApiError> {
    let service = key_service(&state)?;

    let record = match service.revoke(&key, &operator).await {
        Ok(record) => record,
        Err(DomainError::KeyNotFound) => return Err(ApiError::not_found("not found")),
        Err(err) => {
            error!(error = %err, "failed to revoke key");
            return Err(ApiError::internal("failed to revoke key"));
        }
    };

    Ok(Json(RevokeKeyResponse {
        label: record.label.clone(),
        revoked_at: record.revoked_at.map(rfc3339),
        remaining_usage: record.remaining_usage,
        status: record.status(Utc::now()),
    }))
}

/// POST /admin/api-keys/cleanup?limit=N
pub async fn cleanup(
    State(state): State<AppState>,
    RequireAdmin(_operator): RequireAdmin,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let service = key_service(&state)?;

    // Unparsable or non-positive limits silently fall back to the default;
    // anything above it is clamped.
    let limit = query
        .limit
        .as_deref()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|parsed| *parsed > 0)
        .map(|parsed| parsed.min(DEFAULT_CLEANUP_LIMIT))
        .unwrap_or(DEFAULT_CLEANUP_LIMIT);

    let deleted = service.cleanup_expired(limit).await.map_err(|err| {
        error!(error = %err, "failed to clean up expired keys");
        ApiError::internal("cleanup failed")
    })?;

    Ok(Json(CleanupResponse { deleted }))
}

/// Uniform fallback for unmatched admin paths and methods. Always 404,
/// never 405, so probing cannot distinguish keys from routes.
pub async fn not_found(RequireAdmin(_operator): RequireAdmin) -> ApiError {
    ApiError::not_found("not found")
}

fn key_service(state: &AppState) -> Result<&Arc<KeyService>, ApiError> {
    state
        .key_service
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("temporary key management disabled"))
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::admin::create_admin_router;
    use crate::api::types::ApiErrorBody;
    use crate::domain::api_key::{KeyRecord, KeyRepository, KeyType, MockKeyRepository};
    use crate::infrastructure::render::{ConvertService, StubOpener, DEFAULT_JPEG_QUALITY};
    use axum::{body::Body, http::Request, Router};
    use http_body_util::BodyExt;
    use std::collections::HashSet;

    fn test_state(service: Option<Arc<KeyService>>) -> AppState {
        AppState::new(
            HashSet::new(),
            HashSet::from(["secret".to_string()]),
            service,
            ConvertService::new(Arc::new(StubOpener { pages: 1 }), DEFAULT_JPEG_QUALITY),
        )
    }

    fn test_app(service: Option<Arc<KeyService>>) -> Router {
        Router::new()
            .nest("/admin", create_admin_router())
            .with_state(test_state(service))
    }

    fn app_with_repo() -> (Router, Arc<MockKeyRepository>) {
        let repo = Arc::new(MockKeyRepository::new());
        let app = test_app(Some(Arc::new(KeyService::new(repo.clone()))));
        (app, repo)
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("x-admin-key", "secret")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-admin-key", "secret")
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn oneshot(app: &Router, request: Request<Body>) -> axum::response::Response {
        use tower::util::ServiceExt;
        app.clone().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_issue_with_empty_body_uses_defaults() {
        let (app, _) = app_with_repo();

        let response = oneshot(&app, post("/admin/api-keys", "")).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        assert_eq!(body["key"].as_str().unwrap().len(), 32);
        assert_eq!(body["maxUsage"], 10);
        assert_eq!(body["remainingUsage"], 10);
        assert_eq!(body["status"], "active");
    }

    #[tokio::test]
    async fn test_issue_with_explicit_parameters() {
        let (app, _) = app_with_repo();

        let response = oneshot(
            &app,
            post(
                "/admin/api-keys",
                r#"{"label":"trial","usageLimit":2,"ttlMinutes":60}"#,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        assert_eq!(body["label"], "trial");
        assert_eq!(body["maxUsage"], 2);
        assert_eq!(body["remainingUsage"], 2);
    }

    #[tokio::test]
    async fn test_issue_bounds() {
        let (app, _) = app_with_repo();

        let cases = [
            (r#"{"usageLimit":0}"#, StatusCode::BAD_REQUEST),
            (r#"{"usageLimit":1001}"#, StatusCode::BAD_REQUEST),
            (r#"{"usageLimit":1}"#, StatusCode::CREATED),
            (r#"{"usageLimit":1000}"#, StatusCode::CREATED),
            (r#"{"ttlMinutes":14}"#, StatusCode::BAD_REQUEST),
            (r#"{"ttlMinutes":10081}"#, StatusCode::BAD_REQUEST),
            (r#"{"ttlMinutes":15}"#, StatusCode::CREATED),
            (r#"{"ttlMinutes":10080}"#, StatusCode::CREATED),
        ];

        for (body, expected) in cases {
            let response = oneshot(&app, post("/admin/api-keys", body)).await;
            assert_eq!(response.status(), expected, "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_issue_rejects_invalid_json() {
        let (app, _) = app_with_repo();

        let response = oneshot(&app, post("/admin/api-keys", "{not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["error"], "invalid json body");
    }

    #[tokio::test]
    async fn test_issue_rejects_long_label() {
        let (app, _) = app_with_repo();

        let label = "x".repeat(65);
        let response = oneshot(
            &app,
            post("/admin/api-keys", &format!(r#"{{"label":"{label}"}}"#)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_unknown_key() {
        let (app, _) = app_with_repo();

        let response = oneshot(&app, get("/admin/api-keys/missing")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json_body(response).await;
        assert_eq!(body["error"], "not found");
    }

    #[tokio::test]
    async fn test_issue_then_get() {
        let (app, _) = app_with_repo();

        let response = oneshot(
            &app,
            post("/admin/api-keys", r#"{"label":"trial","usageLimit":5}"#),
        )
        .await;
        let issued = json_body(response).await;
        let key = issued["key"].as_str().unwrap();

        let response = oneshot(&app, get(&format!("/admin/api-keys/{key}"))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["label"], "trial");
        assert_eq!(body["maxUsage"], 5);
        assert_eq!(body["status"], "active");
        assert!(body["revokedAt"].is_null());
        // The raw key never appears in the inspect response.
        assert!(body.get("key").is_none());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent_over_http() {
        let (app, _) = app_with_repo();

        let response = oneshot(&app, post("/admin/api-keys", r#"{"label":"trial"}"#)).await;
        let issued = json_body(response).await;
        let key = issued["key"].as_str().unwrap().to_string();

        let response = oneshot(&app, post(&format!("/admin/api-keys/{key}/revoke"), "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let first = json_body(response).await;
        assert_eq!(first["status"], "revoked");
        assert_eq!(first["remainingUsage"], 0);
        assert!(first["revokedAt"].is_string());

        let response = oneshot(&app, post(&format!("/admin/api-keys/{key}/revoke"), "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let second = json_body(response).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_revoke_unknown_key() {
        let (app, _) = app_with_repo();

        let response = oneshot(&app, post("/admin/api-keys/missing/revoke", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cleanup_clamps_limit() {
        let (app, repo) = app_with_repo();

        let past = Utc::now() - chrono::Duration::hours(1);
        for i in 0..3 {
            repo.create(KeyRecord {
                key: format!("expired-{i}-{}", "x".repeat(20)),
                kind: KeyType::Temporary,
                label: "old".to_string(),
                created_at: past - chrono::Duration::hours(1),
                expires_at: past,
                max_usage: 1,
                remaining_usage: 1,
                revoked_at: None,
            })
            .await
            .unwrap();
        }

        let response = oneshot(&app, post("/admin/api-keys/cleanup?limit=500", "")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["deleted"], 3);
    }

    #[tokio::test]
    async fn test_cleanup_ignores_unparsable_limit() {
        let (app, _) = app_with_repo();

        for uri in [
            "/admin/api-keys/cleanup",
            "/admin/api-keys/cleanup?limit=abc",
            "/admin/api-keys/cleanup?limit=-4",
            "/admin/api-keys/cleanup?limit=0",
        ] {
            let response = oneshot(&app, post(uri, "")).await;
            assert_eq!(response.status(), StatusCode::OK, "uri: {uri}");
            let body = json_body(response).await;
            assert_eq!(body["deleted"], 0);
        }
    }

    #[tokio::test]
    async fn test_unknown_paths_and_methods_are_uniform_404() {
        let (app, _) = app_with_repo();

        // Unknown path.
        let response = oneshot(&app, get("/admin/other")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "not found");

        // Known path, unsupported method: still 404, never 405.
        let response = oneshot(&app, get("/admin/api-keys")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let delete = Request::builder()
            .method("DELETE")
            .uri("/admin/api-keys/somekey")
            .header("x-admin-key", "secret")
            .body(Body::empty())
            .unwrap();
        let response = oneshot(&app, delete).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_fallback_still_requires_admin_key() {
        let (app, _) = app_with_repo();

        let request = Request::builder()
            .uri("/admin/other")
            .body(Body::empty())
            .unwrap();
        let response = oneshot(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_disabled_feature_returns_503() {
        let app = test_app(None);

        let response = oneshot(&app, post("/admin/api-keys", "")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ApiErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "temporary key management disabled");
    }
}

//! PDF to JPEG conversion endpoint

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use tracing::{error, warn};

use crate::api::middleware::RequireApiKey;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::document::ConvertError;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const UPLOAD_FIELD: &str = "file";

/// POST /convert
///
/// Accepts `multipart/form-data` with a `file` field holding a PDF and
/// responds with the first page rendered as JPEG.
pub async fn convert(
    State(state): State<AppState>,
    _key: RequireApiKey,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return Err(map_multipart_error(err)),
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(map_multipart_error)?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let Some((filename, data)) = upload else {
        warn!("convert request without file field");
        return Err(ApiError::bad_request("file field is required"));
    };

    if data.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::too_large("file too large"));
    }

    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(ApiError::bad_request("file must be a pdf"));
    }

    let jpeg = state
        .converter
        .convert_first_page(data)
        .await
        .map_err(map_conversion_error)?;

    let stem = std::path::Path::new(&filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document");

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{stem}.jpg\""),
            ),
        ],
        jpeg,
    ))
}

fn map_multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::too_large("file too large");
    }
    warn!(error = %err, "multipart parse error");
    ApiError::bad_request("invalid multipart form data")
}

fn map_conversion_error(err: ConvertError) -> ApiError {
    match err {
        ConvertError::NoPages => ApiError::bad_request("pdf has no pages"),
        ConvertError::Canceled => ApiError::timeout("request canceled"),
        other => {
            error!(error = %other, "failed to convert first page");
            ApiError::internal("failed to convert pdf")
        }
    }
}

//! Interpretation of raw personalization responses into results or errors.

use shared::{
    domain::ResultImage,
    error::ErrorKind,
    protocol::{ErrorBody, HealthResponse, PersonalizeResponse},
};
use tracing::{debug, warn};

use crate::transport::RawResponse;

/// Upper bound on the raw body kept for diagnostics.
pub const BODY_EXCERPT_LIMIT: usize = 500;

pub fn interpret_personalize_response(response: &RawResponse) -> Result<ResultImage, ErrorKind> {
    if !response.status.is_success() {
        return Err(http_error(response));
    }

    let value: serde_json::Value = serde_json::from_slice(&response.body).map_err(|err| {
        let excerpt = body_excerpt(&response.body, BODY_EXCERPT_LIMIT);
        warn!(error = %err, %excerpt, "personalize response is not valid JSON");
        ErrorKind::InvalidResponseFormat { excerpt }
    })?;

    if let Some(object) = value.as_object() {
        debug!(keys = ?object.keys().collect::<Vec<_>>(), "personalize response received");
    }

    let payload: PersonalizeResponse = match serde_json::from_value(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "personalize response has an unexpected shape");
            return Err(ErrorKind::MissingImageData);
        }
    };

    match payload.image_base64.as_deref() {
        Some(image) if payload.is_success() && !image.is_empty() => {
            debug!(image_len = image.len(), "image payload received");
            Ok(ResultImage::new(payload.format.as_deref(), image))
        }
        _ => {
            warn!(
                status = ?payload.status,
                has_image = payload.image_base64.is_some(),
                "personalize response is missing image data"
            );
            Err(ErrorKind::MissingImageData)
        }
    }
}

/// Returns the status string reported by `GET /health`.
pub fn interpret_health_response(response: &RawResponse) -> Result<String, ErrorKind> {
    if !response.status.is_success() {
        return Err(http_error(response));
    }

    serde_json::from_slice::<HealthResponse>(&response.body)
        .map(|health| health.status)
        .map_err(|_| ErrorKind::InvalidResponseFormat {
            excerpt: body_excerpt(&response.body, BODY_EXCERPT_LIMIT),
        })
}

fn http_error(response: &RawResponse) -> ErrorKind {
    let status = response.status;
    let message = match serde_json::from_slice::<ErrorBody>(&response.body) {
        Ok(body) => body
            .detail_message()
            .unwrap_or_else(|| "Failed to process image".to_string()),
        Err(_) => format!(
            "Server error: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        )
        .trim_end()
        .to_string(),
    };
    warn!(status = status.as_u16(), %message, "personalization request failed");
    ErrorKind::http(status.as_u16(), message)
}

/// First `limit` characters of `body`, decoded lossily.
///
/// Only the leading `limit * 4` bytes are decoded, enough for `limit` chars of any width.
pub fn body_excerpt(body: &[u8], limit: usize) -> String {
    let prefix = &body[..body.len().min(limit.saturating_mul(4))];
    String::from_utf8_lossy(prefix).chars().take(limit).collect()
}

use serde::{Deserialize, Serialize};

/// Multipart field the personalization endpoint reads the photo from.
pub const PHOTO_FIELD: &str = "photo";
pub const PERSONALIZE_PATH: &str = "personalize";
pub const HEALTH_PATH: &str = "health";
pub const SUCCESS_STATUS: &str = "success";
pub const DEFAULT_IMAGE_FORMAT: &str = "png";

/// Body of a successful `POST /personalize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonalizeResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl PersonalizeResponse {
    pub fn success(image_base64: impl Into<String>, format: Option<&str>) -> Self {
        Self {
            status: Some(SUCCESS_STATUS.to_string()),
            image_base64: Some(image_base64.into()),
            format: format.map(str::to_string),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(SUCCESS_STATUS)
    }
}

/// Structured error body returned with non-2xx statuses.
///
/// `detail` is usually a string but validation failures carry a list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn detail_message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) if text.is_empty() => None,
            serde_json::Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}

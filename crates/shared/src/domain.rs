use std::{fmt, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{error::ErrorKind, protocol::DEFAULT_IMAGE_FORMAT};

/// Name the personalized image is saved under, whatever its format.
pub const DOWNLOAD_FILE_NAME: &str = "personalized-book-page.png";

/// Photo chosen by the user. Cloning shares the byte buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub file_name: String,
    pub mime_type: String,
    bytes: Arc<[u8]>,
}

impl SelectedFile {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewDataUri(pub String);

impl PreviewDataUri {
    pub fn encode(mime_type: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Image returned by the personalization endpoint, still base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultImage {
    pub mime_subtype: String,
    pub data: String,
}

impl ResultImage {
    pub fn new(mime_subtype: Option<&str>, data: impl Into<String>) -> Self {
        let mime_subtype = mime_subtype
            .filter(|subtype| !subtype.is_empty())
            .unwrap_or(DEFAULT_IMAGE_FORMAT);
        Self {
            mime_subtype: mime_subtype.to_string(),
            data: data.into(),
        }
    }

    pub fn data_uri(&self) -> String {
        format!("data:image/{};base64,{}", self.mime_subtype, self.data)
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.data.trim())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OperationState {
    #[default]
    Idle,
    Submitting,
    Succeeded(ResultImage),
    Failed(ErrorKind),
}

impl OperationState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting)
    }

    pub fn result(&self) -> Option<&ResultImage> {
        match self {
            Self::Succeeded(image) => Some(image),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorKind> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_image_defaults_to_png() {
        assert_eq!(ResultImage::new(None, "Zm9v").data_uri(), "data:image/png;base64,Zm9v");
        assert_eq!(ResultImage::new(Some(""), "Zm9v").mime_subtype, "png");
        assert_eq!(
            ResultImage::new(Some("jpeg"), "Zm9v").data_uri(),
            "data:image/jpeg;base64,Zm9v"
        );
    }

    #[test]
    fn result_image_decodes_payload() {
        let image = ResultImage::new(Some("png"), "Zm9v");
        assert_eq!(image.decode().expect("decode"), b"foo");
        assert!(ResultImage::new(None, "not base64!").decode().is_err());
    }

    #[test]
    fn preview_uses_declared_mime_type() {
        let preview = PreviewDataUri::encode("image/webp", b"foo");
        assert_eq!(preview.as_str(), "data:image/webp;base64,Zm9v");
    }

    #[test]
    fn selected_file_clone_shares_bytes() {
        let file = SelectedFile::new("me.jpg", "image/jpeg", b"abc".to_vec());
        let copy = file.clone();
        assert_eq!(copy.size_bytes(), 3);
        assert_eq!(copy, file);
        assert!(format!("{file:?}").contains("size_bytes: 3"));
    }
}

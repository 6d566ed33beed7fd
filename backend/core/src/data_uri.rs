//! Data URI encoding for uploaded documents.
//!
//! Uploaded images travel through the system as `data:<mimetype>;base64,<data>`
//! strings so they can be embedded in the page and forwarded to vision models
//! without separate storage.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TaxwiseError;

/// A parsed base64 data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    data: String,
}

impl DataUri {
    /// Encode raw bytes under the given MIME type.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Parse a `data:<mimetype>;base64,<data>` string.
    pub fn parse(uri: &str) -> Result<Self, TaxwiseError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| TaxwiseError::InvalidDocument("data URI must start with 'data:'".into()))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| TaxwiseError::InvalidDocument("data URI is missing the ',' separator".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| TaxwiseError::InvalidDocument("data URI must use base64 encoding".into()))?;

        if mime_type.is_empty() || !mime_type.contains('/') {
            return Err(TaxwiseError::InvalidDocument(format!(
                "data URI has no valid MIME type: '{mime_type}'"
            )));
        }
        if data.is_empty() {
            return Err(TaxwiseError::InvalidDocument("data URI has an empty payload".into()));
        }
        STANDARD
            .decode(data)
            .map_err(|e| TaxwiseError::InvalidDocument(format!("data URI payload is not valid base64: {e}")))?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The base64 payload, without the header.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Approximate decoded size in bytes.
    pub fn decoded_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        ((self.data.len() / 4) * 3).saturating_sub(padding.min(2))
    }

    pub fn is_image(&self) -> bool {
        is_image(&self.mime_type)
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

impl Serialize for DataUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl FromStr for DataUri {
    type Err = TaxwiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Detect an image MIME type by file extension.
///
/// Returns `None` for anything that is not a recognised image format.
pub fn detect_image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png"          => "image/png",
        "gif"          => "image/gif",
        "webp"         => "image/webp",
        "heic"         => "image/heic",
        "heif"         => "image/heif",
        "avif"         => "image/avif",
        "bmp"          => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        _ => return None,
    };
    Some(mime)
}

/// Whether a MIME type is for an image.
pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

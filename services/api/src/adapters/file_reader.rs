//! services/api/src/adapters/file_reader.rs
//!
//! Implements the `FileReader` port by turning uploaded image bytes into a
//! base64 `data:` URI the dashboard can embed directly.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use progress_journal_core::domain::RawFile;
use progress_journal_core::ports::{FileReader, PortError, PortResult};

/// Image signatures recognised when the upload carries no usable content type.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"BM", "image/bmp"),
];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone, Debug)]
pub struct DataUriReader {
    max_bytes: usize,
}

impl DataUriReader {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Picks the MIME type for `file`, preferring a declared `image/*` type.
    fn resolve_mime(file: &RawFile) -> PortResult<String> {
        let declared = file
            .content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

        match declared {
            Some(ct) if ct.starts_with("image/") => Ok(ct),
            Some(ct) => Err(PortError::Unsupported(format!(
                "'{}' is not an image (declared type {})",
                file.file_name, ct
            ))),
            None => sniff_mime(&file.bytes).map(str::to_string).ok_or_else(|| {
                PortError::Unsupported(format!("'{}' is not a recognised image format", file.file_name))
            }),
        }
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    SIGNATURES
        .iter()
        .find(|(magic, _)| bytes.starts_with(magic))
        .map(|(_, mime)| *mime)
}

//=========================================================================================
// `FileReader` Trait Implementation
//=========================================================================================

#[async_trait]
impl FileReader for DataUriReader {
    async fn read_as_data_uri(&self, file: RawFile) -> PortResult<String> {
        if file.bytes.is_empty() {
            return Err(PortError::Unsupported(format!("'{}' is empty", file.file_name)));
        }
        if file.bytes.len() > self.max_bytes {
            return Err(PortError::Unsupported(format!(
                "'{}' is {} bytes, the limit is {}",
                file.file_name,
                file.bytes.len(),
                self.max_bytes
            )));
        }
        let mime = Self::resolve_mime(&file)?;

        // Base64 of a multi-megabyte photo is CPU work; keep it off the async workers.
        let bytes = file.bytes;
        let encoded = tokio::task::spawn_blocking(move || general_purpose::STANDARD.encode(&bytes))
            .await
            .map_err(|e| PortError::Unexpected(format!("Encoding task failed: {}", e)))?;

        Ok(format!("data:{};base64,{}", mime, encoded))
    }
}

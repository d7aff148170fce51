//! Figure image encoding: raw bytes ⇄ base64 payloads.
//!
//! Vision APIs take images as base64 data URIs inside the JSON request body;
//! Docling exports embed figure pixels the same way (`image.uri`). This
//! module handles both directions and never inspects the pixels themselves.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// MIME type announced for every figure sent to a vision model.
pub const FIGURE_MIME: &str = "image/png";

/// `data:image/png;base64,<…>` for the chat-completions `image_url` field.
pub fn data_uri(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", FIGURE_MIME, STANDARD.encode(bytes))
}

/// Figure bytes as an `edgequake-llm` image attachment.
///
/// `detail: "high"` keeps small labels legible for GPT-4-class models.
pub fn image_data(bytes: &[u8]) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded figure → {} bytes base64", b64.len());
    ImageData::new(b64, FIGURE_MIME).with_detail("high")
}

/// Decode a base64 data URI or a bare base64 string.
///
/// Returns `None` for remote URLs, file paths and malformed payloads.
pub fn decode_image_payload(payload: &str) -> Option<Vec<u8>> {
    let payload = payload.trim();
    let b64 = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest.split_once(',')?;
            if !meta.ends_with(";base64") {
                return None;
            }
            data
        }
        None if payload.contains("://") || payload.starts_with('/') => return None,
        None => payload,
    };
    let bytes = STANDARD.decode(b64.trim()).ok()?;
    (!bytes.is_empty()).then_some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn data_uri_has_png_prefix() {
        let uri = data_uri(PNG_MAGIC);
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(decode_image_payload(&uri).as_deref(), Some(PNG_MAGIC));
    }

    #[test]
    fn image_data_is_png() {
        let data = image_data(PNG_MAGIC);
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, PNG_MAGIC);
    }

    #[test]
    fn decode_accepts_jpeg_data_uri_and_bare_base64() {
        let b64 = STANDARD.encode([1u8, 2, 3]);
        let uri = format!("data:image/jpeg;base64,{b64}");
        assert_eq!(decode_image_payload(&uri), Some(vec![1, 2, 3]));
        assert_eq!(decode_image_payload(&b64), Some(vec![1, 2, 3]));
    }

    #[test]
    fn decode_rejects_urls_and_garbage() {
        assert_eq!(decode_image_payload("https://example.com/a.png"), None);
        assert_eq!(decode_image_payload("/tmp/a.png"), None);
        assert_eq!(decode_image_payload("data:image/png,rawtext"), None);
        assert_eq!(decode_image_payload("not base64!!"), None);
        assert_eq!(decode_image_payload(""), None);
    }
}

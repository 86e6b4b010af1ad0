//! Content classification: picks the download strategy from response headers.

use reqwest::header::{CONTENT_TYPE, HeaderMap};

/// Download strategy for a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Small body, buffered and byte-compared.
    Image,
    /// Large body, streamed to a `.part` file and hash-compared.
    Video,
}

/// Classifies a response by its declared `Content-Type`.
///
/// Anything mentioning `video` is streamed; everything else, including a
/// missing or unreadable header, is treated as an image.
#[must_use]
pub fn classify(headers: &HeaderMap) -> MediaKind {
    let is_video = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("video"));
    if is_video {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    fn headers_with(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_video_content_types() {
        assert_eq!(classify(&headers_with("video/mp4")), MediaKind::Video);
        assert_eq!(classify(&headers_with("Video/WebM; codecs=vp9")), MediaKind::Video);
    }

    #[test]
    fn test_image_content_types() {
        assert_eq!(classify(&headers_with("image/jpeg")), MediaKind::Image);
        assert_eq!(classify(&headers_with("application/octet-stream")), MediaKind::Image);
    }

    #[test]
    fn test_missing_header_defaults_to_image() {
        assert_eq!(classify(&HeaderMap::new()), MediaKind::Image);
    }

    #[test]
    fn test_non_utf8_header_defaults_to_image() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_bytes(b"video/\xff").unwrap());
        assert_eq!(classify(&headers), MediaKind::Image);
    }
}

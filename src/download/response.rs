//! Response handles and materialized bodies returned by the fetch client.
//!
//! A [`MediaResponse`] is either a live streaming response or a body that was
//! already buffered by the fallback transport; downloaders consume both the
//! same way through [`ChunkReader`].

use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use reqwest::header::{CONTENT_LENGTH, HeaderMap};

use super::error::DownloadError;

/// Shape a caller wants a body materialized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Decoded text.
    Text,
    /// Raw bytes.
    Bytes,
    /// Parsed JSON document.
    Json,
}

/// A fully materialized response body.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedBody {
    /// Decoded text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// Parsed JSON document.
    Json(serde_json::Value),
}

impl FetchedBody {
    /// Returns the text body, if this is [`FetchedBody::Text`].
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the raw body, if this is [`FetchedBody::Bytes`].
    #[must_use]
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the JSON body, if this is [`FetchedBody::Json`].
    #[must_use]
    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }
}

enum Body {
    Live(reqwest::Response),
    Stream(BoxStream<'static, Result<Bytes, DownloadError>>),
}

/// A successful response whose body has not been consumed yet.
///
/// Ownership passes to the caller, who must read it to completion or drop it.
pub struct MediaResponse {
    url: String,
    status: u16,
    headers: HeaderMap,
    body: Body,
}

impl std::fmt::Debug for MediaResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaResponse")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl MediaResponse {
    pub(crate) fn live(url: impl Into<String>, response: reqwest::Response) -> Self {
        Self {
            url: url.into(),
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            body: Body::Live(response),
        }
    }

    /// Builds a response around an already buffered body.
    #[must_use]
    pub fn buffered(url: impl Into<String>, status: u16, headers: HeaderMap, body: Bytes) -> Self {
        Self::from_stream(url, status, headers, stream::once(async move { Ok(body) }))
    }

    /// Builds a response around an arbitrary body stream.
    pub fn from_stream<S>(url: impl Into<String>, status: u16, headers: HeaderMap, body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, DownloadError>> + Send + 'static,
    {
        Self {
            url: url.into(),
            status,
            headers,
            body: Body::Stream(body.boxed()),
        }
    }

    /// URL this response was fetched from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Declared `Content-Length`, or 0 when absent or malformed.
    #[must_use]
    pub fn content_length(&self) -> u64 {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`] if the body cannot be read.
    pub async fn bytes(self) -> Result<Bytes, DownloadError> {
        read_all(&self.url, self.body).await
    }

    /// Materializes the body into the requested shape.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`] if the body cannot be read and
    /// [`DownloadError::Decode`] if it is not valid JSON for
    /// [`ResponseShape::Json`].
    pub async fn materialize(self, shape: ResponseShape) -> Result<FetchedBody, DownloadError> {
        let url = self.url.clone();
        match shape {
            ResponseShape::Bytes => Ok(FetchedBody::Bytes(self.bytes().await?)),
            ResponseShape::Text => match self.body {
                Body::Live(response) => response
                    .text()
                    .await
                    .map(FetchedBody::Text)
                    .map_err(|e| DownloadError::network(url, e)),
                body @ Body::Stream(_) => {
                    let bytes = read_all(&url, body).await?;
                    Ok(FetchedBody::Text(String::from_utf8_lossy(&bytes).into_owned()))
                }
            },
            ResponseShape::Json => {
                let bytes = self.bytes().await?;
                serde_json::from_slice(&bytes)
                    .map(FetchedBody::Json)
                    .map_err(|e| DownloadError::decode(url, e.to_string()))
            }
        }
    }

    /// Converts the body into a reader that yields bounded chunks.
    #[must_use]
    pub fn into_chunks(self) -> ChunkReader {
        let stream = match self.body {
            Body::Live(response) => {
                let url = self.url.clone();
                response
                    .bytes_stream()
                    .map(move |item| item.map_err(|e| DownloadError::network(url.clone(), e)))
                    .boxed()
            }
            Body::Stream(body) => body,
        };
        ChunkReader {
            stream,
            pending: Bytes::new(),
        }
    }
}

async fn read_all(url: &str, body: Body) -> Result<Bytes, DownloadError> {
    match body {
        Body::Live(response) => response
            .bytes()
            .await
            .map_err(|e| DownloadError::network(url, e)),
        Body::Stream(mut body) => {
            let mut buffer = Vec::new();
            while let Some(chunk) = body.next().await {
                buffer.extend_from_slice(&chunk?);
            }
            Ok(Bytes::from(buffer))
        }
    }
}

/// Reads a body in chunks no larger than a caller-chosen size.
///
/// A chunk is whatever is available up to the requested size; nothing is
/// coalesced, so memory use is bounded by one upstream frame.
pub struct ChunkReader {
    stream: BoxStream<'static, Result<Bytes, DownloadError>>,
    pending: Bytes,
}

impl ChunkReader {
    /// Returns the next chunk of at most `max_len` bytes, or `None` at end of body.
    ///
    /// # Errors
    ///
    /// Propagates transport errors from the underlying stream.
    pub async fn next_chunk(&mut self, max_len: usize) -> Result<Option<Bytes>, DownloadError> {
        let max_len = max_len.max(1);
        while self.pending.is_empty() {
            match self.stream.next().await {
                Some(item) => self.pending = item?,
                None => return Ok(None),
            }
        }
        let take = max_len.min(self.pending.len());
        Ok(Some(self.pending.split_to(take)))
    }
}

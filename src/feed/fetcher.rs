use futures::StreamExt;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching the raw feed body.
///
/// All of these map to a failed poll. Nothing here is retried; the next
/// scheduled poll is the retry.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with a non-success status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request plus body download exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// HTTP cache validators from the last good response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

#[derive(Debug)]
pub enum FetchOutcome {
    /// Fresh body along with the validators the server sent for it
    Body { bytes: Vec<u8>, validators: Validators },
    /// 304 Not Modified or 204 No Content
    NotModified,
}

/// Fetches the feed body once.
///
/// Sends `If-None-Match` / `If-Modified-Since` when validators are known.
/// The whole exchange, body included, runs under `timeout`; dropping the
/// returned future cancels the request without side effects.
///
/// # Errors
///
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::Timeout`] - Exchange exceeded `timeout`
/// - [`FetchError::HttpStatus`] - Any non-2xx status other than 304
/// - [`FetchError::ResponseTooLarge`] - Body exceeded 10MB
/// - [`FetchError::IncompleteResponse`] - Body shorter than Content-Length
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    validators: &Validators,
    timeout: Duration,
) -> Result<FetchOutcome, FetchError> {
    tokio::time::timeout(timeout, fetch_inner(client, url, validators))
        .await
        .map_err(|_| FetchError::Timeout)?
}

async fn fetch_inner(
    client: &reqwest::Client,
    url: &str,
    validators: &Validators,
) -> Result<FetchOutcome, FetchError> {
    let mut request = client.get(url);
    if let Some(etag) = &validators.etag {
        request = request.header(IF_NONE_MATCH, etag.as_str());
    }
    if let Some(last_modified) = &validators.last_modified {
        request = request.header(IF_MODIFIED_SINCE, last_modified.as_str());
    }

    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::NOT_MODIFIED || status == StatusCode::NO_CONTENT {
        tracing::debug!(url = %url, status = %status, "Feed reports no new data");
        return Ok(FetchOutcome::NotModified);
    }

    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let header = |name: reqwest::header::HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    let validators = Validators {
        etag: header(ETAG),
        last_modified: header(LAST_MODIFIED),
    };

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
    Ok(FetchOutcome::Body { bytes, validators })
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Response, Url};
use web2md_logging::{engine_debug, engine_trace};

use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

/// Identification sent with every request. Some servers reject the default
/// client identification of HTTP libraries.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Number of characters of an error response body kept for diagnostics.
pub const BODY_PREVIEW_CHARS: usize = 200;

/// Network limits and identification for page downloads.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Budget for the whole exchange, body included.
    pub request_timeout: Duration,
    /// Redirects followed before giving up.
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Downloads the raw bytes behind a URL.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError>;
}

/// [`Fetcher`] backed by a `reqwest` client built per request, so each
/// download gets its own redirect bookkeeping.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

/// Redirects followed by one request.
#[derive(Debug, Clone, Default)]
struct Hops(Arc<AtomicUsize>);

impl Hops {
    fn record(&self, count: usize) {
        self.0.store(count, Ordering::Relaxed);
    }

    fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn client(&self, hops: Hops) -> Result<reqwest::Client, FetchError> {
        let limit = self.settings.redirect_limit;
        // `previous` holds every address visited so far, the first request included.
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let followed = attempt.previous().len();
            hops.record(followed);
            if followed > limit {
                attempt.error(format!("more than {limit} redirects"))
            } else {
                attempt.follow()
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }

    fn over_limit(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            format!("body exceeds {} bytes", self.settings.max_bytes),
        )
    }

    /// Collects the body while enforcing `max_bytes`, before and during the transfer.
    async fn read_body(&self, response: Response) -> Result<Vec<u8>, FetchError> {
        let limit = self.settings.max_bytes;
        if let Some(announced) = response.content_length().filter(|len| *len > limit) {
            return Err(self.over_limit(announced));
        }

        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(classify)?;
            let received = (body.len() + chunk.len()) as u64;
            if received > limit {
                return Err(self.over_limit(received));
            }
            body.extend_from_slice(&chunk);
            engine_trace!("Received {} bytes so far", received);
        }
        Ok(body)
    }

    /// Turns a non-2xx response into an error carrying the start of its body.
    async fn reject_error_status(&self, response: Response) -> Result<Response, FetchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let cap = self.settings.max_bytes.min(PREVIEW_READ_LIMIT) as usize;
        let head = read_head(response, cap).await;
        let preview = (!head.is_empty()).then(|| body_preview(&String::from_utf8_lossy(&head)));
        Err(
            FetchError::new(FailureKind::HttpStatus(status.as_u16()), status.to_string())
                .with_body_preview(preview),
        )
    }
}

/// Bytes of an error body read for the preview; a UTF-8 char is at most four.
const PREVIEW_READ_LIMIT: u64 = (BODY_PREVIEW_CHARS * 4) as u64;

/// Reads at most `cap` bytes of the body. Transfer errors end the read early.
async fn read_head(response: Response, cap: usize) -> Vec<u8> {
    let mut head = Vec::with_capacity(cap);
    let mut chunks = response.bytes_stream();
    while head.len() < cap {
        match chunks.next().await {
            Some(Ok(chunk)) => {
                let take = chunk.len().min(cap - head.len());
                head.extend_from_slice(&chunk[..take]);
            }
            _ => break,
        }
    }
    head
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let target =
            Url::parse(url).map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let hops = Hops::default();

        let response = self
            .client(hops.clone())?
            .get(target)
            .header(USER_AGENT, self.settings.user_agent.as_str())
            .send()
            .await
            .map_err(classify)?;
        let response = self.reject_error_status(response).await?;

        let final_url = response.url().to_string();
        let content_type = header_text(&response, CONTENT_TYPE);
        let bytes = self.read_body(response).await?;
        engine_debug!("Downloaded {} bytes from {}", bytes.len(), final_url);

        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url,
                redirect_count: hops.count(),
                content_type,
                byte_len: bytes.len() as u64,
            },
            bytes,
        })
    }
}

fn header_text(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// First `BODY_PREVIEW_CHARS` characters of a response body.
pub fn body_preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

fn classify(err: reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_redirect() {
        FailureKind::RedirectLimitExceeded
    } else {
        FailureKind::Network
    };
    FetchError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_bounded_by_chars_not_bytes() {
        let body = "é".repeat(BODY_PREVIEW_CHARS + 50);
        let preview = body_preview(&body);
        assert_eq!(preview.chars().count(), BODY_PREVIEW_CHARS);
    }

    #[test]
    fn short_bodies_are_kept_whole() {
        assert_eq!(body_preview("Not Found"), "Not Found");
    }

    #[test]
    fn empty_preview_is_dropped() {
        let err = FetchError::new(FailureKind::HttpStatus(500), "500")
            .with_body_preview(Some(String::new()));
        assert_eq!(err.body_preview, None);
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn hops_are_shared_between_clones() {
        let hops = Hops::default();
        hops.clone().record(3);
        assert_eq!(hops.count(), 3);
    }
}

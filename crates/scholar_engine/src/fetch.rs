use std::time::Duration;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use engine_logging::engine_debug;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;

use crate::{FailureKind, FetchError, FetchSettings};

/// Capability the orchestrator fetches pages through: URL in, rendered HTML out.
///
/// Implementations must honour `timeout` and report it as `FailureKind::Timeout`.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

/// Plain HTTP fetcher. Pages that need script execution are out of its reach.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout())
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client, settings })
    }

    fn pick_user_agent(&self) -> Option<&str> {
        if self.settings.user_agents.is_empty() {
            return None;
        }
        let index = fastrand::usize(..self.settings.user_agents.len());
        Some(self.settings.user_agents[index].as_str())
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::Network,
            format!(
                "response too large (max {}, actual {actual})",
                self.settings.max_bytes
            ),
        )
    }
}

#[async_trait::async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::Network, format!("invalid url: {err}")))?;

        let mut request = self.client.get(parsed).timeout(timeout);
        if let Some(agent) = self.pick_user_agent() {
            request = request.header(USER_AGENT, agent);
        }
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(classify_status(status), status.to_string()));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(FetchError::new(
                    FailureKind::Network,
                    format!("unsupported content type {ct}"),
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(next_len));
            }
            bytes.extend_from_slice(&chunk);
        }

        engine_debug!("fetched {} bytes from {}", bytes.len(), url);
        Ok(decode_body(&bytes, content_type.as_deref()))
    }
}

/// Publishers answer crawlers with 403/429/503; those count as blocked, not broken.
fn classify_status(status: StatusCode) -> FailureKind {
    match status {
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            FailureKind::Blocked
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FailureKind::Timeout,
        _ => FailureKind::Network,
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

/// BOM, then the Content-Type charset, then chardetng's guess.
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .or_else(|| {
            content_type
                .and_then(charset_label)
                .and_then(|label| Encoding::for_label(label.as_bytes()))
        })
        .unwrap_or_else(|| {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        });
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        key.eq_ignore_ascii_case("charset")
            .then(|| value.trim_matches([' ', '"', '\''].as_ref()))
    })
}

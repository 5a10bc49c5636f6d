use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{redirect, Client, Response};
use tracker_core::{TransportError, TransportKind};
use tracker_logging::{track_debug, track_trace};

use crate::decode::{decode_body, DecodedBody};
use crate::pacer::Pacer;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Redirects followed before the fetch fails.
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Media types accepted on 2xx answers. Matched without parameters.
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec!["text/html".into(), "application/xhtml+xml".into()],
            user_agent: format!("listing-tracker/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// A completed HTTP exchange. Non-2xx answers are pages too: a 404 is how a
/// removed listing looks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub requested_url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// At least one redirect was followed.
    pub redirected: bool,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn decode(&self) -> DecodedBody {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, TransportError>;
}

/// HTTP fetcher backed by one pooled client. Every request waits on the
/// shared [`Pacer`] and reports back to it when the exchange is over.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
    settings: FetchSettings,
    pacer: Arc<Pacer>,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings, pacer: Arc<Pacer>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .redirect(redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| TransportError::new(TransportKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            settings,
            pacer,
        })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    fn accepts(&self, content_type: &str) -> bool {
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(media_type))
    }

    fn too_large(&self, actual: u64) -> TransportError {
        TransportError::new(
            TransportKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }

    async fn read_capped(&self, response: Response) -> Result<Vec<u8>, TransportError> {
        if let Some(declared) = response.content_length() {
            if declared > self.settings.max_bytes {
                return Err(self.too_large(declared));
            }
        }
        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let total = (body.len() + chunk.len()) as u64;
            if total > self.settings.max_bytes {
                return Err(self.too_large(total));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    async fn exchange(
        &self,
        url: &str,
        target: reqwest::Url,
    ) -> Result<FetchedPage, TransportError> {
        let normalized = target.to_string();
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = content_type(response.headers());

        // Error pages are judged by their status alone.
        if let (true, Some(found)) = (status.is_success(), content_type.as_deref()) {
            if !self.accepts(found) {
                return Err(TransportError::new(
                    TransportKind::UnsupportedContentType {
                        content_type: found.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let body = self.read_capped(response).await?;
        track_debug!("{url}: {} ({} bytes)", status.as_u16(), body.len());
        Ok(FetchedPage {
            requested_url: url.to_string(),
            redirected: final_url != normalized,
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

#[async_trait::async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, TransportError> {
        let target = reqwest::Url::parse(url)
            .map_err(|err| TransportError::new(TransportKind::InvalidUrl, err.to_string()))?;

        self.pacer.wait().await;
        track_trace!("GET {url}");
        let result = self.exchange(url, target).await;
        self.pacer.finished().await;
        result
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportKind::Timeout
    } else if err.is_redirect() {
        TransportKind::RedirectLimitExceeded
    } else {
        TransportKind::Network
    };
    TransportError::new(kind, err.to_string())
}

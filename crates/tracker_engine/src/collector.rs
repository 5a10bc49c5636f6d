use std::sync::Arc;

use scraper::{Html, Selector};
use tracker_core::{IdentityResolver, TransportError};
use tracker_logging::{track_debug, track_trace};
use url::Url;

use crate::fetch::{FetchedPage, PageFetcher};
use crate::slug::query_slug;

pub const DEFAULT_SEARCH_URL_TEMPLATE: &str =
    "https://www.boligportal.dk/lejligheder/{query}/?page=1";

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("no result page is open")]
    NotOpened,
    #[error("invalid search url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Navigator over a paginated, possibly lazily rendered result set.
///
/// Methods take `&mut self`: a session serves one interaction at a time.
/// Every call may fail; the harvest loop treats a failure as a cycle without
/// progress.
#[async_trait::async_trait]
pub trait PageCollector: Send {
    /// Navigates to the first result page for `query`.
    async fn open(&mut self, query: &str) -> Result<(), CollectorError>;

    /// Every candidate link currently rendered, in document order.
    async fn collect_visible_candidate_links(&mut self) -> Result<Vec<String>, CollectorError>;

    /// Scrolls or clicks "load more". `true` when more content was requested.
    async fn trigger_further_rendering(&mut self) -> Result<bool, CollectorError>;

    /// Moves to the next result page. `false` when there is none.
    async fn advance_to_next_page(&mut self) -> Result<bool, CollectorError>;
}

#[derive(Debug, Clone)]
struct OpenPage {
    url: Url,
    links: Vec<String>,
}

/// Collector for server-rendered result pages.
///
/// Links come from `<a href>` anchors whose URL carries an identifier; pages
/// are advanced by bumping a `page` query parameter or a `/page/<n>` or
/// `/side/<n>` path segment.
pub struct HttpPageCollector {
    fetcher: Arc<dyn PageFetcher>,
    resolver: IdentityResolver,
    search_url_template: String,
    current: Option<OpenPage>,
}

impl HttpPageCollector {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        resolver: IdentityResolver,
        search_url_template: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            search_url_template: search_url_template.into(),
            current: None,
        }
    }

    pub fn search_url(&self, query: &str) -> Result<Url, CollectorError> {
        let raw = self
            .search_url_template
            .replace("{query}", &query_slug(query));
        Url::parse(&raw).map_err(|err| CollectorError::InvalidUrl {
            url: raw.clone(),
            message: err.to_string(),
        })
    }

    async fn load(&mut self, url: Url) -> Result<FetchedPage, CollectorError> {
        let page = self.fetcher.fetch(url.as_str()).await?;
        if page.is_success() {
            let base = Url::parse(&page.final_url).unwrap_or(url);
            let links = self.candidate_links(&base, &page.decode().text);
            track_debug!("{} candidate links on {}", links.len(), base);
            self.current = Some(OpenPage { url: base, links });
        }
        Ok(page)
    }

    fn candidate_links(&self, base: &Url, html: &str) -> Vec<String> {
        let Ok(anchors) = Selector::parse("a[href]") else {
            return Vec::new();
        };
        let document = Html::parse_document(html);
        document
            .select(&anchors)
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter_map(|href| resolve_href(base, href))
            .filter(|url| self.resolver.extract_identifier(url).is_some())
            .collect()
    }
}

#[async_trait::async_trait]
impl PageCollector for HttpPageCollector {
    async fn open(&mut self, query: &str) -> Result<(), CollectorError> {
        self.current = None;
        let url = self.search_url(query)?;
        let page = self.load(url).await?;
        if page.is_success() {
            Ok(())
        } else {
            Err(CollectorError::Status {
                url: page.requested_url,
                status: page.status,
            })
        }
    }

    async fn collect_visible_candidate_links(&mut self) -> Result<Vec<String>, CollectorError> {
        self.current
            .as_ref()
            .map(|page| page.links.clone())
            .ok_or(CollectorError::NotOpened)
    }

    async fn trigger_further_rendering(&mut self) -> Result<bool, CollectorError> {
        // Static HTML has nothing more to render.
        Ok(false)
    }

    async fn advance_to_next_page(&mut self) -> Result<bool, CollectorError> {
        let current = self.current.as_ref().ok_or(CollectorError::NotOpened)?;
        let Some(next) = next_page_url(&current.url) else {
            return Ok(false);
        };
        track_trace!("advancing to {next}");
        let page = self.load(next).await?;
        Ok(page.is_success())
    }
}

fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// URL of the page after `current`, or `None` when the URL carries no page number.
pub fn next_page_url(current: &Url) -> Option<Url> {
    if let Some(page) = current
        .query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse::<u64>().ok())
    {
        let pairs: Vec<(String, String)> = current
            .query_pairs()
            .map(|(key, value)| {
                if key == "page" {
                    (key.into_owned(), (page + 1).to_string())
                } else {
                    (key.into_owned(), value.into_owned())
                }
            })
            .collect();
        let mut next = current.clone();
        next.query_pairs_mut().clear().extend_pairs(pairs);
        return Some(next);
    }

    let segments: Vec<&str> = current.path_segments()?.collect();
    let position = segments.windows(2).rposition(|pair| {
        matches!(pair[0].to_ascii_lowercase().as_str(), "page" | "side")
            && pair[1].parse::<u64>().is_ok()
    })?;
    let page = segments[position + 1].parse::<u64>().ok()?;
    let mut path: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
    path[position + 1] = (page + 1).to_string();

    let mut next = current.clone();
    next.set_path(&format!("/{}", path.join("/")));
    Some(next)
}

// Scrape resolver - fetches the page and looks for embedded media
//
// Looks, in document order, at:
// - <video src=...> and <source src=...> elements (sources under <audio> are skipped)
// - <meta property="og:video..." content=...> as a fallback
//
// Produces a single-encoding MediaInfo; size and resolution stay unknown.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

use super::traits::Resolver;
use crate::downloader::errors::ResolutionError;
use crate::downloader::models::MediaInfo;
use crate::downloader::traits::PageFetcher;
use crate::downloader::utils::{absolutize, parse_page_url};

lazy_static::lazy_static! {
    static ref MEDIA_TAG_RE: Regex =
        Regex::new(r"(?is)<(/?)(video|audio|source)\b([^>]*)>").unwrap();
    static ref META_TAG_RE: Regex = Regex::new(r"(?is)<meta\b([^>]*)>").unwrap();
    static ref ATTR_RE: Regex = Regex::new(
        r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#
    ).unwrap();
    static ref TITLE_RE: Regex = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
}

/// What the page told us about its media
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMedia {
    pub media_ref: String,
    pub poster: Option<String>,
    pub title: Option<String>,
}

/// Resolver that scrapes raw HTML
pub struct ScrapeResolver {
    fetcher: Arc<dyn PageFetcher>,
}

impl ScrapeResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Find the first embeddable media reference in `html`
    pub fn scan(html: &str) -> Option<PageMedia> {
        let title = TITLE_RE
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| decode_entities(m.as_str().trim()))
            .filter(|t| !t.is_empty());

        let mut poster = None;
        let mut in_audio = false;
        for caps in MEDIA_TAG_RE.captures_iter(html) {
            let closing = !caps[1].is_empty();
            let tag = caps[2].to_ascii_lowercase();
            let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");

            match (tag.as_str(), closing) {
                ("audio", _) => {
                    in_audio = !closing;
                    continue;
                }
                (_, true) => continue,
                ("source", false) if in_audio => continue,
                ("video", false) => {
                    in_audio = false;
                    if poster.is_none() {
                        poster = attribute(attrs, "poster");
                    }
                }
                _ => {}
            }

            if let Some(src) = attribute(attrs, "src") {
                return Some(PageMedia {
                    media_ref: src,
                    poster,
                    title,
                });
            }
        }

        let mut og_image = None;
        let mut og_video = None;
        for caps in META_TAG_RE.captures_iter(html) {
            let attrs = &caps[1];
            let key = attribute(attrs, "property").or_else(|| attribute(attrs, "name"));
            let content = attribute(attrs, "content");
            match (key.as_deref().map(str::to_ascii_lowercase).as_deref(), content) {
                (Some("og:video" | "og:video:url" | "og:video:secure_url"), Some(c))
                    if og_video.is_none() =>
                {
                    og_video = Some(c)
                }
                (Some("og:image"), Some(c)) if og_image.is_none() => og_image = Some(c),
                _ => {}
            }
        }

        og_video.map(|media_ref| PageMedia {
            media_ref,
            poster: poster.or(og_image),
            title,
        })
    }
}

/// Value of attribute `name` inside a tag's attribute text
fn attribute(attrs: &str, name: &str) -> Option<String> {
    ATTR_RE
        .captures_iter(attrs)
        .find(|c| c[1].eq_ignore_ascii_case(name))
        .and_then(|c| c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4)))
        .map(|m| decode_entities(m.as_str().trim()))
        .filter(|v| !v.is_empty())
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn file_name(url: &str) -> Option<String> {
    url.split(['?', '#'])
        .next()?
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Resolver for ScrapeResolver {
    fn name(&self) -> &'static str {
        "scrape"
    }

    async fn resolve(&self, page_url: &str) -> Result<MediaInfo, ResolutionError> {
        let page = parse_page_url(page_url)?;
        let fetched = self.fetcher.fetch_page(page.as_str()).await?;

        if !fetched.is_success() {
            let reason = reqwest::StatusCode::from_u16(fetched.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("request failed");
            return Err(ResolutionError::upstream(
                page.as_str(),
                Some(fetched.status),
                reason,
            ));
        }

        let found = Self::scan(&fetched.body)
            .ok_or_else(|| ResolutionError::NoMediaFound(page.to_string()))?;

        let media_url = absolutize(&page, &found.media_ref)
            .ok_or_else(|| ResolutionError::NoMediaFound(page.to_string()))?;
        let thumbnail = found
            .poster
            .and_then(|p| absolutize(&page, &p))
            .unwrap_or_default();
        let title = found
            .title
            .or_else(|| file_name(&media_url))
            .unwrap_or_else(|| "video".to_string());
        let uploader = page.host_str().unwrap_or_default().to_string();

        tracing::info!(page = %page, media = %media_url, "Resolved media by scraping");
        Ok(MediaInfo::single_source(&media_url, &title, &uploader, &thumbnail))
    }
}

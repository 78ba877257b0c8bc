use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Url;
use reqwest::blocking::Client;
use tracing::debug;

use crate::config::ResolvedConfig;
use crate::domain::{ArchiveInstant, CatalogPage, ChunkDescriptor};
use crate::error::CaptureError;
use crate::http;

static EXTINF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#EXTINF:\s*([^,\s]+)").expect("EXTINF pattern compiles")
});

pub trait CatalogClient {
    /// Loads the index page starting at `page_start`.
    ///
    /// An empty page is `Ok`; a missing or unparsable one is `PageUnavailable`.
    fn fetch_page(&self, page_start: &ArchiveInstant) -> Result<CatalogPage, CaptureError>;
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    station: String,
    url_template: String,
}

impl CatalogHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, CaptureError> {
        let client = http::build_client(Duration::from_secs(config.timeout_secs))
            .map_err(CaptureError::CatalogHttp)?;
        Ok(Self {
            client,
            station: config.station.clone(),
            url_template: config.index_url_template.clone(),
        })
    }

    pub fn page_url(&self, page_start: &ArchiveInstant) -> String {
        page_url(&self.url_template, &self.station, page_start)
    }
}

impl CatalogClient for CatalogHttpClient {
    fn fetch_page(&self, page_start: &ArchiveInstant) -> Result<CatalogPage, CaptureError> {
        let url = self.page_url(page_start);
        let unavailable = |reason: String| CaptureError::PageUnavailable {
            page: page_start.page_id(),
            reason,
        };

        debug!(%url, "fetching catalog page");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| unavailable(err.to_string()))?;
        if !response.status().is_success() {
            return Err(unavailable(format!("status {}", response.status().as_u16())));
        }
        let body = response.text().map_err(|err| unavailable(err.to_string()))?;
        let base = Url::parse(&url).map_err(|err| unavailable(err.to_string()))?;
        let chunks = parse_playlist(&body, &base).map_err(unavailable)?;
        debug!(page = %page_start, chunks = chunks.len(), "parsed catalog page");

        Ok(CatalogPage {
            start: *page_start,
            chunks,
        })
    }
}

pub fn page_url(template: &str, station: &str, page_start: &ArchiveInstant) -> String {
    template
        .replace("{station}", station)
        .replace("{timestamp}", &page_start.page_id())
}

/// Extracts `(duration, uri)` entries from an HLS media playlist.
///
/// Relative URIs are resolved against `base`. A blank document yields no entries.
pub fn parse_playlist(body: &str, base: &Url) -> Result<Vec<ChunkDescriptor>, String> {
    let mut lines = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    match lines.next() {
        None => return Ok(Vec::new()),
        Some(first) if first.trim_start_matches('\u{feff}') == "#EXTM3U" => {}
        Some(_) => return Err("document is not an M3U playlist".to_string()),
    }

    let mut chunks = Vec::new();
    let mut pending: Option<f64> = None;
    for line in lines {
        if line.starts_with("#EXTINF") {
            if pending.is_some() {
                return Err("#EXTINF without segment URI".to_string());
            }
            let raw = EXTINF
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|value| value.as_str())
                .ok_or_else(|| format!("malformed tag: {line}"))?;
            let duration: f64 = raw
                .parse()
                .map_err(|_| format!("invalid segment duration: {raw}"))?;
            if !duration.is_finite() || duration < 0.0 {
                return Err(format!("invalid segment duration: {raw}"));
            }
            pending = Some(duration);
        } else if line.starts_with('#') {
            continue;
        } else {
            let duration = pending
                .take()
                .ok_or_else(|| format!("segment without #EXTINF: {line}"))?;
            let locator = base
                .join(line)
                .map_err(|err| format!("invalid segment URI {line}: {err}"))?;
            chunks.push(ChunkDescriptor::new(duration, locator.to_string()));
        }
    }

    if pending.is_some() {
        return Err("#EXTINF without segment URI".to_string());
    }
    Ok(chunks)
}

use tracing::{debug, warn};

use crate::catalog::CatalogClient;
use crate::domain::{ArchiveInstant, ResolvedWindow, Shortfall};
use crate::error::CaptureError;

pub const DEFAULT_PAGE_MINUTES: u32 = 30;

/// Walks catalog pages from a start instant until enough chunks cover the request.
pub struct WindowResolver<'a, C: CatalogClient> {
    catalog: &'a C,
    page_minutes: u32,
}

impl<'a, C: CatalogClient> WindowResolver<'a, C> {
    pub fn new(catalog: &'a C, page_minutes: u32) -> Self {
        Self {
            catalog,
            page_minutes,
        }
    }

    fn page_cap_secs(&self) -> f64 {
        f64::from(self.page_minutes) * 60.0
    }

    /// Collects whole chunks, page by page, until `required_secs` is reached.
    ///
    /// Consumption stops on the chunk that meets the requirement, so no page after the
    /// covering one is fetched. Each page contributes at most one page width of content.
    /// An empty page, an unavailable page, or a page that contributes nothing yields an
    /// unsatisfied window with no chunks.
    pub fn resolve(
        &self,
        start: &ArchiveInstant,
        required_secs: f64,
    ) -> Result<ResolvedWindow, CaptureError> {
        let mut cursor = *start;
        let mut accumulated = 0.0;
        let mut chunks = Vec::new();
        let mut pages_consulted = 0usize;
        let cap = self.page_cap_secs();

        let unsatisfied = |accumulated: f64, pages_consulted: usize, shortfall: Shortfall| {
            warn!(%shortfall, accumulated, required_secs, "window unsatisfied");
            ResolvedWindow {
                chunks: Vec::new(),
                accumulated_secs: accumulated,
                required_secs,
                pages_consulted,
                shortfall: Some(shortfall),
            }
        };

        while accumulated < required_secs {
            let page_id = cursor.page_id();
            pages_consulted += 1;
            let page = match self.catalog.fetch_page(&cursor) {
                Ok(page) => page,
                Err(CaptureError::PageUnavailable { page, reason }) => {
                    return Ok(unsatisfied(
                        accumulated,
                        pages_consulted,
                        Shortfall::PageUnavailable { page, reason },
                    ));
                }
                Err(err) => return Err(err),
            };

            if page.is_empty() {
                return Ok(unsatisfied(
                    accumulated,
                    pages_consulted,
                    Shortfall::EmptyPage { page: page_id },
                ));
            }

            let mut page_secs = 0.0;
            for chunk in page.chunks {
                if page_secs + chunk.duration > cap {
                    debug!(page = %page_id, page_secs, "page cap reached");
                    break;
                }
                page_secs += chunk.duration;
                accumulated += chunk.duration;
                chunks.push(chunk);
                if accumulated >= required_secs {
                    break;
                }
            }

            if page_secs == 0.0 {
                return Ok(unsatisfied(
                    accumulated,
                    pages_consulted,
                    Shortfall::NoContent { page: page_id },
                ));
            }

            debug!(
                page = %page_id,
                page_secs,
                remaining = (required_secs - accumulated).max(0.0),
                "consumed catalog page"
            );

            if accumulated >= required_secs {
                break;
            }
            cursor = cursor.advance(self.page_minutes);
        }

        Ok(ResolvedWindow {
            chunks,
            accumulated_secs: accumulated,
            required_secs,
            pages_consulted,
            shortfall: None,
        })
    }
}

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// Smallest alignment step of the archive catalog, in seconds.
pub const GRANULARITY_SECS: i64 = 5 * 60;

/// A UTC instant aligned to the catalog granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchiveInstant(DateTime<Utc>);

impl ArchiveInstant {
    pub fn new(value: DateTime<Utc>) -> Result<Self, CaptureError> {
        if value.timestamp() % GRANULARITY_SECS != 0 || value.nanosecond() != 0 {
            return Err(CaptureError::InvalidAlignment(value.to_rfc3339()));
        }
        Ok(Self(value))
    }

    /// Wraps a converted local start time whose wall-clock minute was already checked
    /// against the grid. Zones with offsets off the 5 minute grid (historical LMT) land
    /// off the UTC grid here.
    pub(crate) fn from_wall_clock(value: DateTime<Utc>) -> Self {
        Self(value)
    }

    /// Identifier used in catalog URLs and output names, e.g. `20211121T030000Z`.
    pub fn page_id(&self) -> String {
        self.0.format("%Y%m%dT%H%M%SZ").to_string()
    }

    pub fn advance(&self, minutes: u32) -> Self {
        Self(self.0 + TimeDelta::minutes(i64::from(minutes)))
    }
}

impl fmt::Display for ArchiveInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.page_id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hours(u32);

impl Hours {
    pub fn new(value: i64, max: u32) -> Result<Self, CaptureError> {
        if value < 1 || value > i64::from(max) {
            return Err(CaptureError::InvalidRange {
                requested: value,
                max,
            });
        }
        Ok(Self(value as u32))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn as_secs(&self) -> f64 {
        f64::from(self.0) * 3600.0
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkDescriptor {
    pub duration: f64,
    pub locator: String,
}

impl ChunkDescriptor {
    pub fn new(duration: f64, locator: impl Into<String>) -> Self {
        Self {
            duration,
            locator: locator.into(),
        }
    }

    /// Last path segment of the locator with any query or fragment removed.
    pub fn chunk_id(&self) -> &str {
        let path = self
            .locator
            .split(['?', '#'])
            .next()
            .unwrap_or(self.locator.as_str());
        path.trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub start: ArchiveInstant,
    pub chunks: Vec<ChunkDescriptor>,
}

impl CatalogPage {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Why a window could not be covered.
#[derive(Debug, Clone, PartialEq)]
pub enum Shortfall {
    EmptyPage { page: String },
    PageUnavailable { page: String, reason: String },
    NoContent { page: String },
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shortfall::EmptyPage { page } => write!(f, "no playlist data for page {page}"),
            Shortfall::PageUnavailable { page, reason } => {
                write!(f, "page {page} unavailable: {reason}")
            }
            Shortfall::NoContent { page } => write!(f, "page {page} has no usable content"),
        }
    }
}

/// Chunks selected to cover a requested window, in playback order.
///
/// An unsatisfied window never carries chunks; `accumulated_secs` still reports how much
/// content was found before resolution stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWindow {
    pub chunks: Vec<ChunkDescriptor>,
    pub accumulated_secs: f64,
    pub required_secs: f64,
    pub pages_consulted: usize,
    pub shortfall: Option<Shortfall>,
}

impl ResolvedWindow {
    pub fn satisfied(&self) -> bool {
        self.shortfall.is_none() && self.accumulated_secs >= self.required_secs
    }

    pub fn into_unsatisfied_error(self) -> CaptureError {
        let reason = self
            .shortfall
            .map(|shortfall| shortfall.to_string())
            .unwrap_or_else(|| "not enough content".to_string());
        CaptureError::WindowUnsatisfied {
            found_secs: self.accumulated_secs,
            required_secs: self.required_secs,
            reason,
        }
    }
}

/// A chunk whose bytes are on local disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkArtifact {
    pub position: usize,
    pub descriptor: ChunkDescriptor,
    pub path: PathBuf,
    pub cached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JoinStrategy {
    /// Raw byte concatenation.
    Concat,
    /// Lossless stream copy through ffmpeg's concat demuxer.
    Remux,
}

impl fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinStrategy::Concat => write!(f, "concat"),
            JoinStrategy::Remux => write!(f, "remux"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub start: ArchiveInstant,
    pub hours: Hours,
}

impl CaptureRequest {
    pub fn show_id(&self) -> String {
        self.start.page_id()
    }

    pub fn output_file_name(&self, station: &str, extension: &str) -> String {
        format!(
            "{}_{}_{}h.{}",
            station.to_lowercase(),
            self.show_id(),
            self.hours.get(),
            extension
        )
    }
}

pub fn chunk_file_name(station: &str, position: usize, chunk_id: &str, extension: &str) -> String {
    format!(
        "{}_{:05}_{}.tmp.{}",
        station.to_lowercase(),
        position,
        chunk_id,
        extension
    )
}

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::domain::{ChunkArtifact, ChunkDescriptor, chunk_file_name};
use crate::error::CaptureError;
use crate::http;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkFetchError {
    Status(u16),
    Transport(String),
    Filesystem(String),
}

pub trait ChunkSource {
    /// Writes the full body behind `locator` to `destination`.
    fn download(&self, locator: &str, destination: &Path) -> Result<(), ChunkFetchError>;
}

#[derive(Clone)]
pub struct ChunkHttpClient {
    client: Client,
}

impl ChunkHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, CaptureError> {
        let client = http::build_client(Duration::from_secs(config.timeout_secs))
            .map_err(CaptureError::DownloadHttp)?;
        Ok(Self { client })
    }
}

impl ChunkSource for ChunkHttpClient {
    fn download(&self, locator: &str, destination: &Path) -> Result<(), ChunkFetchError> {
        let mut response = self
            .client
            .get(locator)
            .send()
            .map_err(|err| ChunkFetchError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ChunkFetchError::Status(response.status().as_u16()));
        }
        let mut file = File::create(destination)
            .map_err(|err| ChunkFetchError::Filesystem(err.to_string()))?;
        response
            .copy_to(&mut file)
            .map_err(|err| ChunkFetchError::Transport(err.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub artifacts: Vec<ChunkArtifact>,
    pub fetched: usize,
    pub cached: usize,
}

/// Downloads chunks in order into a working directory, reusing files left by earlier runs.
pub struct ChunkDownloader<'a, S: ChunkSource> {
    source: &'a S,
    workdir: PathBuf,
    station: String,
    extension: String,
}

impl<'a, S: ChunkSource> ChunkDownloader<'a, S> {
    pub fn new(
        source: &'a S,
        workdir: impl Into<PathBuf>,
        station: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            source,
            workdir: workdir.into(),
            station: station.into(),
            extension: extension.into(),
        }
    }

    /// Local file for the chunk at 1-based `position`.
    pub fn artifact_path(&self, position: usize, chunk: &ChunkDescriptor) -> PathBuf {
        self.workdir.join(chunk_file_name(
            &self.station,
            position,
            chunk.chunk_id(),
            &self.extension,
        ))
    }

    /// Stops at the first failed chunk. Files written before the failure stay on disk so a
    /// later run picks them up as cache hits.
    pub fn download_all(
        &self,
        chunks: &[ChunkDescriptor],
        mut on_chunk: impl FnMut(&ChunkArtifact, usize),
    ) -> Result<DownloadOutcome, CaptureError> {
        std::fs::create_dir_all(&self.workdir)
            .map_err(|err| CaptureError::Filesystem(err.to_string()))?;

        let total = chunks.len();
        let mut artifacts = Vec::with_capacity(total);
        let mut fetched = 0usize;
        let mut cached = 0usize;

        for (index, chunk) in chunks.iter().enumerate() {
            let position = index + 1;
            let path = self.artifact_path(position, chunk);

            let hit = path.is_file();
            if hit {
                debug!(position, path = %path.display(), "chunk cache hit");
                cached += 1;
            } else {
                debug!(position, locator = %chunk.locator, "fetching chunk");
                self.fetch_one(position, chunk, &path)?;
                fetched += 1;
            }

            let artifact = ChunkArtifact {
                position,
                descriptor: chunk.clone(),
                path,
                cached: hit,
            };
            on_chunk(&artifact, total);
            artifacts.push(artifact);
        }

        info!(total, fetched, cached, "chunks ready");
        Ok(DownloadOutcome {
            artifacts,
            fetched,
            cached,
        })
    }

    fn fetch_one(
        &self,
        position: usize,
        chunk: &ChunkDescriptor,
        path: &Path,
    ) -> Result<(), CaptureError> {
        let temp = tempfile::Builder::new()
            .prefix(".spinget-chunk")
            .tempfile_in(&self.workdir)
            .map_err(|err| CaptureError::Filesystem(err.to_string()))?;

        self.source
            .download(&chunk.locator, temp.path())
            .map_err(|err| match err {
                ChunkFetchError::Status(status) => CaptureError::DownloadStatus {
                    position,
                    locator: chunk.locator.clone(),
                    status,
                },
                ChunkFetchError::Transport(message) => {
                    CaptureError::DownloadHttp(format!("chunk {position}: {message}"))
                }
                ChunkFetchError::Filesystem(message) => CaptureError::Filesystem(message),
            })?;

        temp.persist(path)
            .map_err(|err| CaptureError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

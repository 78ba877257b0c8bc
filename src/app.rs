use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::assemble::{Assembler, Remuxer};
use crate::catalog::CatalogClient;
use crate::config::ResolvedConfig;
use crate::domain::{CaptureRequest, JoinStrategy, ResolvedWindow};
use crate::download::{ChunkDownloader, ChunkSource};
use crate::error::CaptureError;
use crate::resolver::WindowResolver;

#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    pub keep_intermediates: bool,
    pub strategy: Option<JoinStrategy>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureResult {
    pub station: String,
    pub show_id: String,
    pub hours: u32,
    pub output_path: String,
    pub chunks: usize,
    pub downloaded: usize,
    pub cached: usize,
    pub accumulated_secs: f64,
    pub strategy: String,
    pub intermediates_kept: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub station: String,
    pub show_id: String,
    pub hours: u32,
    pub required_secs: f64,
    pub accumulated_secs: f64,
    pub pages_consulted: usize,
    pub satisfied: bool,
    pub shortfall: Option<String>,
    pub output_path: String,
    pub chunks: Vec<PlanChunk>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanChunk {
    pub position: usize,
    pub duration: f64,
    pub locator: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn emit(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: None,
    });
}

/// Capture pipeline: resolve, download, assemble.
pub struct App<C: CatalogClient, S: ChunkSource, R: Remuxer> {
    config: ResolvedConfig,
    catalog: C,
    source: S,
    remuxer: R,
}

impl<C: CatalogClient, S: ChunkSource, R: Remuxer> App<C, S, R> {
    pub fn new(config: ResolvedConfig, catalog: C, source: S, remuxer: R) -> Self {
        Self {
            config,
            catalog,
            source,
            remuxer,
        }
    }

    pub fn output_path(&self, request: &CaptureRequest) -> PathBuf {
        self.config.workdir.join(
            request.output_file_name(&self.config.station, &self.config.output_extension),
        )
    }

    pub fn resolve(
        &self,
        request: &CaptureRequest,
        sink: &dyn ProgressSink,
    ) -> Result<ResolvedWindow, CaptureError> {
        emit(
            sink,
            format!(
                "phase=Resolve; show start {} ({})",
                request.show_id(),
                request.hours
            ),
        );
        let start = Instant::now();
        let resolver = WindowResolver::new(&self.catalog, self.config.page_minutes);
        let window = resolver.resolve(&request.start, request.hours.as_secs())?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; {} chunks, {}s of {}s from {} pages",
                window.chunks.len(),
                window.accumulated_secs,
                window.required_secs,
                window.pages_consulted
            ),
            elapsed: Some(start.elapsed()),
        });
        Ok(window)
    }

    /// Resolution only; nothing is downloaded or written.
    pub fn plan(
        &self,
        request: &CaptureRequest,
        sink: &dyn ProgressSink,
    ) -> Result<PlanResult, CaptureError> {
        let window = self.resolve(request, sink)?;
        Ok(PlanResult {
            station: self.config.station.clone(),
            show_id: request.show_id(),
            hours: request.hours.get(),
            required_secs: window.required_secs,
            accumulated_secs: window.accumulated_secs,
            pages_consulted: window.pages_consulted,
            satisfied: window.satisfied(),
            shortfall: window.shortfall.as_ref().map(|shortfall| shortfall.to_string()),
            output_path: self.output_path(request).display().to_string(),
            chunks: window
                .chunks
                .iter()
                .enumerate()
                .map(|(index, chunk)| PlanChunk {
                    position: index + 1,
                    duration: chunk.duration,
                    locator: chunk.locator.clone(),
                })
                .collect(),
        })
    }

    pub fn capture(
        &self,
        request: &CaptureRequest,
        options: &CaptureOptions,
        sink: &dyn ProgressSink,
    ) -> Result<CaptureResult, CaptureError> {
        let window = self.resolve(request, sink)?;
        if !window.satisfied() || window.chunks.is_empty() {
            return Err(window.into_unsatisfied_error());
        }

        emit(
            sink,
            format!("phase=Download; {} chunks", window.chunks.len()),
        );
        let started = Instant::now();
        let downloader = ChunkDownloader::new(
            &self.source,
            &self.config.workdir,
            &self.config.station,
            &self.config.output_extension,
        );
        let outcome = downloader.download_all(&window.chunks, |artifact, total| {
            let action = if artifact.cached { "cached" } else { "fetched" };
            emit(
                sink,
                format!(
                    "phase=Download; chunk {}/{} {action} {}",
                    artifact.position, total, artifact.descriptor.locator
                ),
            );
        })?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Download; {} fetched, {} cached",
                outcome.fetched, outcome.cached
            ),
            elapsed: Some(started.elapsed()),
        });

        let strategy = options.strategy.unwrap_or(self.config.strategy);
        let output = self.output_path(request);
        emit(
            sink,
            format!(
                "phase=Assemble; {} chunks into {} ({strategy})",
                outcome.artifacts.len(),
                output.display()
            ),
        );
        let chunks = outcome.artifacts.len();
        let assembler = Assembler::new(strategy, &self.remuxer);
        assembler.join(outcome.artifacts, &output, !options.keep_intermediates)?;
        info!(output = %output.display(), chunks, "capture complete");

        Ok(CaptureResult {
            station: self.config.station.clone(),
            show_id: request.show_id(),
            hours: request.hours.get(),
            output_path: output.display().to_string(),
            chunks,
            downloaded: outcome.fetched,
            cached: outcome.cached,
            accumulated_secs: window.accumulated_secs,
            strategy: strategy.to_string(),
            intermediates_kept: options.keep_intermediates,
        })
    }
}

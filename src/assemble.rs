use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::domain::{ChunkArtifact, JoinStrategy};
use crate::error::CaptureError;

pub trait Remuxer {
    /// Stream-copies the inputs listed in an ffconcat `manifest` into `output`.
    fn remux(&self, manifest: &Path, output: &Path) -> Result<(), CaptureError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    ffmpeg: Option<PathBuf>,
}

impl FfmpegRemuxer {
    pub fn new() -> Self {
        Self {
            ffmpeg: find_in_path("ffmpeg"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: Some(program.into()),
        }
    }
}

impl Default for FfmpegRemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Remuxer for FfmpegRemuxer {
    fn remux(&self, manifest: &Path, output: &Path) -> Result<(), CaptureError> {
        let ffmpeg = self
            .ffmpeg
            .as_ref()
            .ok_or_else(|| CaptureError::MissingTool("ffmpeg".to_string()))?;
        let args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            manifest.to_string_lossy().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ];
        let result = Command::new(ffmpeg)
            .args(&args)
            .output()
            .map_err(|err| CaptureError::Assemble(format!("{}: {err}", ffmpeg.display())))?;
        if result.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {} ({})", ffmpeg.display(), result.status)
        } else {
            stderr
        };
        Err(CaptureError::Assemble(message))
    }
}

/// Joins downloaded chunks into the final output file.
pub struct Assembler<'a, R: Remuxer> {
    strategy: JoinStrategy,
    remuxer: &'a R,
}

impl<'a, R: Remuxer> Assembler<'a, R> {
    pub fn new(strategy: JoinStrategy, remuxer: &'a R) -> Self {
        Self { strategy, remuxer }
    }

    /// Takes ownership of the artifacts. On failure every input stays on disk.
    pub fn join(
        &self,
        artifacts: Vec<ChunkArtifact>,
        output: &Path,
        cleanup: bool,
    ) -> Result<(), CaptureError> {
        if artifacts.is_empty() {
            return Err(CaptureError::Assemble("no chunks to join".to_string()));
        }

        if let [single] = artifacts.as_slice() {
            debug!(path = %single.path.display(), "single chunk, moving into place");
            if cleanup {
                fs::rename(&single.path, output)
                    .map_err(|err| CaptureError::Assemble(err.to_string()))?;
            } else {
                fs::copy(&single.path, output)
                    .map_err(|err| CaptureError::Assemble(err.to_string()))?;
            }
            return Ok(());
        }

        info!(chunks = artifacts.len(), strategy = %self.strategy, "joining chunks");
        let manifest = match self.strategy {
            JoinStrategy::Concat => {
                concat_files(&artifacts, output)?;
                None
            }
            JoinStrategy::Remux => {
                let manifest = manifest_path(output);
                write_manifest(&artifacts, &manifest)?;
                // The staged path is deleted on drop, so a failed remux leaves nothing
                // under the output name.
                let staged = staging_file(output, ".spinget-remux")?.into_temp_path();
                if let Err(err) = self.remuxer.remux(&manifest, &staged) {
                    warn!(manifest = %manifest.display(), "remux failed, keeping intermediates");
                    return Err(err);
                }
                staged
                    .persist(output)
                    .map_err(|err| CaptureError::Assemble(err.to_string()))?;
                Some(manifest)
            }
        };

        if cleanup {
            for artifact in &artifacts {
                remove_intermediate(&artifact.path);
            }
            if let Some(manifest) = manifest {
                remove_intermediate(&manifest);
            }
        }
        Ok(())
    }
}

/// The output is already complete here, so a leftover file is only worth a warning.
fn remove_intermediate(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "failed to remove intermediate file");
    }
}

/// ffconcat list written next to `output` for the remux strategy.
pub fn manifest_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{stem}.concat.txt"))
}

/// Temp file next to `output` carrying the same extension, so ffmpeg still picks the
/// muxer from the name.
fn staging_file(output: &Path, prefix: &str) -> Result<NamedTempFile, CaptureError> {
    let parent = output
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let suffix = output
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(prefix)
        .suffix(&suffix)
        .tempfile_in(parent)
        .map_err(|err| CaptureError::Filesystem(err.to_string()))
}

fn concat_files(artifacts: &[ChunkArtifact], output: &Path) -> Result<(), CaptureError> {
    let temp = staging_file(output, ".spinget-join")?;

    {
        let mut writer = BufWriter::new(temp.as_file());
        for artifact in artifacts {
            let file = File::open(&artifact.path).map_err(|err| {
                CaptureError::Assemble(format!("open {}: {err}", artifact.path.display()))
            })?;
            io::copy(&mut BufReader::new(file), &mut writer)
                .map_err(|err| CaptureError::Assemble(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| CaptureError::Assemble(err.to_string()))?;
    }

    temp.persist(output)
        .map_err(|err| CaptureError::Assemble(err.to_string()))?;
    Ok(())
}

fn write_manifest(artifacts: &[ChunkArtifact], manifest: &Path) -> Result<(), CaptureError> {
    let mut content = String::from("ffconcat version 1.0\n");
    for artifact in artifacts {
        let path = fs::canonicalize(&artifact.path)
            .map_err(|err| CaptureError::Filesystem(err.to_string()))?;
        let escaped = path.to_string_lossy().replace('\'', r"'\''");
        content.push_str(&format!("file '{escaped}'\n"));
    }
    fs::write(manifest, content).map_err(|err| CaptureError::Filesystem(err.to_string()))
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

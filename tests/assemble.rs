use std::path::{Path, PathBuf};
use std::sync::Mutex;

use assert_matches::assert_matches;

use spinget::assemble::{Assembler, FfmpegRemuxer, Remuxer, manifest_path};
use spinget::domain::{ChunkArtifact, ChunkDescriptor, JoinStrategy};
use spinget::error::CaptureError;

#[derive(Default)]
struct RecordingRemuxer {
    manifests: Mutex<Vec<String>>,
    fail: bool,
}

impl Remuxer for RecordingRemuxer {
    fn remux(&self, manifest: &Path, output: &Path) -> Result<(), CaptureError> {
        let content = std::fs::read_to_string(manifest).unwrap();
        self.manifests.lock().unwrap().push(content);
        if self.fail {
            return Err(CaptureError::Assemble(
                "Invalid data found when processing input".to_string(),
            ));
        }
        std::fs::write(output, b"remuxed").unwrap();
        Ok(())
    }
}

fn artifacts(dir: &Path, parts: &[&str]) -> Vec<ChunkArtifact> {
    parts
        .iter()
        .enumerate()
        .map(|(index, bytes)| {
            let path = dir.join(format!("wxox_{:05}_c{index}.tmp.mpeg", index + 1));
            std::fs::write(&path, bytes.as_bytes()).unwrap();
            ChunkArtifact {
                position: index + 1,
                descriptor: ChunkDescriptor::new(300.0, format!("https://ark.test/c{index}")),
                path,
                cached: false,
            }
        })
        .collect()
}

fn paths(items: &[ChunkArtifact]) -> Vec<PathBuf> {
    items.iter().map(|artifact| artifact.path.clone()).collect()
}

#[test]
fn concat_joins_bytes_in_order_and_cleans_up() {
    let temp = tempfile::tempdir().unwrap();
    let inputs = artifacts(temp.path(), &["one-", "two-", "three"]);
    let inputs_paths = paths(&inputs);
    let output = temp.path().join("show.mpeg");
    let remuxer = RecordingRemuxer::default();

    Assembler::new(JoinStrategy::Concat, &remuxer)
        .join(inputs, &output, true)
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"one-two-three");
    assert!(inputs_paths.iter().all(|path| !path.exists()));
    assert!(remuxer.manifests.lock().unwrap().is_empty());
}

#[test]
fn keep_intermediates_leaves_inputs() {
    let temp = tempfile::tempdir().unwrap();
    let inputs = artifacts(temp.path(), &["a", "b"]);
    let inputs_paths = paths(&inputs);
    let output = temp.path().join("show.mpeg");
    let remuxer = RecordingRemuxer::default();

    Assembler::new(JoinStrategy::Concat, &remuxer)
        .join(inputs, &output, false)
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"ab");
    assert!(inputs_paths.iter().all(|path| path.exists()));
}

#[test]
fn single_artifact_output_is_byte_identical() {
    let temp = tempfile::tempdir().unwrap();
    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let mut inputs = artifacts(temp.path(), &[""]);
    std::fs::write(&inputs[0].path, &payload).unwrap();
    inputs[0].cached = true;
    let output = temp.path().join("show.mpeg");
    let remuxer = RecordingRemuxer::default();

    Assembler::new(JoinStrategy::Remux, &remuxer)
        .join(inputs, &output, true)
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), payload);
    assert!(remuxer.manifests.lock().unwrap().is_empty());
}

#[test]
fn remux_writes_ordered_manifest_and_removes_it() {
    let temp = tempfile::tempdir().unwrap();
    let inputs = artifacts(temp.path(), &["a", "b", "c"]);
    let inputs_paths = paths(&inputs);
    let output = temp.path().join("show.mpeg");
    let remuxer = RecordingRemuxer::default();

    Assembler::new(JoinStrategy::Remux, &remuxer)
        .join(inputs, &output, true)
        .unwrap();

    let manifests = remuxer.manifests.lock().unwrap();
    let lines: Vec<&str> = manifests[0].lines().collect();
    assert_eq!(lines[0], "ffconcat version 1.0");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].contains("_00001_c0.tmp.mpeg"));
    assert!(lines[3].contains("_00003_c2.tmp.mpeg"));
    assert!(!manifest_path(&output).exists());
    assert!(inputs_paths.iter().all(|path| !path.exists()));
    assert_eq!(std::fs::read(&output).unwrap(), b"remuxed");
}

#[test]
fn remux_failure_preserves_intermediates() {
    let temp = tempfile::tempdir().unwrap();
    let inputs = artifacts(temp.path(), &["a", "b"]);
    let inputs_paths = paths(&inputs);
    let output = temp.path().join("show.mpeg");
    let remuxer = RecordingRemuxer {
        fail: true,
        ..Default::default()
    };

    let err = Assembler::new(JoinStrategy::Remux, &remuxer)
        .join(inputs, &output, true)
        .unwrap_err();

    assert_matches!(err, CaptureError::Assemble(message) if message.contains("Invalid data"));
    assert!(inputs_paths.iter().all(|path| path.exists()));
    assert!(manifest_path(&output).exists());
    assert!(!output.exists());
}

#[test]
fn empty_input_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let remuxer = RecordingRemuxer::default();

    let err = Assembler::new(JoinStrategy::Concat, &remuxer)
        .join(Vec::new(), &temp.path().join("show.mpeg"), true)
        .unwrap_err();

    assert_matches!(err, CaptureError::Assemble(_));
}

#[test]
fn missing_ffmpeg_binary_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let inputs = artifacts(temp.path(), &["a", "b"]);
    let remuxer = FfmpegRemuxer::with_program(temp.path().join("no-such-ffmpeg"));

    let err = Assembler::new(JoinStrategy::Remux, &remuxer)
        .join(inputs, &temp.path().join("show.mpeg"), true)
        .unwrap_err();

    assert_matches!(err, CaptureError::Assemble(_));
}

#[cfg(unix)]
fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-ffmpeg");
    std::fs::write(&script, format!("#!/bin/sh\nfor last; do :; done\n{body}\n")).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

#[cfg(unix)]
fn staged_leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with(".spinget-"))
        .collect()
}

#[cfg(unix)]
#[test]
fn failed_ffmpeg_run_leaves_no_output() {
    let temp = tempfile::tempdir().unwrap();
    let inputs = artifacts(temp.path(), &["a", "b"]);
    let inputs_paths = paths(&inputs);
    let output = temp.path().join("show.mpeg");
    let script = fake_ffmpeg(
        temp.path(),
        "printf partial > \"$last\"\necho 'Invalid data found when processing input' >&2\nexit 1",
    );
    let remuxer = FfmpegRemuxer::with_program(script);

    let err = Assembler::new(JoinStrategy::Remux, &remuxer)
        .join(inputs, &output, true)
        .unwrap_err();

    assert_matches!(err, CaptureError::Assemble(message) if message.contains("Invalid data"));
    assert!(!output.exists());
    assert!(staged_leftovers(temp.path()).is_empty());
    assert!(inputs_paths.iter().all(|path| path.exists()));
    assert!(manifest_path(&output).exists());
}

#[cfg(unix)]
#[test]
fn ffmpeg_writes_to_staged_file_with_output_extension() {
    let temp = tempfile::tempdir().unwrap();
    let inputs = artifacts(temp.path(), &["a", "b"]);
    let output = temp.path().join("show.mpeg");
    let script = fake_ffmpeg(
        temp.path(),
        "case \"$last\" in *.mpeg) ;; *) exit 2 ;; esac\nprintf joined > \"$last\"",
    );
    let remuxer = FfmpegRemuxer::with_program(script);

    Assembler::new(JoinStrategy::Remux, &remuxer)
        .join(inputs, &output, true)
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"joined");
    assert!(staged_leftovers(temp.path()).is_empty());
    assert!(!manifest_path(&output).exists());
}

#[test]
fn cleanup_failure_keeps_completed_output() {
    let temp = tempfile::tempdir().unwrap();
    let mut inputs = artifacts(temp.path(), &["a", "b"]);
    let stubborn = temp.path().join("wxox_00002_dir.tmp.mpeg");
    std::fs::create_dir(&stubborn).unwrap();
    std::fs::remove_file(&inputs[1].path).unwrap();
    inputs[1].path = stubborn.clone();
    let first = inputs[0].path.clone();
    let output = temp.path().join("show.mpeg");
    let remuxer = RecordingRemuxer::default();

    Assembler::new(JoinStrategy::Remux, &remuxer)
        .join(inputs, &output, true)
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"remuxed");
    assert!(!first.exists());
    assert!(stubborn.is_dir());
}

use std::io::{self, Write};

use serde::Serialize;

use crate::app::{CaptureResult, PlanResult, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_capture(result: &CaptureResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_plan(result: &PlanResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Prints progress lines to stderr so stdout stays clean for results.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({} ms)", event.message, elapsed.as_millis()),
            None => eprintln!("{}", event.message),
        }
    }
}

pub fn print_capture_summary(result: &CaptureResult) {
    println!("show {} ({}h) saved to {}", result.show_id, result.hours, result.output_path);
    println!(
        "  {} chunks, {} downloaded, {} from cache, {}s of audio",
        result.chunks, result.downloaded, result.cached, result.accumulated_secs
    );
    if result.intermediates_kept {
        println!("  chunk files kept in working directory");
    }
}

pub fn print_plan_summary(result: &PlanResult) {
    println!(
        "show {} ({}h): {}s of {}s across {} pages",
        result.show_id,
        result.hours,
        result.accumulated_secs,
        result.required_secs,
        result.pages_consulted
    );
    if let Some(shortfall) = &result.shortfall {
        println!("  unsatisfied: {shortfall}");
        return;
    }
    for chunk in &result.chunks {
        println!("  {:>4}  {:>7.3}s  {}", chunk.position, chunk.duration, chunk.locator);
    }
    println!("  output would be {}", result.output_path);
}

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use spinget::app::{App, CaptureOptions};
use spinget::assemble::FfmpegRemuxer;
use spinget::catalog::CatalogHttpClient;
use spinget::config::{ConfigLoader, ResolvedConfig};
use spinget::domain::{CaptureRequest, Hours, JoinStrategy};
use spinget::download::ChunkHttpClient;
use spinget::error::CaptureError;
use spinget::output::{self, ConsoleOutput, JsonOutput, OutputMode};
use spinget::timestamp;

#[derive(Parser)]
#[command(name = "spinget")]
#[command(about = "Capture a show from a radio station's archived stream into one audio file")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download a show and join it into one file")]
    Run(RunArgs),
    #[command(about = "Resolve the chunks covering a show without downloading")]
    Plan(ShowArgs),
}

#[derive(Args, Clone)]
struct ShowArgs {
    #[arg(value_name = "MM/DD/YYYY", help = "Show date (local time)")]
    date: String,

    #[arg(value_name = "HH:MM", help = "Start time, on a 5 minute boundary")]
    time: String,

    #[arg(value_name = "HOURS", allow_negative_numbers = true, help = "Length of the show in hours")]
    hours: i64,

    #[arg(long)]
    config: Option<String>,

    #[arg(long, help = "Directory for chunk files and the output")]
    workdir: Option<PathBuf>,

    #[arg(long, help = "Print the result as JSON on stdout")]
    json: bool,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[command(flatten)]
    show: ShowArgs,

    #[arg(long, help = "Leave downloaded chunk files in place after joining")]
    keep_intermediates: bool,

    #[arg(long)]
    strategy: Option<JoinStrategy>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CaptureError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CaptureError) -> u8 {
    match error {
        CaptureError::InvalidTimestamp(_)
        | CaptureError::InvalidAlignment(_)
        | CaptureError::InvalidRange { .. }
        | CaptureError::ConfigRead(_)
        | CaptureError::ConfigParse(_)
        | CaptureError::ConfigInvalid(_) => 2,
        CaptureError::CatalogHttp(_)
        | CaptureError::PageUnavailable { .. }
        | CaptureError::WindowUnsatisfied { .. }
        | CaptureError::DownloadStatus { .. }
        | CaptureError::DownloadHttp(_) => 3,
        CaptureError::Assemble(_) | CaptureError::MissingTool(_) => 4,
        CaptureError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_capture(args),
        Commands::Plan(args) => run_plan(args),
    }
}

/// Validates everything that can fail before the first network request.
fn prepare(args: &ShowArgs) -> Result<(ResolvedConfig, CaptureRequest), CaptureError> {
    let mut config = ConfigLoader::resolve(args.config.as_deref())?;
    if let Some(workdir) = &args.workdir {
        config.workdir = workdir.clone();
    }
    let hours = Hours::new(args.hours, config.max_hours)?;
    let start = timestamp::normalize(&args.date, &args.time)?;
    Ok((config, CaptureRequest { start, hours }))
}

fn output_mode(args: &ShowArgs) -> OutputMode {
    if args.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    }
}

fn run_capture(args: RunArgs) -> miette::Result<()> {
    let (config, request) = prepare(&args.show)?;
    tracing::info!(show = %request.show_id(), hours = request.hours.get(), "show start");

    let catalog = CatalogHttpClient::new(&config)?;
    let source = ChunkHttpClient::new(&config)?;
    let app = App::new(config, catalog, source, FfmpegRemuxer::new());
    let options = CaptureOptions {
        keep_intermediates: args.keep_intermediates,
        strategy: args.strategy,
    };

    match output_mode(&args.show) {
        OutputMode::Json => {
            let result = app.capture(&request, &options, &JsonOutput)?;
            JsonOutput::print_capture(&result).into_diagnostic()?;
        }
        OutputMode::Human => {
            let result = app.capture(&request, &options, &ConsoleOutput)?;
            output::print_capture_summary(&result);
        }
    }
    Ok(())
}

fn run_plan(args: ShowArgs) -> miette::Result<()> {
    let (config, request) = prepare(&args)?;
    let catalog = CatalogHttpClient::new(&config)?;
    let source = ChunkHttpClient::new(&config)?;
    let app = App::new(config, catalog, source, FfmpegRemuxer::new());

    match output_mode(&args) {
        OutputMode::Json => {
            let result = app.plan(&request, &JsonOutput)?;
            JsonOutput::print_plan(&result).into_diagnostic()?;
        }
        OutputMode::Human => {
            let result = app.plan(&request, &ConsoleOutput)?;
            output::print_plan_summary(&result);
        }
    }
    Ok(())
}

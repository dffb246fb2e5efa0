//! Main entry point for the ryt-resolver CLI

use anyhow::{Context, Result};
use clap::Parser;
use ryt_resolver::cli::args::VerbosityLevel;
use ryt_resolver::cli::output::{details_json, unplayable_summary};
use ryt_resolver::cli::{Args, OutputFormatter};
use ryt_resolver::core::{MediaStream, Progress, Resolver, VideoDetails};
use ryt_resolver::platform::all_streams;
use ryt_resolver::utils::output_filename;
use ryt_resolver::ResolveError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let mut formatter = OutputFormatter::new(args.verbosity_level());

    match run(&args, &mut formatter).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            formatter.error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args, formatter: &mut OutputFormatter) -> Result<()> {
    init_logging(args.verbosity_level())?;

    debug!("Starting ryt-resolver with args: {:?}", args);

    let resolver = Resolver::with_options(args.resolver_options())
        .context("failed to set up HTTP transport")?;

    let details = resolver
        .resolve(&args.url)
        .await
        .with_context(|| format!("failed to resolve {}", args.url))?;

    if args.json {
        println!("{}", details_json(&details)?);
        return Ok(());
    }

    if let Some(message) = unplayable_summary(&details) {
        formatter.warning(&message);
    }

    if args.list {
        formatter.print_video_info(&details);
        formatter.print_stream_table(&details);
        return Ok(());
    }

    let stream = pick_stream(&resolver, &details, args)?;
    info!("Selected itag {} ({})", stream.itag, stream.quality_string());

    if args.print_url {
        println!("{}", stream.url);
        return Ok(());
    }

    formatter.print_video_info(&details);
    formatter.print_selection(stream);
    download(&resolver, &details, stream, args, formatter).await
}

/// Pick by itag when given, otherwise by the selection flags
fn pick_stream<'a>(
    resolver: &Resolver,
    details: &'a VideoDetails,
    args: &Args,
) -> Result<&'a MediaStream> {
    match args.itag {
        Some(itag) => all_streams(details, true)
            .into_iter()
            .find(|s| s.itag == itag && s.is_playable())
            .ok_or(ResolveError::NoStreamFound)
            .with_context(|| format!("no playable stream with itag {}", itag)),
        None => Ok(resolver.choose(details, &args.criteria())?),
    }
}

async fn download(
    resolver: &Resolver,
    details: &VideoDetails,
    stream: &MediaStream,
    args: &Args,
    formatter: &mut OutputFormatter,
) -> Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(output_filename(&details.title, stream)));
    let output_display = output.display().to_string();
    formatter.print_download_start(&output_display);

    let total = stream.content_length.unwrap_or(0);
    if !args.no_progress {
        formatter.create_progress_bar(total);
    }

    let display: &OutputFormatter = formatter;
    let start_time = Instant::now();
    let mut progress = Progress::new(total);
    let mut on_progress = |downloaded: u64, total: u64| {
        progress.update(downloaded, total);
        display.update_progress(&progress);
    };

    let written = resolver
        .download(stream, &output, &mut on_progress)
        .await
        .with_context(|| format!("download to {} failed", output_display))?;

    display.finish_progress("Download completed!");
    display.print_download_complete(&output_display, written, start_time.elapsed());
    Ok(())
}

/// Initialize logging system
fn init_logging(verbosity: VerbosityLevel) -> Result<()> {
    let default_level = match verbosity {
        VerbosityLevel::Quiet => "error",
        VerbosityLevel::Normal => "info",
        VerbosityLevel::Verbose => "debug",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(())
}

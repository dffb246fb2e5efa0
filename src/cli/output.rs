//! Output formatting and progress display

use crate::cli::args::VerbosityLevel;
use crate::core::progress::{format_bytes, format_length, Progress};
use crate::core::video_info::{MediaStream, VideoDetails};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}";

/// Output formatter for ryt-resolver
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
    progress_bar: Option<ProgressBar>,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: None,
        }
    }

    /// Create a progress bar for downloads
    pub fn create_progress_bar(&mut self, total_size: u64) -> Option<ProgressBar> {
        if self.verbosity == VerbosityLevel::Quiet {
            return None;
        }

        let style = ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        let progress_bar = ProgressBar::new(total_size);
        progress_bar.set_style(style);
        progress_bar.set_message("Downloading...");

        self.progress_bar = Some(progress_bar.clone());
        Some(progress_bar)
    }

    /// Update progress bar
    pub fn update_progress(&self, progress: &Progress) {
        if let Some(progress_bar) = &self.progress_bar {
            if progress.total_size > 0 {
                progress_bar.set_length(progress.total_size);
            }
            progress_bar.set_position(progress.downloaded_size);

            if progress.speed.is_some() {
                progress_bar.set_message(progress.speed_string());
            }
        }
    }

    /// Finish progress bar
    pub fn finish_progress(&self, message: &str) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.finish_with_message(message.to_string());
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{} {}", "done:".green().bold(), message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    /// Print video information
    pub fn print_video_info(&self, details: &VideoDetails) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        println!("{}", details.title.bold());
        println!("  {} {}", "author:".dimmed(), details.author);
        println!("  {} {}", "length:".dimmed(), format_length(details.length_seconds));
        println!(
            "  {} {} ({} playable)",
            "streams:".dimmed(),
            details.stream_count(),
            details.playable_count()
        );
        println!();
    }

    /// Print the muxed section, then the adaptive section
    pub fn print_stream_table(&self, details: &VideoDetails) {
        print_section("Muxed", &details.formats);
        print_section("Adaptive", &details.adaptive_formats);
    }

    /// Print one chosen stream
    pub fn print_selection(&self, stream: &MediaStream) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }
        println!("{} {}", "selected:".cyan().bold(), format_row(stream));
    }

    /// Print download start message
    pub fn print_download_start(&self, output_path: &str) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }
        println!("{} {}", "output:".dimmed(), output_path);
    }

    /// Print download complete message
    pub fn print_download_complete(&self, output_path: &str, bytes: u64, duration: Duration) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }
        self.success(&format!(
            "{} written to {} in {}",
            format_bytes(bytes),
            output_path,
            humantime::format_duration(Duration::from_secs(duration.as_secs()))
        ));
    }
}

fn print_section(name: &str, streams: &[MediaStream]) {
    println!("{} ({})", name.bold().underline(), streams.len());
    if streams.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for stream in streams {
        let row = format_row(stream);
        if stream.is_playable() {
            println!("  {}", row);
        } else {
            println!("  {} {}", row.dimmed(), "(no url)".red());
        }
    }
    println!();
}

/// One listing row: itag, quality, kind, codec, bitrate, size
pub fn format_row(stream: &MediaStream) -> String {
    format!(
        "{:>4}  {:<14} {:<14} {:<6} {:>10}  {:>10}",
        stream.itag,
        stream.quality_string(),
        stream.kind_string(),
        stream.short_codec(),
        stream.bitrate_string(),
        stream.size_string()
    )
}

/// Warning text when some streams were left without a URL
pub fn unplayable_summary(details: &VideoDetails) -> Option<String> {
    let missing = details.stream_count() - details.playable_count();
    (missing > 0).then(|| {
        format!(
            "{} of {} streams have no URL (signature could not be recovered)",
            missing,
            details.stream_count()
        )
    })
}

/// Render details as pretty JSON
pub fn details_json(details: &VideoDetails) -> serde_json::Result<String> {
    serde_json::to_string_pretty(details)
}

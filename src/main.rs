//! CLI entry point for mediadl.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use mediadl_core::{DownloadEngine, DownloadProgress, RunSummary, final_album_path};
use reqwest::header::HeaderMap;
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::{Settings, load_file_config};
use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    init_tracing(default_log_level(args.quiet, args.verbose));
    debug!(?args, "CLI arguments parsed");

    let file_config = load_file_config(args.config.as_deref())?;
    let settings = Settings::resolve(&args, file_config.as_ref());
    debug!(?settings, "resolved settings");

    let urls = read_urls(&args.urls)?;
    if urls.is_empty() {
        info!("No input provided. Pass media URLs as arguments or pipe them via stdin.");
        info!("Example: echo 'https://example.com/a.jpg' | mediadl -a 'My Album'");
        return Ok(ExitCode::SUCCESS);
    }

    let album_path = resolve_album_dir(&settings, args.album.as_deref())?;
    info!(urls = urls.len(), album = %album_path.display(), "starting download");

    let progress = if io::stderr().is_terminal() && !args.quiet {
        DownloadProgress::stderr()
    } else {
        DownloadProgress::hidden()
    };
    let engine = DownloadEngine::new(settings.fetch_config())
        .context("Failed to create download engine")?
        .with_progress(progress.clone());

    let headers: HeaderMap = args.headers.iter().cloned().collect();

    let results = tokio::select! {
        results = engine.download_album(&urls, &album_path, &headers) => results,
        _ = tokio::signal::ctrl_c() => {
            progress.finish();
            warn!("Interrupted; partially transferred .part files may remain");
            return Ok(ExitCode::FAILURE);
        }
    };
    progress.finish();

    let summary = RunSummary::from_results(&results);
    info!(
        downloaded = summary.downloaded(),
        skipped = summary.skipped(),
        errors = summary.errors(),
        "Download complete"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        if !args.quiet {
            eprint!("{summary}");
        }
    } else if !args.quiet || summary.has_errors() {
        print!("{summary}");
    }

    Ok(if summary.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Priority: RUST_LOG env var > quiet flag > verbose flag > default (info).
fn default_log_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .try_init();
}

/// Positional URLs, or one URL per line from a piped stdin.
fn read_urls(positional: &[String]) -> Result<Vec<String>> {
    let text = if !positional.is_empty() {
        positional.join("\n")
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read URLs from stdin")?;
        buffer
    } else {
        return Ok(Vec::new());
    };
    Ok(parse_url_lines(&text))
}

fn parse_url_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn resolve_album_dir(settings: &Settings, album: Option<&str>) -> Result<PathBuf> {
    if let Some(title) = album {
        return final_album_path(&settings.output_dir, title)
            .with_context(|| format!("Failed to prepare album directory for '{title}'"));
    }
    std::fs::create_dir_all(&settings.output_dir).with_context(|| {
        format!(
            "Failed to create output directory '{}'",
            settings.output_dir.display()
        )
    })?;
    Ok(settings.output_dir.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        assert_eq!(default_log_level(false, 0), "info");
        assert_eq!(default_log_level(false, 1), "debug");
        assert_eq!(default_log_level(false, 5), "trace");
        assert_eq!(default_log_level(true, 2), "error");
    }

    #[test]
    fn test_parse_url_lines_skips_blanks_and_comments() {
        let urls = parse_url_lines("https://a/1.jpg\n\n  # album 2\n  https://a/2.mp4  \n");
        assert_eq!(urls, vec!["https://a/1.jpg", "https://a/2.mp4"]);
    }
}

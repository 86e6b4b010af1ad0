//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use reqwest::header::{HeaderName, HeaderValue};

/// Fetch album media reliably, without duplicates.
///
/// Reads media URLs from the arguments or, one per line, from stdin, and saves
/// them into an album directory. Images are byte-compared and videos are
/// hash-compared against files already there, so re-running is safe.
#[derive(Parser, Debug)]
#[command(name = "mediadl")]
#[command(author, version, about)]
pub struct Args {
    /// Media URLs to download (reads stdin when omitted)
    pub urls: Vec<String>,

    /// Download root directory [default: .]
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Album title; media goes into a sanitized subdirectory of the root
    #[arg(short = 'a', long)]
    pub album: Option<String>,

    /// Maximum concurrent downloads (1-100) [default: 10]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Maximum attempts for rate-limited or unreachable requests (0-10) [default: 5]
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Skip URLs recorded in the cache by earlier runs
    #[arg(long)]
    pub check_cache: bool,

    /// Cache directory [default: .cache]
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Use fixed 64 KiB reads instead of throughput-adaptive chunk sizes
    #[arg(long)]
    pub no_dynamic_chunks: bool,

    /// Extra request header, e.g. "Referer: https://example.com/" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(HeaderName, HeaderValue)>,

    /// Override the User-Agent header
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Config file [default: $XDG_CONFIG_HOME/mediadl/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print results as a JSON array on stdout
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got {raw:?}"))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| format!("invalid header name {:?}: {e}", name.trim()))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| format!("invalid value for header {name}: {e}"))?;
    Ok((name, value))
}

//! `cyroidctl cache` — image/ISO cache pulls and downloads (§4.2).

use clap::{Subcommand, ValueEnum};
use cyroid_cache::{CacheKey, CacheStatus, IsoKind};
use cyroid_sdk::Cyroid;

use crate::output::{format_bytes, BOLD, CYAN, DIM, GREEN, RED, RESET, YELLOW};

/// `cache` subcommands (§11).
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Starts pulling a container image in the background.
    Pull {
        /// Image reference, e.g. `nginx:alpine`.
        image: String,
    },
    /// Starts downloading an ISO in the background.
    Download {
        /// Which on-disk subdirectory this belongs under.
        kind: IsoKindArg,
        /// Version code (Windows/Linux) or sanitized filename (custom).
        name: String,
        /// Source URL to fetch from.
        url: String,
    },
    /// Prints the current status of a cache entry.
    Status {
        /// Key as printed by `pull`/`download`/`ls`, e.g. `image:nginx:alpine`.
        key: String,
    },
    /// Cancels an in-flight pull or download.
    Cancel {
        /// Key as printed by `pull`/`download`/`ls`.
        key: String,
    },
    /// Lists all in-flight cache operations.
    Ls,
}

/// CLI-facing mirror of [`IsoKind`], so clap can render a friendly
/// `--help` list without `IsoKind` itself needing to derive `ValueEnum`.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum IsoKindArg {
    Windows,
    Linux,
    Custom,
}

impl From<IsoKindArg> for IsoKind {
    fn from(value: IsoKindArg) -> Self {
        match value {
            IsoKindArg::Windows => Self::Windows,
            IsoKindArg::Linux => Self::Linux,
            IsoKindArg::Custom => Self::Custom,
        }
    }
}

/// Parses a cache key in the `as_string()` form this same CLI prints
/// (`image:<ref>` or `iso:<kind>:<name>`), since the manager is keyed by
/// the structured [`CacheKey`] rather than a flat string.
fn parse_key(key: &str) -> anyhow::Result<CacheKey> {
    if let Some(image) = key.strip_prefix("image:") {
        return Ok(CacheKey::Image { image: image.to_string() });
    }
    if let Some(rest) = key.strip_prefix("iso:") {
        let (kind, name) = rest
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("malformed iso cache key: {key}"))?;
        let iso_kind = match kind {
            "windows" => IsoKind::Windows,
            "linux" => IsoKind::Linux,
            "custom" => IsoKind::Custom,
            other => anyhow::bail!("unknown iso kind in cache key: {other}"),
        };
        return Ok(CacheKey::Iso { iso_kind, name: name.to_string() });
    }
    anyhow::bail!("cache key must start with \"image:\" or \"iso:\": {key}")
}

/// Dispatches a `cache` subcommand.
///
/// # Errors
/// Propagates any cache manager failure.
pub async fn execute(command: CacheCommand, cyroid: &Cyroid) -> anyhow::Result<()> {
    match command {
        CacheCommand::Pull { image } => {
            let key = cyroid.cache.start_pull(&image)?;
            println!("{GREEN}{BOLD}pulling{RESET} {}", key.as_string());
        }
        CacheCommand::Download { kind, name, url } => {
            let key = cyroid.cache.start_download(kind.into(), &name, &url)?;
            println!("{GREEN}{BOLD}downloading{RESET} {}", key.as_string());
        }
        CacheCommand::Status { key } => {
            let key = parse_key(&key)?;
            print_status(&key, &cyroid.cache.status(&key).await);
        }
        CacheCommand::Cancel { key } => {
            let key = parse_key(&key)?;
            cyroid.cache.cancel(&key);
            println!("{YELLOW}{BOLD}cancelled{RESET} {}", key.as_string());
        }
        CacheCommand::Ls => {
            let keys = cyroid.cache.list_active();
            if keys.is_empty() {
                println!("{DIM}no active cache operations{RESET}");
            }
            for key in keys {
                println!("  {CYAN}{key}{RESET}");
            }
        }
    }
    Ok(())
}

fn print_status(key: &CacheKey, status: &CacheStatus) {
    let key = key.as_string();
    match status {
        CacheStatus::Pulling { bytes_done, bytes_total, percent } => println!(
            "{CYAN}{key}{RESET} {BOLD}pulling{RESET} {}{}",
            format_bytes(*bytes_done),
            progress_suffix(*bytes_total, *percent),
        ),
        CacheStatus::Downloading { bytes_done, bytes_total, percent } => println!(
            "{CYAN}{key}{RESET} {BOLD}downloading{RESET} {}{}",
            format_bytes(*bytes_done),
            progress_suffix(*bytes_total, *percent),
        ),
        CacheStatus::Extracting => println!("{CYAN}{key}{RESET} {BOLD}extracting{RESET}"),
        CacheStatus::Completed { bytes_done } => println!(
            "{CYAN}{key}{RESET} {GREEN}{BOLD}completed{RESET} ({})",
            format_bytes(*bytes_done)
        ),
        CacheStatus::Failed { error } => {
            println!("{CYAN}{key}{RESET} {RED}{BOLD}failed{RESET}: {error}");
        }
        CacheStatus::Cancelled => println!("{CYAN}{key}{RESET} {YELLOW}{BOLD}cancelled{RESET}"),
        CacheStatus::NotFound => println!("{CYAN}{key}{RESET} {DIM}not found{RESET}"),
    }
}

fn progress_suffix(bytes_total: Option<u64>, percent: Option<f64>) -> String {
    match (bytes_total, percent) {
        (Some(total), Some(pct)) => format!(" / {} ({pct:.0}%)", format_bytes(total)),
        _ => String::new(),
    }
}

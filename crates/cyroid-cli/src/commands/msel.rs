//! `cyroidctl msel` — MSEL import and inject dispatch (§7).

use std::path::PathBuf;

use clap::Subcommand;
use cyroid_common::ids::{InjectId, RangeId};
use cyroid_sdk::Cyroid;

use crate::output::{BOLD, DIM, GREEN, RESET, YELLOW};

/// `msel` subcommands (§11).
#[derive(Subcommand, Debug)]
pub enum MselCommand {
    /// Parses a MSEL document and attaches it to a range.
    Import {
        /// Range to attach the MSEL to.
        range_id: RangeId,
        /// Path to the MSEL markdown document.
        path: PathBuf,
        /// Display name; defaults to the file stem.
        #[arg(long)]
        name: Option<String>,
    },
    /// Dispatches an inject's actions now, out of band from its scheduled time.
    Run {
        /// Owning range.
        range_id: RangeId,
        /// Inject to run.
        inject_id: InjectId,
    },
    /// Marks an inject Skipped without dispatching its actions.
    Skip {
        /// Inject to skip.
        inject_id: InjectId,
        /// Free-text reason, recorded in the inject's execution log.
        reason: Option<String>,
    },
}

/// Dispatches a `msel` subcommand.
///
/// # Errors
/// Propagates any facade failure.
pub async fn execute(command: MselCommand, cyroid: &Cyroid) -> anyhow::Result<()> {
    match command {
        MselCommand::Import { range_id, path, name } => {
            let text = std::fs::read_to_string(&path)?;
            let name = name.unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "msel".to_string())
            });
            let msel_id = cyroid.import_msel(range_id, &name, &text)?;
            println!("{GREEN}{BOLD}imported{RESET} {} -> msel {msel_id}", path.display());
        }
        MselCommand::Run { range_id, inject_id } => {
            cyroid.run_inject(range_id, inject_id).await?;
            println!("{GREEN}{BOLD}ran{RESET} inject {inject_id}");
        }
        MselCommand::Skip { inject_id, reason } => {
            cyroid.skip_inject(inject_id, reason.clone())?;
            match reason {
                Some(reason) => println!("{YELLOW}{BOLD}skipped{RESET} inject {inject_id} {DIM}({reason}){RESET}"),
                None => println!("{YELLOW}{BOLD}skipped{RESET} inject {inject_id}"),
            }
        }
    }
    Ok(())
}

//! `cyroidctl range` — range lifecycle (§4.4) over the facade.

use std::path::PathBuf;

use clap::Subcommand;
use cyroid_auth::Principal;
use cyroid_common::ids::RangeId;
use cyroid_sdk::Cyroid;
use cyroid_topology::{RangeBlueprint, TopologyStore};

use crate::output::{BOLD, CYAN, DIM, GREEN, RESET};
use crate::session;

/// `range` subcommands (§11).
#[derive(Subcommand, Debug)]
pub enum RangeCommand {
    /// Runs the deploy plan (§4.4).
    Deploy {
        /// Target range.
        range_id: RangeId,
    },
    /// Runs the teardown plan.
    Teardown {
        /// Target range.
        range_id: RangeId,
    },
    /// Stops every VM in the range (the range auto-transitions to
    /// Stopped once all of them have).
    Stop {
        /// Target range.
        range_id: RangeId,
    },
    /// Starts every VM in the range (the range auto-transitions to
    /// Running on the first VM that starts).
    Start {
        /// Target range.
        range_id: RangeId,
    },
    /// Pure-data copy of a range's topology into a new, undeployed range.
    Clone {
        /// Range to copy.
        source_range_id: RangeId,
        /// Name for the new range.
        new_name: String,
    },
    /// Emits a range's topology as a portable blueprint (§6).
    Export {
        /// Range to export.
        range_id: RangeId,
        /// Destination file; defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Imports a blueprint file as a new range.
    Import {
        /// Path to a blueprint JSON document.
        path: PathBuf,
    },
}

/// Dispatches a `range` subcommand.
///
/// # Errors
/// Propagates any facade failure.
pub async fn execute(command: RangeCommand, cyroid: &Cyroid) -> anyhow::Result<()> {
    let operator = Principal::new(session::operator_id()).as_admin();

    match command {
        RangeCommand::Deploy { range_id } => {
            cyroid.deploy_range(range_id).await?;
            println!("{GREEN}{BOLD}deployed{RESET} range {range_id}");
            print_recent_events(cyroid, range_id).await;
        }
        RangeCommand::Teardown { range_id } => {
            cyroid.teardown_range(range_id).await?;
            println!("{GREEN}{BOLD}torn down{RESET} range {range_id}");
        }
        RangeCommand::Stop { range_id } => {
            let vms = cyroid.repo.list_vms(range_id)?;
            for vm in vms {
                cyroid.stop_vm(vm.id).await?;
                println!("  {DIM}stopped vm{RESET} {} ({})", vm.hostname, vm.id);
            }
            println!("{GREEN}{BOLD}stopped{RESET} range {range_id}");
        }
        RangeCommand::Start { range_id } => {
            let vms = cyroid.repo.list_vms(range_id)?;
            for vm in vms {
                cyroid.start_vm(vm.id).await?;
                println!("  {DIM}started vm{RESET} {} ({})", vm.hostname, vm.id);
            }
            println!("{GREEN}{BOLD}started{RESET} range {range_id}");
        }
        RangeCommand::Clone { source_range_id, new_name } => {
            let new_id = cyroid.clone_range(source_range_id, &new_name)?;
            println!("{GREEN}{BOLD}cloned{RESET} range {source_range_id} {CYAN}->{RESET} {new_id}");
        }
        RangeCommand::Export { range_id, output } => {
            let blueprint = cyroid.export_blueprint(range_id)?;
            let json = serde_json::to_string_pretty(&blueprint)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("{GREEN}{BOLD}exported{RESET} range {range_id} -> {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        RangeCommand::Import { path } => {
            let text = std::fs::read_to_string(&path)?;
            let blueprint: RangeBlueprint = serde_json::from_str(&text)?;
            let new_id = cyroid.import_blueprint(operator.id, &blueprint)?;
            println!(
                "{GREEN}{BOLD}imported{RESET} {} -> range {new_id}",
                path.display()
            );
        }
    }
    Ok(())
}

async fn print_recent_events(cyroid: &Cyroid, range_id: RangeId) {
    let Ok(events) = cyroid.list_events(range_id, None, 5, 0) else {
        return;
    };
    if events.is_empty() {
        return;
    }
    println!("{DIM}recent events:{RESET}");
    for event in events {
        println!("  {DIM}{}{RESET} {}", event.kind.as_str(), event.message);
    }
}

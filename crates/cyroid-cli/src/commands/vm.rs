//! `cyroidctl vm` — console exec and snapshot management over the facade.

use clap::Subcommand;
use cyroid_common::ids::{SnapshotId, VmId};
use cyroid_sdk::Cyroid;

use crate::output::{BOLD, DIM, GREEN, RESET, YELLOW};

/// `vm` subcommands (§11).
#[derive(Subcommand, Debug)]
pub enum VmCommand {
    /// Runs a command inside a VM's container and prints its output.
    Exec {
        /// Target VM.
        vm_id: VmId,
        /// Command and arguments to run.
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Snapshot creation and restore.
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommand,
    },
}

/// `vm snapshot` subcommands.
#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Commits a running VM's container to a named snapshot image.
    Create {
        /// Source VM.
        vm_id: VmId,
        /// Snapshot name.
        name: String,
        /// Free-form description.
        #[arg(long)]
        description: Option<String>,
    },
    /// Recreates a VM's container from a previously captured snapshot.
    Restore {
        /// Snapshot to restore from.
        snapshot_id: SnapshotId,
    },
}

/// Dispatches a `vm` subcommand.
///
/// # Errors
/// Propagates any facade failure.
pub async fn execute(command: VmCommand, cyroid: &Cyroid) -> anyhow::Result<()> {
    match command {
        VmCommand::Exec { vm_id, command } => {
            let result = cyroid.exec_in_vm(vm_id, &command).await?;
            print!("{}", result.output);
            if result.exit_code == 0 {
                println!("{DIM}(exit 0){RESET}");
            } else {
                println!("{YELLOW}(exit {}){RESET}", result.exit_code);
            }
        }
        VmCommand::Snapshot { command } => match command {
            SnapshotCommand::Create { vm_id, name, description } => {
                let snapshot_id = cyroid.snapshot_create(vm_id, &name, description).await?;
                println!("{GREEN}{BOLD}snapshot created{RESET} {snapshot_id} from vm {vm_id}");
            }
            SnapshotCommand::Restore { snapshot_id } => {
                cyroid.snapshot_restore(snapshot_id).await?;
                println!("{GREEN}{BOLD}restored{RESET} snapshot {snapshot_id}");
            }
        },
    }
    Ok(())
}

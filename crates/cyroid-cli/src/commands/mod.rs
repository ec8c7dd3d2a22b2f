//! CLI command definitions and dispatch.

pub mod cache;
pub mod msel;
pub mod range;
pub mod vm;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Cyroid — cyber-range orchestrator core, operational CLI.
///
/// A convenience adapter over the core facade (§11): it contains no
/// business logic beyond argument parsing and formatting.
#[derive(Parser, Debug)]
#[command(name = cyroid_common::constants::BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the CLI's local session snapshot, since the core's
    /// repository is an external collaborator (§1) this standalone
    /// binary substitutes with its own file between invocations.
    #[arg(
        long,
        global = true,
        env = "CYROID_STATE_FILE",
        default_value = cyroid_common::constants::DEFAULT_STATE_FILE
    )]
    pub state_file: PathBuf,
}

/// Available CLI subcommands, one per §11 operation group.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Range lifecycle: deploy, teardown, stop, start, clone, export, import.
    Range(RangeArgs),
    /// VM console exec and snapshot management.
    Vm(VmArgs),
    /// MSEL import and inject dispatch.
    Msel(MselArgs),
    /// Image/ISO cache pulls and downloads.
    Cache(CacheArgs),
}

/// `cyroidctl range <...>`.
#[derive(Args, Debug)]
pub struct RangeArgs {
    #[command(subcommand)]
    pub command: range::RangeCommand,
}

/// `cyroidctl vm <...>`.
#[derive(Args, Debug)]
pub struct VmArgs {
    #[command(subcommand)]
    pub command: vm::VmCommand,
}

/// `cyroidctl msel <...>`.
#[derive(Args, Debug)]
pub struct MselArgs {
    #[command(subcommand)]
    pub command: msel::MselCommand,
}

/// `cyroidctl cache <...>`.
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: cache::CacheCommand,
}

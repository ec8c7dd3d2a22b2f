//! # cyroidctl — Cyroid operational CLI
//!
//! A thin convenience adapter over the core facade (§11): it contains no
//! business logic beyond argument parsing, dispatch, and formatting. It
//! keeps its own small local session snapshot (`--state-file`) since the
//! core's repository is an external collaborator the CLI does not itself
//! provide a database for.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod commands;
mod output;
mod session;

use std::sync::Arc;

use clap::Parser;
use cyroid_common::config::CyroidConfig;
use cyroid_runtime::{BollardRuntime, ContainerRuntime};
use cyroid_sdk::{Cyroid, Repository};

use crate::commands::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let repo = session::load(&cli.state_file)?;

    let runtime: Arc<dyn ContainerRuntime> = Arc::new(BollardRuntime::connect()?);
    let cyroid = Cyroid::new(Arc::clone(&repo) as Arc<dyn Repository>, runtime, CyroidConfig::default());

    let result = match cli.command {
        Command::Range(args) => commands::range::execute(args.command, &cyroid).await,
        Command::Vm(args) => commands::vm::execute(args.command, &cyroid).await,
        Command::Msel(args) => commands::msel::execute(args.command, &cyroid).await,
        Command::Cache(args) => commands::cache::execute(args.command, &cyroid).await,
    };

    session::save(&cli.state_file, &repo)?;
    result
}

//! # backhaul — pipeline synthesizer CLI
//!
//! Synthesizes the one-shot backup pipeline (network, cluster, storage,
//! task definition, front door) into a CloudFormation template.

mod commands;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}

//! `backhaul synth` — Synthesize the pipeline into a template file.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::commands::StackArgs;

/// Arguments for the `synth` command.
#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Deployment-time parameters.
    #[command(flatten)]
    pub stack: StackArgs,

    /// Path of the template to write; `-` writes to stdout.
    #[arg(long, short, default_value = "template.json")]
    pub output: PathBuf,
}

/// Executes the `synth` command.
///
/// # Errors
///
/// Returns an error if parameter resolution, synthesis, or writing the
/// template fails.
pub fn execute(args: &SynthArgs) -> anyhow::Result<()> {
    let config = args.stack.resolve()?;
    let template = backhaul_stacks::pipeline::synthesize(&config)?;
    let json = template.to_json_pretty()?;

    if args.output.as_os_str() == "-" {
        println!("{json}");
    } else {
        std::fs::write(&args.output, json)?;
        info!(path = %args.output.display(), resources = template.resources.len(), "wrote template");
        println!(
            "Synthesized {} resources to {}",
            template.resources.len(),
            args.output.display()
        );
    }
    Ok(())
}

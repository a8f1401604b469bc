//! CLI command definitions and dispatch.

pub mod plan;
pub mod synth;

use clap::{Args, Parser, Subcommand};

use backhaul_common::config::{parse_email_list, PipelineConfig};
use backhaul_common::constants::APP_NAME;

/// Backhaul — one-shot backup-pipeline synthesizer.
#[derive(Parser, Debug)]
#[command(name = "backhaul", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Synthesize the pipeline into a CloudFormation template.
    Synth(synth::SynthArgs),
    /// Display the resources that would be provisioned, in deploy order.
    Plan(plan::PlanArgs),
}

/// Deployment-time parameters shared by all subcommands.
#[derive(Args, Debug)]
pub struct StackArgs {
    /// Name prefix applied to stack resources.
    #[arg(long, default_value = APP_NAME)]
    pub app_name: String,

    /// CPU units for the backup task.
    #[arg(long, default_value = "2048")]
    pub cpu: String,

    /// Memory (MiB) for the backup task.
    #[arg(long, default_value = "8192")]
    pub memory: String,

    /// Comma-separated list of emails to send the backup result to.
    #[arg(long, default_value = "")]
    pub emails: String,

    /// CIDR block of the created network.
    #[arg(long, env = "VPC_CIDR")]
    pub vpc_cidr: Option<String>,

    /// Id of an existing network to import instead of creating one.
    #[arg(long, env = "EXISTING_VPC_ID")]
    pub existing_vpc_id: Option<String>,

    /// Suffix of the backup bucket name.
    #[arg(long, default_value = backhaul_common::constants::DEFAULT_BUCKET_SUFFIX)]
    pub bucket_suffix: String,

    /// Target region.
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Target account id.
    #[arg(long, env = "AWS_ACCOUNT_ID", default_value = "000000000000")]
    pub account: String,
}

impl StackArgs {
    /// Resolves the raw argument strings into a validated pipeline
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the CIDR or a task sizing value is outside
    /// its allowed set.
    pub fn resolve(&self) -> anyhow::Result<PipelineConfig> {
        Ok(PipelineConfig {
            app_name: self.app_name.clone(),
            vpc_cidr: self.vpc_cidr.as_deref().map(str::parse).transpose()?,
            existing_vpc_id: self.existing_vpc_id.clone(),
            task_cpu: self.cpu.parse()?,
            task_memory: self.memory.parse()?,
            receiver_emails: parse_email_list(&self.emails),
            bucket_suffix: self.bucket_suffix.clone(),
            region: self.region.clone(),
            account_id: self.account.clone(),
        })
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Synth(args) => synth::execute(&args),
        Command::Plan(args) => plan::execute(&args),
    }
}

//! Top-level pipeline composition.
//!
//! Instantiates the five units in dependency order against one
//! [`SynthContext`], wires their resolved handles, and declares the four
//! stack outputs.

use backhaul_common::config::PipelineConfig;
use backhaul_common::error::Result;
use backhaul_synth::context::SynthContext;
use backhaul_synth::exemption::RuleExemption;
use backhaul_synth::template::{Output, Template};

use crate::{cluster, frontdoor, network, storage, task};

/// Synthesizes the complete backup-pipeline template from resolved
/// deployment-time parameters.
///
/// # Errors
///
/// Returns an error if any unit fails to provision or the resulting
/// resource graph is invalid.
pub fn synthesize(config: &PipelineConfig) -> Result<Template> {
    let mut ctx = SynthContext::new(format!(
        "One-shot MySQL-to-S3 backup pipeline ({})",
        config.app_name
    ));
    ctx.exempt(RuleExemption::new(
        "AwsSolutions-SNS2",
        "No SNS delivery status logging needed.",
    ));

    let network = network::provision(
        &mut ctx,
        &network::NetworkConfig {
            app_name: config.app_name.clone(),
            cidr: config.vpc_cidr,
            existing_vpc_id: config.existing_vpc_id.clone(),
        },
    )?;

    let cluster = cluster::provision(&mut ctx, &config.app_name)?;

    let storage = storage::provision(&mut ctx, &config.app_name, &config.bucket_suffix)?;

    let task = task::provision(
        &mut ctx,
        &task::TaskConfig {
            app_name: &config.app_name,
            cpu: config.task_cpu,
            memory: config.task_memory,
            receiver_emails: &config.receiver_emails,
            cluster: &cluster,
            storage: &storage,
            region: &config.region,
            account_id: &config.account_id,
        },
    )?;

    let frontdoor = frontdoor::provision(
        &mut ctx,
        &frontdoor::FrontdoorConfig {
            app_name: &config.app_name,
            region: &config.region,
            network: &network,
            cluster_arn: &cluster.cluster_arn,
            task: &task,
        },
    )?;

    ctx.output(
        "ApiUrl",
        Output::new(
            "This is the url where you can ping start a backup request.",
            frontdoor.invoke_url,
        ),
    )?;
    ctx.output(
        "EcsRoleName",
        Output::new(
            "This is the role of the task that will try to connect to your DB.",
            task.task_role_name,
        ),
    )?;
    ctx.output(
        "SecurityGroupId",
        Output::new(
            "This is the security group for the backup task, allow a connection from it to the DB in your RDS security group.",
            frontdoor.security_group_id,
        ),
    )?;
    ctx.output(
        "S3Bucket",
        Output::new(
            "This is the S3 bucket where the backup file(s) will be saved.",
            storage.bucket_name,
        ),
    )?;

    ctx.synth()
}

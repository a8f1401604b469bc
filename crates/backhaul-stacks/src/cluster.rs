//! Compute-cluster unit: ECS cluster and its task log destination.
//!
//! Capacity comes entirely from the Fargate compatibility declared on
//! the task definition; the cluster itself carries no scaling
//! configuration.

use serde_json::json;

use backhaul_common::constants::CLUSTER_LOG_RETENTION_DAYS;
use backhaul_common::error::Result;
use backhaul_synth::context::SynthContext;
use backhaul_synth::template::{DeletionPolicy, Resource};
use backhaul_synth::token::Token;

/// Resolved handles produced by the compute-cluster unit.
#[derive(Debug, Clone)]
pub struct ClusterOutputs {
    /// ARN of the ECS cluster.
    pub cluster_arn: Token,
    /// Name of the task log group.
    pub log_group_name: Token,
}

/// Provisions the compute-cluster unit.
///
/// # Errors
///
/// Returns an error if a logical id collides.
pub fn provision(ctx: &mut SynthContext, app_name: &str) -> Result<ClusterOutputs> {
    let cluster = ctx.resource(
        "EcsCluster",
        Resource::new(
            "AWS::ECS::Cluster",
            json!({
                "ClusterName": format!("{app_name}-cluster"),
                "ClusterSettings": [
                    { "Name": "containerInsights", "Value": "enabled" },
                ],
            }),
        ),
    )?;

    let log_group = ctx.resource(
        "EcsLogGroup",
        Resource::new(
            "AWS::Logs::LogGroup",
            json!({
                "LogGroupName": format!("{app_name}-log-group"),
                "RetentionInDays": CLUSTER_LOG_RETENTION_DAYS,
            }),
        )
        .with_deletion_policy(DeletionPolicy::Delete),
    )?;

    Ok(ClusterOutputs {
        cluster_arn: cluster.att("Arn"),
        log_group_name: log_group.reference(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_enables_container_insights() {
        let mut ctx = SynthContext::new("cluster test");
        let _ = provision(&mut ctx, "test").expect("provisions");
        let value = ctx.synth().expect("synthesizes").to_value().expect("serializes");
        assert_eq!(
            value["Resources"]["EcsCluster"]["Properties"]["ClusterSettings"][0],
            json!({ "Name": "containerInsights", "Value": "enabled" })
        );
    }

    #[test]
    fn log_group_retains_one_week() {
        let mut ctx = SynthContext::new("cluster test");
        let outputs = provision(&mut ctx, "test").expect("provisions");
        let value = ctx.synth().expect("synthesizes").to_value().expect("serializes");
        assert_eq!(
            value["Resources"]["EcsLogGroup"]["Properties"]["RetentionInDays"],
            7
        );
        assert_eq!(
            outputs.log_group_name.to_json(),
            json!({ "Ref": "EcsLogGroup" })
        );
    }
}

//! Task-definition unit: IAM roles, notification topic, and the Fargate
//! task that runs the export job.
//!
//! The container image is an external build context; it surfaces as the
//! `TaskImageUri` template parameter. `DB_NAME` and `HOST_NAME` are
//! deliberate placeholders the invocation caller overrides.

use serde_json::json;

use backhaul_common::error::Result;
use backhaul_common::types::{EmailAddress, TaskCpu, TaskMemory};
use backhaul_synth::context::SynthContext;
use backhaul_synth::exemption::RuleExemption;
use backhaul_synth::template::{Parameter, Resource};
use backhaul_synth::token::Token;
use tracing::warn;

use crate::cluster::ClusterOutputs;
use crate::storage::StorageOutputs;

/// Inputs of the task-definition unit.
#[derive(Debug)]
pub struct TaskConfig<'a> {
    /// Name prefix for task resources.
    pub app_name: &'a str,
    /// CPU units of the task.
    pub cpu: TaskCpu,
    /// Memory size of the task.
    pub memory: TaskMemory,
    /// Raw receiver email list; invalid entries are skipped.
    pub receiver_emails: &'a [String],
    /// Log destination of the compute-cluster unit.
    pub cluster: &'a ClusterOutputs,
    /// Backup destination of the storage unit.
    pub storage: &'a StorageOutputs,
    /// Target region.
    pub region: &'a str,
    /// Target account id.
    pub account_id: &'a str,
}

/// Resolved handles produced by the task-definition unit.
#[derive(Debug, Clone)]
pub struct TaskOutputs {
    /// ARN of the task role.
    pub task_role_arn: Token,
    /// Name of the task role.
    pub task_role_name: Token,
    /// ARN of the execution role.
    pub execution_role_arn: Token,
    /// ARN of the task definition.
    pub task_definition_arn: Token,
    /// Name of the single container in the task definition.
    pub container_name: String,
    /// ARN of the notification topic.
    pub topic_arn: Token,
}

/// Provisions the task-definition unit.
///
/// # Errors
///
/// Returns an error if a logical id collides. An invalid receiver email
/// is logged and skipped, never an error.
pub fn provision(ctx: &mut SynthContext, config: &TaskConfig<'_>) -> Result<TaskOutputs> {
    ctx.exempt(RuleExemption::new(
        "AwsSolutions-IAM4",
        "AWS managed execution policy works for this task.",
    ));
    ctx.exempt(RuleExemption::new(
        "AwsSolutions-IAM5",
        "KMS wildcard is needed for the task role.",
    ));
    ctx.exempt(RuleExemption::new(
        "AwsSolutions-ECS2",
        "Task environment variables carry no secrets.",
    ));

    let app_name = config.app_name;
    let execution_role = ctx.resource(
        "EcsExecutionRole",
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "RoleName": format!("{app_name}-execution-role"),
                "AssumeRolePolicyDocument": assume_role_document("ecs-tasks.amazonaws.com"),
                "ManagedPolicyArns": [
                    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy",
                ],
            }),
        ),
    )?;

    let key = ctx.resource(
        "NotificationKey",
        Resource::new(
            "AWS::KMS::Key",
            json!({
                "EnableKeyRotation": true,
                "KeyPolicy": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "AWS": Token::sub("arn:aws:iam::${AWS::AccountId}:root") },
                        "Action": "kms:*",
                        "Resource": "*",
                    }],
                },
            }),
        ),
    )?;

    let topic = ctx.resource(
        "NotificationTopic",
        Resource::new(
            "AWS::SNS::Topic",
            json!({
                "TopicName": format!("{app_name}-topic"),
                "KmsMasterKeyId": key.reference(),
            }),
        ),
    )?;
    let topic_arn = topic.reference();

    let task_role = ctx.resource(
        "EcsTaskRole",
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "RoleName": format!("{app_name}-role"),
                "AssumeRolePolicyDocument": assume_role_document("ecs-tasks.amazonaws.com"),
                "Policies": task_role_policies(config, &topic_arn),
            }),
        ),
    )?;

    subscribe_receivers(ctx, config.receiver_emails, &topic_arn)?;

    let image_uri = ctx.parameter(
        "TaskImageUri",
        Parameter::string("URI of the export job container image (built from the tasks/ecs/ context)."),
    )?;

    let container_name = format!("{app_name}-container");
    let task_definition = ctx.resource(
        "BackupTaskDefinition",
        Resource::new(
            "AWS::ECS::TaskDefinition",
            json!({
                "Family": app_name,
                "RequiresCompatibilities": ["FARGATE"],
                "NetworkMode": "awsvpc",
                "Cpu": config.cpu.as_str(),
                "Memory": config.memory.as_str(),
                "ExecutionRoleArn": execution_role.att("Arn"),
                "TaskRoleArn": task_role.att("Arn"),
                "ContainerDefinitions": [{
                    "Name": container_name,
                    "Image": image_uri,
                    "Essential": true,
                    "Command": ["python", "./main.py"],
                    "LogConfiguration": {
                        "LogDriver": "awslogs",
                        "Options": {
                            "awslogs-group": config.cluster.log_group_name,
                            "awslogs-region": { "Ref": "AWS::Region" },
                            "awslogs-stream-prefix": format!("{app_name}_container"),
                            "awslogs-datetime-format": "%Y-%m-%d",
                        },
                    },
                    "Environment": [
                        { "Name": "SNS_TOPIC_ARN", "Value": topic_arn },
                        { "Name": "S3_BUCKET", "Value": config.storage.bucket_name },
                        { "Name": "AWS_REGION", "Value": config.region },
                        { "Name": "DB_NAME", "Value": "undefined" },
                        { "Name": "HOST_NAME", "Value": "undefined" },
                    ],
                }],
            }),
        ),
    )?;

    Ok(TaskOutputs {
        task_role_arn: task_role.att("Arn"),
        task_role_name: task_role.reference(),
        execution_role_arn: execution_role.att("Arn"),
        task_definition_arn: task_definition.reference(),
        container_name,
        topic_arn,
    })
}

/// Adds one email subscription per valid receiver address. A malformed
/// address is logged and skipped; the remaining list is still processed.
fn subscribe_receivers(
    ctx: &mut SynthContext,
    receivers: &[String],
    topic_arn: &Token,
) -> Result<()> {
    let mut subscribed = 0u32;
    for raw in receivers {
        match EmailAddress::parse(raw) {
            Ok(email) => {
                subscribed += 1;
                let _ = ctx.resource(
                    format!("EmailSubscription{subscribed}"),
                    Resource::new(
                        "AWS::SNS::Subscription",
                        json!({
                            "Protocol": "email",
                            "Endpoint": email.as_str(),
                            "TopicArn": topic_arn,
                        }),
                    ),
                )?;
            }
            Err(error) => {
                warn!(%error, "skipping receiver email");
            }
        }
    }
    Ok(())
}

fn assume_role_document(service: &str) -> serde_json::Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service },
            "Action": "sts:AssumeRole",
        }],
    })
}

fn task_role_policies(config: &TaskConfig<'_>, topic_arn: &Token) -> serde_json::Value {
    let region = config.region;
    let account = config.account_id;
    json!([
        {
            "PolicyName": "secrets-read",
            "PolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": [
                        "secretsmanager:GetResourcePolicy",
                        "secretsmanager:GetSecretValue",
                        "secretsmanager:DescribeSecret",
                        "secretsmanager:ListSecretVersionIds",
                    ],
                    "Resource": format!("arn:aws:secretsmanager:{region}:{account}:secret:*"),
                }],
            },
        },
        {
            "PolicyName": "rds-describe",
            "PolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": [
                        "rds:DescribeDBClusterEndpoints",
                        "rds:DescribeDBInstances",
                        "rds:DescribeDBClusters",
                    ],
                    "Resource": [
                        format!("arn:aws:rds:{region}:{account}:db:*"),
                        format!("arn:aws:rds:{region}:{account}:cluster-endpoint:*"),
                        format!("arn:aws:rds:{region}:{account}:cluster:*"),
                    ],
                }],
            },
        },
        {
            "PolicyName": "notification-publish",
            "PolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": ["sns:Publish"],
                    "Resource": topic_arn,
                }],
            },
        },
        {
            "PolicyName": "kms-usage",
            "PolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": ["kms:GenerateDataKey", "kms:Decrypt"],
                    "Resource": "*",
                }],
            },
        },
        {
            "PolicyName": "bucket-read-write",
            "PolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": [
                        "s3:GetObject*",
                        "s3:GetBucket*",
                        "s3:List*",
                        "s3:PutObject*",
                        "s3:DeleteObject*",
                        "s3:Abort*",
                    ],
                    "Resource": [
                        config.storage.bucket_arn.to_json(),
                        json!({ "Fn::Join": ["", [config.storage.bucket_arn.to_json(), "/*"]] }),
                    ],
                }],
            },
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cluster, storage};

    fn synth(emails: &[String], cpu: TaskCpu, memory: TaskMemory) -> serde_json::Value {
        let mut ctx = SynthContext::new("task test");
        let cluster = cluster::provision(&mut ctx, "test").expect("cluster");
        let storage = storage::provision(&mut ctx, "test", "export-bucket").expect("storage");
        let _ = provision(
            &mut ctx,
            &TaskConfig {
                app_name: "test",
                cpu,
                memory,
                receiver_emails: emails,
                cluster: &cluster,
                storage: &storage,
                region: "eu-west-1",
                account_id: "123456789012",
            },
        )
        .expect("provisions");
        ctx.synth()
            .expect("synthesizes")
            .to_value()
            .expect("serializes")
    }

    fn subscription_count(value: &serde_json::Value) -> usize {
        value["Resources"]
            .as_object()
            .expect("resources")
            .values()
            .filter(|r| r["Type"] == "AWS::SNS::Subscription")
            .count()
    }

    #[test]
    fn invalid_email_is_skipped_without_aborting() {
        let emails = vec![
            "a@x.com".to_owned(),
            "not-an-email".to_owned(),
            "b@x.com".to_owned(),
        ];
        let value = synth(&emails, TaskCpu::default(), TaskMemory::default());
        assert_eq!(subscription_count(&value), 2);
        assert_eq!(
            value["Resources"]["EmailSubscription1"]["Properties"]["Endpoint"],
            "a@x.com"
        );
        assert_eq!(
            value["Resources"]["EmailSubscription2"]["Properties"]["Endpoint"],
            "b@x.com"
        );
    }

    #[test]
    fn empty_receiver_list_creates_no_subscriptions() {
        let value = synth(&[], TaskCpu::default(), TaskMemory::default());
        assert_eq!(subscription_count(&value), 0);
    }

    #[test]
    fn task_sizing_matches_parameters_exactly() {
        for cpu in TaskCpu::ALL {
            let value = synth(&[], cpu, TaskMemory::default());
            assert_eq!(
                value["Resources"]["BackupTaskDefinition"]["Properties"]["Cpu"],
                cpu.as_str()
            );
        }
        for memory in TaskMemory::ALL {
            let value = synth(&[], TaskCpu::default(), memory);
            assert_eq!(
                value["Resources"]["BackupTaskDefinition"]["Properties"]["Memory"],
                memory.as_str()
            );
        }
    }

    #[test]
    fn container_environment_names_the_external_contract() {
        let value = synth(&[], TaskCpu::default(), TaskMemory::default());
        let env = value["Resources"]["BackupTaskDefinition"]["Properties"]
            ["ContainerDefinitions"][0]["Environment"]
            .as_array()
            .expect("environment");
        let names: Vec<&str> = env
            .iter()
            .filter_map(|e| e["Name"].as_str())
            .collect();
        assert_eq!(
            names,
            vec!["SNS_TOPIC_ARN", "S3_BUCKET", "AWS_REGION", "DB_NAME", "HOST_NAME"]
        );
        assert_eq!(env[3]["Value"], "undefined");
        assert_eq!(env[4]["Value"], "undefined");
    }

    #[test]
    fn notification_topic_is_kms_encrypted_with_rotation() {
        let value = synth(&[], TaskCpu::default(), TaskMemory::default());
        assert_eq!(
            value["Resources"]["NotificationKey"]["Properties"]["EnableKeyRotation"],
            true
        );
        assert_eq!(
            value["Resources"]["NotificationTopic"]["Properties"]["KmsMasterKeyId"],
            json!({ "Ref": "NotificationKey" })
        );
    }

    #[test]
    fn task_role_policies_are_region_scoped() {
        let value = synth(&[], TaskCpu::default(), TaskMemory::default());
        let policies = value["Resources"]["EcsTaskRole"]["Properties"]["Policies"]
            .as_array()
            .expect("policies");
        assert_eq!(policies.len(), 5);
        assert_eq!(
            policies[0]["PolicyDocument"]["Statement"][0]["Resource"],
            "arn:aws:secretsmanager:eu-west-1:123456789012:secret:*"
        );
    }
}

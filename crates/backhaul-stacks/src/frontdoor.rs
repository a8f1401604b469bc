//! Front-door unit: the private REST trigger for the backup job.
//!
//! A request-triggered launcher function is granted permission to start
//! the task definition, fronted by a private REST API whose resource
//! policy denies every invocation that does not arrive through the
//! network's API Gateway endpoint. Access requires an API key whose
//! value comes from a generated secret, throttled by a usage plan.

use serde_json::json;

use backhaul_common::constants::{
    API_ACCESS_LOG_RETENTION_DAYS, API_KEY_EXCLUDED_CHARS, API_KEY_LENGTH,
    LAUNCHER_LOG_RETENTION_DAYS, LAUNCHER_MEMORY_MIB, LAUNCHER_TIMEOUT_SECONDS,
    USAGE_PLAN_BURST_LIMIT, USAGE_PLAN_DAILY_QUOTA, USAGE_PLAN_RATE_LIMIT,
};
use backhaul_common::error::Result;
use backhaul_synth::context::SynthContext;
use backhaul_synth::exemption::RuleExemption;
use backhaul_synth::template::{DeletionPolicy, Parameter, Resource};
use backhaul_synth::token::Token;

use crate::network::NetworkOutputs;
use crate::task::TaskOutputs;

/// Inputs of the front-door unit.
#[derive(Debug)]
pub struct FrontdoorConfig<'a> {
    /// Name prefix for front-door resources.
    pub app_name: &'a str,
    /// Target region.
    pub region: &'a str,
    /// Network handles the API and function are bound to.
    pub network: &'a NetworkOutputs,
    /// ARN of the cluster the task is launched on.
    pub cluster_arn: &'a Token,
    /// Handles of the task-definition unit.
    pub task: &'a TaskOutputs,
}

/// Resolved handles produced by the front-door unit.
#[derive(Debug, Clone)]
pub struct FrontdoorOutputs {
    /// Id of the REST API.
    pub rest_api_id: Token,
    /// Invocation URL of the `GET /backup` route.
    pub invoke_url: Token,
    /// Id of the launcher security group.
    pub security_group_id: Token,
}

/// Provisions the front-door unit.
///
/// # Errors
///
/// Returns an error if a logical id collides.
pub fn provision(ctx: &mut SynthContext, config: &FrontdoorConfig<'_>) -> Result<FrontdoorOutputs> {
    for (rule_id, reason) in [
        ("AwsSolutions-APIG2", "Validation not needed for private api."),
        ("AwsSolutions-APIG3", "WAF not needed for private api."),
        ("AwsSolutions-APIG4", "No auth in scope for this private api method."),
        ("AwsSolutions-COG4", "Cognito is not in scope for this."),
        ("AwsSolutions-SMG4", "Rotation of api key not in scope for this."),
        ("AwsSolutions-IAM4", "AWS managed policies work for the launcher role."),
        ("AwsSolutions-IAM5", "Wildcard is needed for this."),
    ] {
        ctx.exempt(RuleExemption::new(rule_id, reason));
    }

    let app_name = config.app_name;
    let security_group = ctx.resource(
        "LauncherSecurityGroup",
        Resource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": "Security group for the backup launcher; open egress only.",
                "VpcId": config.network.vpc_id,
                "SecurityGroupEgress": [{
                    "IpProtocol": "-1",
                    "CidrIp": "0.0.0.0/0",
                    "Description": "Allow all outbound traffic",
                }],
            }),
        ),
    )?;
    let security_group_id = security_group.att("GroupId");

    let launcher_role = ctx.resource(
        "LauncherRole",
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "RoleName": format!("{app_name}-lambda-backup-role"),
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "lambda.amazonaws.com" },
                        "Action": "sts:AssumeRole",
                    }],
                },
                "ManagedPolicyArns": [
                    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole",
                    "arn:aws:iam::aws:policy/service-role/AWSLambdaVPCAccessExecutionRole",
                ],
                "Policies": [
                    {
                        "PolicyName": "run-backup-task",
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [{
                                "Effect": "Allow",
                                "Action": ["ecs:RunTask"],
                                "Resource": config.task.task_definition_arn,
                                "Condition": {
                                    "ArnEquals": { "ecs:cluster": config.cluster_arn },
                                },
                            }],
                        },
                    },
                    {
                        "PolicyName": "pass-task-roles",
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [{
                                "Effect": "Allow",
                                "Action": ["iam:PassRole"],
                                "Resource": [
                                    config.task.execution_role_arn,
                                    config.task.task_role_arn,
                                ],
                            }],
                        },
                    },
                ],
            }),
        ),
    )?;

    let code_bucket = ctx.parameter(
        "LauncherCodeBucket",
        Parameter::string("Bucket holding the launcher function archive (built from the tasks/lambda/ context)."),
    )?;
    let code_key = ctx.parameter(
        "LauncherCodeKey",
        Parameter::string("Key of the launcher function archive."),
    )?;

    let _ = ctx.resource(
        "LauncherLogGroup",
        Resource::new(
            "AWS::Logs::LogGroup",
            json!({
                "LogGroupName": format!("/aws/lambda/{app_name}-launcher"),
                "RetentionInDays": LAUNCHER_LOG_RETENTION_DAYS,
            }),
        )
        .with_deletion_policy(DeletionPolicy::Delete),
    )?;

    let launcher = ctx.resource(
        "LauncherFunction",
        Resource::new(
            "AWS::Lambda::Function",
            json!({
                "FunctionName": format!("{app_name}-launcher"),
                "Runtime": "python3.9",
                "Handler": "startTask.lambda_handler",
                "MemorySize": LAUNCHER_MEMORY_MIB,
                "Timeout": LAUNCHER_TIMEOUT_SECONDS,
                "Role": launcher_role.att("Arn"),
                "Code": { "S3Bucket": code_bucket, "S3Key": code_key },
                "VpcConfig": {
                    "SecurityGroupIds": [security_group_id],
                    "SubnetIds": config.network.private_subnet_ids.to_json(),
                },
                "Environment": {
                    "Variables": {
                        "REGION": config.region,
                        "ECS_CLUSTER": config.cluster_arn,
                        "ECS_TASK_DEFINITION": config.task.task_definition_arn,
                        "ECS_TASK_CONTAINER_NAME": config.task.container_name,
                        "ECS_SUBNETS": config.network.private_subnet_ids.joined(),
                        "SECURITY_GROUP_ID": security_group_id,
                    },
                },
            }),
        ),
    )?;

    let rest_api = ctx.resource(
        "BackupRestApi",
        Resource::new(
            "AWS::ApiGateway::RestApi",
            json!({
                "Name": format!("{app_name}-rest-api"),
                "EndpointConfiguration": { "Types": ["PRIVATE"] },
                "Policy": {
                    "Version": "2012-10-17",
                    "Statement": [
                        {
                            "Effect": "Deny",
                            "Principal": { "AWS": "*" },
                            "Action": "execute-api:Invoke",
                            "Resource": "execute-api:/*",
                            "Condition": {
                                "StringNotEquals": {
                                    "aws:SourceVpce": config.network.api_gateway_endpoint_id,
                                },
                            },
                        },
                        {
                            "Effect": "Allow",
                            "Principal": { "AWS": "*" },
                            "Action": "execute-api:Invoke",
                            "Resource": "execute-api:/*",
                        },
                    ],
                },
            }),
        ),
    )?;

    let backup_resource = ctx.resource(
        "BackupResource",
        Resource::new(
            "AWS::ApiGateway::Resource",
            json!({
                "RestApiId": rest_api.reference(),
                "ParentId": rest_api.att("RootResourceId"),
                "PathPart": "backup",
            }),
        ),
    )?;

    let backup_method = ctx.resource(
        "BackupMethod",
        Resource::new(
            "AWS::ApiGateway::Method",
            json!({
                "RestApiId": rest_api.reference(),
                "ResourceId": backup_resource.reference(),
                "HttpMethod": "GET",
                "AuthorizationType": "NONE",
                "ApiKeyRequired": true,
                "Integration": {
                    "Type": "AWS_PROXY",
                    "IntegrationHttpMethod": "POST",
                    "Uri": Token::sub(
                        "arn:aws:apigateway:${AWS::Region}:lambda:path/2015-03-31/functions/${LauncherFunction.Arn}/invocations",
                    ),
                },
            }),
        ),
    )?;

    let _ = ctx.resource(
        "LauncherInvokePermission",
        Resource::new(
            "AWS::Lambda::Permission",
            json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": launcher.att("Arn"),
                "Principal": "apigateway.amazonaws.com",
                "SourceArn": Token::sub(
                    "arn:aws:execute-api:${AWS::Region}:${AWS::AccountId}:${BackupRestApi}/*/GET/backup",
                ),
            }),
        ),
    )?;

    let access_logs = ctx.resource(
        "ApiAccessLogGroup",
        Resource::new(
            "AWS::Logs::LogGroup",
            json!({
                "LogGroupName": format!("/aws/apigateway/{app_name}-api"),
                "RetentionInDays": API_ACCESS_LOG_RETENTION_DAYS,
            }),
        )
        .with_deletion_policy(DeletionPolicy::Delete),
    )?;

    // Execution logging on the stage requires the account-level
    // CloudWatch role to be set; without it the stage fails to deploy.
    let logs_role = ctx.resource(
        "ApiGatewayLogsRole",
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "apigateway.amazonaws.com" },
                        "Action": "sts:AssumeRole",
                    }],
                },
                "ManagedPolicyArns": [
                    "arn:aws:iam::aws:policy/service-role/AmazonAPIGatewayPushToCloudWatchLogs",
                ],
            }),
        ),
    )?;
    let account = ctx.resource(
        "ApiGatewayAccount",
        Resource::new(
            "AWS::ApiGateway::Account",
            json!({ "CloudWatchRoleArn": logs_role.att("Arn") }),
        ),
    )?;

    let deployment = ctx.resource(
        "ApiDeployment",
        Resource::new(
            "AWS::ApiGateway::Deployment",
            json!({ "RestApiId": rest_api.reference() }),
        ),
    )?;
    ctx.depends_on(&deployment, &backup_method)?;

    let stage = ctx.resource(
        "ProdStage",
        Resource::new(
            "AWS::ApiGateway::Stage",
            json!({
                "RestApiId": rest_api.reference(),
                "DeploymentId": deployment.reference(),
                "StageName": "prod",
                "AccessLogSetting": {
                    "DestinationArn": access_logs.att("Arn"),
                    "Format": access_log_format(),
                },
                "MethodSettings": [{
                    "ResourcePath": "/*",
                    "HttpMethod": "*",
                    "MetricsEnabled": true,
                    "LoggingLevel": "INFO",
                    "DataTraceEnabled": true,
                }],
            }),
        ),
    )?;
    ctx.depends_on(&stage, &account)?;

    let api_key_secret = ctx.resource(
        "ApiKeySecret",
        Resource::new(
            "AWS::SecretsManager::Secret",
            json!({
                "Name": format!("backup/{app_name}/apiKey"),
                "Description": "API key for backup creation",
                "GenerateSecretString": {
                    "ExcludePunctuation": true,
                    "ExcludeCharacters": API_KEY_EXCLUDED_CHARS,
                    "PasswordLength": API_KEY_LENGTH,
                },
            }),
        ),
    )?;

    let api_key = ctx.resource(
        "BackupApiKey",
        Resource::new(
            "AWS::ApiGateway::ApiKey",
            json!({
                "Name": format!("{app_name}-api-key"),
                "Description": "API key used to access the backup API endpoint",
                "Enabled": true,
                "Value": Token::sub("{{resolve:secretsmanager:${ApiKeySecret}}}"),
            }),
        ),
    )?;
    ctx.depends_on(&api_key, &api_key_secret)?;

    let usage_plan = ctx.resource(
        "BackupUsagePlan",
        Resource::new(
            "AWS::ApiGateway::UsagePlan",
            json!({
                "UsagePlanName": "Backup usage plan",
                "ApiStages": [{
                    "ApiId": rest_api.reference(),
                    "Stage": stage.reference(),
                }],
                "Throttle": {
                    "RateLimit": USAGE_PLAN_RATE_LIMIT,
                    "BurstLimit": USAGE_PLAN_BURST_LIMIT,
                },
                "Quota": { "Limit": USAGE_PLAN_DAILY_QUOTA, "Period": "DAY" },
            }),
        ),
    )?;

    let _ = ctx.resource(
        "BackupUsagePlanKey",
        Resource::new(
            "AWS::ApiGateway::UsagePlanKey",
            json!({
                "KeyId": api_key.reference(),
                "KeyType": "API_KEY",
                "UsagePlanId": usage_plan.reference(),
            }),
        ),
    )?;

    Ok(FrontdoorOutputs {
        rest_api_id: rest_api.reference(),
        invoke_url: Token::sub(
            "https://${BackupRestApi}.execute-api.${AWS::Region}.amazonaws.com/prod/backup",
        ),
        security_group_id,
    })
}

fn access_log_format() -> serde_json::Value {
    json!(
        "{\"requestId\":\"$context.requestId\",\"ip\":\"$context.identity.sourceIp\",\"user\":\"$context.identity.user\",\"requestTime\":\"$context.requestTime\",\"httpMethod\":\"$context.httpMethod\",\"resourcePath\":\"$context.resourcePath\",\"status\":\"$context.status\",\"protocol\":\"$context.protocol\",\"responseLength\":\"$context.responseLength\"}"
    )
}

//! Network unit: VPC, subnets, flow logs, and private service endpoints.
//!
//! Creates a two-AZ network with one public and one private /24 tier per
//! zone, or imports an existing network when an id is configured. Either
//! way the unit attaches flow logging and the five service endpoints the
//! pipeline needs (Secrets Manager, ECR, ECR Docker, API Gateway, S3).

use serde_json::json;

use backhaul_common::constants::{AZ_COUNT, FLOW_LOG_RETENTION_DAYS, SUBNET_PREFIX};
use backhaul_common::error::Result;
use backhaul_common::types::CidrBlock;
use backhaul_synth::context::SynthContext;
use backhaul_synth::exemption::RuleExemption;
use backhaul_synth::template::{DeletionPolicy, Parameter, Resource};
use backhaul_synth::token::Token;

/// Inputs of the network unit.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Name prefix for network resources.
    pub app_name: String,
    /// CIDR block of the created network; falls back to the documented
    /// default when absent. Ignored when importing.
    pub cidr: Option<CidrBlock>,
    /// Id of an existing network to import instead of creating one. No
    /// shape validation is performed; an inconsistent network surfaces
    /// at deploy time.
    pub existing_vpc_id: Option<String>,
}

/// The private subnet ids of a network.
///
/// A created network knows its subnets as explicit `Ref` tokens. An
/// imported network defers them to a deployment-time list parameter.
#[derive(Debug, Clone)]
pub enum SubnetIds {
    /// Subnets created by this unit.
    Created(Vec<Token>),
    /// `Ref` to a `List<AWS::EC2::Subnet::Id>` parameter.
    Imported(Token),
}

impl SubnetIds {
    /// The subnet ids as a CloudFormation list value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Created(tokens) => json!(tokens),
            Self::Imported(token) => token.to_json(),
        }
    }

    /// The subnet ids comma-joined into one string value.
    #[must_use]
    pub fn joined(&self) -> serde_json::Value {
        match self {
            Self::Created(tokens) => json!({ "Fn::Join": [",", tokens] }),
            Self::Imported(token) => json!({ "Fn::Join": [",", token.to_json()] }),
        }
    }
}

/// Resolved handles produced by the network unit.
#[derive(Debug, Clone)]
pub struct NetworkOutputs {
    /// The network id: a `Ref` when created, a literal when imported.
    pub vpc_id: Token,
    /// Private subnet ids.
    pub private_subnet_ids: SubnetIds,
    /// Id of the API Gateway interface endpoint.
    pub api_gateway_endpoint_id: Token,
}

/// Provisions the network unit.
///
/// # Errors
///
/// Returns an error if the configured CIDR cannot be carved into the
/// subnet tiers or a logical id collides.
pub fn provision(ctx: &mut SynthContext, config: &NetworkConfig) -> Result<NetworkOutputs> {
    ctx.exempt(RuleExemption::new(
        "CdkNagValidationFailure",
        "Interface endpoint validation warnings are not applicable.",
    ));

    let (vpc_id, private_subnet_ids) = if let Some(existing) = &config.existing_vpc_id {
        import_network(ctx, existing)?
    } else {
        create_network(ctx, config)?
    };

    provision_flow_logs(ctx, &config.app_name, &vpc_id)?;

    let api_gateway_endpoint =
        interface_endpoint(ctx, "ApiGatewayEndpoint", "execute-api", &vpc_id, &private_subnet_ids)?;
    let _ = interface_endpoint(
        ctx,
        "SecretsManagerEndpoint",
        "secretsmanager",
        &vpc_id,
        &private_subnet_ids,
    )?;
    let _ = interface_endpoint(ctx, "EcrEndpoint", "ecr.api", &vpc_id, &private_subnet_ids)?;
    let _ = interface_endpoint(ctx, "EcrDockerEndpoint", "ecr.dkr", &vpc_id, &private_subnet_ids)?;

    Ok(NetworkOutputs {
        vpc_id,
        private_subnet_ids,
        api_gateway_endpoint_id: api_gateway_endpoint.reference(),
    })
}

fn import_network(ctx: &mut SynthContext, existing_id: &str) -> Result<(Token, SubnetIds)> {
    let subnet_param = ctx.parameter(
        "ExistingPrivateSubnetIds",
        Parameter::subnet_id_list("Private subnet ids of the imported network."),
    )?;
    // Without route table ids the gateway endpoint is declared but not
    // routed; associating it is left to the imported network's owner.
    let _ = ctx.resource(
        "S3GatewayEndpoint",
        Resource::new(
            "AWS::EC2::VPCEndpoint",
            json!({
                "VpcEndpointType": "Gateway",
                "ServiceName": Token::sub("com.amazonaws.${AWS::Region}.s3"),
                "VpcId": existing_id,
            }),
        ),
    )?;
    Ok((
        Token::from(existing_id),
        SubnetIds::Imported(subnet_param),
    ))
}

fn create_network(ctx: &mut SynthContext, config: &NetworkConfig) -> Result<(Token, SubnetIds)> {
    let cidr = match config.cidr {
        Some(cidr) => cidr,
        None => backhaul_common::constants::DEFAULT_VPC_CIDR.parse()?,
    };

    let vpc = ctx.resource(
        "Vpc",
        Resource::new(
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": cidr.to_string(),
                "EnableDnsSupport": true,
                "EnableDnsHostnames": true,
                "Tags": [{ "Key": "Name", "Value": config.app_name }],
            }),
        ),
    )?;
    let vpc_id = vpc.reference();

    let igw = ctx.resource(
        "InternetGateway",
        Resource::new("AWS::EC2::InternetGateway", json!({})),
    )?;
    let attachment = ctx.resource(
        "GatewayAttachment",
        Resource::new(
            "AWS::EC2::VPCGatewayAttachment",
            json!({ "VpcId": vpc_id, "InternetGatewayId": igw.reference() }),
        ),
    )?;

    let mut public_subnets = Vec::new();
    let mut private_subnets = Vec::new();
    for az in 0..AZ_COUNT {
        let public = ctx.resource(
            format!("PublicSubnet{}", az + 1),
            Resource::new(
                "AWS::EC2::Subnet",
                json!({
                    "VpcId": vpc_id,
                    "CidrBlock": cidr.subnet(az, SUBNET_PREFIX)?.to_string(),
                    "AvailabilityZone": Token::AvailabilityZone(az),
                    "MapPublicIpOnLaunch": false,
                    "Tags": [{ "Key": "Name", "Value": format!("{}-public-{}", config.app_name, az + 1) }],
                }),
            ),
        )?;
        public_subnets.push(public);

        let private = ctx.resource(
            format!("PrivateSubnet{}", az + 1),
            Resource::new(
                "AWS::EC2::Subnet",
                json!({
                    "VpcId": vpc_id,
                    "CidrBlock": cidr.subnet(AZ_COUNT + az, SUBNET_PREFIX)?.to_string(),
                    "AvailabilityZone": Token::AvailabilityZone(az),
                    "Tags": [{ "Key": "Name", "Value": format!("{}-private-{}", config.app_name, az + 1) }],
                }),
            ),
        )?;
        private_subnets.push(private);
    }

    let public_rt = ctx.resource(
        "PublicRouteTable",
        Resource::new("AWS::EC2::RouteTable", json!({ "VpcId": vpc_id })),
    )?;
    let public_route = ctx.resource(
        "PublicDefaultRoute",
        Resource::new(
            "AWS::EC2::Route",
            json!({
                "RouteTableId": public_rt.reference(),
                "DestinationCidrBlock": "0.0.0.0/0",
                "GatewayId": igw.reference(),
            }),
        ),
    )?;
    ctx.depends_on(&public_route, &attachment)?;

    let nat_eip = ctx.resource(
        "NatEip",
        Resource::new("AWS::EC2::EIP", json!({ "Domain": "vpc" })),
    )?;
    let nat = ctx.resource(
        "NatGateway",
        Resource::new(
            "AWS::EC2::NatGateway",
            json!({
                "SubnetId": public_subnets[0].reference(),
                "AllocationId": nat_eip.att("AllocationId"),
            }),
        ),
    )?;
    ctx.depends_on(&nat, &attachment)?;

    let private_rt = ctx.resource(
        "PrivateRouteTable",
        Resource::new("AWS::EC2::RouteTable", json!({ "VpcId": vpc_id })),
    )?;
    let _ = ctx.resource(
        "PrivateDefaultRoute",
        Resource::new(
            "AWS::EC2::Route",
            json!({
                "RouteTableId": private_rt.reference(),
                "DestinationCidrBlock": "0.0.0.0/0",
                "NatGatewayId": nat.reference(),
            }),
        ),
    )?;

    for (index, subnet) in public_subnets.iter().enumerate() {
        let _ = ctx.resource(
            format!("PublicSubnetRouteAssociation{}", index + 1),
            Resource::new(
                "AWS::EC2::SubnetRouteTableAssociation",
                json!({
                    "SubnetId": subnet.reference(),
                    "RouteTableId": public_rt.reference(),
                }),
            ),
        )?;
    }
    for (index, subnet) in private_subnets.iter().enumerate() {
        let _ = ctx.resource(
            format!("PrivateSubnetRouteAssociation{}", index + 1),
            Resource::new(
                "AWS::EC2::SubnetRouteTableAssociation",
                json!({
                    "SubnetId": subnet.reference(),
                    "RouteTableId": private_rt.reference(),
                }),
            ),
        )?;
    }

    let _ = ctx.resource(
        "S3GatewayEndpoint",
        Resource::new(
            "AWS::EC2::VPCEndpoint",
            json!({
                "VpcEndpointType": "Gateway",
                "ServiceName": Token::sub("com.amazonaws.${AWS::Region}.s3"),
                "VpcId": vpc_id,
                "RouteTableIds": [private_rt.reference()],
            }),
        ),
    )?;

    let subnet_ids = private_subnets.iter().map(|s| s.reference()).collect();
    Ok((vpc_id, SubnetIds::Created(subnet_ids)))
}

fn provision_flow_logs(ctx: &mut SynthContext, app_name: &str, vpc_id: &Token) -> Result<()> {
    let log_group = ctx.resource(
        "FlowLogGroup",
        Resource::new(
            "AWS::Logs::LogGroup",
            json!({
                "LogGroupName": format!("{app_name}-flow-logs-group"),
                "RetentionInDays": FLOW_LOG_RETENTION_DAYS,
            }),
        )
        .with_deletion_policy(DeletionPolicy::Delete),
    )?;

    let role = ctx.resource(
        "FlowLogRole",
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "vpc-flow-logs.amazonaws.com" },
                        "Action": "sts:AssumeRole",
                    }],
                },
                "Policies": [{
                    "PolicyName": "flow-log-delivery",
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Action": [
                                "logs:CreateLogStream",
                                "logs:PutLogEvents",
                                "logs:DescribeLogGroups",
                                "logs:DescribeLogStreams",
                            ],
                            "Resource": log_group.att("Arn"),
                        }],
                    },
                }],
            }),
        ),
    )?;

    let _ = ctx.resource(
        "VpcFlowLog",
        Resource::new(
            "AWS::EC2::FlowLog",
            json!({
                "ResourceType": "VPC",
                "ResourceId": vpc_id,
                "TrafficType": "ALL",
                "LogDestinationType": "cloud-watch-logs",
                "LogGroupName": log_group.reference(),
                "DeliverLogsPermissionArn": role.att("Arn"),
            }),
        ),
    )?;
    Ok(())
}

fn interface_endpoint(
    ctx: &mut SynthContext,
    logical_id: &str,
    service: &str,
    vpc_id: &Token,
    subnets: &SubnetIds,
) -> Result<backhaul_synth::context::ResourceHandle> {
    ctx.resource(
        logical_id,
        Resource::new(
            "AWS::EC2::VPCEndpoint",
            json!({
                "VpcEndpointType": "Interface",
                "ServiceName": Token::sub(format!("com.amazonaws.${{AWS::Region}}.{service}")),
                "VpcId": vpc_id,
                "SubnetIds": subnets.to_json(),
                "PrivateDnsEnabled": true,
            }),
        ),
    )
}

//! End-to-end assertions over the synthesized pipeline template.

use backhaul_common::config::PipelineConfig;
use backhaul_common::types::{TaskCpu, TaskMemory};
use backhaul_stacks::pipeline;

fn synth(config: &PipelineConfig) -> serde_json::Value {
    pipeline::synthesize(config)
        .expect("synthesizes")
        .to_value()
        .expect("serializes")
}

fn resources_of_type<'a>(
    value: &'a serde_json::Value,
    resource_type: &str,
) -> Vec<(&'a String, &'a serde_json::Value)> {
    value["Resources"]
        .as_object()
        .expect("resources")
        .iter()
        .filter(|(_, r)| r["Type"] == resource_type)
        .collect()
}

#[test]
fn default_pipeline_declares_all_four_outputs() {
    let value = synth(&PipelineConfig::default());
    for output in ["ApiUrl", "EcsRoleName", "SecurityGroupId", "S3Bucket"] {
        assert!(
            value["Outputs"][output].is_object(),
            "missing output {output}"
        );
    }
    assert!(value["Outputs"]["ApiUrl"]["Value"]["Fn::Sub"]
        .as_str()
        .expect("sub")
        .ends_with("/prod/backup"));
}

#[test]
fn every_allowed_cpu_value_is_reproduced_exactly() {
    for cpu in TaskCpu::ALL {
        let config = PipelineConfig {
            task_cpu: cpu,
            ..PipelineConfig::default()
        };
        let value = synth(&config);
        assert_eq!(
            value["Resources"]["BackupTaskDefinition"]["Properties"]["Cpu"],
            cpu.as_str(),
            "cpu {cpu} not reproduced"
        );
    }
}

#[test]
fn every_allowed_memory_value_is_reproduced_exactly() {
    for memory in TaskMemory::ALL {
        let config = PipelineConfig {
            task_memory: memory,
            ..PipelineConfig::default()
        };
        let value = synth(&config);
        assert_eq!(
            value["Resources"]["BackupTaskDefinition"]["Properties"]["Memory"],
            memory.as_str(),
            "memory {memory} not reproduced"
        );
    }
}

#[test]
fn bucket_lockdown_is_independent_of_configuration() {
    for config in [
        PipelineConfig::default(),
        PipelineConfig {
            existing_vpc_id: Some("vpc-0123456789abcdef0".to_owned()),
            bucket_suffix: "other-suffix".to_owned(),
            ..PipelineConfig::default()
        },
    ] {
        let value = synth(&config);
        let bucket = &value["Resources"]["BackupBucket"];
        let block = &bucket["Properties"]["PublicAccessBlockConfiguration"];
        assert_eq!(block["BlockPublicAcls"], true);
        assert_eq!(block["BlockPublicPolicy"], true);
        assert_eq!(block["IgnorePublicAcls"], true);
        assert_eq!(block["RestrictPublicBuckets"], true);
        assert_eq!(
            bucket["Properties"]["LifecycleConfiguration"]["Rules"][0]["ExpirationInDays"],
            1
        );
        let policy_statement = &value["Resources"]["BackupBucketPolicy"]["Properties"]
            ["PolicyDocument"]["Statement"][0];
        assert_eq!(
            policy_statement["Condition"]["Bool"]["aws:SecureTransport"],
            "false"
        );
    }
}

#[test]
fn front_door_policy_pins_the_api_gateway_endpoint() {
    let value = synth(&PipelineConfig::default());
    let statements = value["Resources"]["BackupRestApi"]["Properties"]["Policy"]["Statement"]
        .as_array()
        .expect("statements");
    assert_eq!(statements.len(), 2);
    let deny = &statements[0];
    let allow = &statements[1];
    assert_eq!(deny["Effect"], "Deny");
    assert_eq!(
        deny["Condition"]["StringNotEquals"]["aws:SourceVpce"],
        serde_json::json!({ "Ref": "ApiGatewayEndpoint" })
    );
    assert_eq!(allow["Effect"], "Allow");
    assert!(allow.get("Condition").is_none());
}

#[test]
fn invalid_receiver_email_is_skipped_not_fatal() {
    let config = PipelineConfig {
        receiver_emails: vec![
            "a@x.com".to_owned(),
            "not-an-email".to_owned(),
            "b@x.com".to_owned(),
        ],
        ..PipelineConfig::default()
    };
    let value = synth(&config);
    let subscriptions = resources_of_type(&value, "AWS::SNS::Subscription");
    assert_eq!(subscriptions.len(), 2);
    let endpoints: Vec<&str> = subscriptions
        .iter()
        .filter_map(|(_, r)| r["Properties"]["Endpoint"].as_str())
        .collect();
    assert!(endpoints.contains(&"a@x.com"));
    assert!(endpoints.contains(&"b@x.com"));
}

#[test]
fn existing_network_id_suppresses_network_creation() {
    let config = PipelineConfig {
        existing_vpc_id: Some("vpc-0123456789abcdef0".to_owned()),
        ..PipelineConfig::default()
    };
    let value = synth(&config);
    assert!(resources_of_type(&value, "AWS::EC2::VPC").is_empty());
    assert!(resources_of_type(&value, "AWS::EC2::Subnet").is_empty());
    assert!(resources_of_type(&value, "AWS::EC2::NatGateway").is_empty());
    // Units downstream see the literal id.
    assert_eq!(
        value["Resources"]["LauncherSecurityGroup"]["Properties"]["VpcId"],
        "vpc-0123456789abcdef0"
    );
    assert!(value["Parameters"]["ExistingPrivateSubnetIds"].is_object());
}

#[test]
fn missing_cidr_and_network_id_fall_back_to_default_cidr() {
    let value = synth(&PipelineConfig::default());
    assert_eq!(
        value["Resources"]["Vpc"]["Properties"]["CidrBlock"],
        "10.192.0.0/16"
    );
}

#[test]
fn configured_cidr_overrides_the_default() {
    let config = PipelineConfig {
        vpc_cidr: Some("172.16.0.0/16".parse().expect("valid")),
        ..PipelineConfig::default()
    };
    let value = synth(&config);
    assert_eq!(
        value["Resources"]["Vpc"]["Properties"]["CidrBlock"],
        "172.16.0.0/16"
    );
    assert_eq!(
        value["Resources"]["PublicSubnet1"]["Properties"]["CidrBlock"],
        "172.16.0.0/24"
    );
}

#[test]
fn rule_exemptions_surface_in_template_metadata() {
    let value = synth(&PipelineConfig::default());
    let exemptions = value["Metadata"]["RuleExemptions"]
        .as_array()
        .expect("exemptions");
    let rule_ids: Vec<&str> = exemptions
        .iter()
        .filter_map(|e| e["RuleId"].as_str())
        .collect();
    for expected in ["AwsSolutions-SNS2", "AwsSolutions-S1", "AwsSolutions-IAM5"] {
        assert!(rule_ids.contains(&expected), "missing exemption {expected}");
    }
    assert!(exemptions.iter().all(|e| e["Reason"].is_string()));
}

#[test]
fn synthesis_is_deterministic() {
    let config = PipelineConfig {
        receiver_emails: vec!["ops@example.com".to_owned()],
        ..PipelineConfig::default()
    };
    let first = pipeline::synthesize(&config)
        .expect("synthesizes")
        .to_json_pretty()
        .expect("serializes");
    let second = pipeline::synthesize(&config)
        .expect("synthesizes")
        .to_json_pretty()
        .expect("serializes");
    assert_eq!(first, second);
}

#[test]
fn task_launch_wiring_matches_across_units() {
    let value = synth(&PipelineConfig::default());
    let vars = &value["Resources"]["LauncherFunction"]["Properties"]["Environment"]["Variables"];
    assert_eq!(
        vars["ECS_CLUSTER"],
        serde_json::json!({ "Fn::GetAtt": ["EcsCluster", "Arn"] })
    );
    assert_eq!(
        vars["ECS_TASK_DEFINITION"],
        serde_json::json!({ "Ref": "BackupTaskDefinition" })
    );
    let container = &value["Resources"]["BackupTaskDefinition"]["Properties"]
        ["ContainerDefinitions"][0];
    assert_eq!(vars["ECS_TASK_CONTAINER_NAME"], container["Name"]);
}

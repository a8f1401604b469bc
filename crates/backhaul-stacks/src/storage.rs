//! Storage unit: the private, encrypted, auto-expiring backup bucket.
//!
//! Policy is static: public access fully blocked, SSE-S3 encryption,
//! TLS-only access, versioning off, all objects expired after one day,
//! and the bucket is destroyed with the stack.

use serde_json::json;

use backhaul_common::constants::BUCKET_EXPIRATION_DAYS;
use backhaul_common::error::Result;
use backhaul_synth::context::SynthContext;
use backhaul_synth::exemption::RuleExemption;
use backhaul_synth::template::{DeletionPolicy, Resource};
use backhaul_synth::token::Token;

/// Resolved handles produced by the storage unit.
#[derive(Debug, Clone)]
pub struct StorageOutputs {
    /// Name of the backup bucket.
    pub bucket_name: Token,
    /// ARN of the backup bucket.
    pub bucket_arn: Token,
}

/// Provisions the storage unit.
///
/// # Errors
///
/// Returns an error if a logical id collides.
pub fn provision(
    ctx: &mut SynthContext,
    app_name: &str,
    bucket_suffix: &str,
) -> Result<StorageOutputs> {
    ctx.exempt(RuleExemption::new(
        "AwsSolutions-S1",
        "No access logs needed for this bucket.",
    ));

    let bucket = ctx.resource(
        "BackupBucket",
        Resource::new(
            "AWS::S3::Bucket",
            json!({
                "BucketName": format!("{app_name}-{bucket_suffix}").to_lowercase(),
                "PublicAccessBlockConfiguration": {
                    "BlockPublicAcls": true,
                    "BlockPublicPolicy": true,
                    "IgnorePublicAcls": true,
                    "RestrictPublicBuckets": true,
                },
                "BucketEncryption": {
                    "ServerSideEncryptionConfiguration": [{
                        "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" },
                    }],
                },
                "LifecycleConfiguration": {
                    "Rules": [{
                        "Id": "expire-backups",
                        "Status": "Enabled",
                        "ExpirationInDays": BUCKET_EXPIRATION_DAYS,
                    }],
                },
            }),
        )
        .with_deletion_policy(DeletionPolicy::Delete),
    )?;

    let _ = ctx.resource(
        "BackupBucketPolicy",
        Resource::new(
            "AWS::S3::BucketPolicy",
            json!({
                "Bucket": bucket.reference(),
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Sid": "DenyInsecureTransport",
                        "Effect": "Deny",
                        "Principal": { "AWS": "*" },
                        "Action": "s3:*",
                        "Resource": [
                            bucket.att("Arn"),
                            Token::sub("${BackupBucket.Arn}/*"),
                        ],
                        "Condition": { "Bool": { "aws:SecureTransport": "false" } },
                    }],
                },
            }),
        ),
    )?;

    Ok(StorageOutputs {
        bucket_name: bucket.reference(),
        bucket_arn: bucket.att("Arn"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth(app_name: &str, suffix: &str) -> serde_json::Value {
        let mut ctx = SynthContext::new("storage test");
        let _ = provision(&mut ctx, app_name, suffix).expect("provisions");
        ctx.synth()
            .expect("synthesizes")
            .to_value()
            .expect("serializes")
    }

    #[test]
    fn public_access_is_fully_blocked() {
        let value = synth("test", "export-bucket");
        let block = &value["Resources"]["BackupBucket"]["Properties"]
            ["PublicAccessBlockConfiguration"];
        for flag in [
            "BlockPublicAcls",
            "BlockPublicPolicy",
            "IgnorePublicAcls",
            "RestrictPublicBuckets",
        ] {
            assert_eq!(block[flag], true, "flag {flag} not set");
        }
    }

    #[test]
    fn objects_expire_after_one_day() {
        let value = synth("test", "export-bucket");
        let rule =
            &value["Resources"]["BackupBucket"]["Properties"]["LifecycleConfiguration"]["Rules"][0];
        assert_eq!(rule["ExpirationInDays"], 1);
        assert_eq!(rule["Status"], "Enabled");
    }

    #[test]
    fn tls_only_policy_denies_insecure_transport() {
        let value = synth("test", "export-bucket");
        let statement =
            &value["Resources"]["BackupBucketPolicy"]["Properties"]["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Effect"], "Deny");
        assert_eq!(
            statement["Condition"]["Bool"]["aws:SecureTransport"],
            "false"
        );
    }

    #[test]
    fn bucket_name_is_lowercased() {
        let value = synth("MyApp", "Export-Bucket");
        assert_eq!(
            value["Resources"]["BackupBucket"]["Properties"]["BucketName"],
            "myapp-export-bucket"
        );
    }

    #[test]
    fn bucket_is_destroyed_on_teardown() {
        let value = synth("test", "export-bucket");
        assert_eq!(value["Resources"]["BackupBucket"]["DeletionPolicy"], "Delete");
        assert!(value["Resources"]["BackupBucket"]["Properties"]
            .get("VersioningConfiguration")
            .is_none());
    }
}

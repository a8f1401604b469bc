//! Pipeline-wide constants and fixed policy values.

/// Application name used for stack naming and CLI output.
pub const APP_NAME: &str = "backhaul";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "backhaul";

/// CIDR block used when neither a CIDR nor an existing network id is
/// configured.
pub const DEFAULT_VPC_CIDR: &str = "10.192.0.0/16";

/// Number of availability zones the created network spans.
pub const AZ_COUNT: u32 = 2;

/// Prefix length of each subnet tier carved out of the VPC block.
pub const SUBNET_PREFIX: u8 = 24;

/// Retention of VPC flow logs, in days.
pub const FLOW_LOG_RETENTION_DAYS: u32 = 30;

/// Retention of the ECS task log group, in days.
pub const CLUSTER_LOG_RETENTION_DAYS: u32 = 7;

/// Retention of the launcher function's log group, in days.
pub const LAUNCHER_LOG_RETENTION_DAYS: u32 = 7;

/// Retention of API Gateway access logs, in days.
pub const API_ACCESS_LOG_RETENTION_DAYS: u32 = 30;

/// Days after which backup objects expire from the bucket.
pub const BUCKET_EXPIRATION_DAYS: u32 = 1;

/// Default suffix of the backup bucket name.
pub const DEFAULT_BUCKET_SUFFIX: &str = "export-bucket";

/// Launcher function memory, in MiB.
pub const LAUNCHER_MEMORY_MIB: u32 = 128;

/// Launcher function timeout, in seconds.
pub const LAUNCHER_TIMEOUT_SECONDS: u32 = 20;

/// Generated API key length, in characters.
pub const API_KEY_LENGTH: u32 = 20;

/// Characters excluded from the generated API key on top of punctuation.
pub const API_KEY_EXCLUDED_CHARS: &str = "/'";

/// Steady-state request rate allowed by the usage plan, per second.
pub const USAGE_PLAN_RATE_LIMIT: u32 = 10;

/// Burst size allowed by the usage plan.
pub const USAGE_PLAN_BURST_LIMIT: u32 = 2;

/// Requests per day allowed by the usage plan quota.
pub const USAGE_PLAN_DAILY_QUOTA: u32 = 100;

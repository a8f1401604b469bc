//! Deployment-time parameter model for the backup pipeline.
//!
//! Every field is resolved once before synthesis; nothing here is
//! reconfigurable at runtime.

use serde::{Deserialize, Serialize};

use crate::types::{CidrBlock, TaskCpu, TaskMemory};

/// Resolved deployment-time parameters for one pipeline synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name prefix applied to stack resources.
    pub app_name: String,
    /// CIDR block of the created network. Ignored when
    /// `existing_vpc_id` is set; defaults to
    /// [`crate::constants::DEFAULT_VPC_CIDR`] when absent.
    pub vpc_cidr: Option<CidrBlock>,
    /// Id of an existing network to import instead of creating one.
    pub existing_vpc_id: Option<String>,
    /// CPU units for the backup task.
    pub task_cpu: TaskCpu,
    /// Memory size for the backup task.
    pub task_memory: TaskMemory,
    /// Raw receiver email list; invalid entries are skipped during
    /// synthesis, not rejected here.
    pub receiver_emails: Vec<String>,
    /// Suffix of the backup bucket name.
    pub bucket_suffix: String,
    /// Target region.
    pub region: String,
    /// Target account id.
    pub account_id: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            app_name: crate::constants::APP_NAME.to_owned(),
            vpc_cidr: None,
            existing_vpc_id: None,
            task_cpu: TaskCpu::default(),
            task_memory: TaskMemory::default(),
            receiver_emails: Vec::new(),
            bucket_suffix: crate::constants::DEFAULT_BUCKET_SUFFIX.to_owned(),
            region: "us-east-1".to_owned(),
            account_id: "000000000000".to_owned(),
        }
    }
}

/// Splits a comma-separated receiver list into trimmed entries,
/// dropping empty segments.
#[must_use]
pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

//! # backhaul-stacks
//!
//! The five composition units of the backup pipeline, plus the top-level
//! pipeline that wires them together:
//!
//! - **network**: VPC (created or imported), flow logs, private service
//!   endpoints.
//! - **cluster**: ECS cluster and task log group.
//! - **storage**: locked-down, auto-expiring backup bucket.
//! - **task**: IAM roles, notification topic, Fargate task definition.
//! - **frontdoor**: private REST API, launcher function, API key and
//!   usage plan.
//!
//! Units communicate exclusively through resolved output handles; the
//! pipeline instantiates them in dependency order against one
//! [`backhaul_synth::context::SynthContext`].

pub mod cluster;
pub mod frontdoor;
pub mod network;
pub mod pipeline;
pub mod storage;
pub mod task;

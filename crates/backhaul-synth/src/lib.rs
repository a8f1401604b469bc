//! # backhaul-synth
//!
//! Typed CloudFormation template model and the synthesis context that
//! composition units register resources into.
//!
//! Handles:
//! - **Token**: typed intrinsic references (`Ref`, `Fn::GetAtt`, ...)
//!   resolved at composition time.
//! - **Template**: parameters, resources, outputs, and metadata with
//!   deterministic JSON output.
//! - **Context**: the explicit build context finalized by one
//!   [`context::SynthContext::synth`] pass — no implicit global registry.
//! - **Graph**: resource dependency ordering and cycle detection.
//! - **Exemption**: typed policy-rule exemption records.

pub mod context;
pub mod exemption;
pub mod graph;
pub mod template;
pub mod token;

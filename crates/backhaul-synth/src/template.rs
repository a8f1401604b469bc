//! CloudFormation template model with deterministic JSON output.
//!
//! Sections are `BTreeMap`-ordered so two syntheses of the same
//! configuration produce byte-identical templates.

use std::collections::BTreeMap;

use serde::Serialize;

use backhaul_common::error::Result;

use crate::exemption::RuleExemption;
use crate::token::Token;

/// Template format version emitted in every synthesized template.
pub const FORMAT_VERSION: &str = "2010-09-09";

/// A deployment-time template parameter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    /// CloudFormation parameter type, e.g. `String`.
    #[serde(rename = "Type")]
    pub parameter_type: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Parameter {
    /// A `String` parameter with the given description.
    #[must_use]
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            parameter_type: "String".to_owned(),
            description: Some(description.into()),
            default: None,
        }
    }

    /// A `List<AWS::EC2::Subnet::Id>` parameter with the given
    /// description.
    #[must_use]
    pub fn subnet_id_list(description: impl Into<String>) -> Self {
        Self {
            parameter_type: "List<AWS::EC2::Subnet::Id>".to_owned(),
            description: Some(description.into()),
            default: None,
        }
    }
}

/// A declared stack output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Output value.
    pub value: Token,
}

impl Output {
    /// An output with a description.
    #[must_use]
    pub fn new(description: impl Into<String>, value: Token) -> Self {
        Self {
            description: Some(description.into()),
            value,
        }
    }
}

/// Behavior on stack teardown for resources that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeletionPolicy {
    /// Destroy the resource with the stack.
    Delete,
    /// Keep the resource after the stack is destroyed.
    Retain,
}

/// A declared resource.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    /// CloudFormation resource type, e.g. `AWS::EC2::VPC`.
    #[serde(rename = "Type")]
    pub resource_type: String,
    /// Resource properties as CloudFormation JSON.
    pub properties: serde_json::Value,
    /// Explicit ordering edges on top of intrinsic references.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Teardown behavior, when it differs from the provider default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
}

impl Resource {
    /// A resource of `resource_type` with the given properties.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, properties: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
        }
    }

    /// Sets the teardown behavior.
    #[must_use]
    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self
    }

    /// Logical ids of resources this resource references through
    /// intrinsics, plus its explicit `DependsOn` entries.
    #[must_use]
    pub fn referenced_ids(&self) -> Vec<String> {
        let mut ids = self.depends_on.clone();
        collect_refs(&self.properties, &mut ids);
        ids.sort();
        ids.dedup();
        ids
    }
}

fn collect_refs(value: &serde_json::Value, ids: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            if map.len() == 1 {
                if let Some(serde_json::Value::String(id)) = map.get("Ref") {
                    ids.push(id.clone());
                    return;
                }
                if let Some(serde_json::Value::Array(args)) = map.get("Fn::GetAtt") {
                    if let Some(serde_json::Value::String(id)) = args.first() {
                        ids.push(id.clone());
                        return;
                    }
                }
                match map.get("Fn::Sub") {
                    Some(serde_json::Value::String(template)) => {
                        collect_sub_refs(template, ids);
                        return;
                    }
                    Some(serde_json::Value::Array(args)) => {
                        if let Some(serde_json::Value::String(template)) = args.first() {
                            collect_sub_refs(template, ids);
                        }
                        if let Some(variables) = args.get(1) {
                            collect_refs(variables, ids);
                        }
                        return;
                    }
                    _ => {}
                }
            }
            for nested in map.values() {
                collect_refs(nested, ids);
            }
        }
        serde_json::Value::Array(items) => {
            for nested in items {
                collect_refs(nested, ids);
            }
        }
        _ => {}
    }
}

// `${Name}` and `${Name.Attr}` inside a `Fn::Sub` string are implicit
// references; `${!...}` is an escaped literal and `AWS::*` pseudo
// parameters are not resources.
fn collect_sub_refs(template: &str, ids: &mut Vec<String>) {
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start + 2..].find('}') else {
            break;
        };
        let token = &rest[start + 2..start + 2 + end];
        rest = &rest[start + 2 + end + 1..];
        if token.starts_with('!') || token.contains("::") {
            continue;
        }
        let id = match token.split_once('.') {
            Some((id, _attr)) => id,
            None => token,
        };
        if !id.is_empty() {
            ids.push(id.to_owned());
        }
    }
}

/// A synthesized CloudFormation template.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    /// Template format version.
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    /// Stack description.
    pub description: String,
    /// Deployment-time parameters.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,
    /// Declared resources, keyed by logical id.
    pub resources: BTreeMap<String, Resource>,
    /// Declared stack outputs.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
    /// Template metadata, including rule exemptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,
}

/// The `Metadata` section of a synthesized template.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateMetadata {
    /// Policy-rule exemptions granted during composition.
    pub rule_exemptions: Vec<RuleExemption>,
}

impl Template {
    /// Serializes the template to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serializes the template to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

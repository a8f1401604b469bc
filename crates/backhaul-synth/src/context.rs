//! The explicit synthesis context.
//!
//! Composition units receive a `&mut SynthContext`, register resources,
//! parameters, outputs, and rule exemptions, and hand resolved
//! [`Token`] handles to dependent units. A single [`SynthContext::synth`]
//! call validates the wiring and produces the final [`Template`].

use std::collections::BTreeMap;

use tracing::debug;

use backhaul_common::error::{BackhaulError, Result};

use crate::exemption::RuleExemption;
use crate::graph::ResourceGraph;
use crate::template::{
    DeletionPolicy, Output, Parameter, Resource, Template, TemplateMetadata, FORMAT_VERSION,
};
use crate::token::Token;

/// Handle to a registered resource.
///
/// Dependent units receive tokens derived from handles, never logical
/// ids to be looked up later.
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    logical_id: String,
}

impl ResourceHandle {
    /// The resource's logical id.
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// A `Ref` token for this resource.
    #[must_use]
    pub fn reference(&self) -> Token {
        Token::reference(&self.logical_id)
    }

    /// A `Fn::GetAtt` token on this resource.
    #[must_use]
    pub fn att(&self, attribute: impl Into<String>) -> Token {
        Token::get_att(&self.logical_id, attribute)
    }
}

/// Collects all declared resources for one synthesis pass.
#[derive(Debug)]
pub struct SynthContext {
    description: String,
    parameters: BTreeMap<String, Parameter>,
    resources: BTreeMap<String, Resource>,
    outputs: BTreeMap<String, Output>,
    exemptions: Vec<RuleExemption>,
}

impl SynthContext {
    /// Creates an empty context for a stack with the given description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            exemptions: Vec::new(),
        }
    }

    /// Registers a resource and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the logical id is already taken.
    pub fn resource(
        &mut self,
        logical_id: impl Into<String>,
        resource: Resource,
    ) -> Result<ResourceHandle> {
        let logical_id = logical_id.into();
        if self.resources.contains_key(&logical_id) || self.parameters.contains_key(&logical_id) {
            return Err(BackhaulError::DuplicateResource { logical_id });
        }
        debug!(logical_id = %logical_id, resource_type = %resource.resource_type, "declared resource");
        let _ = self.resources.insert(logical_id.clone(), resource);
        Ok(ResourceHandle { logical_id })
    }

    /// Registers a deployment-time parameter and returns its `Ref`
    /// token.
    ///
    /// # Errors
    ///
    /// Returns an error if the logical id is already taken.
    pub fn parameter(
        &mut self,
        logical_id: impl Into<String>,
        parameter: Parameter,
    ) -> Result<Token> {
        let logical_id = logical_id.into();
        if self.parameters.contains_key(&logical_id) || self.resources.contains_key(&logical_id) {
            return Err(BackhaulError::DuplicateResource { logical_id });
        }
        let _ = self.parameters.insert(logical_id.clone(), parameter);
        Ok(Token::reference(logical_id))
    }

    /// Declares a stack output.
    ///
    /// # Errors
    ///
    /// Returns an error if the output name is already taken.
    pub fn output(&mut self, name: impl Into<String>, output: Output) -> Result<()> {
        let name = name.into();
        if self.outputs.contains_key(&name) {
            return Err(BackhaulError::DuplicateResource { logical_id: name });
        }
        let _ = self.outputs.insert(name, output);
        Ok(())
    }

    /// Adds an explicit ordering edge: `dependent` waits for
    /// `dependency`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dependent resource is unknown.
    pub fn depends_on(&mut self, dependent: &ResourceHandle, dependency: &ResourceHandle) -> Result<()> {
        let resource = self
            .resources
            .get_mut(dependent.logical_id())
            .ok_or_else(|| BackhaulError::Config {
                message: format!("unknown resource: {}", dependent.logical_id()),
            })?;
        resource.depends_on.push(dependency.logical_id().to_owned());
        Ok(())
    }

    /// Attaches a policy-rule exemption record to the stack.
    pub fn exempt(&mut self, exemption: RuleExemption) {
        self.exemptions.push(exemption);
    }

    /// Marks a resource for destruction on stack teardown.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource is unknown.
    pub fn destroy_on_teardown(&mut self, handle: &ResourceHandle) -> Result<()> {
        let resource = self
            .resources
            .get_mut(handle.logical_id())
            .ok_or_else(|| BackhaulError::Config {
                message: format!("unknown resource: {}", handle.logical_id()),
            })?;
        resource.deletion_policy = Some(DeletionPolicy::Delete);
        Ok(())
    }

    /// Finalizes the context into a template.
    ///
    /// Validates that the resource graph is acyclic; ordering itself is
    /// left to the provisioning engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the declared resources form a dependency
    /// cycle.
    pub fn synth(self) -> Result<Template> {
        let graph = ResourceGraph::from_resources(&self.resources);
        let order = graph.deploy_order()?;
        debug!(resources = order.len(), "synthesized resource graph");

        let metadata = if self.exemptions.is_empty() {
            None
        } else {
            Some(TemplateMetadata {
                rule_exemptions: self.exemptions,
            })
        };
        Ok(Template {
            format_version: FORMAT_VERSION.to_owned(),
            description: self.description,
            parameters: self.parameters,
            resources: self.resources,
            outputs: self.outputs,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_logical_id_is_rejected() {
        let mut ctx = SynthContext::new("test");
        let _ = ctx
            .resource("Vpc", Resource::new("AWS::EC2::VPC", serde_json::json!({})))
            .expect("first registration");
        let result = ctx.resource("Vpc", Resource::new("AWS::EC2::VPC", serde_json::json!({})));
        assert!(matches!(
            result,
            Err(BackhaulError::DuplicateResource { logical_id }) if logical_id == "Vpc"
        ));
    }

    #[test]
    fn parameter_and_resource_share_one_namespace() {
        let mut ctx = SynthContext::new("test");
        let _ = ctx
            .parameter("Thing", Parameter::string("a thing"))
            .expect("parameter");
        let result = ctx.resource("Thing", Resource::new("AWS::SNS::Topic", serde_json::json!({})));
        assert!(result.is_err());
    }

    #[test]
    fn handle_tokens_point_at_logical_id() {
        let mut ctx = SynthContext::new("test");
        let vpc = ctx
            .resource("Vpc", Resource::new("AWS::EC2::VPC", serde_json::json!({})))
            .expect("registers");
        assert_eq!(vpc.reference().to_json(), serde_json::json!({ "Ref": "Vpc" }));
        assert_eq!(
            vpc.att("CidrBlock").to_json(),
            serde_json::json!({ "Fn::GetAtt": ["Vpc", "CidrBlock"] })
        );
    }

    #[test]
    fn synth_rejects_cyclic_wiring() {
        let mut ctx = SynthContext::new("test");
        let a = ctx
            .resource(
                "A",
                Resource::new("AWS::SNS::Topic", serde_json::json!({ "X": { "Ref": "B" } })),
            )
            .expect("registers");
        let b = ctx
            .resource("B", Resource::new("AWS::SNS::Topic", serde_json::json!({})))
            .expect("registers");
        ctx.depends_on(&b, &a).expect("edge");

        assert!(matches!(
            ctx.synth(),
            Err(BackhaulError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn synth_emits_exemptions_under_metadata() {
        let mut ctx = SynthContext::new("test");
        ctx.exempt(RuleExemption::new("RULE-1", "not applicable"));
        let template = ctx.synth().expect("synthesizes");
        let value = template.to_value().expect("serializes");
        assert_eq!(value["Metadata"]["RuleExemptions"][0]["RuleId"], "RULE-1");
    }

    #[test]
    fn destroy_on_teardown_sets_deletion_policy() {
        let mut ctx = SynthContext::new("test");
        let bucket = ctx
            .resource("Bucket", Resource::new("AWS::S3::Bucket", serde_json::json!({})))
            .expect("registers");
        ctx.destroy_on_teardown(&bucket).expect("known resource");
        let template = ctx.synth().expect("synthesizes");
        assert_eq!(
            template.resources["Bucket"].deletion_policy,
            Some(DeletionPolicy::Delete)
        );
    }
}

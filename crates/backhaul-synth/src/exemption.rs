//! Typed policy-rule exemption records.
//!
//! Units that knowingly deviate from a compliance rule attach a
//! structured record naming the rule and the justification instead of
//! side-channel annotations. The context emits all records under the
//! template's `Metadata` section so reviewers see them next to the
//! resources they cover.

use serde::Serialize;

/// One granted exemption from a compliance rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleExemption {
    /// Identifier of the exempted rule.
    pub rule_id: String,
    /// Why the rule does not apply here.
    pub reason: String,
}

impl RuleExemption {
    /// Creates an exemption record.
    #[must_use]
    pub fn new(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }
}

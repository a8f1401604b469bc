//! Typed CloudFormation intrinsic references.
//!
//! Every cross-unit handle in the pipeline is a [`Token`]: either a
//! literal value or an intrinsic that CloudFormation resolves at deploy
//! time. Tokens are produced when a unit registers a resource and passed
//! to dependent units by value, so all wiring is complete before the
//! template is synthesized.

use serde::{Serialize, Serializer};

/// A value inside a template: a literal or an intrinsic reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A plain string value.
    Literal(String),
    /// `{"Ref": "<logical id>"}`.
    Ref(String),
    /// `{"Fn::GetAtt": ["<logical id>", "<attribute>"]}`.
    GetAtt {
        /// Logical id of the referenced resource.
        logical_id: String,
        /// Attribute name, e.g. `Arn`.
        attribute: String,
    },
    /// `{"Fn::Sub": "<template string>"}`.
    Sub(String),
    /// `{"Fn::Join": ["<separator>", [...]]}`.
    Join {
        /// Separator inserted between parts.
        separator: String,
        /// Joined parts, in order.
        parts: Vec<Token>,
    },
    /// `{"Fn::Select": [<index>, {"Fn::GetAZs": ""}]}` — the `index`-th
    /// availability zone of the target region.
    AvailabilityZone(u32),
}

impl Token {
    /// A `Ref` to the given logical id.
    #[must_use]
    pub fn reference(logical_id: impl Into<String>) -> Self {
        Self::Ref(logical_id.into())
    }

    /// A `Fn::GetAtt` on the given logical id.
    #[must_use]
    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::GetAtt {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    /// A `Fn::Sub` over the given template string.
    #[must_use]
    pub fn sub(template: impl Into<String>) -> Self {
        Self::Sub(template.into())
    }

    /// A `Fn::Join` of `parts` with `separator`.
    #[must_use]
    pub fn join(separator: impl Into<String>, parts: Vec<Self>) -> Self {
        Self::Join {
            separator: separator.into(),
            parts,
        }
    }

    /// Returns the literal value, if this token is one.
    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Serializes this token to its CloudFormation JSON form.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Literal(value) => serde_json::Value::String(value.clone()),
            Self::Ref(id) => serde_json::json!({ "Ref": id }),
            Self::GetAtt {
                logical_id,
                attribute,
            } => serde_json::json!({ "Fn::GetAtt": [logical_id, attribute] }),
            Self::Sub(template) => serde_json::json!({ "Fn::Sub": template }),
            Self::Join { separator, parts } => {
                let parts: Vec<serde_json::Value> = parts.iter().map(Self::to_json).collect();
                serde_json::json!({ "Fn::Join": [separator, parts] })
            }
            Self::AvailabilityZone(index) => {
                serde_json::json!({ "Fn::Select": [index, { "Fn::GetAZs": "" }] })
            }
        }
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_owned())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

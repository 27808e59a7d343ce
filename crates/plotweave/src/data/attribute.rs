//! Attribute types, roles and bindings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic type of an attribute or axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    /// No attribute, or nothing known about it.
    #[default]
    Empty,
    /// Finite numbers.
    Numeric,
    /// Arbitrary non-empty strings.
    Categorical,
}

impl AttributeType {
    /// All three types, in table order.
    pub const ALL: [AttributeType; 3] = [
        AttributeType::Empty,
        AttributeType::Numeric,
        AttributeType::Categorical,
    ];

    /// Precedence when choosing the primary role: numeric beats categorical
    /// beats empty.
    pub fn primary_rank(self) -> u8 {
        match self {
            AttributeType::Empty => 0,
            AttributeType::Categorical => 1,
            AttributeType::Numeric => 2,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::Empty => "empty",
            AttributeType::Numeric => "numeric",
            AttributeType::Categorical => "categorical",
        };
        f.write_str(name)
    }
}

/// A logical visual channel an attribute can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Horizontal axis.
    X,
    /// Vertical axis; may hold several series.
    Y,
    /// An additional y series sharing the x attribute.
    YPlus,
    /// A numeric series plotted against a right-hand axis.
    RightNumeric,
    /// Point colour.
    Legend,
    /// Tooltip caption.
    Caption,
    /// Column split.
    TopSplit,
    /// Row split.
    RightSplit,
}

impl Role {
    /// Every role.
    pub const ALL: [Role; 8] = [
        Role::X,
        Role::Y,
        Role::YPlus,
        Role::RightNumeric,
        Role::Legend,
        Role::Caption,
        Role::TopSplit,
        Role::RightSplit,
    ];

    /// Roles whose attributes are shown in data tips, in display order.
    pub const TIP_ROLES: [Role; 7] = [
        Role::X,
        Role::Y,
        Role::RightNumeric,
        Role::TopSplit,
        Role::RightSplit,
        Role::Legend,
        Role::Caption,
    ];

    /// Roles that never exclude a case from the plot.
    pub fn is_optional_for_filtering(self) -> bool {
        matches!(self, Role::Caption | Role::Legend)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::X => "x",
            Role::Y => "y",
            Role::YPlus => "yPlus",
            Role::RightNumeric => "rightNumeric",
            Role::Legend => "legend",
            Role::Caption => "caption",
            Role::TopSplit => "topSplit",
            Role::RightSplit => "rightSplit",
        };
        f.write_str(name)
    }
}

/// An attribute bound to a role, with an optional user type override.
///
/// An empty `attribute_id` means the role is unbound.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeBinding {
    /// The bound attribute.
    #[serde(rename = "attributeID")]
    pub attribute_id: String,
    /// Type chosen by the user, overriding the dataset's declared type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_override: Option<AttributeType>,
}

impl AttributeBinding {
    /// Bind an attribute using its declared type.
    pub fn new(attribute_id: impl Into<String>) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            type_override: None,
        }
    }

    /// Bind an attribute with an explicit type.
    pub fn with_type(attribute_id: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            type_override: Some(attr_type),
        }
    }

    /// Whether an attribute is bound.
    pub fn is_bound(&self) -> bool {
        !self.attribute_id.is_empty()
    }

    /// Set or clear the type override. `Empty` clears it.
    pub fn set_type(&mut self, attr_type: Option<AttributeType>) {
        self.type_override = attr_type.filter(|t| *t != AttributeType::Empty);
    }
}

impl From<&str> for AttributeBinding {
    fn from(attribute_id: &str) -> Self {
        Self::new(attribute_id)
    }
}

//! Filter-expression model for registry searches.
//!
//! The registry consumes an ordered list of predicates that are
//! implicitly AND-ed. Each element is either a condition 3-tuple
//! `[field, operator, operand]` or a disjunction group
//! `{"filter_operator": "any", "filters": [3-tuples…]}`. The
//! `Serialize` impls below produce exactly that wire shape.

#![allow(missing_docs)]

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;

use crate::registry::record::TagRef;

/// Comparison operator of a condition 3-tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Field equals operand.
    Is,
    /// Field strictly greater than operand.
    GreaterThan,
    /// String field ends with operand.
    EndsWith,
    /// Field value is not a member of the operand list.
    NotIn,
    /// Creation timestamp falls inside the relative calendar window
    /// given by a negative month offset.
    InCalendarMonth,
}

impl FilterOp {
    /// Wire name of the operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::GreaterThan => "greater_than",
            Self::EndsWith => "ends_with",
            Self::NotIn => "not_in",
            Self::InCalendarMonth => "in_calendar_month",
        }
    }
}

/// A single leaf predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub operand: Value,
}

impl Condition {
    /// Build a condition over `field`.
    pub fn new(field: impl Into<String>, op: FilterOp, operand: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            operand: operand.into(),
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.field)?;
        seq.serialize_element(self.op.as_str())?;
        seq.serialize_element(&self.operand)?;
        seq.end()
    }
}

/// One top-level element: a condition or an any-of group.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Condition(Condition),
    /// At least one of the nested conditions must hold.
    Any(Vec<Condition>),
}

impl Serialize for FilterNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Condition(cond) => cond.serialize(serializer),
            Self::Any(conditions) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("filter_operator", "any")?;
                map.serialize_entry("filters", conditions)?;
                map.end()
            }
        }
    }
}

/// Ordered conjunction of filter nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpr(pub Vec<FilterNode>);

impl FilterExpr {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a leaf condition.
    pub fn and(mut self, condition: Condition) -> Self {
        self.0.push(FilterNode::Condition(condition));
        self
    }

    /// Append an any-of group.
    pub fn and_any(mut self, conditions: Vec<Condition>) -> Self {
        self.0.push(FilterNode::Any(conditions));
        self
    }

    /// Iterate the top-level nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &FilterNode> {
        self.0.iter()
    }
}

impl Serialize for FilterExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Builder for the standard triage query: calendar window AND
/// tag exclusion AND any-of filename suffixes.
#[derive(Debug, Clone)]
pub struct TriageFilter {
    /// Negative month offset for the creation-date window.
    pub calendar_window_offset: i32,
    /// Filename suffixes accepted (any-of).
    pub suffixes: Vec<String>,
    /// Tags whose presence excludes a record (already processed).
    pub excluded_tags: Vec<TagRef>,
}

impl TriageFilter {
    /// Assemble the filter expression sent to the registry.
    #[must_use]
    pub fn build(&self) -> FilterExpr {
        let mut expr = FilterExpr::new().and(Condition::new(
            "created_at",
            FilterOp::InCalendarMonth,
            self.calendar_window_offset,
        ));

        if !self.excluded_tags.is_empty() {
            let tags: Vec<Value> = self
                .excluded_tags
                .iter()
                .map(|tag| serde_json::json!({ "type": tag.entity_type, "id": tag.id }))
                .collect();
            expr = expr.and(Condition::new("tags", FilterOp::NotIn, tags));
        }

        let suffix_conditions = self
            .suffixes
            .iter()
            .map(|suffix| Condition::new("filename", FilterOp::EndsWith, suffix.as_str()))
            .collect();
        expr.and_any(suffix_conditions)
    }
}

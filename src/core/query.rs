//! Query descriptors sent to the remote document store

use crate::core::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Sort direction for an ordering clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Comparison operator for a `where` clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WhereOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "in")]
    In,
}

impl WhereOp {
    /// Range operators constrain ordering in most document stores
    pub fn is_range(&self) -> bool {
        matches!(self, WhereOp::Lt | WhereOp::Lte | WhereOp::Gt | WhereOp::Gte)
    }
}

impl fmt::Display for WhereOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            WhereOp::Eq => "==",
            WhereOp::Ne => "!=",
            WhereOp::Lt => "<",
            WhereOp::Lte => "<=",
            WhereOp::Gt => ">",
            WhereOp::Gte => ">=",
            WhereOp::In => "in",
        };
        f.write_str(op)
    }
}

/// Ordering clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

/// Single-field filter clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub field: String,
    pub op: WhereOp,
    pub value: Value,
}

/// Opaque description of one read against a collection
///
/// # Example
/// ```rust,ignore
/// let query = QueryDescriptor::collection("collectors")
///     .where_eq("area", json!("Ward 12"))
///     .order_by("fullName", Direction::Asc);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Collection name in the remote store
    pub collection: String,

    /// Optional ordering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,

    /// Optional filter
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<WhereClause>,
}

impl QueryDescriptor {
    /// Query every document of a collection
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            order_by: None,
            filter: None,
        }
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn filter(mut self, field: impl Into<String>, op: WhereOp, value: Value) -> Self {
        self.filter = Some(WhereClause {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: Value) -> Self {
        self.filter(field, WhereOp::Eq, value)
    }

    /// Reject combinations the store would refuse, before any remote call
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: String| Err(ValidationError::InvalidQuery { reason });

        if self.collection.trim().is_empty() {
            return invalid("collection name is empty".to_string());
        }
        if self
            .order_by
            .as_ref()
            .is_some_and(|order| order.field.trim().is_empty())
        {
            return invalid("orderBy field is empty".to_string());
        }

        let Some(clause) = &self.filter else {
            return Ok(());
        };

        if clause.field.trim().is_empty() {
            return invalid("where field is empty".to_string());
        }
        if clause.field == "id" {
            return invalid("filter on the document id is not supported".to_string());
        }

        match clause.op {
            WhereOp::In => {
                if !clause.value.is_array() {
                    return invalid(format!("'{}' in requires an array value", clause.field));
                }
            }
            op if op.is_range() => {
                if clause.value.is_null() || clause.value.is_array() || clause.value.is_object() {
                    return invalid(format!(
                        "'{}' {} requires a scalar value",
                        clause.field, op
                    ));
                }
                if let Some(order) = self.order_by.as_ref().filter(|o| o.field != clause.field) {
                    return invalid(format!(
                        "range filter on '{}' must be ordered by '{}' first, not '{}'",
                        clause.field, clause.field, order.field
                    ));
                }
            }
            _ => {}
        }

        Ok(())
    }
}

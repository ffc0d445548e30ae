//! Column metadata shared across the grid pipeline.
//!
//! A displayable column has a (possibly relation-qualified) name, flags
//! controlling projection and search eligibility, and a scalar type that
//! decides which filter operator a search term produces.

use serde::{Deserialize, Serialize};

/// Scalar type of a database column, declared in config or introspected
/// from the data source's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Decimal,
    Boolean,
    String,
    Text,
    DateTime,
    Unknown,
}

impl ColumnType {
    /// True for types whose search conditions compare numerically.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Decimal)
    }
}

/// One displayable column of a table config.
///
/// The client protocol references columns by position; `request_index` is
/// assigned from config order during registry validation, so indexes are
/// dense and unique by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Qualified (`relation.field`) or bare column name
    pub name: String,
    /// Whether the column is backed by a database field
    #[serde(default = "default_true")]
    pub database: bool,
    /// Whether the global search term applies to this column
    #[serde(default = "default_true")]
    pub searchable: bool,
    /// Explicit type, overriding schema introspection
    #[serde(default, rename = "type")]
    pub declared_type: Option<ColumnType>,
    /// Position the client protocol uses in sort/filter directives
    #[serde(skip)]
    pub request_index: usize,
}

fn default_true() -> bool {
    true
}

/// A column name split into optional relation prefix and field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualifiedColumn<'a> {
    /// Relation or table alias the field belongs to, when qualified
    pub relation: Option<&'a str>,
    /// Bare field name
    pub field: &'a str,
}

/// Split a column name on its qualifying dot.
///
/// Only a single-dot name counts as qualified; anything else is treated as
/// a bare field looked up on the primary table.
pub fn split_qualified(name: &str) -> QualifiedColumn<'_> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() == 2 {
        QualifiedColumn {
            relation: Some(parts[0]),
            field: parts[1],
        }
    } else {
        QualifiedColumn {
            relation: None,
            field: name,
        }
    }
}

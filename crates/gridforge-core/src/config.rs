//! Table configuration registry.
//!
//! A [`TableConfig`] is the static, per-table description the adapter works
//! from: the target table, the finder recipe to start the query with, base
//! filter conditions, joined relations, the displayable column list, and
//! projection/scope options. Configs deserialize with serde and are
//! validated up front; a malformed or unknown config is fatal for the
//! request, never silently defaulted.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::column::ColumnDefinition;
use crate::error::{GridError, GridResult};
use crate::predicate::Condition;
use crate::request::SortDirection;

/// One `ORDER BY` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderClause {
    pub column: String,
    pub dir: SortDirection,
}

/// Options forwarded to the data source's named finder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinderOptions {
    /// Default sort, used only when the request carries no directives
    #[serde(default)]
    pub order: Vec<OrderClause>,
    /// Free-form parameters for parameterized finders
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

/// Static configuration for one grid-backed table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Target table identifier
    pub table: String,
    /// Alias the primary table's qualified columns use; defaults to `table`
    #[serde(default)]
    pub alias: Option<String>,
    /// Named finder the base query starts from
    #[serde(default = "default_finder")]
    pub finder: String,
    #[serde(default)]
    pub finder_options: FinderOptions,
    /// Conditions applied to every pass, filtered or not
    #[serde(default)]
    pub base_where: Vec<Condition>,
    /// Relations to join in
    #[serde(default)]
    pub contain: Vec<String>,
    /// Displayable columns, in client-visible order
    pub columns: Vec<ColumnDefinition>,
    /// When true, the data source's default projection is used and the
    /// select list stays empty
    #[serde(default)]
    pub select_all: bool,
    /// Database-only columns added to the projection without being displayed
    #[serde(default)]
    pub extra_columns: Vec<String>,
    /// Explicitly configured select additions
    #[serde(default)]
    pub select: Vec<String>,
    /// Opaque row-scoping toggles passed through to the data source
    #[serde(default)]
    pub scope_flags: BTreeMap<String, bool>,
}

fn default_finder() -> String {
    "all".to_string()
}

impl TableConfig {
    /// Alias used to recognize the primary table in qualified column names.
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    /// Column definition for a client-protocol index.
    pub fn column(&self, index: usize) -> Option<&ColumnDefinition> {
        self.columns.get(index)
    }

    /// Validate required keys and assign request indexes from config order.
    pub(crate) fn validate(&mut self, name: &str) -> GridResult<()> {
        if self.table.trim().is_empty() {
            return Err(GridError::Configuration(format!(
                "table config '{}' has an empty table identifier",
                name
            )));
        }
        if self.columns.is_empty() {
            return Err(GridError::Configuration(format!(
                "table config '{}' defines no columns",
                name
            )));
        }

        let mut seen = HashSet::new();
        for (index, column) in self.columns.iter_mut().enumerate() {
            if column.name.trim().is_empty() {
                return Err(GridError::Configuration(format!(
                    "table config '{}' has an unnamed column at index {}",
                    name, index
                )));
            }
            if !seen.insert(column.name.clone()) {
                return Err(GridError::Configuration(format!(
                    "table config '{}' defines column '{}' twice",
                    name, column.name
                )));
            }
            column.request_index = index;
        }

        Ok(())
    }
}

/// Registry of named table configs.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    configs: BTreeMap<String, TableConfig>,
}

impl TableRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a config under `name`, validating it first.
    pub fn register(&mut self, name: impl Into<String>, mut config: TableConfig) -> GridResult<()> {
        let name = name.into();
        config.validate(&name)?;
        self.configs.insert(name, config);
        Ok(())
    }

    /// Load a `{name: config}` map from JSON.
    pub fn from_json(json: &str) -> GridResult<Self> {
        let configs: BTreeMap<String, TableConfig> = serde_json::from_str(json)
            .map_err(|e| GridError::Configuration(format!("malformed table config: {}", e)))?;

        let mut registry = Self::new();
        for (name, config) in configs {
            registry.register(name, config)?;
        }
        Ok(registry)
    }

    /// Look up a config by name. Unknown names are a fatal configuration
    /// error, surfaced before any query executes.
    pub fn resolve(&self, name: &str) -> GridResult<&TableConfig> {
        self.configs
            .get(name)
            .ok_or_else(|| GridError::Configuration(format!("unknown table config '{}'", name)))
    }

    /// Names of all registered configs
    pub fn config_names(&self) -> Vec<&str> {
        self.configs.keys().map(String::as_str).collect()
    }
}

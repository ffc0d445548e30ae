//! Named finders: reusable base-query recipes.
//!
//! A finder contributes extra conditions and a default order to every pass
//! of a plan. Finders are closures over the config's finder params, so a
//! recipe like "by_author" can read its target value from
//! `finder_options.params` at request time.

use std::collections::BTreeMap;

use gridforge_core::{Condition, OrderClause};
use serde_json::Value;

use crate::error::{SqliteError, SqliteResult};

/// What a finder adds to the base query.
#[derive(Debug, Clone, Default)]
pub struct FinderSpec {
    /// Conditions applied to every pass, filtered or not
    pub conditions: Vec<Condition>,
    /// Default order, used only when the plan carries none
    pub order: Vec<OrderClause>,
}

type FinderFn = Box<dyn Fn(&BTreeMap<String, Value>) -> FinderSpec + Send + Sync>;

/// Registry of named finders. `all` (the empty recipe) is built in.
pub struct FinderSet {
    finders: BTreeMap<String, FinderFn>,
}

impl Default for FinderSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FinderSet {
    pub fn new() -> Self {
        let mut set = Self {
            finders: BTreeMap::new(),
        };
        set.register("all", |_| FinderSpec::default());
        set
    }

    /// Register a finder recipe under `name`
    pub fn register(
        &mut self,
        name: impl Into<String>,
        finder: impl Fn(&BTreeMap<String, Value>) -> FinderSpec + Send + Sync + 'static,
    ) {
        self.finders.insert(name.into(), Box::new(finder));
    }

    /// Resolve a finder by name and evaluate it with the plan's params.
    pub fn resolve(
        &self,
        name: &str,
        params: &BTreeMap<String, Value>,
    ) -> SqliteResult<FinderSpec> {
        let finder = self
            .finders
            .get(name)
            .ok_or_else(|| SqliteError::UnknownFinder(name.to_string()))?;
        Ok(finder(params))
    }
}

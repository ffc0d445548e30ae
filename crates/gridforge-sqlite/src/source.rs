//! The rusqlite-backed data source.
//!
//! Ties the pool, schema catalog, finder set, and renderer together behind
//! the core `DataSource` trait. Scopes are named condition sets applied to
//! every plan unless the plan's scope flags switch them off explicitly.

use std::collections::BTreeMap;

use gridforge_core::{
    ColumnType, ColumnTypeSource, Condition, DataSource, GridError, GridResult, QueryPlan,
};
use rusqlite::types::ValueRef;
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::connection::SqlitePool;
use crate::error::SqliteResult;
use crate::finder::{FinderSet, FinderSpec};
use crate::render::{PlanRenderer, RenderedQuery};
use crate::schema::SchemaCatalog;

/// SQLite implementation of the grid `DataSource`.
pub struct SqliteGridSource {
    pool: SqlitePool,
    catalog: SchemaCatalog,
    finders: FinderSet,
    scopes: BTreeMap<String, Vec<Condition>>,
}

impl SqliteGridSource {
    /// Create a source over `pool` for the catalog's primary table
    pub fn new(pool: SqlitePool, catalog: SchemaCatalog) -> Self {
        Self {
            pool,
            catalog,
            finders: FinderSet::new(),
            scopes: BTreeMap::new(),
        }
    }

    /// Register a named finder recipe
    pub fn register_finder(
        &mut self,
        name: impl Into<String>,
        finder: impl Fn(&BTreeMap<String, Value>) -> FinderSpec + Send + Sync + 'static,
    ) {
        self.finders.register(name, finder);
    }

    /// Register a named scope: conditions applied to every plan unless its
    /// scope flags carry an explicit `false` for this name.
    pub fn register_scope(&mut self, name: impl Into<String>, conditions: Vec<Condition>) {
        self.scopes.insert(name.into(), conditions);
    }

    fn active_scopes(&self, plan: &QueryPlan) -> Vec<Condition> {
        self.scopes
            .iter()
            .filter(|(name, _)| plan.scope_flags.get(*name).copied().unwrap_or(true))
            .flat_map(|(_, conditions)| conditions.iter().cloned())
            .collect()
    }

    fn run_count(&self, plan: &QueryPlan) -> SqliteResult<u64> {
        let finder = self.finders.resolve(&plan.finder, &plan.finder_params)?;
        let scopes = self.active_scopes(plan);
        let query = PlanRenderer::new(&self.catalog).render_count(plan, &finder, &scopes)?;
        debug!(sql = %query.sql, "counting rows");

        self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare(&query.sql)?;
            let bindings = sql_bindings(&query);
            let count: i64 = stmt.query_row(
                bindings
                    .iter()
                    .map(|(name, value)| (name.as_str(), value as &dyn rusqlite::ToSql))
                    .collect::<Vec<_>>()
                    .as_slice(),
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
    }

    fn run_fetch(&self, plan: &QueryPlan) -> SqliteResult<Vec<Value>> {
        let finder = self.finders.resolve(&plan.finder, &plan.finder_params)?;
        let scopes = self.active_scopes(plan);
        let query = PlanRenderer::new(&self.catalog).render_rows(plan, &finder, &scopes)?;
        debug!(sql = %query.sql, "fetching rows");

        self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare(&query.sql)?;
            let columns: Vec<String> = stmt
                .column_names()
                .iter()
                .map(|name| name.to_string())
                .collect();

            let bindings = sql_bindings(&query);
            let mut rows = stmt.query(
                bindings
                    .iter()
                    .map(|(name, value)| (name.as_str(), value as &dyn rusqlite::ToSql))
                    .collect::<Vec<_>>()
                    .as_slice(),
            )?;

            let mut data = Vec::new();
            while let Some(row) = rows.next()? {
                let mut object = Map::new();
                for (index, column) in columns.iter().enumerate() {
                    object.insert(column.clone(), row_value(row.get_ref(index)?));
                }
                data.push(Value::Object(object));
            }
            Ok(data)
        })
    }
}

impl ColumnTypeSource for SqliteGridSource {
    fn column_type(&self, relation: Option<&str>, field: &str) -> Option<ColumnType> {
        let lookup = self
            .pool
            .with_connection(|conn| self.catalog.column_type(conn, relation, field));
        match lookup {
            Ok(column_type) => column_type,
            Err(e) => {
                warn!(relation = ?relation, field, error = %e, "schema introspection failed");
                None
            }
        }
    }
}

impl DataSource for SqliteGridSource {
    fn count(&self, plan: &QueryPlan) -> GridResult<u64> {
        self.run_count(plan).map_err(GridError::from)
    }

    fn fetch(&self, plan: &QueryPlan) -> GridResult<Vec<Value>> {
        self.run_fetch(plan).map_err(GridError::from)
    }
}

/// Convert rendered JSON params into rusqlite values, keeping names.
fn sql_bindings(query: &RenderedQuery) -> Vec<(String, rusqlite::types::Value)> {
    query
        .params
        .iter()
        .map(|(name, value)| (name.clone(), json_to_sql(value)))
        .collect()
}

fn json_to_sql(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Sql::Integer(i)
            } else {
                Sql::Real(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => Sql::Text(s.clone()),
        other => Sql::Text(other.to_string()),
    }
}

fn row_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(Number::from(i)),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}

//! SQL renderer for query plans.
//!
//! Renders a [`QueryPlan`] to SQLite SQL with:
//! - Named parameter binding for every condition value
//! - Strict identifier validation for every column/table token
//! - LEFT JOINs emitted from the catalog's relation specs
//!
//! Request data can only ever reach the database as a bound parameter;
//! identifiers come from validated configuration.

use gridforge_core::{CompareOp, Condition, OrderClause, QueryPlan};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{SqliteError, SqliteResult};
use crate::finder::FinderSpec;
use crate::schema::SchemaCatalog;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// True when `token` is a bare SQL identifier safe to quote and embed.
pub fn valid_identifier(token: &str) -> bool {
    IDENTIFIER.is_match(token)
}

/// Output from rendering
#[derive(Debug, Clone)]
pub struct RenderedQuery {
    /// The generated SQL
    pub sql: String,
    /// Named parameters to bind, in `:pN` order
    pub params: Vec<(String, Value)>,
}

/// Renders plans against one schema catalog.
pub struct PlanRenderer<'a> {
    catalog: &'a SchemaCatalog,
}

impl<'a> PlanRenderer<'a> {
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// `SELECT COUNT(*)` form: no projection, order, or pagination window.
    pub fn render_count(
        &self,
        plan: &QueryPlan,
        finder: &FinderSpec,
        scopes: &[Condition],
    ) -> SqliteResult<RenderedQuery> {
        let mut params = Vec::new();
        let from = self.from_clause(plan)?;
        let where_clause = self.where_clause(plan, finder, scopes, &mut params)?;

        let mut sql = format!("SELECT COUNT(*) FROM {}", from);
        if let Some(where_clause) = where_clause {
            sql.push_str(&format!(" WHERE {}", where_clause));
        }

        Ok(RenderedQuery { sql, params })
    }

    /// Full row query: projection, filter, order, pagination window.
    pub fn render_rows(
        &self,
        plan: &QueryPlan,
        finder: &FinderSpec,
        scopes: &[Condition],
    ) -> SqliteResult<RenderedQuery> {
        let mut params = Vec::new();
        let select = self.select_clause(plan)?;
        let from = self.from_clause(plan)?;
        let where_clause = self.where_clause(plan, finder, scopes, &mut params)?;

        let mut sql = format!("SELECT {} FROM {}", select, from);
        if let Some(where_clause) = where_clause {
            sql.push_str(&format!(" WHERE {}", where_clause));
        }

        // Plan order wins; the finder default only fills a gap
        let order = if plan.order.is_empty() {
            &finder.order
        } else {
            &plan.order
        };
        if !order.is_empty() {
            let clauses = order
                .iter()
                .map(|clause| self.order_clause(clause))
                .collect::<SqliteResult<Vec<_>>>()?;
            sql.push_str(&format!(" ORDER BY {}", clauses.join(", ")));
        }

        match (plan.limit, plan.offset) {
            (Some(limit), offset) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            // SQLite needs a LIMIT before OFFSET; -1 means unbounded
            (None, offset) if offset > 0 => {
                sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset));
            }
            (None, _) => {}
        }

        Ok(RenderedQuery { sql, params })
    }

    fn select_clause(&self, plan: &QueryPlan) -> SqliteResult<String> {
        if plan.select.is_empty() {
            return Ok(format!("\"{}\".*", self.validated(&plan.alias)?));
        }

        let items = plan
            .select
            .iter()
            .map(|name| {
                // Alias each column back to its config name so row keys
                // match what the client config declares
                Ok(format!(
                    "{} AS \"{}\"",
                    self.column_ref(name)?,
                    name.replace('"', "")
                ))
            })
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items.join(", "))
    }

    fn from_clause(&self, plan: &QueryPlan) -> SqliteResult<String> {
        let table = self.validated(&plan.table)?;
        let alias = self.validated(&plan.alias)?;

        let mut from = if table == alias {
            format!("\"{}\"", table)
        } else {
            format!("\"{}\" AS \"{}\"", table, alias)
        };

        for relation in &plan.contain {
            let spec = self.catalog.relation(relation).ok_or_else(|| {
                SqliteError::Render(format!("unknown relation '{}'", relation))
            })?;
            from.push_str(&format!(
                " LEFT JOIN \"{}\" AS \"{}\" ON {}",
                self.validated(&spec.table)?,
                self.validated(relation)?,
                spec.join_on
            ));
        }
        Ok(from)
    }

    fn where_clause(
        &self,
        plan: &QueryPlan,
        finder: &FinderSpec,
        scopes: &[Condition],
        params: &mut Vec<(String, Value)>,
    ) -> SqliteResult<Option<String>> {
        let mut conditions = Vec::new();

        for condition in plan
            .base_where
            .iter()
            .chain(finder.conditions.iter())
            .chain(scopes.iter())
        {
            conditions.push(self.condition(condition, params)?);
        }

        if let Some(filter) = &plan.filter {
            if !filter.any.is_empty() {
                let any = filter
                    .any
                    .iter()
                    .map(|condition| self.condition(condition, params))
                    .collect::<SqliteResult<Vec<_>>>()?;
                conditions.push(format!("({})", any.join(" OR ")));
            }
            for condition in &filter.all {
                conditions.push(self.condition(condition, params)?);
            }
        }

        if conditions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(conditions.join(" AND ")))
        }
    }

    fn condition(
        &self,
        condition: &Condition,
        params: &mut Vec<(String, Value)>,
    ) -> SqliteResult<String> {
        let column = self.column_ref(&condition.column)?;
        let name = format!(":p{}", params.len());
        params.push((name.clone(), condition.value.clone()));

        Ok(match condition.op {
            CompareOp::Equals => format!("{} = {}", column, name),
            CompareOp::Like => format!("{} LIKE {}", column, name),
        })
    }

    fn order_clause(&self, clause: &OrderClause) -> SqliteResult<String> {
        Ok(format!(
            "{} {}",
            self.column_ref(&clause.column)?,
            clause.dir.as_sql()
        ))
    }

    /// Quote a column reference, qualifying bare names with the primary
    /// alias so joined queries stay unambiguous.
    fn column_ref(&self, name: &str) -> SqliteResult<String> {
        let parts: Vec<&str> = name.split('.').collect();
        match parts.as_slice() {
            [field] => Ok(format!(
                "\"{}\".\"{}\"",
                self.validated(self.catalog.alias())?,
                self.validated(field)?
            )),
            [relation, field] => Ok(format!(
                "\"{}\".\"{}\"",
                self.validated(relation)?,
                self.validated(field)?
            )),
            _ => Err(SqliteError::Render(format!(
                "invalid column reference '{}'",
                name
            ))),
        }
    }

    fn validated<'t>(&self, token: &'t str) -> SqliteResult<&'t str> {
        if valid_identifier(token) {
            Ok(token)
        } else {
            Err(SqliteError::Render(format!(
                "invalid identifier '{}'",
                token
            )))
        }
    }
}

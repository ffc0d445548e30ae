//! Predicate builder.
//!
//! Turns a normalized request plus a table config into a [`PredicateSpec`]:
//! the select list, the sort spec, and two structurally separate filter
//! groups (the global search OR-group and the per-column AND-group). The
//! builder is a pure function of its inputs; column types come through the
//! [`ColumnTypeSource`] seam so it can be exercised with a fake schema.
//!
//! Typing policy: numeric columns only match numeric terms (a text term
//! against a numeric column contributes nothing, it is not an error), and
//! boolean columns never match free-text search at all. Everything else
//! becomes a both-side-wildcard `LIKE`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::column::{split_qualified, ColumnDefinition, ColumnType};
use crate::config::{OrderClause, TableConfig};
use crate::request::GridRequest;

/// Comparison operator of an atomic condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Equals,
    Like,
}

/// One atomic filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Condition {
    /// Equality condition against a typed value
    pub fn equals(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            op: CompareOp::Equals,
            value,
        }
    }

    /// Substring-match condition, wildcarded on both sides
    pub fn like(column: impl Into<String>, term: &str) -> Self {
        Self {
            column: column.into(),
            op: CompareOp::Like,
            value: Value::String(format!("%{}%", term)),
        }
    }
}

/// Combined filter predicate of a plan.
///
/// `any` is the global-search disjunction, `all` the per-column
/// conjunction. They stay separate groups because the executor must apply
/// the per-column constraints on top of whatever the OR-group matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub any: Vec<Condition>,
    pub all: Vec<Condition>,
}

impl FilterGroup {
    pub fn is_empty(&self) -> bool {
        self.any.is_empty() && self.all.is_empty()
    }
}

/// Schema introspection seam consumed by the builder.
pub trait ColumnTypeSource {
    /// Type of `field` on the primary table (`None`) or the named relation.
    /// `None` when the schema has no answer; the builder then defaults to
    /// `String`.
    fn column_type(&self, relation: Option<&str>, field: &str) -> Option<ColumnType>;
}

/// The builder's output: a pure data structure, not itself executed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredicateSpec {
    /// Ordered select list; empty means the data source's default projection
    pub select: Vec<String>,
    /// Sort spec in client directive order
    pub order: Vec<OrderClause>,
    /// Global search disjunction
    pub global_filter: Vec<Condition>,
    /// Per-column conjunction
    pub column_filters: Vec<Condition>,
}

impl PredicateSpec {
    /// Build the spec for one request. Pure and idempotent.
    pub fn build(
        request: &GridRequest,
        config: &TableConfig,
        types: &dyn ColumnTypeSource,
    ) -> Self {
        Self {
            select: build_select(config),
            order: build_order(request, config),
            global_filter: build_global_filter(request, config, types),
            column_filters: build_column_filters(request, config, types),
        }
    }

    /// The two filter groups, packaged for the executor.
    pub fn filter_group(&self) -> FilterGroup {
        FilterGroup {
            any: self.global_filter.clone(),
            all: self.column_filters.clone(),
        }
    }
}

fn build_select(config: &TableConfig) -> Vec<String> {
    if config.select_all {
        return Vec::new();
    }

    let mut select = Vec::new();
    let mut push = |name: &str, select: &mut Vec<String>| {
        if !select.iter().any(|existing| existing == name) {
            select.push(name.to_string());
        }
    };

    for column in config.columns.iter().filter(|c| c.database) {
        push(&column.name, &mut select);
    }
    for extra in &config.extra_columns {
        push(extra, &mut select);
    }
    for explicit in &config.select {
        push(explicit, &mut select);
    }
    select
}

fn build_order(request: &GridRequest, config: &TableConfig) -> Vec<OrderClause> {
    request
        .order
        .iter()
        .filter_map(|directive| {
            config.column(directive.column_index).map(|column| OrderClause {
                column: column.name.clone(),
                dir: directive.direction,
            })
        })
        .collect()
}

fn build_global_filter(
    request: &GridRequest,
    config: &TableConfig,
    types: &dyn ColumnTypeSource,
) -> Vec<Condition> {
    let term = request.search.as_str();
    if term.is_empty() {
        return Vec::new();
    }

    let mut conditions = Vec::new();
    for column in config.columns.iter().filter(|c| c.searchable) {
        if let Some(condition) = term_condition(column, config, types, term) {
            conditions.push(condition);
        }
    }
    conditions
}

fn build_column_filters(
    request: &GridRequest,
    config: &TableConfig,
    types: &dyn ColumnTypeSource,
) -> Vec<Condition> {
    let mut conditions = Vec::new();
    for (index, term) in &request.column_search {
        let Some(column) = config.column(*index) else {
            continue;
        };
        if let Some(condition) = term_condition(column, config, types, term) {
            conditions.push(condition);
        }
    }
    conditions
}

/// Condition a search term contributes against one column, if any.
fn term_condition(
    column: &ColumnDefinition,
    config: &TableConfig,
    types: &dyn ColumnTypeSource,
    term: &str,
) -> Option<Condition> {
    match resolve_type(column, config, types) {
        ColumnType::Integer | ColumnType::Decimal => {
            if is_numeric(term) {
                Some(Condition::equals(&column.name, numeric_value(term)))
            } else {
                None
            }
        }
        // True/false parsing of free text is ambiguous; boolean columns
        // never contribute a condition.
        ColumnType::Boolean => None,
        _ => Some(Condition::like(&column.name, term)),
    }
}

/// Resolve a column's type: explicit declaration first, then schema
/// introspection against the table the qualifier names. A qualifier equal
/// to the primary alias resolves against the primary table; anything else
/// against the named relation. No answer defaults to `String`.
fn resolve_type(
    column: &ColumnDefinition,
    config: &TableConfig,
    types: &dyn ColumnTypeSource,
) -> ColumnType {
    if let Some(declared) = column.declared_type {
        return declared;
    }

    let qualified = split_qualified(&column.name);
    let relation = match qualified.relation {
        Some(relation) if relation == config.alias() => None,
        other => other,
    };

    types
        .column_type(relation, qualified.field)
        .unwrap_or(ColumnType::String)
}

fn is_numeric(term: &str) -> bool {
    term.trim()
        .parse::<f64>()
        .map(f64::is_finite)
        .unwrap_or(false)
}

fn numeric_value(term: &str) -> Value {
    let trimmed = term.trim();
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::from(integer);
    }
    trimmed
        .parse::<f64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(term.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableRegistry;
    use crate::request::PageLength;
    use serde_json::json;
    use test_case::test_case;

    /// Fake schema: primary table has integer `age`, string `name`;
    /// the `authors` relation has a text `bio`.
    struct FakeSchema;

    impl ColumnTypeSource for FakeSchema {
        fn column_type(&self, relation: Option<&str>, field: &str) -> Option<ColumnType> {
            match (relation, field) {
                (None, "id") => Some(ColumnType::Integer),
                (None, "age") => Some(ColumnType::Integer),
                (None, "name") => Some(ColumnType::String),
                (None, "active") => Some(ColumnType::Boolean),
                (Some("authors"), "bio") => Some(ColumnType::Text),
                _ => None,
            }
        }
    }

    fn config() -> TableConfig {
        let registry = TableRegistry::from_json(
            r#"{
                "people": {
                    "table": "people",
                    "columns": [
                        { "name": "id" },
                        { "name": "name" },
                        { "name": "age" },
                        { "name": "active" },
                        { "name": "authors.bio" },
                        { "name": "actions", "database": false, "searchable": false }
                    ]
                }
            }"#,
        )
        .expect("valid config");
        registry.resolve("people").expect("registered").clone()
    }

    fn request() -> GridRequest {
        GridRequest {
            draw: 1,
            start: 0,
            length: PageLength::Limited(10),
            search: String::new(),
            order: Vec::new(),
            column_search: Vec::new(),
        }
    }

    #[test]
    fn test_select_list_database_columns_only() {
        let spec = PredicateSpec::build(&request(), &config(), &FakeSchema);
        assert_eq!(spec.select, vec!["id", "name", "age", "active", "authors.bio"]);
    }

    #[test]
    fn test_select_all_means_default_projection() {
        let mut config = config();
        config.select_all = true;
        let spec = PredicateSpec::build(&request(), &config, &FakeSchema);
        assert!(spec.select.is_empty());
    }

    #[test]
    fn test_select_merges_extra_and_explicit_columns() {
        let mut config = config();
        config.extra_columns = vec!["author_id".to_string()];
        config.select = vec!["created".to_string(), "id".to_string()];
        let spec = PredicateSpec::build(&request(), &config, &FakeSchema);
        assert_eq!(
            spec.select,
            vec!["id", "name", "age", "active", "authors.bio", "author_id", "created"]
        );
    }

    #[test]
    fn test_order_preserves_directive_order() {
        let mut request = request();
        request.order = vec![
            crate::request::SortDirective {
                column_index: 2,
                direction: crate::request::SortDirection::Desc,
            },
            crate::request::SortDirective {
                column_index: 0,
                direction: crate::request::SortDirection::Asc,
            },
        ];
        let spec = PredicateSpec::build(&request, &config(), &FakeSchema);
        assert_eq!(
            spec.order,
            vec![
                OrderClause {
                    column: "age".to_string(),
                    dir: crate::request::SortDirection::Desc
                },
                OrderClause {
                    column: "id".to_string(),
                    dir: crate::request::SortDirection::Asc
                },
            ]
        );
    }

    #[test]
    fn test_numeric_global_search_hits_numeric_and_text_columns() {
        let mut request = request();
        request.search = "42".to_string();
        let spec = PredicateSpec::build(&request, &config(), &FakeSchema);

        assert_eq!(
            spec.global_filter,
            vec![
                Condition::equals("id", json!(42)),
                Condition::like("name", "42"),
                Condition::equals("age", json!(42)),
                Condition::like("authors.bio", "42"),
            ]
        );
    }

    #[test]
    fn test_text_global_search_skips_numeric_columns() {
        let mut request = request();
        request.search = "abc".to_string();
        let spec = PredicateSpec::build(&request, &config(), &FakeSchema);

        assert_eq!(
            spec.global_filter,
            vec![
                Condition::like("name", "abc"),
                Condition::like("authors.bio", "abc"),
            ]
        );
    }

    #[test_case("true"; "word true")]
    #[test_case("0"; "numeric zero")]
    #[test_case("anything"; "free text")]
    fn test_boolean_column_never_contributes(term: &str) {
        let mut request = request();
        request.column_search = vec![(3, term.to_string())];
        let spec = PredicateSpec::build(&request, &config(), &FakeSchema);
        assert!(spec.column_filters.is_empty());
    }

    #[test]
    fn test_per_column_numeric_policy_uses_column_term() {
        let mut request = request();
        // Numeric term on the integer column, text on the string column
        request.column_search = vec![(2, "30".to_string()), (1, "smith".to_string())];
        let spec = PredicateSpec::build(&request, &config(), &FakeSchema);

        assert_eq!(
            spec.column_filters,
            vec![
                Condition::equals("age", json!(30)),
                Condition::like("name", "smith"),
            ]
        );
    }

    #[test]
    fn test_per_column_text_term_on_numeric_column_is_silently_excluded() {
        let mut request = request();
        request.column_search = vec![(2, "abc".to_string())];
        let spec = PredicateSpec::build(&request, &config(), &FakeSchema);
        assert!(spec.column_filters.is_empty());
    }

    #[test]
    fn test_joined_column_resolves_against_relation_schema() {
        let mut request = request();
        request.search = "history".to_string();
        let spec = PredicateSpec::build(&request, &config(), &FakeSchema);
        // authors.bio is Text in the relation schema, so it takes a LIKE
        assert!(spec
            .global_filter
            .iter()
            .any(|c| c.column == "authors.bio" && c.op == CompareOp::Like));
    }

    #[test]
    fn test_declared_type_overrides_introspection() {
        let mut config = config();
        config.columns[1].declared_type = Some(ColumnType::Integer);
        let mut request = request();
        request.search = "abc".to_string();
        let spec = PredicateSpec::build(&request, &config, &FakeSchema);
        assert!(!spec.global_filter.iter().any(|c| c.column == "name"));
    }

    #[test]
    fn test_unintrospectable_column_defaults_to_string() {
        let mut request = request();
        request.column_search = vec![(4, "x".to_string())];
        let mut config = config();
        // Point the joined column at a relation the schema cannot answer for
        config.columns[4].name = "mystery.field".to_string();
        let spec = PredicateSpec::build(&request, &config, &FakeSchema);
        assert_eq!(
            spec.column_filters,
            vec![Condition::like("mystery.field", "x")]
        );
    }

    #[test]
    fn test_decimal_term_keeps_fraction() {
        let mut request = request();
        request.column_search = vec![(2, "19.5".to_string())];
        let spec = PredicateSpec::build(&request, &config(), &FakeSchema);
        assert_eq!(
            spec.column_filters,
            vec![Condition::equals("age", json!(19.5))]
        );
    }

    #[test]
    fn test_nan_term_is_not_numeric() {
        assert!(!is_numeric("NaN"));
        assert!(!is_numeric("inf"));
        assert!(!is_numeric(""));
        assert!(is_numeric(" 7 "));
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut request = request();
        request.search = "42".to_string();
        request.column_search = vec![(1, "smith".to_string())];
        let config = config();

        let first = PredicateSpec::build(&request, &config, &FakeSchema);
        let second = PredicateSpec::build(&request, &config, &FakeSchema);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_filter_group() {
        let spec = PredicateSpec::build(&request(), &config(), &FakeSchema);
        assert!(spec.filter_group().is_empty());
    }
}

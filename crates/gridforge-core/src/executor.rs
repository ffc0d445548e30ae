//! Query executor.
//!
//! The executor owns the only side-effecting step of the pipeline: it
//! resolves the config, normalizes the request, builds the predicate spec,
//! and drives the data source through the protocol's two-pass count
//! sequence (total before the filter is attached, filtered after) plus the
//! row materialization, assembling the response envelope.
//!
//! The data source is a trait seam; backends implement it, the core never
//! depends on a concrete one.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::config::{OrderClause, TableConfig, TableRegistry};
use crate::envelope::ResultEnvelope;
use crate::error::GridResult;
use crate::predicate::{ColumnTypeSource, Condition, FilterGroup, PredicateSpec};
use crate::request::GridRequest;

/// Fully resolved query handed to the data source.
///
/// `filter` is absent for the unfiltered total-count pass and present for
/// the filtered count and the row fetch. Counting ignores the pagination
/// window by contract.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub table: String,
    pub alias: String,
    pub finder: String,
    pub finder_params: BTreeMap<String, Value>,
    pub base_where: Vec<Condition>,
    pub contain: Vec<String>,
    /// Opaque row-scoping toggles from the config
    pub scope_flags: BTreeMap<String, bool>,
    /// Projection; empty means the source's default
    pub select: Vec<String>,
    pub order: Vec<OrderClause>,
    pub filter: Option<FilterGroup>,
    pub offset: u64,
    /// Row cap, `None` for the "all" sentinel
    pub limit: Option<u64>,
}

/// Data-access collaborator.
///
/// Must be able to introspect column types, count rows for a plan, and
/// materialize a plan's page of rows as JSON objects.
pub trait DataSource: ColumnTypeSource {
    /// Row count for `plan`, ignoring its pagination window.
    fn count(&self, plan: &QueryPlan) -> GridResult<u64>;

    /// The filtered, sorted, paginated rows.
    fn fetch(&self, plan: &QueryPlan) -> GridResult<Vec<Value>>;
}

/// Zero-argument callback run around the pipeline.
pub type Hook = Box<dyn Fn() + Send + Sync>;

/// The adapter tying the pipeline together for one table config.
///
/// Optional before/after hooks run synchronously, fully before and fully
/// after the pipeline; their signature is enforced at compile time, so
/// registration cannot fail at runtime.
#[derive(Default)]
pub struct GridAdapter {
    before: Option<Hook>,
    after: Option<Hook>,
}

impl GridAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback run before request processing begins.
    pub fn set_before_hook(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.before = Some(Box::new(hook));
    }

    /// Register a callback run after the response envelope is assembled.
    pub fn set_after_hook(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.after = Some(Box::new(hook));
    }

    /// Full pipeline for one request: resolve config, normalize, execute.
    ///
    /// Config and request errors surface before any data-source call; the
    /// after-hook only runs once a complete envelope exists.
    pub fn handle(
        &self,
        registry: &TableRegistry,
        config_name: &str,
        params: &[(String, String)],
        source: &dyn DataSource,
    ) -> GridResult<ResultEnvelope> {
        if let Some(hook) = &self.before {
            hook();
        }

        let config = registry.resolve(config_name)?;
        let request = GridRequest::from_params(params, config)?;
        let envelope = self.respond(config, &request, source)?;

        if let Some(hook) = &self.after {
            hook();
        }
        Ok(envelope)
    }

    /// Execute a normalized request against the data source.
    pub fn respond(
        &self,
        config: &TableConfig,
        request: &GridRequest,
        source: &dyn DataSource,
    ) -> GridResult<ResultEnvelope> {
        let spec = PredicateSpec::build(request, config, &SourceTypes(source));

        // An explicit request sort fully overrides the finder default
        let order = if spec.order.is_empty() {
            config.finder_options.order.clone()
        } else {
            spec.order.clone()
        };

        let mut plan = QueryPlan {
            table: config.table.clone(),
            alias: config.alias().to_string(),
            finder: config.finder.clone(),
            finder_params: config.finder_options.params.clone(),
            base_where: config.base_where.clone(),
            contain: config.contain.clone(),
            scope_flags: config.scope_flags.clone(),
            select: spec.select.clone(),
            order,
            filter: None,
            offset: request.start,
            limit: request.length.limit(),
        };

        debug!(
            table = %plan.table,
            finder = %plan.finder,
            offset = plan.offset,
            limit = ?plan.limit,
            "executing grid query plan"
        );

        let records_total = source.count(&plan)?;

        let filter = spec.filter_group();
        if !filter.is_empty() {
            plan.filter = Some(filter);
        }

        let records_filtered = source.count(&plan)?;
        let data = source.fetch(&plan)?;

        debug!(
            records_total,
            records_filtered,
            rows = data.len(),
            "grid query complete"
        );

        Ok(ResultEnvelope {
            draw: request.draw,
            records_total,
            records_filtered,
            data,
        })
    }
}

/// Delegating wrapper so the builder sees the source as a type oracle only.
struct SourceTypes<'a>(&'a dyn DataSource);

impl ColumnTypeSource for SourceTypes<'_> {
    fn column_type(
        &self,
        relation: Option<&str>,
        field: &str,
    ) -> Option<crate::column::ColumnType> {
        self.0.column_type(relation, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnType;
    use crate::error::GridError;
    use serde_json::json;
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted in-memory source over `(id, name, age)` people rows.
    struct FakeSource {
        rows: Vec<Value>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn new(count: usize) -> Self {
            let rows = (0..count)
                .map(|i| json!({"id": i, "name": format!("person {}", i), "age": 20 + i}))
                .collect();
            Self {
                rows,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn filtered(&self, plan: &QueryPlan) -> Vec<Value> {
            let Some(filter) = &plan.filter else {
                return self.rows.clone();
            };
            self.rows
                .iter()
                .filter(|row| {
                    let any = filter.any.is_empty()
                        || filter.any.iter().any(|c| Self::matches(row, c));
                    let all = filter.all.iter().all(|c| Self::matches(row, c));
                    any && all
                })
                .cloned()
                .collect()
        }

        fn matches(row: &Value, condition: &Condition) -> bool {
            let Some(field) = row.get(&condition.column) else {
                return false;
            };
            match condition.op {
                crate::predicate::CompareOp::Equals => field == &condition.value,
                crate::predicate::CompareOp::Like => {
                    let needle = condition
                        .value
                        .as_str()
                        .unwrap_or_default()
                        .trim_matches('%')
                        .to_string();
                    field
                        .as_str()
                        .map(|s| s.contains(&needle))
                        .unwrap_or(false)
                }
            }
        }
    }

    impl ColumnTypeSource for FakeSource {
        fn column_type(&self, _relation: Option<&str>, field: &str) -> Option<ColumnType> {
            match field {
                "id" | "age" => Some(ColumnType::Integer),
                "name" => Some(ColumnType::String),
                _ => None,
            }
        }
    }

    impl DataSource for FakeSource {
        fn count(&self, plan: &QueryPlan) -> GridResult<u64> {
            self.calls.borrow_mut().push("count".to_string());
            Ok(self.filtered(plan).len() as u64)
        }

        fn fetch(&self, plan: &QueryPlan) -> GridResult<Vec<Value>> {
            self.calls.borrow_mut().push("fetch".to_string());
            let rows = self.filtered(plan);
            let start = plan.offset as usize;
            let page: Vec<Value> = rows
                .into_iter()
                .skip(start)
                .take(plan.limit.map(|l| l as usize).unwrap_or(usize::MAX))
                .collect();
            Ok(page)
        }
    }

    fn registry() -> TableRegistry {
        TableRegistry::from_json(
            r#"{
                "people": {
                    "table": "people",
                    "finder_options": { "order": [{"column": "id", "dir": "asc"}] },
                    "columns": [
                        { "name": "id" },
                        { "name": "name" },
                        { "name": "age" }
                    ]
                }
            }"#,
        )
        .expect("valid config")
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_unfiltered_request_counts_match() {
        let source = FakeSource::new(25);
        let adapter = GridAdapter::new();
        let params = pairs(&[("draw", "1"), ("start", "0"), ("length", "10")]);

        let envelope = adapter
            .handle(&registry(), "people", &params, &source)
            .expect("success");

        assert_eq!(envelope.draw, 1);
        assert_eq!(envelope.records_total, 25);
        assert_eq!(envelope.records_filtered, 25);
        assert_eq!(envelope.data.len(), 10);
        // Strict sequencing: total count, filtered count, then fetch
        assert_eq!(*source.calls.borrow(), vec!["count", "count", "fetch"]);
    }

    #[test]
    fn test_filtered_never_exceeds_total() {
        let source = FakeSource::new(25);
        let adapter = GridAdapter::new();
        let params = pairs(&[
            ("draw", "2"),
            ("start", "0"),
            ("length", "10"),
            ("search[value]", "person 1"),
        ]);

        let envelope = adapter
            .handle(&registry(), "people", &params, &source)
            .expect("success");

        assert_eq!(envelope.records_total, 25);
        // "person 1" and "person 10".."person 19"
        assert_eq!(envelope.records_filtered, 11);
        assert!(envelope.records_filtered <= envelope.records_total);
    }

    #[test]
    fn test_length_sentinel_returns_all_rows() {
        let source = FakeSource::new(25);
        let adapter = GridAdapter::new();
        let params = pairs(&[("draw", "1"), ("start", "0"), ("length", "-1")]);

        let envelope = adapter
            .handle(&registry(), "people", &params, &source)
            .expect("success");
        assert_eq!(envelope.data.len(), 25);
    }

    #[test]
    fn test_page_window_applies_to_rows_only() {
        let source = FakeSource::new(25);
        let adapter = GridAdapter::new();
        let params = pairs(&[("draw", "1"), ("start", "20"), ("length", "10")]);

        let envelope = adapter
            .handle(&registry(), "people", &params, &source)
            .expect("success");
        assert_eq!(envelope.records_total, 25);
        assert_eq!(envelope.data.len(), 5);
    }

    #[test]
    fn test_bad_request_issues_no_query() {
        let source = FakeSource::new(5);
        let adapter = GridAdapter::new();
        // Sort index 9 does not exist
        let params = pairs(&[
            ("draw", "1"),
            ("start", "0"),
            ("length", "10"),
            ("order[0][column]", "9"),
            ("order[0][dir]", "asc"),
        ]);

        let err = adapter
            .handle(&registry(), "people", &params, &source)
            .expect_err("should fail");
        assert!(matches!(err, GridError::BadRequest(_)));
        assert!(source.calls.borrow().is_empty());
    }

    #[test]
    fn test_missing_draw_issues_no_query() {
        let source = FakeSource::new(5);
        let adapter = GridAdapter::new();
        let params = pairs(&[("start", "0"), ("length", "10")]);

        let err = adapter
            .handle(&registry(), "people", &params, &source)
            .expect_err("should fail");
        assert!(matches!(err, GridError::BadRequest(_)));
        assert!(source.calls.borrow().is_empty());
    }

    #[test]
    fn test_request_sort_overrides_finder_default() {
        let source = FakeSource::new(3);
        let adapter = GridAdapter::new();
        let registry = registry();
        let config = registry.resolve("people").expect("registered");

        let params = pairs(&[
            ("draw", "1"),
            ("start", "0"),
            ("length", "10"),
            ("order[0][column]", "2"),
            ("order[0][dir]", "desc"),
        ]);
        let request = GridRequest::from_params(&params, config).expect("valid");
        let spec = PredicateSpec::build(&request, config, &SourceTypes(&source));

        assert_eq!(
            spec.order,
            vec![OrderClause {
                column: "age".to_string(),
                dir: crate::request::SortDirection::Desc
            }]
        );
    }

    #[test]
    fn test_hooks_run_around_pipeline() {
        let before_count = Arc::new(AtomicUsize::new(0));
        let after_count = Arc::new(AtomicUsize::new(0));

        let mut adapter = GridAdapter::new();
        let before = Arc::clone(&before_count);
        adapter.set_before_hook(move || {
            before.fetch_add(1, Ordering::SeqCst);
        });
        let after = Arc::clone(&after_count);
        adapter.set_after_hook(move || {
            after.fetch_add(1, Ordering::SeqCst);
        });

        let source = FakeSource::new(2);
        let params = pairs(&[("draw", "1"), ("start", "0"), ("length", "10")]);
        adapter
            .handle(&registry(), "people", &params, &source)
            .expect("success");

        assert_eq!(before_count.load(Ordering::SeqCst), 1);
        assert_eq!(after_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_after_hook_skipped_on_error() {
        let after_count = Arc::new(AtomicUsize::new(0));
        let mut adapter = GridAdapter::new();
        let after = Arc::clone(&after_count);
        adapter.set_after_hook(move || {
            after.fetch_add(1, Ordering::SeqCst);
        });

        let source = FakeSource::new(2);
        let params = pairs(&[("start", "0"), ("length", "10")]);
        adapter
            .handle(&registry(), "people", &params, &source)
            .expect_err("missing draw");

        assert_eq!(after_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_config_is_configuration_error() {
        let source = FakeSource::new(2);
        let adapter = GridAdapter::new();
        let params = pairs(&[("draw", "1"), ("start", "0"), ("length", "10")]);

        let err = adapter
            .handle(&registry(), "missing", &params, &source)
            .expect_err("should fail");
        assert!(matches!(err, GridError::Configuration(_)));
        assert!(source.calls.borrow().is_empty());
    }
}

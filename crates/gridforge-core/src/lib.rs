//! Server-side driver for the DataTables-style grid protocol.
//!
//! Gridforge turns a paginated-grid AJAX request (column list, global
//! search, per-column filters, multi-column sort, pagination window) into a
//! typed, injection-safe query plan, executes it against a pluggable data
//! source, and returns the `{draw, recordsTotal, recordsFiltered, data}`
//! envelope the client widget expects.
//!
//! ## Pipeline
//!
//! ```text
//! raw query pairs ──> GridRequest ──┐
//!                                   ├──> PredicateSpec ──> QueryPlan ──> ResultEnvelope
//! TableRegistry ──> TableConfig ────┘         (pure)      (DataSource)
//! ```
//!
//! - [`config::TableRegistry`] resolves named table configs (columns,
//!   finder, base filters, joined relations).
//! - [`request::GridRequest`] normalizes and validates the protocol
//!   parameters.
//! - [`predicate::PredicateSpec`] builds the select list, sort spec, and
//!   filter groups as pure data, typing each search term against the
//!   column's schema type.
//! - [`executor::GridAdapter`] drives a [`executor::DataSource`] through
//!   the two-pass count sequence and assembles the envelope.
//!
//! Backends implement [`executor::DataSource`]; see the `gridforge-sqlite`
//! crate for the rusqlite implementation.

pub mod column;
pub mod config;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod predicate;
pub mod request;

pub use column::{split_qualified, ColumnDefinition, ColumnType, QualifiedColumn};
pub use config::{FinderOptions, OrderClause, TableConfig, TableRegistry};
pub use envelope::ResultEnvelope;
pub use error::{GridError, GridResult};
pub use executor::{DataSource, GridAdapter, Hook, QueryPlan};
pub use predicate::{ColumnTypeSource, CompareOp, Condition, FilterGroup, PredicateSpec};
pub use request::{parse_query_pairs, GridRequest, PageLength, SortDirection, SortDirective};

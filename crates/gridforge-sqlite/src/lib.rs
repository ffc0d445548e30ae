//! SQLite data source for Gridforge
//!
//! This crate implements the core `DataSource` trait over rusqlite,
//! turning query plans into parameterized SQL.
//!
//! ## Features
//!
//! - **Schema introspection**: column types via `PRAGMA table_info`,
//!   cached per table, with relation-aware lookup for joined columns
//! - **Named finders**: reusable base-query recipes, parameterized from
//!   the config's finder options
//! - **Scopes**: named condition sets toggled by the config's opaque
//!   scope flags
//! - **Injection safety**: every value is a bound parameter, every
//!   identifier is validated before it reaches SQL text
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gridforge_core::{GridAdapter, TableRegistry};
//! use gridforge_sqlite::{SchemaCatalog, SqliteGridSource, SqlitePool};
//!
//! let pool = SqlitePool::new(SqliteConfig::new("./app.db"))?;
//! let catalog = SchemaCatalog::new("books")
//!     .with_relation("authors", "authors", "\"authors\".\"id\" = \"books\".\"author_id\"");
//! let source = SqliteGridSource::new(pool, catalog);
//!
//! let envelope = GridAdapter::new().handle(&registry, "books", &params, &source)?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod finder;
pub mod render;
pub mod schema;
pub mod source;

// Re-exports
pub use config::SqliteConfig;
pub use connection::SqlitePool;
pub use error::{SqliteError, SqliteResult};
pub use finder::{FinderSet, FinderSpec};
pub use render::{PlanRenderer, RenderedQuery};
pub use schema::{RelationSpec, SchemaCatalog};
pub use source::SqliteGridSource;

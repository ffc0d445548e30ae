//! Schema introspection for the grid source.
//!
//! A [`SchemaCatalog`] knows the primary table, its alias, and the joined
//! relations a config may contain. Column types come from
//! `PRAGMA table_info` and are cached per table; declared SQLite types map
//! onto the grid's scalar [`ColumnType`] enum.

use std::collections::{BTreeMap, HashMap};

use gridforge_core::ColumnType;
use parking_lot::Mutex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{SqliteError, SqliteResult};
use crate::render::valid_identifier;

/// A joined relation: the table behind it and the raw join condition.
///
/// `join_on` is trusted configuration (it names schema objects, not
/// request data) and is emitted into the query verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationSpec {
    pub table: String,
    pub join_on: String,
}

/// Catalog of the primary table and its relations, with cached
/// per-table column types.
pub struct SchemaCatalog {
    table: String,
    alias: String,
    relations: BTreeMap<String, RelationSpec>,
    type_cache: Mutex<HashMap<String, HashMap<String, ColumnType>>>,
}

impl SchemaCatalog {
    /// Catalog for `table`, aliased as itself
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            alias: table.clone(),
            table,
            relations: BTreeMap::new(),
            type_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Override the alias qualified column names use for the primary table
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Register a joined relation
    pub fn with_relation(
        mut self,
        name: impl Into<String>,
        table: impl Into<String>,
        join_on: impl Into<String>,
    ) -> Self {
        self.relations.insert(
            name.into(),
            RelationSpec {
                table: table.into(),
                join_on: join_on.into(),
            },
        );
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.get(name)
    }

    /// Introspected type of a field on the primary table (`None` relation)
    /// or a registered relation. `Ok(None)` when the relation or field is
    /// unknown to the schema.
    pub fn column_type(
        &self,
        conn: &Connection,
        relation: Option<&str>,
        field: &str,
    ) -> SqliteResult<Option<ColumnType>> {
        let table = match relation {
            None => self.table.as_str(),
            Some(name) => match self.relations.get(name) {
                Some(spec) => spec.table.as_str(),
                None => return Ok(None),
            },
        };

        let mut cache = self.type_cache.lock();
        if !cache.contains_key(table) {
            cache.insert(table.to_string(), introspect_table(conn, table)?);
        }

        Ok(cache
            .get(table)
            .and_then(|columns| columns.get(field))
            .copied())
    }
}

fn introspect_table(conn: &Connection, table: &str) -> SqliteResult<HashMap<String, ColumnType>> {
    if !valid_identifier(table) {
        return Err(SqliteError::Render(format!(
            "invalid table identifier '{}'",
            table
        )));
    }

    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let rows = stmt.query_map([], |row| {
        let name: String = row.get("name")?;
        let decl: String = row.get("type")?;
        Ok((name, decl))
    })?;

    let mut columns = HashMap::new();
    for row in rows {
        let (name, decl) = row?;
        columns.insert(name, map_decl_type(&decl));
    }
    Ok(columns)
}

/// Map a SQLite declared column type onto the grid scalar types.
///
/// Follows SQLite's substring-affinity style: the first matching fragment
/// wins, with the date/boolean fragments checked before the broader ones.
pub fn map_decl_type(decl: &str) -> ColumnType {
    let decl = decl.to_ascii_uppercase();
    if decl.contains("BOOL") {
        ColumnType::Boolean
    } else if decl.contains("DATE") || decl.contains("TIME") {
        ColumnType::DateTime
    } else if decl.contains("INT") {
        ColumnType::Integer
    } else if decl.contains("CHAR") {
        ColumnType::String
    } else if decl.contains("TEXT") || decl.contains("CLOB") {
        ColumnType::Text
    } else if decl.contains("REAL")
        || decl.contains("FLOA")
        || decl.contains("DOUB")
        || decl.contains("DEC")
        || decl.contains("NUM")
    {
        ColumnType::Decimal
    } else {
        ColumnType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SqlitePool;

    #[test]
    fn test_decl_type_mapping() {
        assert_eq!(map_decl_type("INTEGER"), ColumnType::Integer);
        assert_eq!(map_decl_type("BIGINT"), ColumnType::Integer);
        assert_eq!(map_decl_type("VARCHAR(200)"), ColumnType::String);
        assert_eq!(map_decl_type("TEXT"), ColumnType::Text);
        assert_eq!(map_decl_type("BOOLEAN"), ColumnType::Boolean);
        assert_eq!(map_decl_type("DATETIME"), ColumnType::DateTime);
        assert_eq!(map_decl_type("NUMERIC(10,2)"), ColumnType::Decimal);
        assert_eq!(map_decl_type("DOUBLE PRECISION"), ColumnType::Decimal);
        assert_eq!(map_decl_type(""), ColumnType::Unknown);
    }

    #[test]
    fn test_catalog_resolves_primary_and_relation() {
        let pool = SqlitePool::memory().expect("pool");
        pool.with_connection(|conn| {
            conn.execute_batch(
                "CREATE TABLE books (id INTEGER PRIMARY KEY, title VARCHAR(200), author_id INTEGER);
                 CREATE TABLE authors (id INTEGER PRIMARY KEY, bio TEXT);",
            )?;
            Ok(())
        })
        .expect("schema");

        let catalog = SchemaCatalog::new("books").with_relation(
            "authors",
            "authors",
            "\"authors\".\"id\" = \"books\".\"author_id\"",
        );

        pool.with_connection(|conn| {
            assert_eq!(
                catalog.column_type(conn, None, "title")?,
                Some(ColumnType::String)
            );
            assert_eq!(
                catalog.column_type(conn, Some("authors"), "bio")?,
                Some(ColumnType::Text)
            );
            assert_eq!(catalog.column_type(conn, None, "missing")?, None);
            assert_eq!(catalog.column_type(conn, Some("nowhere"), "bio")?, None);
            Ok(())
        })
        .expect("introspection");
    }
}

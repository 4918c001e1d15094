//! Runtime schema discovery
//!
//! Provides:
//! - SchemaProvider: narrow read-only discovery of a single table's shape
//! - InformationSchemaProvider: introspection through information_schema
//! - StaticSchemaProvider: fixed schemas for backends without introspection
//!
//! Discovery happens per flush and is never cached across flushes; the
//! table's current shape always wins.

use async_trait::async_trait;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::{ColumnMetadata, TableMetadata};

/// Split a possibly schema-qualified table identifier into its parts
pub fn split_table_ident(ident: &str) -> (Option<&str>, &str) {
    match ident.split_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, ident),
    }
}

/// Read-only discovery of a target table's current shape
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Discover the table's columns and primary key.
    ///
    /// Fails with a table-not-found error when the table does not exist.
    async fn table_schema(
        &self,
        conn: &dyn Connection,
        schema: Option<&str>,
        table: &str,
    ) -> Result<TableMetadata>;
}

const COLUMNS_SQL: &str = "SELECT column_name, data_type, is_nullable \
     FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 \
     ORDER BY ordinal_position";

const PRIMARY_KEY_SQL: &str = "SELECT kcu.column_name \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON tc.constraint_name = kcu.constraint_name \
      AND tc.table_schema = kcu.table_schema \
     WHERE tc.constraint_type = 'PRIMARY KEY' \
       AND tc.table_schema = $1 AND tc.table_name = $2 \
     ORDER BY kcu.ordinal_position";

/// Discovery through the standard `information_schema` views.
///
/// Works against any backend exposing `information_schema.columns` and the
/// key constraint views. An unqualified table resolves in `public`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InformationSchemaProvider;

#[async_trait]
impl SchemaProvider for InformationSchemaProvider {
    async fn table_schema(
        &self,
        conn: &dyn Connection,
        schema: Option<&str>,
        table: &str,
    ) -> Result<TableMetadata> {
        let schema_name = schema.unwrap_or("public");
        let params = [
            crate::types::Value::String(schema_name.to_owned()),
            crate::types::Value::String(table.to_owned()),
        ];

        let column_rows = conn.query(COLUMNS_SQL, &params).await?;
        if column_rows.is_empty() {
            return Err(Error::table_not_found(format!("{schema_name}.{table}")));
        }

        let pk_rows = conn.query(PRIMARY_KEY_SQL, &params).await?;
        let pk_names: Vec<String> = pk_rows
            .iter()
            .filter_map(|row| row.get_by_name("column_name"))
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect();

        let mut meta = TableMetadata::new(table);
        meta.schema = Some(schema_name.to_owned());

        for row in &column_rows {
            let name = row
                .get_by_name("column_name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::schema("column_name missing from introspection row"))?;
            let type_name = row
                .get_by_name("data_type")
                .and_then(|v| v.as_str())
                .unwrap_or("text");

            let mut column = ColumnMetadata::new(name, type_name);
            column.nullable = row
                .get_by_name("is_nullable")
                .and_then(|v| v.as_str())
                .map(|v| v.eq_ignore_ascii_case("YES"))
                .unwrap_or(true);

            if let Some(pos) = pk_names.iter().position(|pk| pk.eq_ignore_ascii_case(name)) {
                column = column.primary_key(pos as u32 + 1);
            }

            meta = meta.with_column(column);
        }

        tracing::debug!(
            table = %meta.qualified_name(),
            columns = meta.columns.len(),
            "discovered table schema"
        );

        Ok(meta)
    }
}

/// Fixed table schemas supplied up front.
///
/// Lookup is case-insensitive on schema and table name; an unqualified
/// request matches an unqualified registration or one in `public`.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaProvider {
    tables: Vec<TableMetadata>,
}

impl StaticSchemaProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table schema
    pub fn with_table(mut self, table: TableMetadata) -> Self {
        self.tables.push(table);
        self
    }
}

#[async_trait]
impl SchemaProvider for StaticSchemaProvider {
    async fn table_schema(
        &self,
        _conn: &dyn Connection,
        schema: Option<&str>,
        table: &str,
    ) -> Result<TableMetadata> {
        let wanted_schema = schema.unwrap_or("public");
        self.tables
            .iter()
            .find(|t| {
                t.name.eq_ignore_ascii_case(table)
                    && t.schema
                        .as_deref()
                        .unwrap_or("public")
                        .eq_ignore_ascii_case(wanted_schema)
            })
            .cloned()
            .ok_or_else(|| Error::table_not_found(format!("{wanted_schema}.{table}")))
    }
}

//! Transactional batch collection
//!
//! [`SqlBatchCollector`] accumulates records locally and writes them to the
//! binding's target table as one all-or-nothing upsert. The binding's
//! command text is reused as the table identifier on this path. Nothing
//! touches the store until [`SqlBatchCollector::flush`]; a failed flush
//! keeps the batch so the caller can retry or inspect it.
//!
//! The payload shape is fixed at construction: structured records that
//! serialize to JSON objects, strings already holding JSON documents, or
//! UTF-8 JSON bytes. All three shapes produce identical upserts for
//! equivalent logical data.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::binding::BindingSpec;
use crate::command::{quote_ident, quote_qualified};
use crate::config::ConfigSource;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::resolver::ConnectionResolver;
use crate::schema::{split_table_ident, SchemaProvider};
use crate::types::{ColumnMetadata, TableMetadata, Value};

type EncodeFn<T> = fn(&T) -> Result<Map<String, JsonValue>>;

fn encode_structured<T: Serialize>(item: &T) -> Result<Map<String, JsonValue>> {
    match serde_json::to_value(item) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(other) => Err(Error::type_conversion(format!(
            "batch record must serialize to a JSON object, got {other}"
        ))),
        Err(e) => Err(Error::type_conversion(format!(
            "failed to serialize batch record: {e}"
        ))),
    }
}

fn encode_json_text(item: &String) -> Result<Map<String, JsonValue>> {
    match serde_json::from_str(item) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(other) => Err(Error::type_conversion(format!(
            "batch record must be a JSON object document, got {other}"
        ))),
        Err(e) => Err(Error::type_conversion(format!(
            "batch record is not valid JSON: {e}"
        ))),
    }
}

fn encode_json_bytes(item: &Vec<u8>) -> Result<Map<String, JsonValue>> {
    let text = std::str::from_utf8(item)
        .map_err(|e| Error::type_conversion(format!("batch record is not UTF-8: {e}")))?;
    encode_json_text(&text.to_owned())
}

/// Accumulates records and flushes them as one transactional upsert
pub struct SqlBatchCollector<T> {
    spec: BindingSpec,
    resolver: ConnectionResolver,
    config: Arc<dyn ConfigSource>,
    schema_provider: Arc<dyn SchemaProvider>,
    batch: Vec<T>,
    encode: EncodeFn<T>,
}

impl<T: Serialize> SqlBatchCollector<T> {
    /// Collector for structured records that serialize to JSON objects
    pub fn structured(
        spec: BindingSpec,
        resolver: ConnectionResolver,
        config: Arc<dyn ConfigSource>,
        schema_provider: Arc<dyn SchemaProvider>,
    ) -> Self {
        Self::with_encoding(spec, resolver, config, schema_provider, encode_structured::<T>)
    }
}

impl SqlBatchCollector<String> {
    /// Collector for rows that are already JSON object documents
    pub fn json_text(
        spec: BindingSpec,
        resolver: ConnectionResolver,
        config: Arc<dyn ConfigSource>,
        schema_provider: Arc<dyn SchemaProvider>,
    ) -> Self {
        Self::with_encoding(spec, resolver, config, schema_provider, encode_json_text)
    }
}

impl SqlBatchCollector<Vec<u8>> {
    /// Collector for rows holding UTF-8 JSON object documents as bytes
    pub fn json_bytes(
        spec: BindingSpec,
        resolver: ConnectionResolver,
        config: Arc<dyn ConfigSource>,
        schema_provider: Arc<dyn SchemaProvider>,
    ) -> Self {
        Self::with_encoding(spec, resolver, config, schema_provider, encode_json_bytes)
    }
}

impl<T> SqlBatchCollector<T> {
    fn with_encoding(
        spec: BindingSpec,
        resolver: ConnectionResolver,
        config: Arc<dyn ConfigSource>,
        schema_provider: Arc<dyn SchemaProvider>,
        encode: EncodeFn<T>,
    ) -> Self {
        Self {
            spec,
            resolver,
            config,
            schema_provider,
            batch: Vec::new(),
            encode,
        }
    }

    /// Append a record to the batch. No store interaction happens here.
    pub fn add(&mut self, item: T) {
        self.batch.push(item);
    }

    /// Append a record if present; `None` is a no-op
    pub fn add_opt(&mut self, item: Option<T>) {
        if let Some(item) = item {
            self.batch.push(item);
        }
    }

    /// Number of records waiting to be flushed
    #[inline]
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Check if the batch is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Write the batch as one transactional upsert, then clear it.
    ///
    /// An empty batch returns without touching the store. The target
    /// table's schema is discovered fresh on every flush. Any failure
    /// between discovery and commit rolls the transaction back and
    /// surfaces a batch-write error carrying the serialized payload; the
    /// batch is kept for retry. Returns the number of rows written.
    pub async fn flush(&mut self) -> Result<u64> {
        if self.batch.is_empty() {
            return Ok(0);
        }

        let rows = self
            .batch
            .iter()
            .map(self.encode)
            .collect::<Result<Vec<_>>>()?;
        let payload = serde_json::to_string(&rows)
            .map_err(|e| Error::type_conversion(format!("failed to serialize batch: {e}")))?;

        match self.write_rows(&rows).await {
            Ok(written) => {
                tracing::debug!(
                    table = %self.spec.command_text,
                    rows = written,
                    "batch upsert committed"
                );
                self.batch.clear();
                Ok(written)
            }
            Err(source) => Err(Error::batch_write(payload, source)),
        }
    }

    async fn write_rows(&self, rows: &[Map<String, JsonValue>]) -> Result<u64> {
        let resolved = self.resolver.resolve(&self.spec, &*self.config)?;
        let conn = resolved.open().await?;

        let result = self.upsert(&*conn, rows).await;
        let closed = conn.close().await;
        let written = result?;
        closed?;
        Ok(written)
    }

    async fn upsert(&self, conn: &dyn Connection, rows: &[Map<String, JsonValue>]) -> Result<u64> {
        let (schema, table) = split_table_ident(&self.spec.command_text);
        let meta = self.schema_provider.table_schema(conn, schema, table).await?;

        let (sql, values) = build_upsert(&meta, rows)?;

        let tx = conn.begin().await?;
        match tx.execute(&sql, &values).await {
            Ok(written) => {
                tx.commit().await?;
                Ok(written)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback after failed batch write also failed");
                }
                Err(err)
            }
        }
    }
}

impl<T> std::fmt::Debug for SqlBatchCollector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlBatchCollector")
            .field("table", &self.spec.command_text)
            .field("pending", &self.batch.len())
            .finish_non_exhaustive()
    }
}

/// Coerce a JSON value to the discovered type of its target column.
///
/// The backend's driver rejects parameters whose Rust type does not match
/// the column (an `i64` never binds to `integer`), so every value is
/// narrowed to the column's `data_type` before binding. Unknown type names
/// fall back to the generic JSON mapping.
fn coerce_json(json: &JsonValue, column: &ColumnMetadata) -> Result<Value> {
    use rust_decimal::prelude::FromPrimitive;

    if json.is_null() {
        return Ok(Value::Null);
    }

    let mismatch = || {
        Error::type_conversion(format!(
            "cannot bind {json} to column {:?} of type {}",
            column.name, column.type_name
        ))
    };

    let value = match column.type_name.to_ascii_lowercase().as_str() {
        "smallint" | "int2" => Value::Int16(
            json_i64(json)
                .and_then(|n| i16::try_from(n).ok())
                .ok_or_else(mismatch)?,
        ),
        "integer" | "int" | "int4" => Value::Int32(
            json_i64(json)
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(mismatch)?,
        ),
        "bigint" | "int8" => Value::Int64(json_i64(json).ok_or_else(mismatch)?),
        "real" | "float4" => Value::Float32(json_f64(json).ok_or_else(mismatch)? as f32),
        "double precision" | "float8" => Value::Float64(json_f64(json).ok_or_else(mismatch)?),
        "numeric" | "decimal" => {
            let decimal = match json {
                JsonValue::Number(n) => match n.as_i64() {
                    Some(i) => Some(rust_decimal::Decimal::from(i)),
                    None => n.as_f64().and_then(rust_decimal::Decimal::from_f64),
                },
                JsonValue::String(s) => s.parse().ok(),
                _ => None,
            };
            Value::Decimal(decimal.ok_or_else(mismatch)?)
        }
        "boolean" | "bool" => Value::Bool(json.as_bool().ok_or_else(mismatch)?),
        "uuid" => Value::Uuid(
            json.as_str()
                .and_then(|s| uuid::Uuid::parse_str(s).ok())
                .ok_or_else(mismatch)?,
        ),
        "date" => Value::Date(
            json.as_str()
                .and_then(|s| s.parse().ok())
                .ok_or_else(mismatch)?,
        ),
        "time" | "time without time zone" => Value::Time(
            json.as_str()
                .and_then(|s| s.parse().ok())
                .ok_or_else(mismatch)?,
        ),
        "timestamp" | "timestamp without time zone" => Value::DateTime(
            json.as_str()
                .and_then(parse_naive_datetime)
                .ok_or_else(mismatch)?,
        ),
        "timestamptz" | "timestamp with time zone" => Value::DateTimeTz(
            json.as_str()
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .ok_or_else(mismatch)?,
        ),
        "json" | "jsonb" => Value::Json(json.clone()),
        "text" | "character varying" | "varchar" | "character" | "char" | "bpchar" | "name" => {
            match json {
                JsonValue::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            }
        }
        _ => Value::from_json(json),
    };

    Ok(value)
}

fn json_i64(json: &JsonValue) -> Option<i64> {
    match json {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn json_f64(json: &JsonValue) -> Option<f64> {
    match json {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_naive_datetime(s: &str) -> Option<chrono::NaiveDateTime> {
    s.parse()
        .ok()
        .or_else(|| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
}

/// Render one multi-row upsert statement for the batch.
///
/// Columns are the table's columns that appear in at least one record,
/// in table ordinal order; records missing a column bind NULL for it.
/// Values are coerced to each column's discovered type. With a primary
/// key the statement upserts via ON CONFLICT; without one it degrades to
/// a plain INSERT.
fn build_upsert(
    meta: &TableMetadata,
    rows: &[Map<String, JsonValue>],
) -> Result<(String, Vec<Value>)> {
    let columns: Vec<&ColumnMetadata> = meta
        .columns
        .iter()
        .filter(|c| {
            rows.iter()
                .any(|row| row.keys().any(|k| k.eq_ignore_ascii_case(&c.name)))
        })
        .collect();

    if columns.is_empty() {
        return Err(Error::schema(format!(
            "no batch record field matches a column of {}",
            meta.qualified_name()
        )));
    }

    let mut values = Vec::with_capacity(columns.len() * rows.len());
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let mut placeholders = Vec::with_capacity(columns.len());
        for column in &columns {
            let json = row
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(&column.name))
                .map(|(_, v)| v);
            values.push(match json {
                Some(json) => coerce_json(json, column)?,
                None => Value::Null,
            });
            placeholders.push(format!("${}", values.len()));
        }
        tuples.push(format!("({})", placeholders.join(", ")));
    }

    let column_list = columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_qualified(&meta.qualified_name()),
        column_list,
        tuples.join(", ")
    );

    let pk: Vec<&str> = meta
        .primary_key_columns()
        .into_iter()
        .map(|c| c.name.as_str())
        .filter(|name| columns.iter().any(|c| c.name.eq_ignore_ascii_case(name)))
        .collect();

    if !pk.is_empty() {
        let conflict_list = pk
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| !pk.iter().any(|p| p.eq_ignore_ascii_case(&c.name)))
            .map(|c| format!("{ident} = EXCLUDED.{ident}", ident = quote_ident(&c.name)))
            .collect();

        if updates.is_empty() {
            sql.push_str(&format!(" ON CONFLICT ({conflict_list}) DO NOTHING"));
        } else {
            sql.push_str(&format!(
                " ON CONFLICT ({conflict_list}) DO UPDATE SET {}",
                updates.join(", ")
            ));
        }
    }

    Ok((sql, values))
}

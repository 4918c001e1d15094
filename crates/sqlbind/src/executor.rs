//! Query execution entry points
//!
//! Provides:
//! - QueryExecutor: resolve, open, execute, release for one binding
//! - fetch / fetch_rows / fetch_json: eager materialization
//! - fetch_stream: lazy RowCursor holding its connection open
//!
//! `buffered` on the binding picks the tradeoff: eager paths hold the whole
//! result in memory but release the connection before returning; the lazy
//! cursor keeps memory flat but holds the connection until it is exhausted,
//! closed or dropped.

use std::pin::Pin;

use serde::de::DeserializeOwned;

use crate::binding::BindingSpec;
use crate::command::CommandBuilder;
use crate::config::ConfigSource;
use crate::connection::{Connection, RowStream};
use crate::error::Result;
use crate::resolver::ConnectionResolver;
use crate::types::Row;

/// Executes bindings against the store, one connection per call
#[derive(Clone)]
pub struct QueryExecutor {
    resolver: ConnectionResolver,
}

impl QueryExecutor {
    /// Create an executor over the given resolver
    pub fn new(resolver: ConnectionResolver) -> Self {
        Self { resolver }
    }

    /// Fetch all rows and decode them into a user record type.
    ///
    /// The connection is released before results are handed back.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        spec: &BindingSpec,
        config: &dyn ConfigSource,
    ) -> Result<Vec<T>> {
        let rows = self.fetch_rows(spec, config).await?;
        rows.iter().map(Row::decode).collect()
    }

    /// Fetch all rows as raw [`Row`] values
    pub async fn fetch_rows(&self, spec: &BindingSpec, config: &dyn ConfigSource) -> Result<Vec<Row>> {
        let resolved = self.resolver.resolve(spec, config)?;
        let conn = resolved.open().await?;

        let result = async {
            let command = CommandBuilder::build(spec, &*conn)?;
            command.fetch_rows().await
        }
        .await;

        let closed = conn.close().await;
        let rows = result?;
        closed?;

        tracing::debug!(rows = rows.len(), "binding query materialized");
        Ok(rows)
    }

    /// Fetch rows through a [`RowCursor`].
    ///
    /// A buffered binding materializes eagerly and the cursor replays from
    /// memory with the connection already released. An unbuffered binding
    /// streams: the cursor owns the live connection and releases it when the
    /// stream is exhausted, on [`RowCursor::close`], or on drop.
    pub async fn fetch_stream(
        &self,
        spec: &BindingSpec,
        config: &dyn ConfigSource,
    ) -> Result<RowCursor> {
        if spec.buffered {
            let rows = self.fetch_rows(spec, config).await?;
            return Ok(RowCursor::buffered(rows));
        }

        let resolved = self.resolver.resolve(spec, config)?;
        let conn = resolved.open().await?;

        let stream = match async {
            let command = CommandBuilder::build(spec, &*conn)?;
            command.stream().await
        }
        .await
        {
            Ok(stream) => stream,
            Err(err) => {
                if let Err(close_err) = conn.close().await {
                    tracing::warn!(error = %close_err, "failed to close connection after stream setup error");
                }
                return Err(err);
            }
        };

        Ok(RowCursor::streaming(conn, stream))
    }

    /// Fetch all rows as a JSON array string.
    ///
    /// Always eager regardless of the binding's `buffered` flag; object
    /// field order follows column order and an empty result is `[]`.
    pub async fn fetch_json(&self, spec: &BindingSpec, config: &dyn ConfigSource) -> Result<String> {
        let rows = self.fetch_rows(spec, config).await?;
        let array = serde_json::Value::Array(rows.iter().map(Row::to_json).collect());
        serde_json::to_string(&array)
            .map_err(|e| crate::error::Error::type_conversion(format!("json encoding failed: {e}")))
    }
}

enum CursorInner {
    Buffered(std::vec::IntoIter<Row>),
    Streaming {
        conn: Box<dyn Connection>,
        stream: Pin<Box<dyn RowStream>>,
    },
    Done,
}

/// Lazily iterated query results.
///
/// In streaming mode the cursor owns the connection; dropping the cursor
/// drops the connection, but calling [`RowCursor::close`] surfaces close
/// errors instead of discarding them.
pub struct RowCursor {
    inner: CursorInner,
}

impl RowCursor {
    fn buffered(rows: Vec<Row>) -> Self {
        Self {
            inner: CursorInner::Buffered(rows.into_iter()),
        }
    }

    fn streaming(conn: Box<dyn Connection>, stream: Pin<Box<dyn RowStream>>) -> Self {
        Self {
            inner: CursorInner::Streaming { conn, stream },
        }
    }

    /// Advance to the next raw row, releasing the connection at exhaustion
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        match &mut self.inner {
            CursorInner::Buffered(iter) => Ok(iter.next()),
            CursorInner::Streaming { stream, .. } => match stream.next().await {
                Ok(Some(row)) => Ok(Some(row)),
                Ok(None) => {
                    self.finish().await?;
                    Ok(None)
                }
                Err(err) => {
                    self.finish().await?;
                    Err(err)
                }
            },
            CursorInner::Done => Ok(None),
        }
    }

    /// Advance and decode the next row into a user record type
    pub async fn next<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        match self.next_row().await? {
            Some(row) => row.decode().map(Some),
            None => Ok(None),
        }
    }

    /// Release the cursor's connection early
    pub async fn close(mut self) -> Result<()> {
        self.finish().await
    }

    async fn finish(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.inner, CursorInner::Done) {
            CursorInner::Streaming { conn, stream } => {
                drop(stream);
                conn.close().await
            }
            _ => Ok(()),
        }
    }
}

//! # sqlbind
//!
//! Declarative SQL binding execution engine.
//!
//! A binding declares a connection reference, command text, command type,
//! optional parameter text and a buffering preference; this crate turns it
//! into executable access against a relational store in two directions:
//!
//! - **Reading**: typed records, a lazily iterated cursor, or JSON text.
//! - **Writing**: accumulate records in a batch collector, then commit them
//!   as one all-or-nothing upsert against a table whose schema is
//!   discovered at flush time.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sqlbind::prelude::*;
//! use std::sync::Arc;
//!
//! let resolver = ConnectionResolver::new(Arc::new(PgConnectionFactory));
//! let executor = QueryExecutor::new(resolver.clone());
//!
//! // Read rows out
//! let spec = BindingSpec::query("SqlConnection", "SELECT * FROM products WHERE cost > @cost")
//!     .with_parameters("@cost=100");
//! let products: Vec<Product> = executor.fetch(&spec, &EnvConfig).await?;
//!
//! // Write a batch in
//! let spec = BindingSpec::table("SqlConnection", "public.products");
//! let mut collector = SqlBatchCollector::structured(
//!     spec,
//!     resolver,
//!     Arc::new(EnvConfig),
//!     Arc::new(InformationSchemaProvider),
//! );
//! collector.add(Product { product_id: 3, name: "Bottle".into(), cost: 90 });
//! collector.flush().await?;
//! ```
//!
//! The engine owns resolution, execution and release; retry policy and
//! trigger dispatch belong to the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod binding;
pub mod collector;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod params;
pub mod postgres;
pub mod resolver;
pub mod schema;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Error, ErrorCategory, Result};

    // Value and type system
    pub use crate::types::{ColumnMetadata, Row, TableMetadata, Value};

    // Binding and parameters
    pub use crate::binding::{BindingSpec, CommandType};
    pub use crate::params::ParameterSet;

    // Configuration and resolution
    pub use crate::config::{ConfigSource, EnvConfig, MapConfig};
    pub use crate::resolver::{ConnectionResolver, ResolvedConnection};

    // Connection traits and config
    pub use crate::connection::{
        Connection, ConnectionConfig, ConnectionFactory, DatabaseType, RowStream, Transaction,
    };

    // Commands and execution
    pub use crate::command::{CommandBuilder, ExecutableCommand};
    pub use crate::executor::{QueryExecutor, RowCursor};

    // Schema discovery
    pub use crate::schema::{InformationSchemaProvider, SchemaProvider, StaticSchemaProvider};

    // Batch collection
    pub use crate::collector::SqlBatchCollector;

    // PostgreSQL backend
    pub use crate::postgres::PgConnectionFactory;
}

// Re-export commonly used items at crate root
pub use binding::BindingSpec;
pub use error::{Error, Result};
pub use types::Value;

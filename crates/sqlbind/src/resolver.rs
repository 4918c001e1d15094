//! Connection resolution
//!
//! Turns a binding's connection reference into a [`ResolvedConnection`]: a
//! connection configuration plus the factory able to open it. Resolution is
//! pure lookup and construction; no network I/O and no retry happen here.
//! Opening is the caller's responsibility and must be paired with release on
//! every exit path.

use std::sync::Arc;

use crate::binding::BindingSpec;
use crate::config::ConfigSource;
use crate::connection::{Connection, ConnectionConfig, ConnectionFactory};
use crate::error::{Error, Result};

/// Resolves binding connection references against a configuration source
#[derive(Clone)]
pub struct ConnectionResolver {
    factory: Arc<dyn ConnectionFactory>,
}

impl ConnectionResolver {
    /// Create a resolver for the given backend factory
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }

    /// Resolve the binding's connection reference into an openable handle.
    ///
    /// Fails with a configuration error when the binding names no
    /// connection setting or the setting is absent from `config`.
    pub fn resolve(
        &self,
        spec: &BindingSpec,
        config: &dyn ConfigSource,
    ) -> Result<ResolvedConnection> {
        if spec.connection_ref.is_empty() {
            return Err(Error::config(
                "binding must name a connection setting holding the connection string",
            ));
        }

        let url = config.get(&spec.connection_ref).ok_or_else(|| {
            Error::config(format!(
                "connection setting {:?} not found in configuration",
                spec.connection_ref
            ))
        })?;

        tracing::debug!(setting = %spec.connection_ref, "resolved connection reference");

        Ok(ResolvedConnection {
            config: ConnectionConfig::new(url),
            factory: Arc::clone(&self.factory),
        })
    }
}

/// An openable connection handle produced by [`ConnectionResolver`].
///
/// Holds the resolved connection string; nothing is opened until
/// [`ResolvedConnection::open`] is called.
#[derive(Clone)]
pub struct ResolvedConnection {
    config: ConnectionConfig,
    factory: Arc<dyn ConnectionFactory>,
}

impl ResolvedConnection {
    /// The resolved connection configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open a live connection. The caller owns it exclusively and must
    /// close it on every exit path.
    pub async fn open(&self) -> Result<Box<dyn Connection>> {
        self.factory.connect(&self.config).await
    }
}

impl std::fmt::Debug for ResolvedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConnection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::connection::DatabaseType;
    use async_trait::async_trait;

    struct NullFactory;

    #[async_trait]
    impl ConnectionFactory for NullFactory {
        async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
            Err(Error::connection("not implemented"))
        }

        fn database_type(&self) -> DatabaseType {
            DatabaseType::Unknown
        }
    }

    fn resolver() -> ConnectionResolver {
        ConnectionResolver::new(Arc::new(NullFactory))
    }

    #[test]
    fn test_resolve_missing_reference() {
        let spec = BindingSpec::query("", "SELECT 1");
        let err = resolver().resolve(&spec, &MapConfig::new()).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_resolve_missing_setting() {
        let spec = BindingSpec::query("SqlConnection", "SELECT 1");
        let err = resolver().resolve(&spec, &MapConfig::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration { message } if message.contains("SqlConnection")
        ));
    }

    #[test]
    fn test_resolve_builds_config_without_connecting() {
        let spec = BindingSpec::query("SqlConnection", "SELECT 1");
        let config = MapConfig::new().with("SqlConnection", "postgres://localhost/db");

        let resolved = resolver().resolve(&spec, &config).unwrap();
        assert_eq!(resolved.config().url, "postgres://localhost/db");
    }
}

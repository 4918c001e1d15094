//! Declarative binding specification
//!
//! A [`BindingSpec`] is the small configuration record the trigger layer
//! hands to the engine: which connection setting to use, what to run (or
//! which table to write), how to bind parameters and whether results are
//! buffered.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// How the command text is interpreted when reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    /// Command text is a raw SQL query, executed verbatim
    #[default]
    RawQuery,
    /// Command text names a stored procedure/routine to invoke
    StoredProcedure,
}

impl FromStr for CommandType {
    type Err = Error;

    /// Parse a command type from configuration text.
    ///
    /// This is the boundary where an unsupported command type surfaces:
    /// once a [`CommandType`] exists it is one of the two supported values
    /// by construction.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw_query" | "text" => Ok(Self::RawQuery),
            "stored_procedure" => Ok(Self::StoredProcedure),
            other => Err(Error::unsupported_command_type(other)),
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RawQuery => write!(f, "raw_query"),
            Self::StoredProcedure => write!(f, "stored_procedure"),
        }
    }
}

/// Declarative binding supplied by the external trigger layer.
///
/// Immutable once constructed. For input bindings `command_text` is the
/// query or routine name; for output bindings (batch upsert) the same field
/// is reused as the target table identifier, optionally schema-qualified
/// (`public.products`). That overload is deliberate and mirrors the binding
/// direction: reads run it, writes write into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSpec {
    /// Name of the configuration setting holding the connection string
    pub connection_ref: String,
    /// Query text, routine name, or target table identifier
    pub command_text: String,
    /// How `command_text` is interpreted when reading
    #[serde(default)]
    pub command_type: CommandType,
    /// Parameter mini-language text (`@name1=value1,@name2=value2`)
    #[serde(default)]
    pub parameter_text: Option<String>,
    /// Whether query results are eagerly materialized
    #[serde(default = "default_buffered")]
    pub buffered: bool,
}

fn default_buffered() -> bool {
    true
}

impl BindingSpec {
    /// Create a raw-query binding (buffered by default)
    pub fn query(connection_ref: impl Into<String>, command_text: impl Into<String>) -> Self {
        Self {
            connection_ref: connection_ref.into(),
            command_text: command_text.into(),
            command_type: CommandType::RawQuery,
            parameter_text: None,
            buffered: true,
        }
    }

    /// Create a stored-procedure binding (buffered by default)
    pub fn stored_procedure(
        connection_ref: impl Into<String>,
        routine: impl Into<String>,
    ) -> Self {
        Self {
            connection_ref: connection_ref.into(),
            command_text: routine.into(),
            command_type: CommandType::StoredProcedure,
            parameter_text: None,
            buffered: true,
        }
    }

    /// Create an output binding targeting a table for batch upserts.
    ///
    /// `table` lands in `command_text`; see the type-level note about the
    /// field overload.
    pub fn table(connection_ref: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            connection_ref: connection_ref.into(),
            command_text: table.into(),
            command_type: CommandType::RawQuery,
            parameter_text: None,
            buffered: true,
        }
    }

    /// Attach parameter text
    pub fn with_parameters(mut self, text: impl Into<String>) -> Self {
        self.parameter_text = Some(text.into());
        self
    }

    /// Select unbuffered (lazy cursor) execution
    pub fn unbuffered(mut self) -> Self {
        self.buffered = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_type_from_str() {
        assert_eq!(
            "raw_query".parse::<CommandType>().unwrap(),
            CommandType::RawQuery
        );
        assert_eq!(
            "stored_procedure".parse::<CommandType>().unwrap(),
            CommandType::StoredProcedure
        );

        let err = "table_direct".parse::<CommandType>().unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedCommandType { value } if value == "table_direct"
        ));
    }

    #[test]
    fn test_binding_builders() {
        let spec = BindingSpec::query("SqlConnection", "SELECT * FROM products")
            .with_parameters("@cost=100")
            .unbuffered();

        assert_eq!(spec.connection_ref, "SqlConnection");
        assert_eq!(spec.command_type, CommandType::RawQuery);
        assert_eq!(spec.parameter_text.as_deref(), Some("@cost=100"));
        assert!(!spec.buffered);

        let spec = BindingSpec::stored_procedure("SqlConnection", "get_products");
        assert_eq!(spec.command_type, CommandType::StoredProcedure);
        assert!(spec.buffered);

        let spec = BindingSpec::table("SqlConnection", "public.products");
        assert_eq!(spec.command_text, "public.products");
    }

    #[test]
    fn test_binding_spec_deserialization() {
        let spec: BindingSpec = serde_json::from_str(
            r#"{
                "connection_ref": "SqlConnection",
                "command_text": "SELECT 1",
                "command_type": "stored_procedure"
            }"#,
        )
        .unwrap();

        assert_eq!(spec.command_type, CommandType::StoredProcedure);
        assert!(spec.buffered);
        assert!(spec.parameter_text.is_none());
    }
}

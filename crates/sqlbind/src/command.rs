//! Executable commands
//!
//! [`CommandBuilder`] combines a binding, an open connection and the parsed
//! parameters into an [`ExecutableCommand`]. Command text is passed through
//! verbatim; parameters are always bound, never interpolated into the text.
//! Rendering to the backend's positional placeholder form happens at
//! execution time.

use std::pin::Pin;

use crate::binding::{BindingSpec, CommandType};
use crate::connection::{Connection, RowStream};
use crate::error::Result;
use crate::params;
use crate::types::{Row, Value};

/// Quote a single SQL identifier
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified identifier (`public.products`)
pub(crate) fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// A command bound to a connection, ready for a single execution.
///
/// Lifetime is bounded by the borrowed connection; the command holds the
/// verbatim text, the command type and the ordered bound parameters.
pub struct ExecutableCommand<'a> {
    connection: &'a dyn Connection,
    text: String,
    kind: CommandType,
    parameters: Vec<(String, Value)>,
}

impl<'a> ExecutableCommand<'a> {
    /// Create a command with no parameters bound yet
    pub fn new(connection: &'a dyn Connection, text: impl Into<String>, kind: CommandType) -> Self {
        Self {
            connection,
            text: text.into(),
            kind,
            parameters: Vec::new(),
        }
    }

    /// Attach a typed bound parameter. Order of attachment determines
    /// placeholder numbering.
    pub fn bind_parameter(&mut self, name: impl Into<String>, value: Value) {
        self.parameters.push((name.into(), value));
    }

    /// The verbatim command text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The command type
    pub fn kind(&self) -> CommandType {
        self.kind
    }

    /// The bound parameters in attachment order
    pub fn parameters(&self) -> &[(String, Value)] {
        &self.parameters
    }

    /// Render to positional SQL and the ordered parameter values.
    ///
    /// Raw queries have each `@name` reference rewritten to the positional
    /// placeholder of the matching bound parameter; unknown `@` sequences
    /// are left untouched. Stored procedures render as a routine invocation
    /// with one placeholder per bound parameter.
    pub fn render(&self) -> (String, Vec<Value>) {
        let values: Vec<Value> = self.parameters.iter().map(|(_, v)| v.clone()).collect();
        let sql = match self.kind {
            CommandType::RawQuery => self.rewrite_placeholders(),
            CommandType::StoredProcedure => {
                let args: Vec<String> = (1..=self.parameters.len())
                    .map(|i| format!("${i}"))
                    .collect();
                format!(
                    "SELECT * FROM {}({})",
                    quote_qualified(&self.text),
                    args.join(", ")
                )
            }
        };
        (sql, values)
    }

    fn rewrite_placeholders(&self) -> String {
        let mut out = String::with_capacity(self.text.len() + 8);
        let mut rest = self.text.as_str();

        while let Some(at) = rest.find(params::NAME_PREFIX) {
            out.push_str(&rest[..at]);
            let after = &rest[at + 1..];
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..end];

            match self.parameters.iter().position(|(n, _)| n == name) {
                Some(idx) => {
                    out.push('$');
                    out.push_str(&(idx + 1).to_string());
                    rest = &after[end..];
                }
                None => {
                    out.push(params::NAME_PREFIX);
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }

    /// Execute and return all rows
    pub async fn fetch_rows(&self) -> Result<Vec<Row>> {
        let (sql, values) = self.render();
        self.connection.query(&sql, &values).await
    }

    /// Execute and stream rows
    pub async fn stream(&self) -> Result<Pin<Box<dyn RowStream>>> {
        let (sql, values) = self.render();
        self.connection.query_stream(&sql, &values).await
    }

    /// Execute as a statement, returning the affected row count
    pub async fn execute(&self) -> Result<u64> {
        let (sql, values) = self.render();
        self.connection.execute(&sql, &values).await
    }
}

impl std::fmt::Debug for ExecutableCommand<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableCommand")
            .field("text", &self.text)
            .field("kind", &self.kind)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Builds executable commands from binding specifications
pub struct CommandBuilder;

impl CommandBuilder {
    /// Build a command for the binding against an open connection.
    ///
    /// Only raw queries and stored procedures are supported; the closed
    /// [`CommandType`] enum guarantees that here, and any other value read
    /// from configuration text already failed at the [`CommandType`] parse
    /// boundary with an unsupported-command-type error. Parameter
    /// attachment is delegated to the parameter codec.
    pub fn build<'a>(
        spec: &BindingSpec,
        connection: &'a dyn Connection,
    ) -> Result<ExecutableCommand<'a>> {
        match spec.command_type {
            CommandType::RawQuery | CommandType::StoredProcedure => {}
        }

        let mut command =
            ExecutableCommand::new(connection, spec.command_text.clone(), spec.command_type);
        params::bind(spec.parameter_text.as_deref(), &mut command)?;
        Ok(command)
    }
}

//! Parameter mini-language codec
//!
//! Parses the compact parameter syntax `@name1=value1,@name2=value2` into
//! an ordered [`ParameterSet`], or binds the pairs directly onto an
//! [`ExecutableCommand`].
//!
//! Splitting on `,` is tolerant: empty segments from leading, trailing or
//! doubled separators are dropped, so `,,@a=1,@b=2,,` parses like
//! `@a=1,@b=2`. Each remaining segment must split into exactly two
//! non-empty parts on `=` and the name must carry the `@` prefix.
//!
//! Known limitation: there is no escaping, so values containing `,` or `=`
//! cannot be represented. Values always bind as SQL text; queries comparing
//! against non-text columns should cast explicitly (e.g. `$1::int`).

use crate::command::ExecutableCommand;
use crate::error::{Error, Result};
use crate::types::Value;

/// Sentinel prefix every parameter name must carry
pub const NAME_PREFIX: char = '@';

const PAIR_SEPARATOR: char = ',';
const VALUE_SEPARATOR: char = '=';

/// Ordered parameter name/value pairs parsed from the mini-language.
///
/// Names are stored without the `@` sentinel and are unique within a set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    entries: Vec<(String, String)>,
}

impl ParameterSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the set is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a value by parameter name (without the sentinel prefix)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Check whether a parameter name is present
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Iterate over pairs in parse order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl IntoIterator for ParameterSet {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Parse parameter text into an ordered [`ParameterSet`].
///
/// `None` (binding declared no parameters) yields an empty set.
pub fn parse(text: Option<&str>) -> Result<ParameterSet> {
    let mut set = ParameterSet::new();
    let Some(text) = text else {
        return Ok(set);
    };

    for segment in text.split(PAIR_SEPARATOR).filter(|s| !s.is_empty()) {
        let mut parts = segment.split(VALUE_SEPARATOR);
        let (name, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(value), None) if !name.is_empty() && !value.is_empty() => {
                (name, value)
            }
            _ => return Err(Error::malformed_parameter(segment)),
        };

        let name = name
            .strip_prefix(NAME_PREFIX)
            .ok_or_else(|| Error::missing_prefix(segment))?;
        if name.is_empty() || set.contains(name) {
            return Err(Error::malformed_parameter(segment));
        }

        set.entries.push((name.to_owned(), value.to_owned()));
    }

    Ok(set)
}

/// Parse parameter text and attach each pair as a typed bound parameter on
/// `command`, instead of returning a mapping.
pub fn bind(text: Option<&str>, command: &mut ExecutableCommand<'_>) -> Result<()> {
    for (name, value) in parse(text)? {
        command.bind_parameter(name, Value::String(value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absent_and_empty() {
        assert!(parse(None).unwrap().is_empty());
        assert!(parse(Some("")).unwrap().is_empty());
        assert!(parse(Some(",,,")).unwrap().is_empty());
    }

    #[test]
    fn test_parse_pairs() {
        let set = parse(Some("@a=1,@b=2")).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a"), Some("1"));
        assert_eq!(set.get("b"), Some("2"));

        let names: Vec<_> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_tolerates_stray_separators() {
        let set = parse(Some(",,@a=1,,@b=2,,,")).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a"), Some("1"));
        assert_eq!(set.get("b"), Some("2"));
    }

    #[test]
    fn test_parse_cardinality_matches_non_empty_segments() {
        let text = ",@x=10,,@y=20,@z=30,";
        let non_empty = text.split(',').filter(|s| !s.is_empty()).count();
        let set = parse(Some(text)).unwrap();
        assert_eq!(set.len(), non_empty);
    }

    #[test]
    fn test_parse_malformed_segment() {
        let err = parse(Some("@a=1=2")).unwrap_err();
        assert!(matches!(err, Error::MalformedParameter { segment } if segment == "@a=1=2"));

        // Empty name or value is malformed, not silently dropped
        assert!(matches!(
            parse(Some("@a=")).unwrap_err(),
            Error::MalformedParameter { .. }
        ));
        assert!(matches!(
            parse(Some("=1")).unwrap_err(),
            Error::MalformedParameter { .. }
        ));
        assert!(matches!(
            parse(Some("@a")).unwrap_err(),
            Error::MalformedParameter { .. }
        ));
    }

    #[test]
    fn test_parse_missing_prefix() {
        let err = parse(Some("a=1")).unwrap_err();
        assert!(matches!(err, Error::MissingPrefix { segment } if segment == "a=1"));

        // A lone '@' is not a name
        assert!(matches!(
            parse(Some("@=1")).unwrap_err(),
            Error::MalformedParameter { .. }
        ));
    }

    #[test]
    fn test_parse_rejects_duplicate_names() {
        let err = parse(Some("@a=1,@a=2")).unwrap_err();
        assert!(matches!(err, Error::MalformedParameter { segment } if segment == "@a=2"));
    }
}

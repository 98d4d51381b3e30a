//! Parse-time error taxonomy and the per-document error collection.

use std::collections::BTreeMap;
use std::fmt;

/// Errors recorded while compiling a schema into a generator tree.
///
/// Only `Decode` aborts parsing; everything else is accumulated against the
/// schema path that produced it and the offending node degrades to a null
/// fallback generator.
#[derive(Clone, Debug)]
pub enum ParseError {
    /// The top-level document could not be decoded as a JSON Schema.
    Decode(String),
    /// A keyword the generator refuses to honor.
    Unsupported(String),
    /// A `$ref` pointed at a path that does not exist.
    RefNotFound(String),
    /// An external document could not be fetched or decoded.
    DocumentLoadFailed(String),
    /// A `pattern` or pattern-property key failed to compile.
    InvalidRegex(String),
    /// Numeric or length bounds contradict each other.
    InvalidBounds(String),
    /// The schema is satisfiable by no value (e.g. fully pruned enum).
    IllogicalSchema(String),
    /// Merging produced a contradiction; recovery was best-effort.
    ConfigMergeError(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Decode(message) => write!(f, "failed to decode schema: {message}"),
            ParseError::Unsupported(message) => write!(f, "unsupported keyword: {message}"),
            ParseError::RefNotFound(message) => write!(f, "reference not found: {message}"),
            ParseError::DocumentLoadFailed(message) => {
                write!(f, "failed to load document: {message}")
            }
            ParseError::InvalidRegex(message) => write!(f, "invalid regex: {message}"),
            ParseError::InvalidBounds(message) => write!(f, "invalid bounds: {message}"),
            ParseError::IllogicalSchema(message) => write!(f, "illogical schema: {message}"),
            ParseError::ConfigMergeError(message) => write!(f, "schema merge error: {message}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Two-level error map: document id -> schema path -> error.
#[derive(Clone, Debug, Default)]
pub struct ErrorCollection {
    errors: BTreeMap<String, BTreeMap<String, ParseError>>,
}

impl ErrorCollection {
    pub fn add(&mut self, document: &str, path: &str, error: ParseError) {
        self.errors
            .entry(document.to_string())
            .or_default()
            .insert(path.to_string(), error);
    }

    pub fn has_errors(&self) -> bool {
        self.errors.values().any(|paths| !paths.is_empty())
    }

    /// Flattens the two-level map into `"document -> path"` keys.
    pub fn collect(&self) -> BTreeMap<String, &ParseError> {
        let mut flattened = BTreeMap::new();
        for (document, paths) in &self.errors {
            for (path, error) in paths {
                flattened.insert(format!("{document} -> {path}"), error);
            }
        }
        flattened
    }

    pub fn for_document(&self, document: &str) -> Option<&BTreeMap<String, ParseError>> {
        self.errors.get(document)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, ParseError>)> {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_flattens_documents_and_paths() {
        let mut errors = ErrorCollection::default();
        errors.add("urn:a", "#/properties/x", ParseError::Unsupported("x".into()));
        errors.add("urn:b", "#", ParseError::InvalidBounds("y".into()));
        let flattened = errors.collect();
        assert_eq!(flattened.len(), 2);
        assert!(flattened.contains_key("urn:a -> #/properties/x"));
        assert!(errors.has_errors());
    }
}

//! Reference registry, resolution stack, and JSON-pointer walking.

use std::collections::BTreeMap;

use crate::error::ParseError;
use crate::generator::GenIndex;
use crate::schema::SchemaNode;

/// Two-level map from `(document id, pointer)` to a compiled generator slot.
///
/// Every parsed node registers exactly one entry under its running path so
/// `$ref` targets late-bind to generators rather than schema nodes. Cycles
/// are broken at generation time by the resolution stack.
#[derive(Debug, Default)]
pub(crate) struct ReferenceRegistry {
    references: BTreeMap<String, BTreeMap<String, GenIndex>>,
}

impl ReferenceRegistry {
    pub(crate) fn add(&mut self, document: &str, pointer: &str, index: GenIndex) {
        self.references
            .entry(document.to_string())
            .or_default()
            .insert(pointer.to_string(), index);
    }

    pub(crate) fn lookup(&self, document: &str, pointer: &str) -> Option<GenIndex> {
        self.references.get(document)?.get(pointer).copied()
    }
}

/// Running JSON-pointer maintained by the parser via push/pop.
#[derive(Clone, Debug)]
pub(crate) struct PathTracker {
    current: String,
}

impl PathTracker {
    pub(crate) fn new() -> Self {
        Self {
            current: "#".to_string(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.current = "#".to_string();
    }

    pub(crate) fn push(&mut self, part: &str) {
        self.current.push_str(part);
    }

    pub(crate) fn pop(&mut self, part: &str) {
        let len = self.current.len().saturating_sub(part.len());
        self.current.truncate(len);
    }

    pub(crate) fn current(&self) -> &str {
        &self.current
    }
}

/// One `(document id, pointer)` pair on a resolution stack.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ResolutionFrame {
    pub(crate) document: String,
    pub(crate) pointer: String,
}

/// Stack of in-flight reference resolutions. One instance serves the
/// compile-time merger, a separate instance serves generation; the two
/// never interleave.
#[derive(Clone, Debug, Default)]
pub(crate) struct ReferenceResolver {
    frames: Vec<ResolutionFrame>,
}

impl ReferenceResolver {
    pub(crate) fn push(&mut self, frame: ResolutionFrame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }

    pub(crate) fn contains(&self, frame: &ResolutionFrame) -> bool {
        self.frames.contains(frame)
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn formatted(&self) -> String {
        self.frames
            .iter()
            .map(|frame| format!("{}{}", frame.document, frame.pointer))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Encodes one RFC 6901 pointer segment (`~` -> `~0`, `/` -> `~1`), so
/// registry paths line up with the fragments `$ref`s use.
pub(crate) fn encode_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Decodes one RFC 6901 pointer segment (`~0` -> `~`, `~1` -> `/`).
pub(crate) fn decode_pointer_segment(segment: &str) -> String {
    let mut decoded = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(ch) = chars.next() {
        if ch == '~' {
            match chars.next() {
                Some('0') => decoded.push('~'),
                Some('1') => decoded.push('/'),
                Some(other) => {
                    decoded.push('~');
                    decoded.push(other);
                }
                None => decoded.push('~'),
            }
        } else {
            decoded.push(ch);
        }
    }
    decoded
}

/// Resolves a fragment pointer (`#`, `#/properties/foo`, ...) against a
/// schema node tree.
pub(crate) fn resolve_pointer<'a>(
    node: &'a SchemaNode,
    pointer: &str,
) -> Result<&'a SchemaNode, ParseError> {
    let trimmed = pointer.strip_prefix('#').unwrap_or(pointer);
    let tokens: Vec<String> = trimmed
        .split('/')
        .filter(|token| !token.is_empty())
        .map(decode_pointer_segment)
        .collect();
    walk_pointer(node, &tokens, pointer)
}

fn walk_pointer<'a>(
    node: &'a SchemaNode,
    tokens: &[String],
    full: &str,
) -> Result<&'a SchemaNode, ParseError> {
    let Some((token, rest)) = tokens.split_first() else {
        return Ok(node);
    };

    let dangling = || ParseError::RefNotFound(format!("no schema at '{token}' in '{full}'"));

    match token.as_str() {
        "properties" => walk_keyed(node.properties.as_ref(), rest, full),
        "patternProperties" => walk_keyed(node.pattern_properties.as_ref(), rest, full),
        "$defs" => walk_keyed(node.defs.as_ref(), rest, full),
        "definitions" => walk_keyed(node.definitions.as_ref(), rest, full),
        "additionalProperties" => {
            let schema = node
                .additional_properties
                .as_ref()
                .and_then(|extra| extra.schema())
                .ok_or_else(dangling)?;
            walk_pointer(schema, rest, full)
        }
        "items" => match node.items.as_ref() {
            Some(items) => {
                if let Some(schema) = items.schema() {
                    walk_pointer(schema, rest, full)
                } else if let Some(tuple) = items.tuple() {
                    walk_indexed(Some(tuple), rest, full)
                } else {
                    Err(dangling())
                }
            }
            None => Err(dangling()),
        },
        "prefixItems" => walk_indexed(node.prefix_items.as_deref(), rest, full),
        "allOf" => walk_indexed(node.all_of.as_deref(), rest, full),
        "oneOf" => walk_indexed(node.one_of.as_deref(), rest, full),
        "anyOf" => Err(ParseError::RefNotFound(format!(
            "anyOf nodes cannot be referenced ('{full}')"
        ))),
        "contains" => walk_boxed(node.contains.as_deref(), rest, full, dangling),
        "not" => walk_boxed(node.not.as_deref(), rest, full, dangling),
        "if" => walk_boxed(node.if_.as_deref(), rest, full, dangling),
        "then" => walk_boxed(node.then_.as_deref(), rest, full, dangling),
        "else" => walk_boxed(node.else_.as_deref(), rest, full, dangling),
        "additionalItems" => {
            let schema = node
                .additional_items
                .as_ref()
                .and_then(|extra| extra.schema())
                .ok_or_else(dangling)?;
            walk_pointer(schema, rest, full)
        }
        "unevaluatedItems" => {
            let schema = node
                .unevaluated_items
                .as_ref()
                .and_then(|extra| extra.schema())
                .ok_or_else(dangling)?;
            walk_pointer(schema, rest, full)
        }
        _ => Err(ParseError::RefNotFound(format!(
            "invalid reference step '{token}' in '{full}'"
        ))),
    }
}

fn walk_keyed<'a>(
    map: Option<&'a std::collections::BTreeMap<String, SchemaNode>>,
    tokens: &[String],
    full: &str,
) -> Result<&'a SchemaNode, ParseError> {
    let map = map.ok_or_else(|| ParseError::RefNotFound(format!("no entries in '{full}'")))?;
    let Some((name, rest)) = tokens.split_first() else {
        return Err(ParseError::RefNotFound(format!(
            "missing key after container in '{full}'"
        )));
    };
    let child = map
        .get(name)
        .ok_or_else(|| ParseError::RefNotFound(format!("'{name}' not found in '{full}'")))?;
    walk_pointer(child, rest, full)
}

fn walk_indexed<'a>(
    nodes: Option<&'a [SchemaNode]>,
    tokens: &[String],
    full: &str,
) -> Result<&'a SchemaNode, ParseError> {
    let nodes = nodes.ok_or_else(|| ParseError::RefNotFound(format!("no items in '{full}'")))?;
    let Some((index, rest)) = tokens.split_first() else {
        return Err(ParseError::RefNotFound(format!(
            "missing index after container in '{full}'"
        )));
    };
    let index: usize = index.parse().map_err(|_| {
        ParseError::RefNotFound(format!("index '{index}' is not a number in '{full}'"))
    })?;
    let child = nodes
        .get(index)
        .ok_or_else(|| ParseError::RefNotFound(format!("index {index} out of bounds in '{full}'")))?;
    walk_pointer(child, rest, full)
}

fn walk_boxed<'a>(
    node: Option<&'a SchemaNode>,
    tokens: &[String],
    full: &str,
    dangling: impl Fn() -> ParseError,
) -> Result<&'a SchemaNode, ParseError> {
    walk_pointer(node.ok_or_else(dangling)?, tokens, full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: serde_json::Value) -> SchemaNode {
        serde_json::from_value(value).expect("schema node")
    }

    #[test]
    fn decodes_escaped_segments() {
        assert_eq!(decode_pointer_segment("a~1b"), "a/b");
        assert_eq!(decode_pointer_segment("a~0b"), "a~b");
        assert_eq!(decode_pointer_segment("plain"), "plain");
    }

    #[test]
    fn resolves_nested_properties_and_defs() {
        let root = node(json!({
            "$defs": {"leaf": {"type": "integer"}},
            "properties": {
                "outer": {"properties": {"inner": {"type": "string"}}}
            }
        }));

        let leaf = resolve_pointer(&root, "#/$defs/leaf").expect("defs path");
        assert!(leaf.type_.is_some());

        let inner = resolve_pointer(&root, "#/properties/outer/properties/inner").expect("nested");
        assert!(inner.type_.is_some());
    }

    #[test]
    fn resolves_tuple_indices_through_items_and_prefix_items() {
        let root = node(json!({
            "prefixItems": [{"type": "string"}, {"type": "number"}],
        }));
        let second = resolve_pointer(&root, "#/prefixItems/1").expect("index path");
        assert!(second.type_.is_some());
    }

    #[test]
    fn dangling_paths_and_any_of_are_rejected() {
        let root = node(json!({"anyOf": [{"type": "string"}]}));
        assert!(resolve_pointer(&root, "#/anyOf/0").is_err());
        assert!(resolve_pointer(&root, "#/properties/missing").is_err());
    }

    #[test]
    fn path_tracker_pushes_and_pops() {
        let mut path = PathTracker::new();
        path.push("/properties/a");
        assert_eq!(path.current(), "#/properties/a");
        path.push("/items");
        path.pop("/items");
        path.pop("/properties/a");
        assert_eq!(path.current(), "#");
    }
}

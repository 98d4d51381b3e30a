//! Self-schema validation: compiles sub-schema fragments into validators
//! used for enum pruning, const checks, `if` predicates and `oneOf`
//! exclusivity tests.
//!
//! Fragments may contain `$ref`s back into the original document, so the
//! root schema is registered as a resource and every fragment-local ref is
//! rewritten to point into it before compilation.

use jsonschema::{Resource, Validator};
use serde_json::Value as JsonValue;

use crate::error::ParseError;
use crate::schema::SchemaNode;

const ROOT_RESOURCE_URI: &str = "urn:fixgen:root-schema";

pub(crate) struct SchemaValidatorManager {
    root: JsonValue,
}

impl SchemaValidatorManager {
    pub(crate) fn new(root: JsonValue) -> Self {
        Self { root }
    }

    /// Compiles a schema node into a validator.
    pub(crate) fn compile_node(&self, node: &SchemaNode) -> Result<Validator, ParseError> {
        let fragment = serde_json::to_value(node).map_err(|err| {
            ParseError::IllogicalSchema(format!("failed to serialize sub-schema: {err}"))
        })?;
        self.compile_value(&fragment)
    }

    /// Compiles a raw schema value into a validator.
    pub(crate) fn compile_value(&self, fragment: &JsonValue) -> Result<Validator, ParseError> {
        let mut fragment = fragment.clone();
        rewrite_local_refs(&mut fragment);

        let resource = Resource::from_contents(self.root.clone()).map_err(|err| {
            ParseError::IllogicalSchema(format!("failed to register root schema: {err}"))
        })?;
        let document_resource = Resource::from_contents(self.root.clone()).map_err(|err| {
            ParseError::IllogicalSchema(format!("failed to register root schema: {err}"))
        })?;
        jsonschema::options()
            .with_resource(ROOT_RESOURCE_URI, resource)
            // Merged subtrees may carry refs rewritten to the root document
            // id; register the root under that id as well.
            .with_resource(crate::document::ROOT_DOCUMENT_ID, document_resource)
            .build(&fragment)
            .map_err(|err| {
                ParseError::IllogicalSchema(format!("failed to compile sub-schema: {err}"))
            })
    }
}

/// Points fragment-local `$ref`s at the registered root resource.
fn rewrite_local_refs(value: &mut JsonValue) {
    match value {
        JsonValue::Object(map) => {
            if let Some(JsonValue::String(reference)) = map.get_mut("$ref") {
                if reference.starts_with('#') {
                    *reference = format!("{ROOT_RESOURCE_URI}{reference}");
                }
            }
            for child in map.values_mut() {
                rewrite_local_refs(child);
            }
        }
        JsonValue::Array(items) => {
            for child in items.iter_mut() {
                rewrite_local_refs(child);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compiles_plain_fragments() {
        let manager = SchemaValidatorManager::new(json!({"type": "object"}));
        let validator = manager
            .compile_value(&json!({"type": "integer", "minimum": 3}))
            .expect("validator");
        assert!(validator.is_valid(&json!(4)));
        assert!(!validator.is_valid(&json!(2)));
    }

    #[test]
    fn fragment_refs_resolve_into_the_root_document() {
        let manager = SchemaValidatorManager::new(json!({
            "$defs": {"name": {"type": "string", "minLength": 2}}
        }));
        let validator = manager
            .compile_value(&json!({"$ref": "#/$defs/name"}))
            .expect("validator");
        assert!(validator.is_valid(&json!("ok")));
        assert!(!validator.is_valid(&json!("x")));
    }
}

//! Schema AST with optional-presence semantics on every keyword.
//!
//! Absent and present-with-zero-value must stay distinguishable (a schema
//! with `minimum: 0` is not the same as one with no minimum), so every
//! keyword is an `Option` and nothing relies on zero-value sentinels.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::conditional::IfStatement;
use crate::constraint::ConstraintSet;

/// The seven JSON Schema primitive types.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    Array,
    Number,
    Integer,
    String,
    Boolean,
    Null,
}

impl SchemaType {
    pub const ALL: [SchemaType; 7] = [
        SchemaType::Object,
        SchemaType::Array,
        SchemaType::Number,
        SchemaType::Integer,
        SchemaType::String,
        SchemaType::Boolean,
        SchemaType::Null,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::String => "string",
            SchemaType::Boolean => "boolean",
            SchemaType::Null => "null",
        }
    }
}

/// `type` accepts either a single tag or an array of tags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSet {
    Single(SchemaType),
    Multiple(Vec<SchemaType>),
}

impl TypeSet {
    /// Normalizes a list of types into the smallest representation.
    pub fn from_types(types: Vec<SchemaType>) -> Option<TypeSet> {
        let mut deduped: Vec<SchemaType> = Vec::with_capacity(types.len());
        for candidate in types {
            if !deduped.contains(&candidate) {
                deduped.push(candidate);
            }
        }
        let types = deduped;
        match types.len() {
            0 => None,
            1 => Some(TypeSet::Single(types[0])),
            _ => Some(TypeSet::Multiple(types)),
        }
    }

    pub fn types(&self) -> Vec<SchemaType> {
        match self {
            TypeSet::Single(single) => vec![*single],
            TypeSet::Multiple(types) => types.clone(),
        }
    }

    pub fn contains(&self, candidate: SchemaType) -> bool {
        match self {
            TypeSet::Single(single) => *single == candidate,
            TypeSet::Multiple(types) => types.contains(&candidate),
        }
    }
}

/// Keywords such as `additionalProperties` accept a schema or a boolean.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaOrBool {
    Bool(bool),
    Schema(Box<SchemaNode>),
}

impl SchemaOrBool {
    pub fn is_false(&self) -> bool {
        matches!(self, SchemaOrBool::Bool(false))
    }

    pub fn schema(&self) -> Option<&SchemaNode> {
        match self {
            SchemaOrBool::Schema(node) => Some(node),
            SchemaOrBool::Bool(_) => None,
        }
    }
}

/// `items` accepts a schema, `false`, or (legacy) a tuple of schemas
/// equivalent to `prefixItems`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemsField {
    Bool(bool),
    Schema(Box<SchemaNode>),
    Tuple(Vec<SchemaNode>),
}

impl ItemsField {
    pub fn disallows_additional(&self) -> bool {
        matches!(self, ItemsField::Bool(false))
    }

    pub fn schema(&self) -> Option<&SchemaNode> {
        match self {
            ItemsField::Schema(node) => Some(node),
            _ => None,
        }
    }

    pub fn tuple(&self) -> Option<&[SchemaNode]> {
        match self {
            ItemsField::Tuple(nodes) => Some(nodes),
            _ => None,
        }
    }
}

/// One JSON object of a JSON Schema document after decoding.
///
/// The struct is treated as immutable once decoded; the merger builds new
/// nodes instead of mutating shared subtrees. The `merged_if`, `merged_not`
/// and `carried` fields never appear on the wire: they are populated by the
/// merger and the `not` reconciler to hand work to the parser.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemaNode {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<TypeSet>,

    // Object keywords.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, SchemaNode>>,
    #[serde(rename = "patternProperties", skip_serializing_if = "Option::is_none")]
    pub pattern_properties: Option<BTreeMap<String, SchemaNode>>,
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<SchemaOrBool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(rename = "minProperties", skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<i64>,
    #[serde(rename = "maxProperties", skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<i64>,

    // Array keywords.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsField>,
    #[serde(rename = "prefixItems", skip_serializing_if = "Option::is_none")]
    pub prefix_items: Option<Vec<SchemaNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains: Option<Box<SchemaNode>>,
    #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<i64>,
    #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<i64>,
    #[serde(rename = "minContains", skip_serializing_if = "Option::is_none")]
    pub min_contains: Option<i64>,
    #[serde(rename = "maxContains", skip_serializing_if = "Option::is_none")]
    pub max_contains: Option<i64>,
    #[serde(rename = "uniqueItems", skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
    #[serde(rename = "additionalItems", skip_serializing_if = "Option::is_none")]
    pub additional_items: Option<SchemaOrBool>,
    #[serde(rename = "unevaluatedItems", skip_serializing_if = "Option::is_none")]
    pub unevaluated_items: Option<SchemaOrBool>,

    // String keywords.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<i64>,
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,

    // Number keywords. Only the numeric (modern draft) form of the
    // exclusive bounds is accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "exclusiveMinimum", skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<f64>,
    #[serde(rename = "exclusiveMaximum", skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<f64>,
    #[serde(rename = "multipleOf", skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,

    // Value keywords.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<JsonValue>>,
    #[serde(rename = "const", skip_serializing_if = "Option::is_none")]
    pub const_: Option<JsonValue>,

    // Composition keywords.
    #[serde(rename = "allOf", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<SchemaNode>>,
    #[serde(rename = "anyOf", skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<SchemaNode>>,
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<SchemaNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<SchemaNode>>,

    // Conditional keywords.
    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub if_: Option<Box<SchemaNode>>,
    #[serde(rename = "then", skip_serializing_if = "Option::is_none")]
    pub then_: Option<Box<SchemaNode>>,
    #[serde(rename = "else", skip_serializing_if = "Option::is_none")]
    pub else_: Option<Box<SchemaNode>>,

    // Identity keywords.
    #[serde(rename = "$id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "$defs", skip_serializing_if = "Option::is_none")]
    pub defs: Option<BTreeMap<String, SchemaNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definitions: Option<BTreeMap<String, SchemaNode>>,

    // Unsupported keywords, decoded only so they can be rejected.
    #[serde(rename = "dependentRequired", skip_serializing_if = "Option::is_none")]
    pub dependent_required: Option<BTreeMap<String, Vec<String>>>,
    #[serde(rename = "dependentSchemas", skip_serializing_if = "Option::is_none")]
    pub dependent_schemas: Option<BTreeMap<String, SchemaNode>>,

    // Internal-only state, never (de)serialized.
    #[serde(skip)]
    pub merged_if: Vec<IfStatement>,
    #[serde(skip)]
    pub merged_not: Vec<SchemaNode>,
    #[serde(skip)]
    pub carried: ConstraintSet,
}

impl SchemaNode {
    /// True when the node carries no keywords at all.
    pub fn is_empty(&self) -> bool {
        canonical_json_of_node(self) == "{}"
    }

    /// The set of permitted types, or `None` when `type` is absent.
    pub fn declared_types(&self) -> Option<Vec<SchemaType>> {
        self.type_.as_ref().map(TypeSet::types)
    }
}

/// Canonical string form of a JSON value. `serde_json` maps are ordered,
/// so equal values always serialize identically.
pub fn canonical_json(value: &JsonValue) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Canonical string form of a schema node (internal fields excluded).
pub fn canonical_json_of_node(node: &SchemaNode) -> String {
    serde_json::to_string(node).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_valued_keywords_stay_distinguishable_from_absent_ones() {
        let node: SchemaNode = serde_json::from_value(json!({"minimum": 0})).expect("decode");
        assert_eq!(node.minimum, Some(0.0));
        assert!(node.maximum.is_none());

        let empty: SchemaNode = serde_json::from_value(json!({})).expect("decode");
        assert!(empty.minimum.is_none());
        assert!(empty.is_empty());
    }

    #[test]
    fn type_decodes_single_and_multiple_forms() {
        let single: SchemaNode = serde_json::from_value(json!({"type": "string"})).expect("decode");
        assert_eq!(single.type_, Some(TypeSet::Single(SchemaType::String)));

        let multiple: SchemaNode =
            serde_json::from_value(json!({"type": ["string", "null"]})).expect("decode");
        assert!(multiple.type_.as_ref().is_some_and(|set| {
            set.contains(SchemaType::String) && set.contains(SchemaType::Null)
        }));
    }

    #[test]
    fn items_decodes_schema_tuple_and_false_forms() {
        let schema: SchemaNode =
            serde_json::from_value(json!({"items": {"type": "number"}})).expect("decode");
        assert!(schema.items.as_ref().is_some_and(|i| i.schema().is_some()));

        let tuple: SchemaNode =
            serde_json::from_value(json!({"items": [{"type": "number"}, {}]})).expect("decode");
        assert_eq!(tuple.items.as_ref().and_then(|i| i.tuple()).map(<[_]>::len), Some(2));

        let disallowed: SchemaNode = serde_json::from_value(json!({"items": false})).expect("decode");
        assert!(disallowed.items.as_ref().is_some_and(ItemsField::disallows_additional));
    }

    #[test]
    fn internal_fields_never_serialize() {
        let node: SchemaNode = serde_json::from_value(json!({"minLength": 2})).expect("decode");
        assert_eq!(canonical_json_of_node(&node), r#"{"minLength":2}"#);
    }
}

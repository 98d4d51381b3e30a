//! Seed-sweep properties: generated values validate against their source
//! schema, and a fixed seed reproduces output exactly.

use fixgen_core::{parse_schema_str_with_defaults, GeneratorOptions};
use proptest::prelude::*;
use serde_json::json;

fn supported_schemas() -> Vec<serde_json::Value> {
    vec![
        json!({"type": "object",
               "properties": {
                   "id": {"type": "integer", "minimum": 1, "maximum": 10_000},
                   "name": {"type": "string", "minLength": 1, "maxLength": 32},
                   "tags": {"type": "array", "items": {"type": "string"}, "maxItems": 4}
               },
               "required": ["id", "name"],
               "additionalProperties": false}),
        json!({"type": "array",
               "items": {"type": "integer", "minimum": -5, "maximum": 5},
               "minItems": 1,
               "maxItems": 6}),
        json!({"type": "string", "pattern": "^[a-z]{3}[0-9]{2}$"}),
        json!({"type": "number", "minimum": 0, "maximum": 10, "multipleOf": 0.5}),
        json!({"type": "integer", "minimum": 1, "maximum": 20, "multipleOf": 3}),
        json!({"allOf": [{"minimum": 5}, {"maximum": 10}, {"multipleOf": 2}]}),
        json!({"anyOf": [{"type": "string"}, {"type": "integer", "minimum": 0}]}),
        json!({"oneOf": [{"type": "string", "minLength": 1},
                          {"type": "integer", "minimum": 0}]}),
        json!({"enum": ["red", "green", "blue"]}),
        json!({"const": {"kind": "fixed"}}),
        json!({"type": ["string", "integer"]}),
        json!({"type": "integer", "minimum": 0, "maximum": 20,
               "not": {"minimum": 5, "maximum": 15}}),
        json!({"type": "array", "items": {"type": "boolean"},
               "uniqueItems": true, "maxItems": 2}),
        json!({"type": "object",
               "properties": {"left": {"$ref": "#/$defs/leaf"},
                               "right": {"$ref": "#/$defs/leaf"}},
               "required": ["left"],
               "$defs": {"leaf": {"type": "string", "minLength": 2, "maxLength": 8}}}),
    ]
}

proptest! {
    #[test]
    fn generated_values_validate_against_their_schema(seed in any::<u64>()) {
        for schema in supported_schemas() {
            let root = parse_schema_str_with_defaults(&schema.to_string())
                .expect("schema compiles");
            prop_assert!(
                !root.metadata.errors.has_errors(),
                "compile errors for {schema}: {:?}",
                root.metadata.errors.collect()
            );
            let value = root.generate(&GeneratorOptions::default().with_seed(seed));
            let validator = jsonschema::validator_for(&schema).expect("valid schema");
            prop_assert!(
                validator.is_valid(&value),
                "schema {schema} rejected generated value {value}"
            );
        }
    }

    #[test]
    fn identical_seeds_produce_identical_output(seed in any::<u64>()) {
        for schema in supported_schemas() {
            let root = parse_schema_str_with_defaults(&schema.to_string())
                .expect("schema compiles");
            let options = GeneratorOptions::default().with_seed(seed);
            let first = root.generate(&options);
            let second = root.generate(&options);
            prop_assert_eq!(&first, &second, "non-deterministic output for {}", schema);

            // A fresh compile of the same schema must agree as well.
            let recompiled = parse_schema_str_with_defaults(&schema.to_string())
                .expect("schema compiles");
            let third = recompiled.generate(&options);
            prop_assert_eq!(&first, &third, "compile-dependent output for {}", schema);
        }
    }
}

#[test]
fn entropy_seeding_still_terminates() {
    let schema = json!({"type": "object", "properties": {"a": {"type": "string"}}});
    let root = parse_schema_str_with_defaults(&schema.to_string()).expect("schema compiles");
    let value = root.generate(&GeneratorOptions::default());
    assert!(value.is_object());
}

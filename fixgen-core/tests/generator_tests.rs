use fixgen_core::{parse_schema_str, parse_schema_str_with_defaults, GeneratorOptions, ParserOptions};
use serde_json::{json, Value as JsonValue};

fn compile(schema: &JsonValue) -> fixgen_core::Root {
    parse_schema_str_with_defaults(&schema.to_string()).expect("schema compiles")
}

fn validator(schema: &JsonValue) -> jsonschema::Validator {
    jsonschema::validator_for(schema).expect("schema is a valid JSON Schema")
}

fn seeds() -> impl Iterator<Item = u64> {
    (0..24).map(|seed| seed * 7 + 1)
}

#[test]
fn enum_values_intersect_with_negated_enum() {
    let schema = json!({"enum": [1, 2, 3], "not": {"enum": [2]}});
    let root = compile(&schema);
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        assert!(
            value == json!(1) || value == json!(3),
            "expected 1 or 3, got {value}"
        );
    }
}

#[test]
fn conditional_branches_control_the_dependent_property() {
    let schema = json!({
        "type": "object",
        "properties": {"x": {"type": "integer"}},
        "if": {"properties": {"x": {"const": 1}}},
        "then": {"required": ["y"], "properties": {"y": {"const": "yes"}}},
        "else": {"not": {"required": ["y"]}}
    });
    let root = compile(&schema);
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        let object = value.as_object().expect("object output");
        let x_is_one = match object.get("x") {
            None => true,
            Some(x) => x == &json!(1),
        };
        if x_is_one {
            assert_eq!(object.get("y"), Some(&json!("yes")), "then-branch output: {value}");
        } else {
            assert!(object.get("y").is_none(), "else-branch output: {value}");
        }
    }
}

#[test]
fn all_of_merges_string_constraints() {
    let schema = json!({
        "allOf": [
            {"type": "string", "minLength": 5},
            {"maxLength": 10},
            {"pattern": "^[a-z]+$"}
        ]
    });
    let root = compile(&schema);
    let check = validator(&schema);
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        let text = value.as_str().expect("string output");
        assert!(
            (5..=10).contains(&text.chars().count()),
            "length out of bounds: '{text}'"
        );
        assert!(text.chars().all(|ch| ch.is_ascii_lowercase()));
        assert!(check.is_valid(&value));
    }
}

#[test]
fn cyclic_references_terminate_with_a_diagnostic() {
    let schema = json!({
        "$ref": "#/$defs/node",
        "$defs": {
            "node": {
                "type": "object",
                "properties": {"child": {"$ref": "#/$defs/node"}},
                "required": ["child"]
            }
        }
    });
    let root = compile(&schema);
    let options = GeneratorOptions::default()
        .with_seed(3)
        .with_maximum_reference_depth(3);
    let value = root.generate(&options);

    let mut depth = 0;
    let mut cursor = &value;
    loop {
        match cursor {
            JsonValue::Object(object) => {
                cursor = object.get("child").expect("child is required");
                depth += 1;
            }
            JsonValue::String(diagnostic) => {
                assert!(
                    diagnostic.contains("CyclicRef") || diagnostic.contains("MaxDepthExceeded"),
                    "unexpected leaf: {diagnostic}"
                );
                break;
            }
            other => panic!("unexpected node in cycle: {other}"),
        }
        assert!(depth <= 4, "recursion was not bounded");
    }
    assert!(depth >= 1);
}

#[test]
fn negated_multiple_of_precomputes_the_valid_set() {
    let schema = json!({
        "type": "integer",
        "minimum": 0,
        "maximum": 20,
        "multipleOf": 2,
        "not": {"multipleOf": 6}
    });
    let root = compile(&schema);
    let expected = [2.0, 4.0, 8.0, 10.0, 14.0, 16.0, 20.0];
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        let number = value.as_f64().expect("numeric output");
        assert!(
            expected.iter().any(|candidate| (candidate - number).abs() < 1e-9),
            "unexpected value {number}"
        );
    }
}

#[test]
fn cross_document_references_resolve_through_the_filesystem() {
    let dir = std::env::temp_dir().join(format!("fixgen-xdoc-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    std::fs::write(
        dir.join("b.json"),
        json!({"$defs": {"item": {"type": "string", "minLength": 3}}}).to_string(),
    )
    .expect("write referenced document");

    let schema = json!({
        "type": "array",
        "items": {"$ref": "b.json#/$defs/item"},
        "minItems": 2,
        "maxItems": 4
    });
    let options = ParserOptions::default()
        .with_relative_to(format!("file://{}/", dir.display()))
        .with_document_fetch(
            fixgen_core::DocumentFetchOptions::default().with_file_system(
                fixgen_core::FileSystemFetchOptions::default()
                    .with_enabled(true)
                    .with_allowed_paths(vec![dir.display().to_string()])
                    .with_allow_outside_cwd(true),
            ),
        );
    let root = parse_schema_str(&schema.to_string(), &options).expect("schema compiles");
    assert!(
        !root.metadata.errors.has_errors(),
        "unexpected errors: {:?}",
        root.metadata.errors.collect()
    );

    let value = root.generate(&GeneratorOptions::default().with_seed(11));
    let items = value.as_array().expect("array output");
    assert!(items.len() >= 2);
    for item in items {
        let text = item.as_str().expect("items follow the referenced schema");
        assert!(text.chars().count() >= 3, "'{text}' is too short");
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn exact_property_counts_are_honored() {
    let schema = json!({
        "type": "object",
        "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
        "required": ["a", "b"],
        "minProperties": 2,
        "maxProperties": 2
    });
    let root = compile(&schema);
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        let object = value.as_object().expect("object output");
        assert_eq!(object.len(), 2, "got {value}");
        assert!(object.contains_key("a") && object.contains_key("b"));
    }
}

#[test]
fn tuple_prefix_plus_items_fills_to_the_exact_length() {
    let schema = json!({
        "type": "array",
        "prefixItems": [{"const": "a"}, {"const": "b"}],
        "items": {"const": "c"},
        "minItems": 3,
        "maxItems": 3
    });
    let root = compile(&schema);
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        assert_eq!(value, json!(["a", "b", "c"]));
    }
}

#[test]
fn degenerate_integer_range_is_constant() {
    let root = compile(&json!({"type": "integer", "minimum": 0, "maximum": 0}));
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        assert_eq!(value, json!(0));
    }
}

#[test]
fn negated_null_type_narrows_a_type_union() {
    let root = compile(&json!({"type": ["string", "null"], "not": {"type": "null"}}));
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        assert!(value.is_string(), "expected string, got {value}");
    }
}

#[test]
fn all_of_numeric_constraints_land_on_the_grid() {
    let schema = json!({"allOf": [{"minimum": 5}, {"maximum": 10}, {"multipleOf": 2}]});
    let root = compile(&schema);
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        let number = value.as_f64().expect("numeric output");
        assert!(
            [6.0, 8.0, 10.0].iter().any(|c| (c - number).abs() < 1e-9),
            "unexpected value {number}"
        );
    }
}

#[test]
fn one_of_outputs_match_exactly_one_branch() {
    let schema = json!({
        "oneOf": [
            {"type": "string", "minLength": 1},
            {"type": "integer", "minimum": 0}
        ]
    });
    let root = compile(&schema);
    let check = validator(&schema);
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        assert!(check.is_valid(&value), "oneOf output invalid: {value}");
    }
}

#[test]
fn enum_values_violating_siblings_are_pruned() {
    let schema = json!({"type": "integer", "minimum": 2, "enum": [1, 2, 3]});
    let root = compile(&schema);
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        assert!(value == json!(2) || value == json!(3), "got {value}");
    }
}

#[test]
fn fully_pruned_enums_degrade_to_null_with_an_error() {
    let schema = json!({"type": "string", "enum": [1, 2]});
    let root = compile(&schema);
    assert!(root.metadata.errors.has_errors());
    let value = root.generate(&GeneratorOptions::default().with_seed(1));
    assert!(value.is_null());
}

#[test]
fn unique_boolean_pairs_exhaust_the_domain() {
    let schema = json!({
        "type": "array",
        "items": {"type": "boolean"},
        "uniqueItems": true,
        "minItems": 2,
        "maxItems": 2
    });
    let root = compile(&schema);
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        let items = value.as_array().expect("array output");
        assert_eq!(items.len(), 2);
        assert_ne!(items[0], items[1]);
    }
}

#[test]
fn unsupported_keywords_are_rejected_not_ignored() {
    let schema = json!({
        "type": "object",
        "dependentRequired": {"a": ["b"]}
    });
    let root = compile(&schema);
    assert!(root.metadata.errors.has_errors());
    let value = root.generate(&GeneratorOptions::default().with_seed(1));
    assert!(value.is_null());
}

#[test]
fn pattern_properties_name_their_own_keys() {
    let schema = json!({
        "type": "object",
        "patternProperties": {"^id_[0-9]{2}$": {"type": "integer"}},
        "minProperties": 1,
        "maxProperties": 3
    });
    let root = compile(&schema);
    let name = regex::Regex::new("^id_[0-9]{2}$").expect("valid regex");
    for seed in seeds() {
        let value = root.generate(&GeneratorOptions::default().with_seed(seed));
        let object = value.as_object().expect("object output");
        for (key, property) in object {
            if name.is_match(key) {
                assert!(property.is_i64() || property.is_u64(), "got {property}");
            } else {
                // Filler keys only appear to satisfy the minimum count.
                assert!(key.starts_with("min_filler_"), "unexpected key '{key}'");
            }
        }
    }
}

#[test]
fn hard_cutoff_bounds_the_output_size() {
    let schema = json!({
        "type": "array",
        "minItems": 4,
        "maxItems": 8,
        "items": {
            "type": "array",
            "minItems": 4,
            "maxItems": 8,
            "items": {"type": "integer"}
        }
    });
    let root = compile(&schema);
    let options = GeneratorOptions::default()
        .with_seed(5)
        .with_maximum_generation_steps(10)
        .with_cutoff_generation_steps(20);
    let value = root.generate(&options);
    assert!(count_nodes(&value) <= 20 + 16, "output too large: {value}");
}

fn count_nodes(value: &JsonValue) -> usize {
    match value {
        JsonValue::Array(items) => 1 + items.iter().map(count_nodes).sum::<usize>(),
        JsonValue::Object(map) => 1 + map.values().map(count_nodes).sum::<usize>(),
        _ => 1,
    }
}

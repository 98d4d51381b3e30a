//! Algebraic merge of schema nodes.
//!
//! Central to `allOf`, the body of `not`, and the factoring step of
//! `oneOf`/`anyOf`. Merging never mutates its inputs; it builds a new node
//! keyword by keyword. `$ref`s encountered during a merge are resolved and
//! inlined (after rewriting their internal refs to absolute form), with a
//! resolution stack breaking cycles by treating the re-entered ref as an
//! empty node at that site.

use crate::conditional::IfStatement;
use crate::error::ParseError;
use crate::parser::ParseContext;
use crate::reference::ResolutionFrame;
use crate::schema::{
    canonical_json, ItemsField, SchemaNode, SchemaOrBool, SchemaType, TypeSet,
};

/// Merges nodes left to right into a single node. Errors are recorded
/// against `/config_merge_error[...]` paths and merging continues
/// best-effort.
pub(crate) fn merge_schema_nodes(ctx: &mut ParseContext, nodes: Vec<SchemaNode>) -> SchemaNode {
    let mut merged = SchemaNode::default();

    for node in nodes {
        let (node, frames) = resolve_node_references(ctx, node);
        merge_into(ctx, &mut merged, node);
        for _ in 0..frames {
            ctx.merge_resolver.pop();
        }
        if frames > 0 {
            ctx.documents.set_resolving_document(None);
        }
    }

    merged
}

/// Follows a node's `$ref` chain, returning the inlined target (refs
/// rewritten absolute) and the number of resolution frames pushed.
fn resolve_node_references(ctx: &mut ParseContext, mut node: SchemaNode) -> (SchemaNode, usize) {
    let mut frames = 0;
    while let Some(reference) = node.reference.clone() {
        let (document, fragment) = match ctx.documents.resolve_id_and_path(&reference) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn_merge(ctx, "$ref", err);
                node.reference = None;
                break;
            }
        };

        let frame = ResolutionFrame {
            document: document.clone(),
            pointer: fragment.clone(),
        };
        if ctx.merge_resolver.contains(&frame) {
            // Circular reference inside a merge: give up on the ref and
            // treat the node as empty at this site.
            node.reference = None;
            break;
        }

        let target = match ctx.documents.resolve_path(&reference) {
            Ok((target, _, _)) => target,
            Err(err) => {
                ctx.record_error_at(&format!("/config_ref_merge_error[{reference}]"), err);
                node.reference = None;
                break;
            }
        };

        ctx.merge_resolver.push(frame);
        frames += 1;
        ctx.documents.set_resolving_document(Some(document.clone()));
        node = ctx.documents.rewrite_refs(&target, &document);
    }
    (node, frames)
}

fn merge_into(ctx: &mut ParseContext, merged: &mut SchemaNode, node: SchemaNode) {
    // Captured up front: later field moves make the node unborrowable.
    let if_statement = if node.if_.is_some() {
        let origin = format!("{}/if", ctx.path.current());
        IfStatement::capture(&node, &origin)
    } else {
        None
    };

    merge_types(ctx, merged, node.type_.as_ref());

    if let Some(values) = node.enum_ {
        let mut combined = merged.enum_.take().unwrap_or_default();
        let mut seen: Vec<String> = combined.iter().map(canonical_json).collect();
        for value in values {
            let key = canonical_json(&value);
            if !seen.contains(&key) {
                seen.push(key);
                combined.push(value);
            }
        }
        merged.enum_ = Some(combined);
    }

    if let Some(value) = node.const_ {
        match &merged.const_ {
            Some(existing) if canonical_json(existing) != canonical_json(&value) => {
                warn_merge(
                    ctx,
                    "const",
                    ParseError::ConfigMergeError(format!(
                        "conflicting const values during schema merge ({} != {})",
                        canonical_json(existing),
                        canonical_json(&value)
                    )),
                );
            }
            Some(_) => {}
            None => merged.const_ = Some(value),
        }
    }

    if let Some(properties) = node.properties {
        let mut combined = merged.properties.take().unwrap_or_default();
        for (key, value) in properties {
            let existing = combined.remove(&key).unwrap_or_default();
            let child = merge_schema_nodes(ctx, vec![existing, value]);
            combined.insert(key, child);
        }
        merged.properties = Some(combined);
    }

    if let Some(pattern_properties) = node.pattern_properties {
        let mut combined = merged.pattern_properties.take().unwrap_or_default();
        for (key, value) in pattern_properties {
            let existing = combined.remove(&key).unwrap_or_default();
            let child = merge_schema_nodes(ctx, vec![existing, value]);
            combined.insert(key, child);
        }
        merged.pattern_properties = Some(combined);
    }

    merge_additional_properties(ctx, merged, node.additional_properties);

    if let Some(required) = node.required {
        let mut combined = merged.required.take().unwrap_or_default();
        for name in required {
            if !combined.contains(&name) {
                combined.push(name);
            }
        }
        merged.required = Some(combined);
    }

    // Tuple-form `items` is legacy spelling for `prefixItems`.
    let (node_items, node_tuple) = split_items(node.items);
    merge_items(ctx, merged, node_items);

    let incoming_prefix = match (node.prefix_items, node_tuple) {
        (Some(prefix), _) => Some(prefix),
        (None, Some(tuple)) => Some(tuple),
        (None, None) => None,
    };
    if let Some(prefix) = incoming_prefix {
        let existing = merged.prefix_items.take().unwrap_or_default();
        let length = existing.len().max(prefix.len());
        let mut combined = Vec::with_capacity(length);
        for index in 0..length {
            let left = existing.get(index).cloned().unwrap_or_default();
            let right = prefix.get(index).cloned().unwrap_or_default();
            combined.push(merge_schema_nodes(ctx, vec![left, right]));
        }
        merged.prefix_items = Some(combined);
    }

    merge_contains(ctx, merged, node.contains);

    // Lower bounds tighten upward, upper bounds tighten downward.
    merged.min_properties = merge_lower_i64(merged.min_properties, node.min_properties);
    merged.max_properties = merge_upper_i64(merged.max_properties, node.max_properties);
    merged.min_items = merge_lower_i64(merged.min_items, node.min_items);
    merged.max_items = merge_upper_i64(merged.max_items, node.max_items);
    merged.min_contains = merge_lower_i64(merged.min_contains, node.min_contains);
    merged.max_contains = merge_upper_i64(merged.max_contains, node.max_contains);
    merged.min_length = merge_lower_i64(merged.min_length, node.min_length);
    merged.max_length = merge_upper_i64(merged.max_length, node.max_length);
    merged.minimum = merge_lower_f64(merged.minimum, node.minimum);
    merged.maximum = merge_upper_f64(merged.maximum, node.maximum);
    merged.exclusive_minimum = merge_lower_f64(merged.exclusive_minimum, node.exclusive_minimum);
    merged.exclusive_maximum = merge_upper_f64(merged.exclusive_maximum, node.exclusive_maximum);

    if let Some(multiple) = node.multiple_of {
        merged.multiple_of = Some(match merged.multiple_of {
            Some(existing) => merge_multiple_of(ctx, existing, multiple),
            None => multiple,
        });
    }

    merge_divergent_string(ctx, "pattern", &mut merged.pattern, node.pattern);
    merge_divergent_string(ctx, "format", &mut merged.format, node.format);

    if let Some(unique) = node.unique_items {
        if merged.unique_items.is_some_and(|existing| existing != unique) {
            warn_merge(
                ctx,
                "uniqueItems",
                ParseError::ConfigMergeError(
                    "conflicting uniqueItems values during schema merge".to_string(),
                ),
            );
        }
        merged.unique_items = Some(unique);
    }

    merge_list(&mut merged.all_of, node.all_of);
    merge_list(&mut merged.any_of, node.any_of);
    merge_list(&mut merged.one_of, node.one_of);

    if let Some(not) = node.not {
        if merged.not.is_none() {
            merged.not = Some(not);
        } else {
            merged.merged_not.push(*not);
        }
    }
    merged.merged_not.extend(node.merged_not);

    if let Some(statement) = if_statement {
        merged.merged_if.push(statement);
    }
    merged.merged_if.extend(node.merged_if);

    merge_unevaluated(ctx, merged, node.additional_items, node.unevaluated_items);

    // Unsupported keywords survive the merge so rejection still fires when
    // the merged node is reparsed.
    if node.dependent_required.is_some() {
        merged.dependent_required = node.dependent_required;
    }
    if node.dependent_schemas.is_some() {
        merged.dependent_schemas = node.dependent_schemas;
    }

    merged.carried.merge_from(node.carried);
}

fn merge_types(ctx: &mut ParseContext, merged: &mut SchemaNode, incoming: Option<&TypeSet>) {
    let Some(incoming) = incoming else { return };
    let Some(existing) = merged.type_.as_ref() else {
        merged.type_ = Some(incoming.clone());
        return;
    };

    let intersection: Vec<SchemaType> = existing
        .types()
        .into_iter()
        .filter(|candidate| type_set_admits(incoming, *candidate))
        .chain(
            // integer narrows number: keep the tighter tag when one side
            // says number and the other integer.
            incoming
                .types()
                .into_iter()
                .filter(|candidate| {
                    *candidate == SchemaType::Integer
                        && existing.contains(SchemaType::Number)
                        && !existing.contains(SchemaType::Integer)
                }),
        )
        .collect();

    match TypeSet::from_types(intersection) {
        Some(types) => merged.type_ = Some(types),
        None => {
            warn_merge(
                ctx,
                "type",
                ParseError::ConfigMergeError(format!(
                    "no type satisfies both {:?} and {:?}",
                    existing.types(),
                    incoming.types()
                )),
            );
            merged.type_ = Some(incoming.clone());
        }
    }
}

fn type_set_admits(set: &TypeSet, candidate: SchemaType) -> bool {
    if set.contains(candidate) {
        return true;
    }
    // number admits integer.
    candidate == SchemaType::Integer && set.contains(SchemaType::Number)
}

fn merge_additional_properties(
    ctx: &mut ParseContext,
    merged: &mut SchemaNode,
    incoming: Option<SchemaOrBool>,
) {
    let Some(incoming) = incoming else { return };
    let combined = match (merged.additional_properties.take(), incoming) {
        (Some(existing), incoming) if existing.is_false() || incoming.is_false() => {
            SchemaOrBool::Bool(false)
        }
        (None, incoming) => incoming,
        (Some(SchemaOrBool::Schema(left)), SchemaOrBool::Schema(right)) => SchemaOrBool::Schema(
            Box::new(merge_schema_nodes(ctx, vec![*left, *right])),
        ),
        (Some(SchemaOrBool::Bool(_)), incoming) => incoming,
        (Some(existing), SchemaOrBool::Bool(_)) => existing,
    };
    merged.additional_properties = Some(combined);
}

fn split_items(items: Option<ItemsField>) -> (Option<ItemsField>, Option<Vec<SchemaNode>>) {
    match items {
        Some(ItemsField::Tuple(tuple)) => (None, Some(tuple)),
        other => (other, None),
    }
}

fn merge_items(ctx: &mut ParseContext, merged: &mut SchemaNode, incoming: Option<ItemsField>) {
    let Some(incoming) = incoming else { return };
    let combined = match (merged.items.take(), incoming) {
        (Some(existing), incoming)
            if existing.disallows_additional() || incoming.disallows_additional() =>
        {
            ItemsField::Bool(false)
        }
        (None, incoming) => incoming,
        (Some(ItemsField::Schema(left)), ItemsField::Schema(right)) => {
            ItemsField::Schema(Box::new(merge_schema_nodes(ctx, vec![*left, *right])))
        }
        (Some(ItemsField::Bool(_)), incoming) => incoming,
        (Some(existing), ItemsField::Bool(_)) => existing,
        (Some(existing), ItemsField::Tuple(_)) => existing,
        (Some(ItemsField::Tuple(tuple)), incoming) => {
            // Tuple forms are normalized into prefixItems before this point;
            // reaching here means the left side predates normalization.
            let _ = incoming;
            ItemsField::Tuple(tuple)
        }
    };
    merged.items = Some(combined);
}

fn merge_contains(
    ctx: &mut ParseContext,
    merged: &mut SchemaNode,
    incoming: Option<Box<SchemaNode>>,
) {
    let Some(incoming) = incoming else { return };
    let combined = match merged.contains.take() {
        Some(existing) => Box::new(merge_schema_nodes(ctx, vec![*existing, *incoming])),
        None => incoming,
    };
    merged.contains = Some(combined);
}

fn merge_unevaluated(
    ctx: &mut ParseContext,
    merged: &mut SchemaNode,
    additional_items: Option<SchemaOrBool>,
    unevaluated_items: Option<SchemaOrBool>,
) {
    let merge_one = |ctx: &mut ParseContext,
                     slot: &mut Option<SchemaOrBool>,
                     incoming: Option<SchemaOrBool>| {
        let Some(incoming) = incoming else { return };
        let combined = match (slot.take(), incoming) {
            (Some(existing), incoming) if existing.is_false() || incoming.is_false() => {
                SchemaOrBool::Bool(false)
            }
            (None, incoming) => incoming,
            (Some(SchemaOrBool::Schema(left)), SchemaOrBool::Schema(right)) => {
                SchemaOrBool::Schema(Box::new(merge_schema_nodes(ctx, vec![*left, *right])))
            }
            (Some(SchemaOrBool::Bool(_)), incoming) => incoming,
            (Some(existing), SchemaOrBool::Bool(_)) => existing,
        };
        *slot = Some(combined);
    };
    merge_one(ctx, &mut merged.additional_items, additional_items);
    merge_one(ctx, &mut merged.unevaluated_items, unevaluated_items);
}

fn merge_divergent_string(
    ctx: &mut ParseContext,
    field: &str,
    slot: &mut Option<String>,
    incoming: Option<String>,
) {
    let Some(incoming) = incoming else { return };
    if slot.as_ref().is_some_and(|existing| existing != &incoming) {
        warn_merge(
            ctx,
            field,
            ParseError::ConfigMergeError(format!(
                "conflicting {field} values during schema merge; keeping the last"
            )),
        );
    }
    *slot = Some(incoming);
}

fn merge_list(slot: &mut Option<Vec<SchemaNode>>, incoming: Option<Vec<SchemaNode>>) {
    if let Some(incoming) = incoming {
        slot.get_or_insert_with(Vec::new).extend(incoming);
    }
}

fn merge_lower_i64(existing: Option<i64>, incoming: Option<i64>) -> Option<i64> {
    match (existing, incoming) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn merge_upper_i64(existing: Option<i64>, incoming: Option<i64>) -> Option<i64> {
    match (existing, incoming) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn merge_lower_f64(existing: Option<f64>, incoming: Option<f64>) -> Option<f64> {
    match (existing, incoming) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn merge_upper_f64(existing: Option<f64>, incoming: Option<f64>) -> Option<f64> {
    match (existing, incoming) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Least common multiple of two `multipleOf` values. Decimal values are
/// scaled to integers first; when no exact combination exists the larger
/// value is kept and a merge error recorded.
fn merge_multiple_of(ctx: &mut ParseContext, a: f64, b: f64) -> f64 {
    if a <= 0.0 || b <= 0.0 {
        warn_merge(
            ctx,
            "multipleOf",
            ParseError::ConfigMergeError("multipleOf must be positive".to_string()),
        );
        return a.max(b);
    }

    let mut scale = 1.0_f64;
    while scale < 1e9
        && ((a * scale).fract().abs() > 1e-9 || (b * scale).fract().abs() > 1e-9)
    {
        scale *= 10.0;
    }
    let scaled_a = (a * scale).round() as i64;
    let scaled_b = (b * scale).round() as i64;
    if scaled_a <= 0
        || scaled_b <= 0
        || (scaled_a as f64 - a * scale).abs() > 1e-6
        || (scaled_b as f64 - b * scale).abs() > 1e-6
    {
        warn_merge(
            ctx,
            "multipleOf",
            ParseError::ConfigMergeError(format!(
                "cannot combine multipleOf values {a} and {b}; keeping the larger"
            )),
        );
        return a.max(b);
    }

    let divisor = gcd(scaled_a, scaled_b);
    match (scaled_a / divisor).checked_mul(scaled_b) {
        Some(lcm) => lcm as f64 / scale,
        None => {
            warn_merge(
                ctx,
                "multipleOf",
                ParseError::ConfigMergeError(format!(
                    "multipleOf combination of {a} and {b} overflows; keeping the larger"
                )),
            );
            a.max(b)
        }
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let remainder = a % b;
        a = b;
        b = remainder;
    }
    a.abs().max(1)
}

fn warn_merge(ctx: &mut ParseContext, field: &str, error: ParseError) {
    ctx.record_error_at(&format!("/config_merge_error[{field}]"), error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_context;
    use crate::schema::canonical_json_of_node;
    use serde_json::json;

    fn node(value: serde_json::Value) -> SchemaNode {
        serde_json::from_value(value).expect("schema node")
    }

    #[test]
    fn merging_a_single_plain_node_is_idempotent() {
        let mut ctx = test_context();
        let original = node(json!({
            "type": "object",
            "properties": {"a": {"type": "string", "minLength": 2}},
            "required": ["a"],
            "minProperties": 1
        }));
        let merged = merge_schema_nodes(&mut ctx, vec![original.clone()]);
        assert_eq!(
            canonical_json_of_node(&merged),
            canonical_json_of_node(&original)
        );
        assert!(!ctx.errors.has_errors());
    }

    #[test]
    fn bounds_tighten_toward_each_other() {
        let mut ctx = test_context();
        let merged = merge_schema_nodes(
            &mut ctx,
            vec![
                node(json!({"minimum": 2, "maximum": 20, "minLength": 1})),
                node(json!({"minimum": 5, "maximum": 10, "minLength": 4})),
            ],
        );
        assert_eq!(merged.minimum, Some(5.0));
        assert_eq!(merged.maximum, Some(10.0));
        assert_eq!(merged.min_length, Some(4));
    }

    #[test]
    fn type_intersection_narrows_number_to_integer() {
        let mut ctx = test_context();
        let merged = merge_schema_nodes(
            &mut ctx,
            vec![
                node(json!({"type": ["number", "string"]})),
                node(json!({"type": "integer"})),
            ],
        );
        let types = merged.declared_types().expect("types");
        assert_eq!(types, vec![SchemaType::Integer]);
    }

    #[test]
    fn multiple_of_combines_to_the_least_common_multiple() {
        let mut ctx = test_context();
        let merged = merge_schema_nodes(
            &mut ctx,
            vec![
                node(json!({"multipleOf": 4})),
                node(json!({"multipleOf": 6})),
            ],
        );
        assert_eq!(merged.multiple_of, Some(12.0));

        let decimal = merge_schema_nodes(
            &mut ctx,
            vec![
                node(json!({"multipleOf": 0.2})),
                node(json!({"multipleOf": 0.3})),
            ],
        );
        assert!((decimal.multiple_of.expect("multiple") - 0.6).abs() < 1e-9);
    }

    #[test]
    fn enums_concatenate_with_canonical_dedup() {
        let mut ctx = test_context();
        let merged = merge_schema_nodes(
            &mut ctx,
            vec![
                node(json!({"enum": [1, 2, {"a": 1}]})),
                node(json!({"enum": [2, 3, {"a": 1}]})),
            ],
        );
        let values = merged.enum_.expect("enum");
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn required_unions_and_properties_merge_recursively() {
        let mut ctx = test_context();
        let merged = merge_schema_nodes(
            &mut ctx,
            vec![
                node(json!({
                    "properties": {"a": {"type": "string", "minLength": 1}},
                    "required": ["a"]
                })),
                node(json!({
                    "properties": {"a": {"maxLength": 5}, "b": {"type": "integer"}},
                    "required": ["b", "a"]
                })),
            ],
        );
        assert_eq!(merged.required.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        let properties = merged.properties.expect("properties");
        assert_eq!(properties["a"].min_length, Some(1));
        assert_eq!(properties["a"].max_length, Some(5));
        assert!(properties.contains_key("b"));
    }

    #[test]
    fn if_clauses_are_captured_instead_of_copied() {
        let mut ctx = test_context();
        let merged = merge_schema_nodes(
            &mut ctx,
            vec![node(json!({
                "if": {"properties": {"a": {"const": 1}}},
                "then": {"required": ["b"]}
            }))],
        );
        assert!(merged.if_.is_none());
        assert_eq!(merged.merged_if.len(), 1);
    }

    #[test]
    fn additional_properties_false_wins() {
        let mut ctx = test_context();
        let merged = merge_schema_nodes(
            &mut ctx,
            vec![
                node(json!({"additionalProperties": {"type": "string"}})),
                node(json!({"additionalProperties": false})),
            ],
        );
        assert!(merged
            .additional_properties
            .as_ref()
            .is_some_and(crate::schema::SchemaOrBool::is_false));
    }
}

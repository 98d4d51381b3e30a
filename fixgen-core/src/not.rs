//! Reconciliation of `not` clauses.
//!
//! Given `parent AND NOT(notNode)`, the reconciler rewrites the parent into
//! an equivalent positive schema wherever the algebra allows (type
//! complements, shifted bounds, subtracted enums, precomputed multiples)
//! and registers post-hoc exclusion constraints for everything that cannot
//! be expressed positively (negated patterns, formats, single values,
//! forbidden property names). The reconciled node then parses normally.

use std::collections::BTreeMap;

use crate::constraint::ConstraintSet;
use crate::error::ParseError;
use crate::generator::{ConstrainedGenerator, GenIndex, Generator};
use crate::merge::merge_schema_nodes;
use crate::parser::{parse_schema_node, ParseContext};
use crate::schema::{
    canonical_json, ItemsField, SchemaNode, SchemaOrBool, SchemaType, TypeSet,
};

/// Below this the float bound arithmetic starts to misbehave.
pub(crate) const INFINITESIMAL: f64 = 1e-14;

/// Clamped so shifted bounds stay JSON-serializable.
pub(crate) const FLOAT_LOWER_BOUND: f64 = -(f64::MAX / 1000.0);
pub(crate) const FLOAT_UPPER_BOUND: f64 = f64::MAX / 1000.0;

// Bounds get shifted by one unit during reconciliation; keep headroom.
const MIN_INT: i64 = i32::MIN as i64 + 1;
const MAX_INT: i64 = i32::MAX as i64 - 1;

const MAX_MULTIPLE_ITERATIONS: usize = 10_000;
const MAX_MULTIPLE_CANDIDATES: usize = 200;

pub(crate) fn parse_not(ctx: &mut ParseContext, node: SchemaNode) -> Result<GenIndex, ParseError> {
    let node = simplify_double_negation(ctx, node);

    let mut not_bodies: Vec<SchemaNode> = Vec::new();
    if let Some(not_body) = node.not.clone() {
        not_bodies.push(*not_body);
    }
    not_bodies.extend(node.merged_not.clone());

    if not_bodies.is_empty() {
        // Double negation cancelled out entirely.
        let mut plain = node;
        plain.not = None;
        plain.merged_not = Vec::new();
        return parse_schema_node(ctx, plain);
    }

    // Flatten each negated body (resolves refs, folds nested allOf).
    ctx.path.push("/not");
    let not_nodes: Vec<SchemaNode> = not_bodies
        .into_iter()
        .map(|body| merge_schema_nodes(ctx, vec![body]))
        .collect();
    ctx.path.pop("/not");

    // Flatten the parent itself before reconciling against it.
    let mut flat = merge_schema_nodes(ctx, vec![node]);
    flat.not = None;
    flat.merged_not = Vec::new();

    let mut constraints = ConstraintSet::default();
    let mut current = flat;
    for not_node in not_nodes {
        let (reconciled, collected) = not_merge(ctx, &current, &not_node);
        current = reconciled;
        constraints.merge_from(collected);
    }

    let inner = parse_schema_node(ctx, current)?;
    if constraints.is_empty() {
        return Ok(inner);
    }

    let compiled = match constraints.compile() {
        Ok(compiled) => compiled,
        Err(err) => {
            ctx.record_error_at("/not", err);
            return Ok(inner);
        }
    };

    Ok(ctx.alloc(Generator::Constrained(ConstrainedGenerator {
        inner,
        constraints: vec![crate::constraint::Constraint::Exclusion(compiled)],
    })))
}

/// Flattens `not.not` chains: even-depth layers merge back into the
/// parent, odd-depth layers collapse into a single outer `not`. The
/// rebuilt body is dropped when simplification leaves it empty.
fn simplify_double_negation(ctx: &mut ParseContext, node: SchemaNode) -> SchemaNode {
    let mut odd_bodies = Vec::new();
    let mut even_bodies = Vec::new();
    let mut current = node.not.clone();
    let mut depth = 1usize;
    while let Some(body) = current {
        let mut stripped = *body;
        let next = stripped.not.take();
        if depth % 2 == 1 {
            odd_bodies.push(stripped);
        } else {
            even_bodies.push(stripped);
        }
        current = next;
        depth += 1;
    }

    if even_bodies.is_empty() {
        return node;
    }

    let mut parent = node;
    parent.not = None;
    let mut to_merge = vec![parent];
    to_merge.extend(even_bodies);
    let mut simplified = merge_schema_nodes(ctx, to_merge);

    ctx.path.push("/not");
    let rebuilt = merge_schema_nodes(ctx, odd_bodies);
    ctx.path.pop("/not");

    if !rebuilt.is_empty() {
        simplified.not = Some(Box::new(rebuilt));
    }
    simplified
}

/// Rewrites `node AND NOT(not_node)` into a positive node plus a set of
/// post-hoc constraints. Applied keyword group by keyword group; a type
/// contradiction aborts early with whatever was reconciled so far.
fn not_merge(
    ctx: &mut ParseContext,
    node: &SchemaNode,
    not_node: &SchemaNode,
) -> (SchemaNode, ConstraintSet) {
    let mut reconciled = SchemaNode::default();
    let mut constraints = ConstraintSet::default();

    reconciled.merged_if = node.merged_if.clone();
    reconciled.carried = node.carried.clone();

    if apply_type(ctx, &mut reconciled, node, not_node).is_err() {
        return (reconciled, constraints);
    }
    apply_string(ctx, &mut reconciled, &mut constraints, node, not_node);
    apply_number(ctx, &mut reconciled, node, not_node);
    apply_enum(ctx, &mut reconciled, &mut constraints, node, not_node);
    apply_const(ctx, &mut reconciled, &mut constraints, node, not_node);
    apply_array(ctx, &mut reconciled, node, not_node);
    apply_object(ctx, &mut reconciled, &mut constraints, node, not_node);
    warn_unsupported_negations(ctx, not_node);

    (reconciled, constraints)
}

fn apply_type(
    ctx: &mut ParseContext,
    reconciled: &mut SchemaNode,
    node: &SchemaNode,
    not_node: &SchemaNode,
) -> Result<(), ()> {
    let node_types = node
        .declared_types()
        .unwrap_or_else(|| SchemaType::ALL.to_vec());
    let not_types = not_node.declared_types().unwrap_or_default();

    let candidates: Vec<SchemaType> = node_types
        .iter()
        .copied()
        .filter(|candidate| !not_types.contains(candidate))
        .collect();

    match TypeSet::from_types(candidates) {
        Some(types) => {
            reconciled.type_ = Some(types);
            Ok(())
        }
        None => {
            ctx.record_error(ParseError::IllogicalSchema(format!(
                "no candidate type satisfies {node_types:?} while excluding {not_types:?}"
            )));
            Err(())
        }
    }
}

fn apply_string(
    ctx: &mut ParseContext,
    reconciled: &mut SchemaNode,
    constraints: &mut ConstraintSet,
    node: &SchemaNode,
    not_node: &SchemaNode,
) {
    let (min_length, max_length) = resolve_bounds_int(
        ctx,
        "minLength",
        "maxLength",
        node.min_length,
        node.max_length,
        not_node.min_length,
        not_node.max_length,
    );
    reconciled.min_length = min_length;
    reconciled.max_length = max_length;
    reconciled.pattern = node.pattern.clone();
    reconciled.format = node.format.clone();

    if let Some(not_pattern) = &not_node.pattern {
        if node.pattern.as_deref() == Some(not_pattern.as_str()) {
            warn_field(
                ctx,
                "not/pattern",
                ParseError::IllogicalSchema(
                    "'pattern' and 'not/pattern' hold the same value; they are mutually exclusive"
                        .to_string(),
                ),
            );
            return;
        }
        if let Err(err) = constraints.add_not_matching_regex(not_pattern) {
            warn_field(ctx, "not/pattern", err);
        }
        return;
    }

    if let Some(not_format) = &not_node.format {
        if node.format.as_deref() == Some(not_format.as_str()) {
            warn_field(
                ctx,
                "not/format",
                ParseError::IllogicalSchema(
                    "'format' and 'not/format' hold the same value; they are mutually exclusive"
                        .to_string(),
                ),
            );
            return;
        }
        if let Err(err) = constraints.add_not_matching_format(not_format) {
            warn_field(ctx, "not/format", err);
        }
    }
}

fn apply_number(
    ctx: &mut ParseContext,
    reconciled: &mut SchemaNode,
    node: &SchemaNode,
    not_node: &SchemaNode,
) {
    let is_integer = reconciled
        .type_
        .as_ref()
        .is_some_and(|types| types.contains(SchemaType::Integer));
    let offset = if is_integer { 1.0 } else { INFINITESIMAL };

    let (minimum, maximum, alternate_min, alternate_max) = resolve_bounds_float(
        ctx,
        "minimum",
        "maximum",
        node.minimum,
        node.exclusive_minimum,
        node.maximum,
        node.exclusive_maximum,
        not_node.minimum,
        not_node.exclusive_minimum,
        not_node.maximum,
        not_node.exclusive_maximum,
        offset,
    );
    reconciled.minimum = minimum;
    reconciled.maximum = maximum;

    let mut multiple = node.multiple_of.unwrap_or(0.0);
    let mut not_multiple = not_node.multiple_of.unwrap_or(0.0);
    let denies_integer = not_node
        .declared_types()
        .is_some_and(|types| types.contains(&SchemaType::Integer));

    if multiple == 0.0 && is_integer && !denies_integer {
        multiple = 1.0;
    }
    if not_multiple == 0.0 && denies_integer {
        not_multiple = 1.0;
    }

    if multiple == 0.0 && not_multiple == 0.0 {
        return;
    }

    if multiple != 0.0 && not_multiple != 0.0 && multiple == not_multiple {
        warn_field(
            ctx,
            "not/multipleOf",
            ParseError::IllogicalSchema(format!(
                "'multipleOf' and 'not/multipleOf' are both {not_multiple}; they are mutually exclusive"
            )),
        );
    } else if multiple != 0.0 && not_multiple != 0.0 && is_float_multiple(multiple, not_multiple) {
        warn_field(
            ctx,
            "not/multipleOf",
            ParseError::IllogicalSchema(
                "every accepted multiple is also a 'not/multipleOf' multiple".to_string(),
            ),
        );
    } else if not_multiple != 0.0 && not_multiple <= INFINITESIMAL {
        warn_field(
            ctx,
            "not/multipleOf",
            ParseError::IllogicalSchema(
                "'not/multipleOf' is too small to enforce".to_string(),
            ),
        );
    } else if not_multiple != 0.0 {
        // Precompute a bounded enum of values that hit `multipleOf` while
        // dodging `not/multipleOf`, falling back to the alternate range
        // when the primary range yields nothing.
        let step = if multiple == 0.0 { INFINITESIMAL } else { multiple };
        let range_min = minimum.unwrap_or(FLOAT_LOWER_BOUND);
        let range_max = maximum.unwrap_or(FLOAT_UPPER_BOUND);

        let mut values = compute_valid_multiple_of_values(range_min, range_max, step, not_multiple);
        if values.is_empty() && (alternate_min.is_some() || alternate_max.is_some()) {
            values = compute_valid_multiple_of_values(
                alternate_min.unwrap_or(FLOAT_LOWER_BOUND),
                alternate_max.unwrap_or(FLOAT_UPPER_BOUND),
                step,
                not_multiple,
            );
        }
        if values.is_empty() {
            warn_field(
                ctx,
                "not/multipleOf",
                ParseError::IllogicalSchema(format!(
                    "no values satisfy multipleOf {step} while excluding multiples of {not_multiple}"
                )),
            );
            return;
        }

        reconciled.multiple_of = None;
        reconciled.minimum = None;
        reconciled.maximum = None;

        let filtered: Vec<serde_json::Value> = match &node.enum_ {
            Some(existing) if !existing.is_empty() => {
                let survivors: Vec<serde_json::Value> = existing
                    .iter()
                    .filter(|value| {
                        value
                            .as_f64()
                            .is_some_and(|number| values.iter().any(|v| (v - number).abs() < INFINITESIMAL))
                    })
                    .cloned()
                    .collect();
                if survivors.is_empty() {
                    warn_field(
                        ctx,
                        "not/multipleOf",
                        ParseError::IllogicalSchema(
                            "no enum values satisfy the multipleOf constraints".to_string(),
                        ),
                    );
                }
                survivors
            }
            _ => values
                .iter()
                .map(|value| {
                    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                        serde_json::Value::from(*value as i64)
                    } else {
                        serde_json::Value::from(*value)
                    }
                })
                .collect(),
        };
        reconciled.enum_ = Some(filtered);
    } else {
        reconciled.multiple_of = node.multiple_of;
    }
}

fn apply_enum(
    ctx: &mut ParseContext,
    reconciled: &mut SchemaNode,
    constraints: &mut ConstraintSet,
    node: &SchemaNode,
    not_node: &SchemaNode,
) {
    if node.enum_.is_none() && not_node.enum_.is_none() {
        return;
    }

    let source = reconciled.enum_.clone().or_else(|| node.enum_.clone());
    let values = source.unwrap_or_default();
    let not_values: Vec<String> = not_node
        .enum_
        .clone()
        .unwrap_or_default()
        .iter()
        .map(canonical_json)
        .collect();

    if values.is_empty() && !not_values.is_empty() {
        match &node.const_ {
            None => constraints.add_not_values(not_values),
            Some(constant) => {
                if not_values.contains(&canonical_json(constant)) {
                    warn_field(
                        ctx,
                        "not/enum",
                        ParseError::IllogicalSchema(
                            "'not/enum' contains the value fixed by 'const'".to_string(),
                        ),
                    );
                }
            }
        }
        return;
    }

    let difference: Vec<serde_json::Value> = values
        .into_iter()
        .filter(|value| !not_values.contains(&canonical_json(value)))
        .collect();

    if difference.is_empty() {
        warn_field(
            ctx,
            "not/enum",
            ParseError::IllogicalSchema(
                "'not/enum' excludes every value of 'enum'".to_string(),
            ),
        );
        return;
    }
    reconciled.enum_ = Some(difference);
}

fn apply_const(
    ctx: &mut ParseContext,
    reconciled: &mut SchemaNode,
    constraints: &mut ConstraintSet,
    node: &SchemaNode,
    not_node: &SchemaNode,
) {
    reconciled.const_ = node.const_.clone();

    let Some(not_const) = &not_node.const_ else {
        return;
    };
    let not_const_json = canonical_json(not_const);

    if let Some(constant) = &node.const_ {
        if canonical_json(constant) == not_const_json {
            warn_field(
                ctx,
                "not/const",
                ParseError::IllogicalSchema(
                    "'const' and 'not/const' hold the same value; they are mutually exclusive"
                        .to_string(),
                ),
            );
            return;
        }
    }

    if let Some(values) = &reconciled.enum_ {
        if values.len() == 1 && canonical_json(&values[0]) == not_const_json {
            warn_field(
                ctx,
                "not/const",
                ParseError::IllogicalSchema(
                    "'not/const' excludes the only remaining enum value".to_string(),
                ),
            );
            return;
        }
    }

    constraints.add_not_values([not_const_json]);
}

fn apply_array(
    ctx: &mut ParseContext,
    reconciled: &mut SchemaNode,
    node: &SchemaNode,
    not_node: &SchemaNode,
) {
    let (min_items, max_items) = resolve_bounds_int(
        ctx,
        "minItems",
        "maxItems",
        node.min_items,
        node.max_items,
        not_node.min_items,
        not_node.max_items,
    );
    reconciled.min_items = min_items;
    reconciled.max_items = max_items;

    let (min_contains, max_contains) = resolve_bounds_int(
        ctx,
        "minContains",
        "maxContains",
        node.min_contains,
        node.max_contains,
        not_node.min_contains,
        not_node.max_contains,
    );
    reconciled.min_contains = min_contains;
    reconciled.max_contains = max_contains;

    if let (Some(min_contains), Some(max_items)) = (reconciled.min_contains, reconciled.max_items) {
        if min_contains > max_items {
            warn_field(
                ctx,
                "not/minContains",
                ParseError::InvalidBounds(
                    "minContains cannot exceed maxItems after reconciliation".to_string(),
                ),
            );
            reconciled.min_contains = reconciled.max_items;
        }
    }

    reconciled.items = not_merge_items(ctx, node, not_node);

    if not_node.unique_items == Some(true) {
        warn_field(
            ctx,
            "not/uniqueItems",
            ParseError::Unsupported(
                "'not/uniqueItems: true' cannot be honored; identical items satisfying every \
                 clause are not computable"
                    .to_string(),
            ),
        );
    }
    reconciled.unique_items = node.unique_items;

    reconciled.prefix_items = not_merge_prefix_items(ctx, node, not_node, reconciled.items.clone());
    reconciled.unevaluated_items = not_merge_schema_or_bool(
        ctx,
        "/not/unevaluatedItems",
        node.unevaluated_items.as_ref(),
        not_node.unevaluated_items.as_ref(),
    );
    reconciled.additional_items = not_merge_schema_or_bool(
        ctx,
        "/not/additionalItems",
        node.additional_items.as_ref(),
        not_node.additional_items.as_ref(),
    );
    reconciled.contains = not_merge_sub_node_opt(
        ctx,
        "/not/contains",
        node.contains.as_deref(),
        not_node.contains.as_deref(),
    );
}

fn apply_object(
    ctx: &mut ParseContext,
    reconciled: &mut SchemaNode,
    constraints: &mut ConstraintSet,
    node: &SchemaNode,
    not_node: &SchemaNode,
) {
    let (min_properties, max_properties) = resolve_bounds_int(
        ctx,
        "minProperties",
        "maxProperties",
        node.min_properties,
        node.max_properties,
        not_node.min_properties,
        not_node.max_properties,
    );
    reconciled.min_properties = min_properties;
    reconciled.max_properties = max_properties;

    // Property-wise reconciliation over the union of both key sets.
    let mut merged_properties: BTreeMap<String, SchemaNode> = BTreeMap::new();
    let empty = BTreeMap::new();
    let node_properties = node.properties.as_ref().unwrap_or(&empty);
    let not_properties = not_node.properties.as_ref().unwrap_or(&empty);
    let mut keys: Vec<&String> = node_properties.keys().chain(not_properties.keys()).collect();
    keys.sort();
    keys.dedup();
    for key in keys {
        let scope = format!("/not/properties/{key}");
        let child = not_merge_sub_node(
            ctx,
            &scope,
            node_properties.get(key).cloned().unwrap_or_default(),
            not_properties.get(key).cloned().unwrap_or_default(),
        );
        merged_properties.insert(key.clone(), child);
    }

    if not_node
        .pattern_properties
        .as_ref()
        .is_some_and(|map| !map.is_empty())
    {
        warn_field(
            ctx,
            "not/patternProperties",
            ParseError::Unsupported(
                "negated patternProperties are not supported".to_string(),
            ),
        );
    }
    reconciled.pattern_properties = node.pattern_properties.clone();

    reconciled.additional_properties = not_merge_schema_or_bool(
        ctx,
        "/not/additionalProperties",
        node.additional_properties.as_ref(),
        not_node.additional_properties.as_ref(),
    );

    // `required` in the negation forces those names out of the generated
    // property set and installs a must-not-have constraint.
    reconciled.required = node.required.clone();
    let required = node.required.clone().unwrap_or_default();
    let not_required = not_node.required.clone().unwrap_or_default();
    let mut excluded = Vec::new();
    for name in &not_required {
        if required.contains(name) {
            warn_field(
                ctx,
                "not/required",
                ParseError::IllogicalSchema(format!(
                    "'required' and 'not/required' both list '{name}'; they are mutually exclusive"
                )),
            );
            continue;
        }
        merged_properties.remove(name);
        excluded.push(name.clone());
    }
    constraints.add_must_not_have_properties(excluded);

    if !merged_properties.is_empty() {
        reconciled.properties = Some(merged_properties);
    }
}

fn warn_unsupported_negations(ctx: &mut ParseContext, not_node: &SchemaNode) {
    let mut warn_if = |present: bool, field: &str| {
        if present {
            warn_field(
                ctx,
                field,
                ParseError::Unsupported(format!("negation of '{field}' is not supported")),
            );
        }
    };

    warn_if(
        not_node
            .dependent_required
            .as_ref()
            .is_some_and(|map| !map.is_empty()),
        "not/dependentRequired",
    );
    warn_if(
        not_node
            .dependent_schemas
            .as_ref()
            .is_some_and(|map| !map.is_empty()),
        "not/dependentSchemas",
    );
    warn_if(not_node.if_.is_some(), "not/if");
    warn_if(not_node.then_.is_some(), "not/then");
    warn_if(not_node.else_.is_some(), "not/else");
    warn_if(
        not_node.all_of.as_ref().is_some_and(|list| !list.is_empty()),
        "not/allOf",
    );
    warn_if(
        not_node.any_of.as_ref().is_some_and(|list| !list.is_empty()),
        "not/anyOf",
    );
    warn_if(
        not_node.one_of.as_ref().is_some_and(|list| !list.is_empty()),
        "not/oneOf",
    );
}

/// Recursive reconciliation of a sub-schema pair. Constraints collected for
/// the pair ride along on the returned node and wrap its generator when the
/// node is parsed.
fn not_merge_sub_node(
    ctx: &mut ParseContext,
    scope: &str,
    node: SchemaNode,
    not_node: SchemaNode,
) -> SchemaNode {
    ctx.path.push(scope);
    let (mut merged, constraints) = not_merge(ctx, &node, &not_node);
    merged.carried.merge_from(constraints);
    ctx.path.pop(scope);
    merged
}

fn not_merge_sub_node_opt(
    ctx: &mut ParseContext,
    scope: &str,
    node: Option<&SchemaNode>,
    not_node: Option<&SchemaNode>,
) -> Option<Box<SchemaNode>> {
    if node.is_none() && not_node.is_none() {
        return None;
    }
    let merged = not_merge_sub_node(
        ctx,
        scope,
        node.cloned().unwrap_or_default(),
        not_node.cloned().unwrap_or_default(),
    );
    Some(Box::new(merged))
}

fn not_merge_items(
    ctx: &mut ParseContext,
    node: &SchemaNode,
    not_node: &SchemaNode,
) -> Option<ItemsField> {
    let node_items = node.items.as_ref();
    let not_items = not_node.items.as_ref();
    if node_items.is_none() && not_items.is_none() {
        return None;
    }

    let node_disallows = node_items.is_some_and(ItemsField::disallows_additional);
    let not_disallows = not_items.is_some_and(ItemsField::disallows_additional);
    if node_disallows && not_disallows {
        warn_field(
            ctx,
            "not/items",
            ParseError::IllogicalSchema(
                "'items' and 'not/items' are both false; they are mutually exclusive".to_string(),
            ),
        );
        return node.items.clone();
    }
    if node_disallows {
        return node.items.clone();
    }

    if node_items.and_then(|items| items.tuple()).is_some()
        || not_items.and_then(|items| items.tuple()).is_some()
    {
        warn_field(
            ctx,
            "not/items",
            ParseError::Unsupported(
                "negating tuple-form 'items' is not supported; use 'prefixItems'".to_string(),
            ),
        );
    }

    let node_schema = node_items.and_then(|items| items.schema());
    let not_schema = not_items.and_then(|items| items.schema());
    if node_schema.is_none() && not_schema.is_none() {
        return None;
    }

    let merged = not_merge_sub_node(
        ctx,
        "/not/items",
        node_schema.cloned().unwrap_or_default(),
        not_schema.cloned().unwrap_or_default(),
    );
    Some(ItemsField::Schema(Box::new(merged)))
}

fn not_merge_prefix_items(
    ctx: &mut ParseContext,
    node: &SchemaNode,
    not_node: &SchemaNode,
    reconciled_items: Option<ItemsField>,
) -> Option<Vec<SchemaNode>> {
    if node.prefix_items.is_none() && not_node.prefix_items.is_none() {
        return None;
    }

    let node_prefix = node.prefix_items.clone().unwrap_or_default();
    let not_prefix = not_node.prefix_items.clone().unwrap_or_default();
    let filler = reconciled_items
        .as_ref()
        .and_then(|items| items.schema())
        .cloned()
        .unwrap_or_default();

    let length = node_prefix.len().max(not_prefix.len());
    let mut merged = Vec::with_capacity(length);
    for index in 0..length {
        let scope = format!("/not/prefixItems/{index}");
        let left = node_prefix.get(index).cloned().unwrap_or_else(|| filler.clone());
        let right = not_prefix.get(index).cloned().unwrap_or_default();
        merged.push(not_merge_sub_node(ctx, &scope, left, right));
    }
    Some(merged)
}

fn not_merge_schema_or_bool(
    ctx: &mut ParseContext,
    scope: &str,
    node: Option<&SchemaOrBool>,
    not_node: Option<&SchemaOrBool>,
) -> Option<SchemaOrBool> {
    if node.is_none() && not_node.is_none() {
        return None;
    }

    let node_false = node.is_some_and(SchemaOrBool::is_false);
    let not_false = not_node.is_some_and(SchemaOrBool::is_false);
    if node_false && not_false {
        warn_field(
            ctx,
            scope.trim_start_matches('/'),
            ParseError::IllogicalSchema(
                "a schema and its negation are both false; they are mutually exclusive".to_string(),
            ),
        );
        return node.cloned();
    }
    if node_false {
        return node.cloned();
    }

    let merged = not_merge_sub_node(
        ctx,
        scope,
        node.and_then(|n| n.schema()).cloned().unwrap_or_default(),
        not_node.and_then(|n| n.schema()).cloned().unwrap_or_default(),
    );
    Some(SchemaOrBool::Schema(Box::new(merged)))
}

/// Computes `[x1,x2] - [y1,y2]` over integers. Disjoint ranges keep the
/// original; full cover warns and keeps the original; one-sided overlap
/// shifts the bound by one; interior overlap prefers the lower side.
fn resolve_bounds_int(
    ctx: &mut ParseContext,
    min_field: &str,
    max_field: &str,
    min: Option<i64>,
    max: Option<i64>,
    not_min: Option<i64>,
    not_max: Option<i64>,
) -> (Option<i64>, Option<i64>) {
    if not_min.is_none() && not_max.is_none() {
        return (min, max);
    }

    if min.is_none() && max.is_none() {
        if let Some(not_min) = not_min {
            return (None, int_max_to_none(not_min - 1));
        }
        if let Some(not_max) = not_max {
            return (int_min_to_none(not_max + 1), None);
        }
        return (None, None);
    }

    let x1 = min.unwrap_or(MIN_INT);
    let x2 = max.unwrap_or(MAX_INT);
    let y1 = not_min.unwrap_or(MIN_INT);
    let y2 = not_max.unwrap_or(MAX_INT);

    if y2 < x1 || y1 > x2 {
        return (int_min_to_none(x1), int_max_to_none(x2));
    }

    if y1 <= x1 && y2 >= x2 {
        warn_field(
            ctx,
            max_field,
            ParseError::InvalidBounds(format!(
                "no range inside [{x1}, {x2}] excludes the negated {min_field}/{max_field} \
                 range [{y1}, {y2}]"
            )),
        );
        return (min, max);
    }

    if y1 <= x1 && y2 < x2 {
        return (int_min_to_none(y2 + 1), int_max_to_none(x2));
    }

    if y1 > x1 && y2 >= x2 {
        return (int_min_to_none(x1), int_max_to_none(y1 - 1));
    }

    (int_min_to_none(x1), int_max_to_none(y1 - 1))
}

/// Float variant of the range subtraction. Exclusive bounds fold into the
/// inclusive ones via `offset` (1 for integers, an infinitesimal for
/// numbers). Interior overlap returns both the lower range and an
/// alternate upper range the caller may fall back to.
#[allow(clippy::too_many_arguments)]
fn resolve_bounds_float(
    ctx: &mut ParseContext,
    min_field: &str,
    max_field: &str,
    min: Option<f64>,
    exclusive_min: Option<f64>,
    max: Option<f64>,
    exclusive_max: Option<f64>,
    not_min: Option<f64>,
    not_exclusive_min: Option<f64>,
    not_max: Option<f64>,
    not_exclusive_max: Option<f64>,
    offset: f64,
) -> (Option<f64>, Option<f64>, Option<f64>, Option<f64>) {
    let x1 = max_opt(min, add_opt(exclusive_min, offset));
    let x2 = min_opt(max, add_opt(exclusive_max, -offset));
    let y1 = max_opt(not_min, add_opt(not_exclusive_min, offset));
    let y2 = min_opt(not_max, add_opt(not_exclusive_max, -offset));

    if y1.is_none() && y2.is_none() {
        return (x1, x2, None, None);
    }

    if x1.is_none() && x2.is_none() {
        if let Some(y1) = y1 {
            return (None, Some(y1 - offset), None, None);
        }
        if let Some(y2) = y2 {
            return (Some(y2 + offset), None, None, None);
        }
        return (None, None, None, None);
    }

    let x1_value = x1.unwrap_or(FLOAT_LOWER_BOUND);
    let x2_value = x2.unwrap_or(FLOAT_UPPER_BOUND);
    let y1_value = y1.unwrap_or(FLOAT_LOWER_BOUND);
    let y2_value = y2.unwrap_or(FLOAT_UPPER_BOUND);

    if y2_value < x1_value || y1_value > x2_value {
        return (
            float_min_to_none(x1_value, offset),
            float_max_to_none(x2_value, offset),
            None,
            None,
        );
    }

    if y1_value <= x1_value && y2_value >= x2_value {
        warn_field(
            ctx,
            max_field,
            ParseError::InvalidBounds(format!(
                "no range inside [{x1_value}, {x2_value}] excludes the negated \
                 {min_field}/{max_field} range [{y1_value}, {y2_value}]"
            )),
        );
        return (
            float_min_to_none(x1_value, offset),
            float_max_to_none(x2_value, offset),
            None,
            None,
        );
    }

    if y1_value <= x1_value && y2_value < x2_value {
        return (
            float_min_to_none(y2_value + offset, offset),
            float_max_to_none(x2_value, offset),
            None,
            None,
        );
    }

    if y1_value > x1_value && y2_value >= x2_value {
        return (
            float_min_to_none(x1_value, offset),
            float_max_to_none(y1_value - offset, offset),
            None,
            None,
        );
    }

    // Interior overlap: primary range below the hole, alternate above it.
    (
        float_min_to_none(x1_value, offset),
        float_max_to_none(y1_value - offset, offset),
        float_min_to_none(y2_value + offset, offset),
        float_max_to_none(x2_value, offset),
    )
}

/// Enumerates multiples of `multiple` in `[min, max]` that are not
/// multiples of `not_multiple`, bounded by iteration and candidate caps.
pub(crate) fn compute_valid_multiple_of_values(
    min: f64,
    max: f64,
    multiple: f64,
    not_multiple: f64,
) -> Vec<f64> {
    let mut values = Vec::new();
    if multiple <= 0.0 || not_multiple <= 0.0 || max < min {
        return values;
    }

    let mut value = (min / multiple).ceil() * multiple;
    let mut iterations = 0usize;
    while value <= max {
        if !is_float_multiple(value, not_multiple) {
            values.push(value);
        }
        iterations += 1;
        if iterations >= MAX_MULTIPLE_ITERATIONS || values.len() >= MAX_MULTIPLE_CANDIDATES {
            break;
        }
        value += multiple;
    }
    values
}

fn is_float_multiple(value: f64, multiple: f64) -> bool {
    if multiple == 0.0 {
        return false;
    }
    let ratio = value / multiple;
    (ratio - ratio.round()).abs() < 1e-9
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn add_opt(value: Option<f64>, delta: f64) -> Option<f64> {
    value.map(|value| value + delta)
}

// Shifted sentinels fold back to "unbounded" with a small buffer.
fn int_min_to_none(min: i64) -> Option<i64> {
    (min > MIN_INT + 10).then_some(min)
}

fn int_max_to_none(max: i64) -> Option<i64> {
    (max < MAX_INT - 10).then_some(max)
}

fn float_min_to_none(min: f64, offset: f64) -> Option<f64> {
    (min > FLOAT_LOWER_BOUND + offset * 10.0).then_some(min)
}

fn float_max_to_none(max: f64, offset: f64) -> Option<f64> {
    (max < FLOAT_UPPER_BOUND - offset * 10.0).then_some(max)
}

fn warn_field(ctx: &mut ParseContext, field: &str, error: ParseError) {
    ctx.record_error_at(&format!("/{field}"), error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_context;

    #[test]
    fn disjoint_negated_ranges_leave_bounds_alone() {
        let mut ctx = test_context();
        let (min, max) =
            resolve_bounds_int(&mut ctx, "minItems", "maxItems", Some(0), Some(5), Some(10), None);
        assert_eq!((min, max), (Some(0), Some(5)));
    }

    #[test]
    fn one_sided_overlap_shifts_the_bound_by_one() {
        let mut ctx = test_context();
        // [0, 10] minus [5, inf) -> [0, 4]
        let (min, max) =
            resolve_bounds_int(&mut ctx, "minItems", "maxItems", Some(0), Some(10), Some(5), None);
        assert_eq!((min, max), (Some(0), Some(4)));

        // [0, 10] minus (-inf, 4] -> [5, 10]
        let (min, max) =
            resolve_bounds_int(&mut ctx, "minItems", "maxItems", Some(0), Some(10), None, Some(4));
        assert_eq!((min, max), (Some(5), Some(10)));
    }

    #[test]
    fn full_cover_warns_and_keeps_the_original_range() {
        let mut ctx = test_context();
        let (min, max) = resolve_bounds_int(
            &mut ctx,
            "minItems",
            "maxItems",
            Some(3),
            Some(6),
            Some(0),
            Some(10),
        );
        assert_eq!((min, max), (Some(3), Some(6)));
        assert!(ctx.errors.has_errors());
    }

    #[test]
    fn interior_overlap_produces_primary_and_alternate_float_ranges() {
        let mut ctx = test_context();
        let (min, max, alternate_min, alternate_max) = resolve_bounds_float(
            &mut ctx,
            "minimum",
            "maximum",
            Some(0.0),
            None,
            Some(20.0),
            None,
            Some(5.0),
            None,
            Some(15.0),
            None,
            1.0,
        );
        assert_eq!((min, max), (Some(0.0), Some(4.0)));
        assert_eq!((alternate_min, alternate_max), (Some(16.0), Some(20.0)));
    }

    #[test]
    fn multiples_exclude_the_negated_multiple() {
        let values = compute_valid_multiple_of_values(0.0, 20.0, 2.0, 6.0);
        assert_eq!(values, vec![2.0, 4.0, 8.0, 10.0, 14.0, 16.0, 20.0]);
    }

    #[test]
    fn multiples_respect_the_candidate_cap() {
        let values = compute_valid_multiple_of_values(0.0, 1e9, 1.0, 7.0);
        assert!(values.len() <= 200);
    }

    #[test]
    fn float_multiple_detection_tolerates_rounding() {
        assert!(is_float_multiple(0.3, 0.1));
        assert!(is_float_multiple(18.0, 6.0));
        assert!(!is_float_multiple(5.0, 2.0));
    }
}

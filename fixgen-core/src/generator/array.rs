//! Array generation: tuple prefix, contains quota, then random fill.

use serde_json::Value as JsonValue;

use super::{generate, GenIndex, GenState, Generator, StringGenerator};
use crate::error::ParseError;
use crate::merge::merge_schema_nodes;
use crate::parser::ParseContext;
use crate::schema::{canonical_json, ItemsField, SchemaNode};
use crate::GeneratorOptions;

pub(crate) struct ArrayGenerator {
    tuple: Vec<GenIndex>,
    items: Option<GenIndex>,
    additional_items: Option<GenIndex>,
    unevaluated_items: Option<GenIndex>,
    disallow_unevaluated: bool,
    contains: Option<GenIndex>,
    disallow_additional: bool,
    unique: bool,
    min_items: Option<i64>,
    max_items: Option<i64>,
    min_contains: Option<i64>,
}

enum ItemSource {
    Generator(GenIndex),
    // High-entropy fallback when uniqueness is required with no item schema.
    PlainString,
    Null,
}

pub(crate) fn parse_array(
    ctx: &mut ParseContext,
    node: &SchemaNode,
) -> Result<Generator, ParseError> {
    assert_lower_upper(node.min_items, node.max_items, "minItems", "maxItems")?;
    assert_lower_upper(
        node.min_contains,
        node.max_contains,
        "minContains",
        "maxContains",
    )?;
    assert_lower_upper(node.min_contains, node.max_items, "minContains", "maxItems")?;

    let tuple_nodes: Vec<SchemaNode> = match (&node.prefix_items, &node.items) {
        (Some(prefix), _) => prefix.clone(),
        (None, Some(items)) => items.tuple().map(<[_]>::to_vec).unwrap_or_default(),
        (None, None) => Vec::new(),
    };

    let min_contains_quota = match (&node.contains, node.min_contains) {
        (Some(_), Some(min)) => min.max(0),
        (Some(_), None) => 1,
        (None, _) => 0,
    };
    if let Some(max) = node.max_items {
        let tuple_len = tuple_nodes.len() as i64;
        if tuple_len > max {
            return Err(ParseError::InvalidBounds(format!(
                "tuple length {tuple_len} exceeds maxItems {max}"
            )));
        }
        if tuple_len + min_contains_quota > max {
            return Err(ParseError::InvalidBounds(format!(
                "tuple length plus minContains ({}) exceeds maxItems {max}",
                tuple_len + min_contains_quota
            )));
        }
    }

    let mut tuple = Vec::with_capacity(tuple_nodes.len());
    for (index, item) in tuple_nodes.iter().enumerate() {
        let scope = format!("/prefixItems/{index}");
        tuple.push(ctx.parse_in_scope(&scope, item.clone()));
    }

    let item_schema = node.items.as_ref().and_then(ItemsField::schema);
    let items = item_schema.map(|schema| ctx.parse_in_scope("/items", schema.clone()));

    let additional_items = node
        .additional_items
        .as_ref()
        .and_then(|extra| extra.schema())
        .map(|schema| ctx.parse_in_scope("/additionalItems", schema.clone()));

    let disallow_unevaluated = node
        .unevaluated_items
        .as_ref()
        .is_some_and(|extra| extra.is_false());
    let unevaluated_items = node
        .unevaluated_items
        .as_ref()
        .and_then(|extra| extra.schema())
        .map(|schema| ctx.parse_in_scope("/unevaluatedItems", schema.clone()));

    // Values emitted for `contains` must also satisfy the element schema,
    // so the two are merged before compiling the contains generator.
    let contains = match &node.contains {
        Some(contains) => {
            let merged = match item_schema {
                Some(items) => {
                    merge_schema_nodes(ctx, vec![items.clone(), (**contains).clone()])
                }
                None => (**contains).clone(),
            };
            Some(ctx.parse_in_scope("/contains", merged))
        }
        None => None,
    };

    let disallow_additional = node
        .items
        .as_ref()
        .is_some_and(ItemsField::disallows_additional)
        || node
            .additional_items
            .as_ref()
            .is_some_and(|extra| extra.is_false());

    let (min_items, max_items) = if disallow_additional {
        let len = tuple.len() as i64;
        (Some(len), Some(len))
    } else {
        (node.min_items, node.max_items)
    };

    Ok(Generator::Array(ArrayGenerator {
        tuple,
        items,
        additional_items,
        unevaluated_items,
        disallow_unevaluated,
        contains,
        disallow_additional,
        unique: node.unique_items.unwrap_or(false),
        min_items,
        max_items,
        min_contains: node.min_contains,
    }))
}

fn assert_lower_upper(
    lower: Option<i64>,
    upper: Option<i64>,
    lower_name: &str,
    upper_name: &str,
) -> Result<(), ParseError> {
    if lower.is_some_and(|value| value < 0) || upper.is_some_and(|value| value < 0) {
        return Err(ParseError::InvalidBounds(format!(
            "{lower_name}/{upper_name} cannot be negative"
        )));
    }
    if let (Some(lower), Some(upper)) = (lower, upper) {
        if lower > upper {
            return Err(ParseError::InvalidBounds(format!(
                "{lower_name} ({lower}) cannot be greater than {upper_name} ({upper})"
            )));
        }
    }
    Ok(())
}

impl ArrayGenerator {
    pub(crate) fn generate(
        &self,
        root: &crate::Root,
        options: &GeneratorOptions,
        state: &mut GenState,
    ) -> JsonValue {
        state.complexity += 1;
        let mut items_out: Vec<JsonValue> = Vec::new();

        for index in &self.tuple {
            if state.should_cutoff(options) {
                return JsonValue::Array(items_out);
            }
            items_out.push(generate(root, *index, options, state));
        }

        if self.disallow_additional {
            return JsonValue::Array(items_out);
        }

        let source = self
            .items
            .or(self.additional_items)
            .or(self.unevaluated_items)
            .map(ItemSource::Generator)
            .unwrap_or(if self.unique {
                ItemSource::PlainString
            } else {
                ItemSource::Null
            });

        let min = self
            .min_items
            .unwrap_or(options.default_array_min_items as i64)
            .max(0) as usize;
        let mut max = self
            .max_items
            .unwrap_or(options.default_array_max_items as i64)
            .max(0) as usize;
        if max < min {
            max = min + options.default_array_max_items;
        }

        let contains_quota = match self.contains {
            Some(_) => self.min_contains.unwrap_or(1).max(0) as usize,
            None => 0,
        };
        if let Some(contains) = self.contains {
            for _ in 0..contains_quota {
                if state.should_cutoff(options) {
                    return JsonValue::Array(items_out);
                }
                let value = self.generate_considering_unique(
                    root,
                    options,
                    state,
                    &ItemSource::Generator(contains),
                    &items_out,
                );
                items_out.push(value);
            }
        }

        let remaining = max.saturating_sub(self.tuple.len() + contains_quota);
        let mut to_generate = state.rng.usize_between(0, remaining);
        if self.disallow_unevaluated || state.should_minimize(options) {
            to_generate = 0;
        }

        let mut emitted = 0;
        while emitted < to_generate || items_out.len() < min {
            if state.should_cutoff(options) {
                break;
            }
            let value =
                self.generate_considering_unique(root, options, state, &source, &items_out);
            items_out.push(value);
            emitted += 1;
        }

        JsonValue::Array(items_out)
    }

    fn generate_considering_unique(
        &self,
        root: &crate::Root,
        options: &GeneratorOptions,
        state: &mut GenState,
        source: &ItemSource,
        existing: &[JsonValue],
    ) -> JsonValue {
        if !self.unique {
            return emit(root, options, state, source);
        }

        let seen: Vec<String> = existing.iter().map(canonical_json).collect();
        for _ in 0..options.maximum_unique_generator_attempts {
            let candidate = emit(root, options, state, source);
            if !seen.contains(&canonical_json(&candidate)) {
                return candidate;
            }
        }
        JsonValue::String(format!(
            "UniqueExhausted: unable to generate a unique item after {} attempts",
            options.maximum_unique_generator_attempts
        ))
    }
}

fn emit(
    root: &crate::Root,
    options: &GeneratorOptions,
    state: &mut GenState,
    source: &ItemSource,
) -> JsonValue {
    match source {
        ItemSource::Generator(index) => generate(root, *index, options, state),
        ItemSource::PlainString => StringGenerator::plain().generate(options, state),
        ItemSource::Null => JsonValue::Null,
    }
}

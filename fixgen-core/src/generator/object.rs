//! Object generation: required, optional, pattern, additional, and filler
//! properties, in that order.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use super::{generate, GenIndex, GenState, Generator};
use crate::error::ParseError;
use crate::parser::ParseContext;
use crate::reference::encode_pointer_segment;
use crate::regex_gen::RegexGenerator;
use crate::schema::SchemaNode;
use crate::GeneratorOptions;

pub(crate) struct PatternProperty {
    name_generator: Option<RegexGenerator>,
    value: GenIndex,
}

pub(crate) struct ObjectGenerator {
    properties: BTreeMap<String, GenIndex>,
    pattern_properties: Vec<PatternProperty>,
    disallow_additional: bool,
    additional: Option<GenIndex>,
    required: Vec<String>,
    min_properties: Option<i64>,
    max_properties: Option<i64>,
}

pub(crate) fn parse_object(
    ctx: &mut ParseContext,
    node: &SchemaNode,
) -> Result<Generator, ParseError> {
    if node.min_properties.is_some_and(|min| min < 0)
        || node.max_properties.is_some_and(|max| max < 0)
    {
        return Err(ParseError::InvalidBounds(
            "minProperties/maxProperties cannot be negative".to_string(),
        ));
    }
    if let (Some(min), Some(max)) = (node.min_properties, node.max_properties) {
        if min > max {
            return Err(ParseError::InvalidBounds(format!(
                "minProperties ({min}) cannot be greater than maxProperties ({max})"
            )));
        }
    }

    let required = node.required.clone().unwrap_or_default();
    if let Some(max) = node.max_properties {
        if required.len() as i64 > max {
            return Err(ParseError::InvalidBounds(format!(
                "required lists {} properties but maxProperties is {max}",
                required.len()
            )));
        }
    }

    let disallow_additional = node
        .additional_properties
        .as_ref()
        .is_some_and(|extra| extra.is_false());
    let declared = node.properties.as_ref().map_or(0, BTreeMap::len);
    if disallow_additional
        && node.pattern_properties.is_none()
        && node.min_properties.is_some_and(|min| min > declared as i64)
    {
        return Err(ParseError::InvalidBounds(format!(
            "additional properties are disallowed but minProperties exceeds the {declared} declared properties"
        )));
    }

    let mut properties = BTreeMap::new();
    if let Some(map) = &node.properties {
        for (name, property) in map {
            let scope = format!("/properties/{}", encode_pointer_segment(name));
            let index = ctx.parse_in_scope(&scope, property.clone());
            properties.insert(name.clone(), index);
        }
    }

    let mut pattern_properties = Vec::new();
    if let Some(map) = &node.pattern_properties {
        for (pattern, property) in map {
            let scope = format!("/patternProperties/{}", encode_pointer_segment(pattern));
            let value = ctx.parse_in_scope(&scope, property.clone());
            let name_generator = match RegexGenerator::new(
                pattern,
                &ctx.parser_options.regex_pattern_property_options,
            ) {
                Ok(generator) => Some(generator),
                Err(err) => {
                    ctx.record_error_at(&format!("/patternProperties/{pattern}/regex"), err);
                    None
                }
            };
            pattern_properties.push(PatternProperty {
                name_generator,
                value,
            });
        }
    }

    let additional = node
        .additional_properties
        .as_ref()
        .and_then(|extra| extra.schema())
        .map(|schema| ctx.parse_in_scope("/additionalProperties", schema.clone()));

    Ok(Generator::Object(ObjectGenerator {
        properties,
        pattern_properties,
        disallow_additional,
        additional,
        required,
        min_properties: node.min_properties,
        max_properties: node.max_properties,
    }))
}

impl ObjectGenerator {
    pub(crate) fn generate(
        &self,
        root: &crate::Root,
        options: &GeneratorOptions,
        state: &mut GenState,
    ) -> JsonValue {
        state.complexity += 1;
        let mut generated = serde_json::Map::new();

        // Required properties first, in declaration order. A required name
        // with no matching property schema gets a synthetic marker value.
        for key in &self.required {
            if state.should_cutoff(options) {
                return JsonValue::Object(generated);
            }
            let value = match self.properties.get(key) {
                Some(index) => generate(root, *index, options, state),
                None => JsonValue::String(format!(
                    "required_{key}_{}",
                    state.rng.int_between(0, 9_999_999)
                )),
            };
            generated.insert(key.clone(), value);
        }

        let min = self
            .min_properties
            .unwrap_or(options.default_object_min_properties as i64)
            .max(0) as usize;
        let mut max = self
            .max_properties
            .unwrap_or(options.default_object_max_properties as i64)
            .max(0) as usize;
        if max < min {
            max += min;
        }

        let min_extras = min.saturating_sub(self.required.len());
        let max_extras = max.saturating_sub(self.required.len());
        let mut target = state.rng.usize_between(min_extras, max_extras);
        if state.should_minimize(options) {
            target = min_extras;
        }

        let optional: Vec<String> = self
            .properties
            .keys()
            .filter(|key| !self.required.contains(*key))
            .cloned()
            .collect();
        let chosen = state
            .rng
            .choose_multiple(&optional, target.min(optional.len()));
        for key in &chosen {
            if state.should_cutoff(options) {
                return JsonValue::Object(generated);
            }
            if let Some(index) = self.properties.get(key) {
                let value = generate(root, *index, options, state);
                generated.insert(key.clone(), value);
            }
        }

        // Fill the remainder: pattern-property keys first, then additional
        // instances, then fallback nulls (suppressed unless needed for the
        // minimum).
        let remaining = target.saturating_sub(chosen.len());
        if !self.pattern_properties.is_empty() {
            for _ in 0..remaining {
                if state.should_cutoff(options) {
                    return JsonValue::Object(generated);
                }
                let pick = state
                    .rng
                    .usize_between(0, self.pattern_properties.len() - 1);
                let property = &self.pattern_properties[pick];
                let Some(name_generator) = &property.name_generator else {
                    continue;
                };
                let name = name_generator.generate(&mut state.rng);
                let value = generate(root, property.value, options, state);
                generated.insert(name, value);
            }
        } else if self.disallow_additional {
            // Nothing else may be emitted.
        } else if let Some(additional) = self.additional {
            for index in 0..remaining {
                if state.should_cutoff(options) {
                    return JsonValue::Object(generated);
                }
                let value = generate(root, additional, options, state);
                generated.insert(format!("additional_{index}"), value);
            }
        } else {
            for index in 0..remaining {
                if options.suppress_fallback_values && generated.len() >= min {
                    continue;
                }
                generated.insert(format!("fallback_{index}"), JsonValue::Null);
            }
        }

        // Top up with fillers until the minimum holds.
        let mut filler = 0;
        while generated.len() < min {
            if state.should_cutoff(options) {
                break;
            }
            let value = match self.additional {
                Some(additional) => generate(root, additional, options, state),
                None => JsonValue::Null,
            };
            generated.insert(format!("min_filler_{filler}"), value);
            filler += 1;
        }

        JsonValue::Object(generated)
    }
}

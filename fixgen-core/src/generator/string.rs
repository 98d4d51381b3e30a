//! String generation: formats, patterns, and lorem filler.

use serde_json::Value as JsonValue;

use super::{GenState, Generator};
use crate::error::ParseError;
use crate::formats::{generate_format, lorem_sentence};
use crate::parser::ParseContext;
use crate::regex_gen::RegexGenerator;
use crate::schema::SchemaNode;
use crate::GeneratorOptions;

pub(crate) struct StringGenerator {
    pub(crate) format: Option<String>,
    pub(crate) pattern: Option<RegexGenerator>,
    pub(crate) min_length: Option<usize>,
    pub(crate) max_length: Option<usize>,
}

impl StringGenerator {
    /// Plain lorem-backed generator, used as the high-entropy fallback for
    /// unique arrays.
    pub(crate) fn plain() -> Self {
        Self {
            format: None,
            pattern: None,
            min_length: None,
            max_length: None,
        }
    }
}

pub(crate) fn parse_string(
    ctx: &mut ParseContext,
    node: &SchemaNode,
) -> Result<Generator, ParseError> {
    if node.format.is_some() && node.pattern.is_some() {
        return Err(ParseError::InvalidBounds(
            "cannot have both format and pattern on a string".to_string(),
        ));
    }

    if node.min_length.is_some_and(|min| min < 0) || node.max_length.is_some_and(|max| max < 0) {
        return Err(ParseError::InvalidBounds(
            "minLength/maxLength cannot be negative".to_string(),
        ));
    }
    if let (Some(min), Some(max)) = (node.min_length, node.max_length) {
        if min > max {
            return Err(ParseError::InvalidBounds(format!(
                "minLength ({min}) cannot be greater than maxLength ({max})"
            )));
        }
    }

    // Formats produce fixed shapes; length bounds cannot be honored there.
    // Patterns can: sampling retries until the bounds hold.
    if node.format.is_some() && (node.min_length.is_some() || node.max_length.is_some()) {
        return Err(ParseError::InvalidBounds(
            "format strings cannot also declare minLength/maxLength".to_string(),
        ));
    }

    let pattern = match &node.pattern {
        Some(pattern) => Some(RegexGenerator::new(
            pattern,
            &ctx.parser_options.regex_string_options,
        )?),
        None => None,
    };

    Ok(Generator::String(StringGenerator {
        format: node.format.clone(),
        pattern,
        min_length: node.min_length.map(|min| min as usize),
        max_length: node.max_length.map(|max| max as usize),
    }))
}

impl StringGenerator {
    pub(crate) fn generate(&self, options: &GeneratorOptions, state: &mut GenState) -> JsonValue {
        state.complexity += 1;

        if let Some(format) = &self.format {
            return JsonValue::String(generate_format(format, &mut state.rng));
        }

        if let Some(pattern) = &self.pattern {
            let mut candidate = pattern.generate(&mut state.rng);
            if self.min_length.is_some() || self.max_length.is_some() {
                for _ in 0..options.maximum_unique_generator_attempts {
                    if self.length_in_bounds(&candidate) {
                        break;
                    }
                    candidate = pattern.generate(&mut state.rng);
                }
            }
            return JsonValue::String(candidate);
        }

        let min_length = self
            .min_length
            .unwrap_or(options.default_string_min_length);
        let mut text = lorem_sentence(&mut state.rng);
        while text.chars().count() < min_length {
            text.push(' ');
            text.push_str(&lorem_sentence(&mut state.rng));
        }
        if let Some(max_length) = self.max_length {
            text = text.chars().take(max_length).collect();
        }
        JsonValue::String(text)
    }

    fn length_in_bounds(&self, candidate: &str) -> bool {
        let length = candidate.chars().count();
        if self.min_length.is_some_and(|min| length < min) {
            return false;
        }
        if self.max_length.is_some_and(|max| length > max) {
            return false;
        }
        true
    }
}

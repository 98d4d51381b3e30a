//! Numeric generation for `number` and `integer` nodes.

use serde_json::Value as JsonValue;

use super::{ConstGenerator, GenState, Generator};
use crate::error::ParseError;
use crate::not::{FLOAT_LOWER_BOUND, FLOAT_UPPER_BOUND, INFINITESIMAL};
use crate::schema::SchemaNode;
use crate::GeneratorOptions;

pub(crate) struct NumberGenerator {
    pub(crate) integer: bool,
    pub(crate) minimum: Option<f64>,
    pub(crate) maximum: Option<f64>,
    pub(crate) multiple_of: Option<f64>,
}

pub(crate) fn parse_number(node: &SchemaNode, integer: bool) -> Result<Generator, ParseError> {
    if node.minimum.is_some() && node.exclusive_minimum.is_some() {
        return Err(ParseError::InvalidBounds(
            "cannot have both minimum and exclusiveMinimum".to_string(),
        ));
    }
    if node.maximum.is_some() && node.exclusive_maximum.is_some() {
        return Err(ParseError::InvalidBounds(
            "cannot have both maximum and exclusiveMaximum".to_string(),
        ));
    }

    let minimum = node
        .minimum
        .or(node.exclusive_minimum.map(|value| value + INFINITESIMAL))
        .map(|value| value.max(FLOAT_LOWER_BOUND));
    let maximum = node
        .maximum
        .or(node.exclusive_maximum.map(|value| value - INFINITESIMAL))
        .map(|value| value.min(FLOAT_UPPER_BOUND));

    if let (Some(min), Some(max)) = (minimum, maximum) {
        if min > max {
            return Err(ParseError::InvalidBounds(format!(
                "minimum cannot be greater than maximum (min: {min}, max: {max})"
            )));
        }
        if integer && min.ceil() > max.floor() {
            return Err(ParseError::InvalidBounds(format!(
                "minimum and maximum allow no integers (min: {min}, max: {max})"
            )));
        }
    }

    if let Some(multiple) = node.multiple_of {
        if multiple < 0.0 {
            return Err(ParseError::InvalidBounds(
                "multipleOf cannot be negative".to_string(),
            ));
        }
        if multiple < INFINITESIMAL {
            return Err(ParseError::InvalidBounds(format!(
                "multipleOf must be at least {INFINITESIMAL:e}"
            )));
        }
        if integer && multiple.trunc() != multiple {
            return Err(ParseError::InvalidBounds(
                "integer type cannot have a non-integer multipleOf".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (minimum, maximum) {
            if count_multiples_in_range(min, max, multiple) == 0 {
                return Err(ParseError::InvalidBounds(
                    "minimum and maximum allow no multiples of multipleOf".to_string(),
                ));
            }
        }
    }

    if let (Some(min), Some(max)) = (minimum, maximum) {
        if min == max {
            let value = if integer {
                JsonValue::from(min.round() as i64)
            } else {
                JsonValue::from(min)
            };
            return Ok(Generator::Const(ConstGenerator { value }));
        }
    }

    Ok(Generator::Number(NumberGenerator {
        integer,
        minimum,
        maximum,
        multiple_of: node.multiple_of,
    }))
}

impl NumberGenerator {
    pub(crate) fn generate(&self, options: &GeneratorOptions, state: &mut GenState) -> JsonValue {
        state.complexity += 1;

        let (min, max) = self.resolve_bounds(options);
        let value = match self.multiple_of {
            Some(multiple) => {
                let raw = draw_multiple_of(state, min, max, multiple);
                // Round onto the multiple grid, then pull back inside the
                // range if float error spilled over a bound.
                let mut rounded = (raw / multiple).round() * multiple;
                if rounded < min {
                    rounded += multiple;
                }
                if rounded > max {
                    rounded -= multiple;
                }
                rounded
            }
            None => {
                let raw = state.rng.float_between(min, max);
                if self.integer {
                    raw.round().clamp(min, max)
                } else {
                    raw
                }
            }
        };

        let value = if value == 0.0 { 0.0 } else { value };
        if self.integer {
            JsonValue::from(value as i64)
        } else {
            JsonValue::from(value)
        }
    }

    /// Unbounded sides resolve against the runtime defaults, widened for
    /// large `multipleOf` values so at least a few multiples fit.
    fn resolve_bounds(&self, options: &GeneratorOptions) -> (f64, f64) {
        let span = (options.default_number_maximum - options.default_number_minimum).abs();
        let offset = self
            .multiple_of
            .map(|multiple| (multiple * 100.0).abs())
            .filter(|offset| *offset > 0.0)
            .unwrap_or(span)
            .max(span);

        let (mut min, mut max) = match (self.minimum, self.maximum) {
            (Some(min), Some(max)) => (min, max),
            (Some(min), None) => (min, min + offset),
            (None, Some(max)) => (max - offset, max),
            (None, None) => (
                options.default_number_minimum,
                options.default_number_minimum + offset,
            ),
        };

        min = min.max(FLOAT_LOWER_BOUND);
        max = max.min(FLOAT_UPPER_BOUND);
        if self.integer {
            min = min.ceil();
            max = max.floor();
        }
        if min > max {
            max = min;
        }
        (min, max)
    }
}

fn count_multiples_in_range(min: f64, max: f64, multiple: f64) -> i64 {
    let first = (min / multiple).ceil() as i64;
    let last = (max / multiple).floor() as i64;
    (last - first + 1).max(0)
}

fn draw_multiple_of(state: &mut GenState, min: f64, max: f64, multiple: f64) -> f64 {
    let first = (min / multiple).ceil() as i64;
    let last = (max / multiple).floor() as i64;
    if last < first {
        return min;
    }
    let pick = state.rng.int_between(first, last);
    pick as f64 * multiple
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RandomSource;
    use crate::reference::ReferenceResolver;

    fn state(seed: u64) -> GenState {
        GenState {
            rng: RandomSource::from_seed(seed),
            complexity: 0,
            resolver: ReferenceResolver::default(),
        }
    }

    fn node(value: serde_json::Value) -> SchemaNode {
        serde_json::from_value(value).expect("schema node")
    }

    #[test]
    fn integers_stay_inside_explicit_bounds() {
        let generator = parse_number(
            &node(serde_json::json!({"minimum": -5, "maximum": 5})),
            true,
        )
        .expect("generator");
        let Generator::Number(generator) = generator else {
            panic!("expected a number generator");
        };
        let options = GeneratorOptions::default();
        let mut state = state(9);
        for _ in 0..64 {
            let value = generator.generate(&options, &mut state);
            let value = value.as_i64().expect("integer output");
            assert!((-5..=5).contains(&value));
        }
    }

    #[test]
    fn multiples_land_on_the_grid() {
        let generator = parse_number(
            &node(serde_json::json!({"minimum": 5, "maximum": 10, "multipleOf": 2})),
            true,
        )
        .expect("generator");
        let Generator::Number(generator) = generator else {
            panic!("expected a number generator");
        };
        let options = GeneratorOptions::default();
        let mut state = state(10);
        for _ in 0..32 {
            let value = generator.generate(&options, &mut state);
            let value = value.as_i64().expect("integer output");
            assert!(value == 6 || value == 8 || value == 10, "got {value}");
        }
    }

    #[test]
    fn equal_bounds_collapse_to_a_constant() {
        let generator = parse_number(
            &node(serde_json::json!({"minimum": 0, "maximum": 0})),
            true,
        )
        .expect("generator");
        assert!(matches!(
            generator,
            Generator::Const(ConstGenerator {
                value: JsonValue::Number(_)
            })
        ));
    }

    #[test]
    fn contradictory_bounds_are_rejected() {
        assert!(parse_number(
            &node(serde_json::json!({"minimum": 3, "maximum": 1})),
            false
        )
        .is_err());
        assert!(parse_number(
            &node(serde_json::json!({"minimum": 0.2, "maximum": 0.8})),
            true
        )
        .is_err());
        assert!(parse_number(
            &node(serde_json::json!({"minimum": 0, "maximum": 10, "multipleOf": 20})),
            false
        )
        .is_err());
    }
}

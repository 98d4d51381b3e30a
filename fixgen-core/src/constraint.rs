//! Post-generation constraints.
//!
//! Some keyword combinations cannot be realized algebraically (a negated
//! pattern, oneOf exclusivity, conditional chains). Those compile into
//! constraints that inspect the generated value and regenerate through the
//! wrapped generator until the value satisfies them or a retry budget runs
//! out. Exhaustion yields an inline diagnostic string rather than an error
//! so the failure stays visible at its site in the output.

use std::collections::BTreeSet;

use jsonschema::Validator;
use serde_json::Value as JsonValue;

use crate::error::ParseError;
use crate::formats::matches_format;
use crate::generator::{generate, GenIndex, GenState};
use crate::schema::canonical_json;
use crate::{GeneratorOptions, Root};

/// Exclusions gathered while reconciling `not` clauses. This is the
/// builder form carried on rewritten schema nodes; `compile` turns it into
/// the runtime constraint.
#[derive(Clone, Debug, Default)]
pub struct ConstraintSet {
    not_matching_regex: BTreeSet<String>,
    not_matching_formats: BTreeSet<String>,
    not_values: BTreeSet<String>,
    must_not_have_properties: BTreeSet<String>,
}

impl ConstraintSet {
    pub(crate) fn add_not_matching_regex(&mut self, pattern: &str) -> Result<(), ParseError> {
        regex::Regex::new(pattern)
            .map_err(|err| ParseError::InvalidRegex(format!("pattern '{pattern}': {err}")))?;
        self.not_matching_regex.insert(pattern.to_string());
        Ok(())
    }

    pub(crate) fn add_not_matching_format(&mut self, format: &str) -> Result<(), ParseError> {
        if matches_format(format, "").is_none() {
            return Err(ParseError::Unsupported(format!(
                "unknown format '{format}' in negated clause"
            )));
        }
        self.not_matching_formats.insert(format.to_string());
        Ok(())
    }

    /// Excludes values by their canonical JSON serialization.
    pub(crate) fn add_not_values<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.not_values.extend(values);
    }

    pub(crate) fn add_must_not_have_properties<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.must_not_have_properties.extend(names);
    }

    pub(crate) fn merge_from(&mut self, other: ConstraintSet) {
        self.not_matching_regex.extend(other.not_matching_regex);
        self.not_matching_formats.extend(other.not_matching_formats);
        self.not_values.extend(other.not_values);
        self.must_not_have_properties
            .extend(other.must_not_have_properties);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.not_matching_regex.is_empty()
            && self.not_matching_formats.is_empty()
            && self.not_values.is_empty()
            && self.must_not_have_properties.is_empty()
    }

    pub(crate) fn compile(&self) -> Result<ExclusionConstraint, ParseError> {
        let mut regexes = Vec::with_capacity(self.not_matching_regex.len());
        for pattern in &self.not_matching_regex {
            let compiled = regex::Regex::new(pattern)
                .map_err(|err| ParseError::InvalidRegex(format!("pattern '{pattern}': {err}")))?;
            regexes.push(compiled);
        }
        Ok(ExclusionConstraint {
            regexes,
            formats: self.not_matching_formats.iter().cloned().collect(),
            not_values: self.not_values.clone(),
            must_not_have_properties: self.must_not_have_properties.clone(),
        })
    }
}

/// Compiled exclusion filter: regenerates until the value matches none of
/// the negated patterns, formats, serialized values, or forbidden keys.
pub(crate) struct ExclusionConstraint {
    regexes: Vec<regex::Regex>,
    formats: Vec<String>,
    not_values: BTreeSet<String>,
    must_not_have_properties: BTreeSet<String>,
}

impl ExclusionConstraint {
    fn passes(&self, value: &JsonValue) -> bool {
        if let JsonValue::String(text) = value {
            if self.regexes.iter().any(|regex| regex.is_match(text)) {
                return false;
            }
            if self
                .formats
                .iter()
                .any(|format| matches_format(format, text) == Some(true))
            {
                return false;
            }
        }

        if !self.not_values.is_empty() && self.not_values.contains(&canonical_json(value)) {
            return false;
        }

        if let JsonValue::Object(map) = value {
            if self
                .must_not_have_properties
                .iter()
                .any(|name| map.contains_key(name))
            {
                return false;
            }
        }

        true
    }

    fn apply(
        &self,
        root: &Root,
        inner: GenIndex,
        options: &GeneratorOptions,
        state: &mut GenState,
        mut value: JsonValue,
    ) -> JsonValue {
        for _ in 0..options.maximum_unique_generator_attempts {
            if self.passes(&value) {
                return value;
            }
            value = generate(root, inner, options, state);
        }
        JsonValue::String(format!(
            "Failed to generate a value passing exclusion constraints after {} attempts",
            options.maximum_unique_generator_attempts
        ))
    }
}

/// Accepts a candidate only when it validates against exactly one of the
/// `oneOf` alternatives; factoring alone does not guarantee exclusivity.
pub(crate) struct OneOfConstraint {
    pub(crate) validators: Vec<Validator>,
}

impl OneOfConstraint {
    fn apply(
        &self,
        root: &Root,
        inner: GenIndex,
        options: &GeneratorOptions,
        state: &mut GenState,
        mut value: JsonValue,
    ) -> JsonValue {
        for _ in 0..options.maximum_one_of_attempts {
            let matches = self
                .validators
                .iter()
                .filter(|validator| validator.is_valid(&value))
                .count();
            if matches == 1 {
                return value;
            }
            value = generate(root, inner, options, state);
        }
        JsonValue::String(format!(
            "OneOfExhausted: no exclusively matching value after {} attempts",
            options.maximum_one_of_attempts
        ))
    }
}

/// One compiled `if`/`then`/`else` statement.
pub(crate) struct IfConstraint {
    pub(crate) predicate: Validator,
    pub(crate) then_: Option<GenIndex>,
    pub(crate) else_: Option<GenIndex>,
}

impl IfConstraint {
    /// Tries to satisfy the statement for the current value. When the value
    /// triggers a branch, that branch regenerates and the result is accepted
    /// only if it still lands on the same side of the predicate. Without a
    /// matching branch the value passes through, unless `must_exactly`
    /// requires a branch hit (the multi-constraint brute-force mode).
    fn attempt(
        &self,
        root: &Root,
        options: &GeneratorOptions,
        state: &mut GenState,
        value: &JsonValue,
        must_exactly: bool,
    ) -> Option<JsonValue> {
        if self.predicate.is_valid(value) {
            match self.then_ {
                Some(then_) => {
                    let regenerated = generate(root, then_, options, state);
                    self.predicate.is_valid(&regenerated).then_some(regenerated)
                }
                None => (!must_exactly).then(|| value.clone()),
            }
        } else {
            match self.else_ {
                Some(else_) => {
                    let regenerated = generate(root, else_, options, state);
                    (!self.predicate.is_valid(&regenerated)).then_some(regenerated)
                }
                None => (!must_exactly).then(|| value.clone()),
            }
        }
    }
}

/// All `if` statements attached to one node. A single statement applies
/// directly; several (accumulated through `allOf` merges) are brute-forced
/// in a random permutation per attempt, succeeding as soon as one
/// statement's satisfaction path returns.
pub(crate) struct MultiIfConstraint {
    pub(crate) constraints: Vec<IfConstraint>,
}

impl MultiIfConstraint {
    fn apply(
        &self,
        root: &Root,
        inner: GenIndex,
        options: &GeneratorOptions,
        state: &mut GenState,
        mut value: JsonValue,
    ) -> JsonValue {
        let must_exactly = self.constraints.len() > 1;
        for _ in 0..options.maximum_if_attempts {
            state.complexity += 1;
            let order = state.rng.permutation(self.constraints.len());
            for index in order {
                if let Some(satisfied) =
                    self.constraints[index].attempt(root, options, state, &value, must_exactly)
                {
                    return satisfied;
                }
            }
            value = generate(root, inner, options, state);
        }
        JsonValue::String(format!(
            "IfUnsatisfied: failed to satisfy if/then/else after {} attempts",
            options.maximum_if_attempts
        ))
    }
}

/// A post-hoc filter attached to a constrained generator.
pub(crate) enum Constraint {
    Exclusion(ExclusionConstraint),
    OneOf(OneOfConstraint),
    If(MultiIfConstraint),
}

impl Constraint {
    pub(crate) fn apply(
        &self,
        root: &Root,
        inner: GenIndex,
        options: &GeneratorOptions,
        state: &mut GenState,
        value: JsonValue,
    ) -> JsonValue {
        match self {
            Constraint::Exclusion(constraint) => {
                constraint.apply(root, inner, options, state, value)
            }
            Constraint::OneOf(constraint) => constraint.apply(root, inner, options, state, value),
            Constraint::If(constraint) => constraint.apply(root, inner, options, state, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exclusion_checks_regex_format_value_and_keys() {
        let mut set = ConstraintSet::default();
        set.add_not_matching_regex("^ab").expect("valid regex");
        set.add_not_matching_format("ipv4").expect("known format");
        set.add_not_values([canonical_json(&json!(42))]);
        set.add_must_not_have_properties(["secret".to_string()]);
        let compiled = set.compile().expect("compile");

        assert!(!compiled.passes(&json!("abc")));
        assert!(compiled.passes(&json!("zbc")));
        assert!(!compiled.passes(&json!("127.0.0.1")));
        assert!(!compiled.passes(&json!(42)));
        assert!(compiled.passes(&json!(41)));
        assert!(!compiled.passes(&json!({"secret": 1})));
        assert!(compiled.passes(&json!({"public": 1})));
    }

    #[test]
    fn unknown_negated_formats_are_rejected() {
        let mut set = ConstraintSet::default();
        assert!(set.add_not_matching_format("not-a-format").is_err());
    }
}

//! The compiled generator tree and its runtime.
//!
//! Generators are a sum type stored in an arena owned by the `Root`;
//! children refer to each other by index, which turns the ownership cycles
//! created by `$ref` into plain back-references. One mutable `GenState`
//! (PRNG, complexity counter, resolution stack) threads through a whole
//! `generate` call.

mod array;
mod number;
mod object;
mod string;

use serde_json::Value as JsonValue;

pub(crate) use array::{parse_array, ArrayGenerator};
pub(crate) use number::{parse_number, NumberGenerator};
pub(crate) use object::{parse_object, ObjectGenerator};
pub(crate) use string::{parse_string, StringGenerator};

use crate::constraint::Constraint;
use crate::random::RandomSource;
use crate::reference::{ReferenceResolver, ResolutionFrame};
use crate::{GeneratorOptions, Root};

/// Index of a generator in the root's arena.
pub(crate) type GenIndex = usize;

pub(crate) struct EnumGenerator {
    pub(crate) values: Vec<JsonValue>,
}

pub(crate) struct ConstGenerator {
    pub(crate) value: JsonValue,
}

pub(crate) struct MultiTypeGenerator {
    pub(crate) generators: Vec<GenIndex>,
}

pub(crate) struct CombinationGenerator {
    pub(crate) generators: Vec<GenIndex>,
}

/// Late binding to another generator through the reference registry.
pub(crate) struct ReferenceGenerator {
    pub(crate) document: String,
    pub(crate) pointer: String,
}

/// An inner generator plus post-hoc constraints that filter its output.
pub(crate) struct ConstrainedGenerator {
    pub(crate) inner: GenIndex,
    pub(crate) constraints: Vec<Constraint>,
}

pub(crate) enum Generator {
    Null,
    Boolean,
    Number(NumberGenerator),
    String(StringGenerator),
    Enum(EnumGenerator),
    Const(ConstGenerator),
    Object(ObjectGenerator),
    Array(ArrayGenerator),
    MultiType(MultiTypeGenerator),
    Combination(CombinationGenerator),
    Reference(ReferenceGenerator),
    Constrained(ConstrainedGenerator),
}

/// Mutable state for one generation run.
pub(crate) struct GenState {
    pub(crate) rng: RandomSource,
    pub(crate) complexity: u64,
    pub(crate) resolver: ReferenceResolver,
}

impl GenState {
    /// Soft budget: emit only minimum structure once exceeded.
    pub(crate) fn should_minimize(&self, options: &GeneratorOptions) -> bool {
        options.maximum_generation_steps > 0 && self.complexity > options.maximum_generation_steps
    }

    /// Hard budget: containers return partial output once exceeded.
    pub(crate) fn should_cutoff(&self, options: &GeneratorOptions) -> bool {
        options.cutoff_generation_steps > 0 && self.complexity > options.cutoff_generation_steps
    }
}

/// Dispatches one arena slot.
pub(crate) fn generate(
    root: &Root,
    index: GenIndex,
    options: &GeneratorOptions,
    state: &mut GenState,
) -> JsonValue {
    match &root.arena[index] {
        Generator::Null => JsonValue::Null,
        Generator::Boolean => JsonValue::Bool(state.rng.bool()),
        Generator::Number(generator) => generator.generate(options, state),
        Generator::String(generator) => generator.generate(options, state),
        Generator::Enum(generator) => generator.values[state
            .rng
            .usize_between(0, generator.values.len().saturating_sub(1))]
        .clone(),
        Generator::Const(generator) => generator.value.clone(),
        Generator::Object(generator) => generator.generate(root, options, state),
        Generator::Array(generator) => generator.generate(root, options, state),
        Generator::MultiType(generator) => {
            let pick = state
                .rng
                .usize_between(0, generator.generators.len().saturating_sub(1));
            generate(root, generator.generators[pick], options, state)
        }
        Generator::Combination(generator) => {
            let pick = state
                .rng
                .usize_between(0, generator.generators.len().saturating_sub(1));
            generate(root, generator.generators[pick], options, state)
        }
        Generator::Reference(generator) => generator.generate(root, options, state),
        Generator::Constrained(generator) => {
            let mut value = generate(root, generator.inner, options, state);
            for constraint in &generator.constraints {
                value = constraint.apply(root, generator.inner, options, state, value);
            }
            value
        }
    }
}

impl ReferenceGenerator {
    fn generate(&self, root: &Root, options: &GeneratorOptions, state: &mut GenState) -> JsonValue {
        let Some(target) = root.registry.lookup(&self.document, &self.pointer) else {
            return JsonValue::Null;
        };

        let frame = ResolutionFrame {
            document: self.document.clone(),
            pointer: self.pointer.clone(),
        };

        // A frame already on the stack is a cycle. It may unroll until the
        // stack reaches the depth limit, then the cycle is cut with a
        // visible diagnostic. Plain chains are depth-bounded separately.
        if !options.bypass_cyclic_reference_check
            && state.resolver.contains(&frame)
            && state.resolver.len() >= options.maximum_reference_depth
        {
            return JsonValue::String(format!(
                "CyclicRef: cyclic reference {}{} cut after {} frames: {}",
                self.document,
                self.pointer,
                state.resolver.len(),
                state.resolver.formatted()
            ));
        }
        if state.resolver.len() > options.maximum_reference_depth {
            return JsonValue::String(format!(
                "MaxDepthExceeded: maximum reference depth {} exceeded at {}{}",
                options.maximum_reference_depth, self.document, self.pointer
            ));
        }

        state.resolver.push(frame);
        let value = generate(root, target, options, state);
        state.resolver.pop();
        value
    }
}

//! `oneOf` / `anyOf` factoring.
//!
//! The parent schema is distributed over each alternative: parent merged
//! with branch, combinators nulled in the merged base, and every branch
//! parsed independently. Generation picks a branch uniformly. `oneOf`
//! additionally wraps the pick in an exclusivity constraint, since
//! factoring alone cannot guarantee that exactly one alternative matches.

use crate::constraint::{Constraint, OneOfConstraint};
use crate::error::ParseError;
use crate::generator::{CombinationGenerator, ConstrainedGenerator, GenIndex, Generator};
use crate::merge::merge_schema_nodes;
use crate::parser::ParseContext;
use crate::schema::SchemaNode;

pub(crate) fn parse_combination(
    ctx: &mut ParseContext,
    node: SchemaNode,
) -> Result<GenIndex, ParseError> {
    if node.one_of.is_some() && node.any_of.is_some() {
        return Err(ParseError::ConfigMergeError(
            "only one of [oneOf / anyOf] can be specified on a node".to_string(),
        ));
    }

    let (keyword, alternatives) = if let Some(one_of) = &node.one_of {
        ("oneOf", one_of.clone())
    } else if let Some(any_of) = &node.any_of {
        ("anyOf", any_of.clone())
    } else {
        return Err(ParseError::ConfigMergeError(
            "no items specified for oneOf / anyOf".to_string(),
        ));
    };

    if alternatives.is_empty() {
        return Err(ParseError::IllogicalSchema(format!(
            "{keyword} must include at least one schema"
        )));
    }

    let mut generators = Vec::with_capacity(alternatives.len());
    for (index, alternative) in alternatives.iter().enumerate() {
        let mut base = merge_schema_nodes(ctx, vec![node.clone()]);
        base.one_of = None;
        base.any_of = None;
        let merged = merge_schema_nodes(ctx, vec![base, alternative.clone()]);
        let scope = format!("/{keyword}/{index}");
        generators.push(ctx.parse_in_scope(&scope, merged));
    }

    let combination = ctx.alloc(Generator::Combination(CombinationGenerator { generators }));

    if keyword != "oneOf" {
        return Ok(combination);
    }

    // Exclusivity validators are compiled from the raw alternatives, not
    // the factored branches: a candidate must match exactly one clause as
    // the schema author wrote it.
    let mut validators = Vec::with_capacity(alternatives.len());
    for (index, alternative) in alternatives.iter().enumerate() {
        match ctx.validators.compile_node(alternative) {
            Ok(validator) => validators.push(validator),
            Err(err) => {
                ctx.record_error_at(&format!("/oneOf/{index}/config_compile_error"), err);
            }
        }
    }
    if validators.len() != alternatives.len() {
        // A missing validator would make the exclusive-match count lie.
        return Ok(combination);
    }

    Ok(ctx.alloc(Generator::Constrained(ConstrainedGenerator {
        inner: combination,
        constraints: vec![Constraint::OneOf(OneOfConstraint { validators })],
    })))
}

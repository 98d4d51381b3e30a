//! `if`/`then`/`else` compilation.
//!
//! Conditionals compile into a constrained generator: the inner generator
//! is the parent schema with the conditional keywords removed, and each
//! captured statement becomes an `IfConstraint` whose predicate is a
//! compiled validator on the `if` body. `then`/`else` generators are the
//! parent scope merged with the respective branch so regenerated values
//! still satisfy the surrounding schema.

use crate::constraint::{Constraint, IfConstraint, MultiIfConstraint};
use crate::error::ParseError;
use crate::generator::{ConstrainedGenerator, GenIndex, Generator};
use crate::merge::merge_schema_nodes;
use crate::parser::{parse_schema_node, ParseContext};
use crate::schema::SchemaNode;

/// An `if`/`then`/`else` triple captured from a node, either locally or
/// pulled up from an `allOf` branch by the merger.
#[derive(Clone, Debug)]
pub struct IfStatement {
    pub(crate) if_: Box<SchemaNode>,
    pub(crate) then_: Option<Box<SchemaNode>>,
    pub(crate) else_: Option<Box<SchemaNode>>,
    pub(crate) origin: String,
}

impl IfStatement {
    pub(crate) fn capture(node: &SchemaNode, origin: &str) -> Option<IfStatement> {
        node.if_.as_ref().map(|if_| IfStatement {
            if_: if_.clone(),
            then_: node.then_.clone(),
            else_: node.else_.clone(),
            origin: origin.to_string(),
        })
    }
}

pub(crate) fn parse_conditional(
    ctx: &mut ParseContext,
    node: SchemaNode,
) -> Result<GenIndex, ParseError> {
    let mut statements = node.merged_if.clone();
    if let Some(statement) = IfStatement::capture(&node, ctx.path.current()) {
        statements.push(statement);
    }

    // Conditional keywords are removed before parsing the inner generator
    // so the dispatch does not loop back here.
    let mut inner_node = node;
    inner_node.if_ = None;
    inner_node.then_ = None;
    inner_node.else_ = None;
    inner_node.merged_if = Vec::new();

    let inner = parse_schema_node(ctx, inner_node.clone())?;

    let mut constraints = Vec::new();
    for (index, statement) in statements.iter().enumerate() {
        match compile_statement(ctx, &inner_node, statement) {
            Ok(constraint) => constraints.push(constraint),
            Err(err) => {
                ctx.record_error_at(&format!("/if/{index}/config_compile_error"), err);
            }
        }
    }

    if constraints.is_empty() {
        ctx.record_error_at(
            "/if/config_compile_error",
            ParseError::IllogicalSchema("no valid if statements could be compiled".to_string()),
        );
        return Ok(inner);
    }

    Ok(ctx.alloc(Generator::Constrained(ConstrainedGenerator {
        inner,
        constraints: vec![Constraint::If(MultiIfConstraint { constraints })],
    })))
}

fn compile_statement(
    ctx: &mut ParseContext,
    parent_scope: &SchemaNode,
    statement: &IfStatement,
) -> Result<IfConstraint, ParseError> {
    if statement.then_.is_none() && statement.else_.is_none() {
        return Err(ParseError::IllogicalSchema(format!(
            "if statement at '{}' has neither then nor else",
            statement.origin
        )));
    }

    let predicate = ctx.validators.compile_node(&statement.if_)?;
    let then_ = parse_branch(ctx, "/then", parent_scope, statement.then_.as_deref());
    let else_ = parse_branch(ctx, "/else", parent_scope, statement.else_.as_deref());

    Ok(IfConstraint {
        predicate,
        then_,
        else_,
    })
}

/// Merges the parent scope with a branch body and parses the result, so a
/// regenerated branch value keeps every constraint of the enclosing node.
fn parse_branch(
    ctx: &mut ParseContext,
    scope: &str,
    parent_scope: &SchemaNode,
    body: Option<&SchemaNode>,
) -> Option<GenIndex> {
    let body = body?;
    let merged = merge_schema_nodes(ctx, vec![parent_scope.clone(), body.clone()]);
    Some(ctx.parse_in_scope(scope, merged))
}

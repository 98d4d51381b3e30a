//! Recursive descent from schema AST to generator tree.

use crate::combination::parse_combination;
use crate::conditional::parse_conditional;
use crate::constraint::Constraint;
use crate::document::DocumentResolver;
use crate::error::{ErrorCollection, ParseError};
use crate::generator::{
    parse_array, parse_number, parse_object, parse_string, ConstGenerator, ConstrainedGenerator,
    EnumGenerator, GenIndex, Generator, MultiTypeGenerator, ReferenceGenerator,
};
use crate::merge::merge_schema_nodes;
use crate::not::parse_not;
use crate::reference::{encode_pointer_segment, PathTracker, ReferenceRegistry, ReferenceResolver};
use crate::schema::{SchemaNode, SchemaType};
use crate::validator::SchemaValidatorManager;
use crate::ParserOptions;

/// Everything the parse pass threads through: the generator arena, the
/// reference registry keyed by running path, the document resolver, the
/// merge-time resolution stack, and the error collection.
pub(crate) struct ParseContext {
    pub(crate) arena: Vec<Generator>,
    pub(crate) registry: ReferenceRegistry,
    pub(crate) path: PathTracker,
    pub(crate) documents: DocumentResolver,
    pub(crate) errors: ErrorCollection,
    pub(crate) parser_options: ParserOptions,
    pub(crate) merge_resolver: ReferenceResolver,
    pub(crate) validators: SchemaValidatorManager,
}

impl ParseContext {
    pub(crate) fn alloc(&mut self, generator: Generator) -> GenIndex {
        self.arena.push(generator);
        self.arena.len() - 1
    }

    pub(crate) fn record_error(&mut self, error: ParseError) {
        let document = self.documents.current_document().to_string();
        self.errors.add(&document, self.path.current(), error);
    }

    pub(crate) fn record_error_at(&mut self, subpath: &str, error: ParseError) {
        let document = self.documents.current_document().to_string();
        let path = format!("{}{subpath}", self.path.current());
        self.errors.add(&document, &path, error);
    }

    /// Parses a node under `scope`, keeping the running path accurate so
    /// the node registers under its referenceable pointer.
    pub(crate) fn parse_in_scope(&mut self, scope: &str, node: SchemaNode) -> GenIndex {
        self.path.push(scope);
        let index = parse_node(self, node);
        self.path.pop(scope);
        index
    }
}

/// Parses the top-level node of a document, including `$defs` and
/// `definitions` so their paths become referenceable.
pub(crate) fn parse_root(ctx: &mut ParseContext, node: SchemaNode) -> GenIndex {
    if let Some(defs) = node.defs.clone() {
        for (key, value) in defs {
            let scope = format!("/$defs/{}", encode_pointer_segment(&key));
            ctx.parse_in_scope(&scope, value);
        }
    }
    if let Some(definitions) = node.definitions.clone() {
        for (key, value) in definitions {
            let scope = format!("/definitions/{}", encode_pointer_segment(&key));
            ctx.parse_in_scope(&scope, value);
        }
    }
    parse_node(ctx, node)
}

/// Parses one node. Never fails outward: errors are recorded at the
/// current path and the node degrades to the null fallback generator.
/// Every parsed node leaves exactly one registry entry behind.
pub(crate) fn parse_node(ctx: &mut ParseContext, node: SchemaNode) -> GenIndex {
    let id = node.id.clone();
    let index = match parse_schema_node(ctx, node) {
        Ok(index) => index,
        Err(err) => {
            ctx.record_error(err);
            ctx.alloc(Generator::Null)
        }
    };

    let document = ctx.documents.current_document().to_string();
    if let Some(id) = id {
        ctx.registry.add(&document, &id, index);
    }
    ctx.registry.add(&document, ctx.path.current(), index);
    index
}

/// Dispatch order mirrors keyword precedence: unsupported keywords are
/// rejected first, then references, combinators, negation, conditionals,
/// value keywords, and finally plain types (declared, inferred, or the
/// full union when nothing narrows it down).
pub(crate) fn parse_schema_node(
    ctx: &mut ParseContext,
    mut node: SchemaNode,
) -> Result<GenIndex, ParseError> {
    if node
        .dependent_required
        .as_ref()
        .is_some_and(|map| !map.is_empty())
    {
        return Err(ParseError::Unsupported(
            "'dependentRequired' is not supported".to_string(),
        ));
    }
    if node
        .dependent_schemas
        .as_ref()
        .is_some_and(|map| !map.is_empty())
    {
        return Err(ParseError::Unsupported(
            "'dependentSchemas' is not supported".to_string(),
        ));
    }

    // Constraints carried onto this node by the `not` reconciler wrap
    // whatever generator the rest of the dispatch produces.
    if !node.carried.is_empty() {
        let carried = std::mem::take(&mut node.carried);
        let inner = parse_schema_node(ctx, node)?;
        let compiled = match carried.compile() {
            Ok(compiled) => compiled,
            Err(err) => {
                ctx.record_error(err);
                return Ok(inner);
            }
        };
        return Ok(ctx.alloc(Generator::Constrained(ConstrainedGenerator {
            inner,
            constraints: vec![Constraint::Exclusion(compiled)],
        })));
    }

    if node.reference.is_some() {
        return parse_reference(ctx, node);
    }

    if node.all_of.is_some() {
        return parse_all_of(ctx, node);
    }

    if node.one_of.is_some() || node.any_of.is_some() {
        return parse_combination(ctx, node);
    }

    if node.not.is_some() || !node.merged_not.is_empty() {
        return parse_not(ctx, node);
    }

    if node.if_.is_some() || !node.merged_if.is_empty() {
        return parse_conditional(ctx, node);
    }

    if node.enum_.as_ref().is_some_and(|values| !values.is_empty()) {
        return parse_enum(ctx, node);
    }

    if node.const_.is_some() {
        return parse_const(ctx, node);
    }

    if let Some(types) = node.declared_types() {
        if types.len() > 1 {
            return parse_multiple_types(ctx, node, types);
        }
        if let Some(single) = types.first() {
            return parse_type(ctx, *single, &node);
        }
    }

    match infer_type(&node) {
        Some(inferred) => parse_type(ctx, inferred, &node),
        None => parse_multiple_types(ctx, node, SchemaType::ALL.to_vec()),
    }
}

fn parse_reference(ctx: &mut ParseContext, node: SchemaNode) -> Result<GenIndex, ParseError> {
    let reference = node.reference.clone().unwrap_or_default();
    if reference.contains("/allOf/") {
        return Err(ParseError::Unsupported(format!(
            "references into allOf are not supported: {reference}"
        )));
    }
    let (document, pointer) = ctx.documents.resolve_id_and_path(&reference)?;
    Ok(ctx.alloc(Generator::Reference(ReferenceGenerator { document, pointer })))
}

fn parse_all_of(ctx: &mut ParseContext, node: SchemaNode) -> Result<GenIndex, ParseError> {
    let mut base = node.clone();
    let elements = base.all_of.take().unwrap_or_default();
    let mut to_merge = vec![base];
    to_merge.extend(elements);
    let merged = merge_schema_nodes(ctx, to_merge);
    parse_schema_node(ctx, merged)
}

/// Prunes enum values through the sibling-constraint validator so a value
/// violating adjacent keywords can never be emitted. A single survivor
/// demotes to a constant; zero survivors reject the node.
fn parse_enum(ctx: &mut ParseContext, node: SchemaNode) -> Result<GenIndex, ParseError> {
    let values = node.enum_.clone().unwrap_or_default();
    let mut sibling = node.clone();
    sibling.enum_ = None;
    sibling.const_ = None;

    let survivors: Vec<serde_json::Value> = match ctx.validators.compile_node(&sibling) {
        Ok(validator) => values
            .iter()
            .filter(|value| validator.is_valid(value))
            .cloned()
            .collect(),
        Err(err) => {
            ctx.record_error_at("/enum", err);
            values.clone()
        }
    };

    match survivors.len() {
        0 => Err(ParseError::IllogicalSchema(
            "enum contains no values matching sibling constraints".to_string(),
        )),
        1 => Ok(ctx.alloc(Generator::Const(ConstGenerator {
            value: survivors.into_iter().next().expect("single survivor"),
        }))),
        _ => Ok(ctx.alloc(Generator::Enum(EnumGenerator { values: survivors }))),
    }
}

fn parse_const(ctx: &mut ParseContext, node: SchemaNode) -> Result<GenIndex, ParseError> {
    let value = node.const_.clone().expect("const present at dispatch");
    let mut sibling = node.clone();
    sibling.const_ = None;

    if let Ok(validator) = ctx.validators.compile_node(&sibling) {
        if !validator.is_valid(&value) {
            return Err(ParseError::IllogicalSchema(
                "const value violates sibling constraints".to_string(),
            ));
        }
    }
    Ok(ctx.alloc(Generator::Const(ConstGenerator { value })))
}

fn parse_multiple_types(
    ctx: &mut ParseContext,
    node: SchemaNode,
    types: Vec<SchemaType>,
) -> Result<GenIndex, ParseError> {
    let mut generators = Vec::with_capacity(types.len());
    for schema_type in types {
        let index = match parse_type(ctx, schema_type, &node) {
            Ok(index) => index,
            Err(err) => {
                ctx.record_error(err);
                ctx.alloc(Generator::Null)
            }
        };
        generators.push(index);
    }
    Ok(ctx.alloc(Generator::MultiType(MultiTypeGenerator { generators })))
}

fn parse_type(
    ctx: &mut ParseContext,
    schema_type: SchemaType,
    node: &SchemaNode,
) -> Result<GenIndex, ParseError> {
    let generator = match schema_type {
        SchemaType::Object => parse_object(ctx, node)?,
        SchemaType::Array => parse_array(ctx, node)?,
        SchemaType::Number => parse_number(node, false)?,
        SchemaType::Integer => parse_number(node, true)?,
        SchemaType::String => parse_string(ctx, node)?,
        SchemaType::Boolean => Generator::Boolean,
        SchemaType::Null => Generator::Null,
    };
    Ok(ctx.alloc(generator))
}

/// Infers a node's type from the keywords it carries, in the order the
/// keyword families are most distinctive: object, string, number, array.
pub(crate) fn infer_type(node: &SchemaNode) -> Option<SchemaType> {
    let has_object_keywords = node.properties.is_some()
        || node.pattern_properties.is_some()
        || node.min_properties.is_some()
        || node.max_properties.is_some()
        || node.required.is_some()
        || node
            .additional_properties
            .as_ref()
            .is_some_and(|extra| extra.schema().is_some());
    if has_object_keywords {
        return Some(SchemaType::Object);
    }

    let has_string_keywords = node.pattern.is_some()
        || node.format.is_some()
        || node.min_length.is_some()
        || node.max_length.is_some();
    if has_string_keywords {
        return Some(SchemaType::String);
    }

    let has_number_keywords = node.minimum.is_some()
        || node.maximum.is_some()
        || node.exclusive_minimum.is_some()
        || node.exclusive_maximum.is_some()
        || node.multiple_of.is_some();
    if has_number_keywords {
        return Some(SchemaType::Number);
    }

    let has_array_keywords = node.items.is_some()
        || node.min_items.is_some()
        || node.max_items.is_some()
        || node.contains.is_some()
        || node.min_contains.is_some()
        || node.max_contains.is_some()
        || node.prefix_items.is_some()
        || node.additional_items.is_some()
        || node.unevaluated_items.is_some();
    if has_array_keywords {
        return Some(SchemaType::Array);
    }

    None
}

/// Bare context over an empty root document, for unit tests of the
/// algebraic pieces.
#[cfg(test)]
pub(crate) fn test_context() -> ParseContext {
    use crate::DocumentFetchOptions;

    ParseContext {
        arena: Vec::new(),
        registry: ReferenceRegistry::default(),
        path: PathTracker::new(),
        documents: DocumentResolver::new(
            &DocumentFetchOptions::default(),
            Some("file://./"),
            SchemaNode::default(),
        )
        .expect("document resolver"),
        errors: ErrorCollection::default(),
        parser_options: ParserOptions::default(),
        merge_resolver: ReferenceResolver::default(),
        validators: SchemaValidatorManager::new(serde_json::json!({})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: serde_json::Value) -> SchemaNode {
        serde_json::from_value(value).expect("schema node")
    }

    #[test]
    fn infers_types_from_keyword_families() {
        assert_eq!(
            infer_type(&node(json!({"properties": {}}))),
            Some(SchemaType::Object)
        );
        assert_eq!(
            infer_type(&node(json!({"pattern": "a"}))),
            Some(SchemaType::String)
        );
        assert_eq!(
            infer_type(&node(json!({"minimum": 1}))),
            Some(SchemaType::Number)
        );
        assert_eq!(
            infer_type(&node(json!({"minItems": 1}))),
            Some(SchemaType::Array)
        );
        assert_eq!(infer_type(&node(json!({}))), None);
    }
}

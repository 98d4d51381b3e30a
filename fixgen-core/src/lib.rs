//! fixgen-core: compile a JSON Schema into a tree of composable random
//! generators, then execute that tree under complexity budgets to produce
//! instances that validate against the whole composition.
//!
//! ```
//! use fixgen_core::{parse_schema_str, GeneratorOptions, ParserOptions};
//!
//! let root = parse_schema_str(
//!     r#"{"type": "object", "properties": {"id": {"type": "integer", "minimum": 1}},
//!         "required": ["id"]}"#,
//!     &ParserOptions::default(),
//! )
//! .expect("schema compiles");
//! let value = root.generate(&GeneratorOptions::default().with_seed(7));
//! assert!(value["id"].as_i64().expect("id is generated") >= 1);
//! ```

use serde_json::Value as JsonValue;

mod combination;
mod conditional;
mod constraint;
mod document;
mod error;
mod formats;
mod generator;
mod merge;
mod not;
mod parser;
mod random;
mod reference;
mod regex_gen;
mod schema;
mod validator;

pub use document::{DocumentFetchOptions, FileSystemFetchOptions, HttpFetchOptions};
pub use error::{ErrorCollection, ParseError};
pub use regex_gen::RegexGeneratorOptions;

use document::{DocumentResolver, ROOT_DOCUMENT_ID};
use generator::{GenIndex, GenState, Generator};
use parser::{parse_root, ParseContext};
use random::RandomSource;
use reference::{PathTracker, ReferenceRegistry, ReferenceResolver};
use schema::SchemaNode;
use validator::SchemaValidatorManager;

/// Options applied while compiling a schema.
#[derive(Clone, Debug, Default)]
pub struct ParserOptions {
    /// Regex synthesizer options for `pattern` strings.
    pub regex_string_options: RegexGeneratorOptions,
    /// Regex synthesizer options for pattern-property keys.
    pub regex_pattern_property_options: RegexGeneratorOptions,
    /// Transports for external `$ref` documents.
    pub document_fetch: DocumentFetchOptions,
    /// Base URI for unqualified external references. Defaults to a
    /// `file://` URI of the working directory.
    pub relative_to: Option<String>,
}

impl ParserOptions {
    pub fn with_regex_string_options(mut self, options: RegexGeneratorOptions) -> Self {
        self.regex_string_options = options;
        self
    }

    pub fn with_regex_pattern_property_options(mut self, options: RegexGeneratorOptions) -> Self {
        self.regex_pattern_property_options = options;
        self
    }

    pub fn with_document_fetch(mut self, options: DocumentFetchOptions) -> Self {
        self.document_fetch = options;
        self
    }

    pub fn with_relative_to(mut self, relative_to: impl Into<String>) -> Self {
        self.relative_to = Some(relative_to.into());
        self
    }
}

/// Runtime knobs for one generation run.
#[derive(Clone, Debug)]
pub struct GeneratorOptions {
    /// PRNG seed. `None` seeds from entropy; fixing it makes output
    /// reproducible bit for bit.
    pub seed: Option<u64>,

    /// Default range for numbers with no declared bounds.
    pub default_number_minimum: f64,
    pub default_number_maximum: f64,
    /// Default length bounds for plain strings.
    pub default_string_min_length: usize,
    pub default_string_max_length: usize,
    /// Default item counts for arrays with no declared bounds.
    pub default_array_min_items: usize,
    pub default_array_max_items: usize,
    /// Default property counts for objects with no declared bounds.
    pub default_object_min_properties: usize,
    pub default_object_max_properties: usize,

    /// Maximum reference frames in flight before recursion is cut.
    pub maximum_reference_depth: usize,
    /// Disables the cyclic-reference check, leaving only the depth cap.
    pub bypass_cyclic_reference_check: bool,
    /// Suppresses `fallback_n` values except where needed to reach a
    /// minimum property count.
    pub suppress_fallback_values: bool,

    /// Retry budget for unique-item generation and exclusion constraints.
    pub maximum_unique_generator_attempts: u32,
    /// Retry budget for satisfying `if` statements.
    pub maximum_if_attempts: u32,
    /// Retry budget for exclusive `oneOf` matches.
    pub maximum_one_of_attempts: u32,

    /// Soft step budget; beyond it generators emit minimal structure.
    pub maximum_generation_steps: u64,
    /// Hard step budget; beyond it containers return partial output.
    pub cutoff_generation_steps: u64,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            seed: None,
            default_number_minimum: 0.0,
            default_number_maximum: 100.0,
            default_string_min_length: 0,
            default_string_max_length: 100,
            default_array_min_items: 0,
            default_array_max_items: 10,
            default_object_min_properties: 0,
            default_object_max_properties: 10,
            maximum_reference_depth: 10,
            bypass_cyclic_reference_check: false,
            suppress_fallback_values: true,
            maximum_unique_generator_attempts: 100,
            maximum_if_attempts: 100,
            maximum_one_of_attempts: 100,
            maximum_generation_steps: 100,
            cutoff_generation_steps: 2000,
        }
    }
}

impl GeneratorOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_maximum_reference_depth(mut self, depth: usize) -> Self {
        self.maximum_reference_depth = depth;
        self
    }

    pub fn with_bypass_cyclic_reference_check(mut self, bypass: bool) -> Self {
        self.bypass_cyclic_reference_check = bypass;
        self
    }

    pub fn with_suppress_fallback_values(mut self, suppress: bool) -> Self {
        self.suppress_fallback_values = suppress;
        self
    }

    pub fn with_maximum_if_attempts(mut self, attempts: u32) -> Self {
        self.maximum_if_attempts = attempts;
        self
    }

    pub fn with_maximum_one_of_attempts(mut self, attempts: u32) -> Self {
        self.maximum_one_of_attempts = attempts;
        self
    }

    pub fn with_maximum_unique_generator_attempts(mut self, attempts: u32) -> Self {
        self.maximum_unique_generator_attempts = attempts;
        self
    }

    pub fn with_maximum_generation_steps(mut self, steps: u64) -> Self {
        self.maximum_generation_steps = steps;
        self
    }

    pub fn with_cutoff_generation_steps(mut self, steps: u64) -> Self {
        self.cutoff_generation_steps = steps;
        self
    }
}

/// Warnings and errors accumulated while compiling, addressable by
/// document id and schema path.
#[derive(Clone, Debug, Default)]
pub struct Metadata {
    pub errors: ErrorCollection,
}

/// A compiled schema: the generator arena, its reference registry, and
/// the compile metadata. Generation needs no further parsing.
pub struct Root {
    pub(crate) arena: Vec<Generator>,
    pub(crate) root: GenIndex,
    pub(crate) registry: ReferenceRegistry,
    pub metadata: Metadata,
}

impl Root {
    /// Generates one JSON value. Deterministic for a fixed seed.
    pub fn generate(&self, options: &GeneratorOptions) -> JsonValue {
        let rng = match options.seed {
            Some(seed) => RandomSource::from_seed(seed),
            None => RandomSource::from_entropy(),
        };
        let mut state = GenState {
            rng,
            complexity: 0,
            resolver: ReferenceResolver::default(),
        };
        generator::generate(self, self.root, options, &mut state)
    }

    pub fn generate_with_defaults(&self) -> JsonValue {
        self.generate(&GeneratorOptions::default())
    }
}

/// Compiles a JSON Schema document. Only an undecodable document fails;
/// every other problem is recorded in `Root::metadata` and the offending
/// node degrades to a null generator.
pub fn parse_schema(bytes: &[u8], options: &ParserOptions) -> Result<Root, ParseError> {
    let node: SchemaNode = serde_json::from_slice(bytes)
        .map_err(|err| ParseError::Decode(err.to_string()))?;
    let raw: JsonValue = serde_json::from_slice(bytes)
        .map_err(|err| ParseError::Decode(err.to_string()))?;

    let documents = DocumentResolver::new(
        &options.document_fetch,
        options.relative_to.as_deref(),
        node.clone(),
    )?;

    let mut ctx = ParseContext {
        arena: Vec::new(),
        registry: ReferenceRegistry::default(),
        path: PathTracker::new(),
        documents,
        errors: ErrorCollection::default(),
        parser_options: options.clone(),
        merge_resolver: ReferenceResolver::default(),
        validators: SchemaValidatorManager::new(raw),
    };

    let root_index = parse_root(&mut ctx, node);

    // External documents discovered through `$ref`s parse lazily, each
    // under its own document id so registry entries land where reference
    // lookups expect them.
    while ctx.documents.has_more_pending() {
        match ctx.documents.next_pending() {
            Some(Ok((document, document_node))) => {
                ctx.documents.set_current_document(&document);
                ctx.path.reset();
                parse_root(&mut ctx, document_node);
            }
            Some(Err(err)) => ctx.record_error(err),
            None => break,
        }
    }
    ctx.documents.set_current_document(ROOT_DOCUMENT_ID);
    ctx.path.reset();

    Ok(Root {
        arena: ctx.arena,
        root: root_index,
        registry: ctx.registry,
        metadata: Metadata { errors: ctx.errors },
    })
}

/// Convenience wrapper over [`parse_schema`] for string input.
pub fn parse_schema_str(schema: &str, options: &ParserOptions) -> Result<Root, ParseError> {
    parse_schema(schema.as_bytes(), options)
}

/// Convenience wrapper over [`parse_schema`] reading a schema file.
pub fn parse_schema_file(
    path: impl AsRef<std::path::Path>,
    options: &ParserOptions,
) -> Result<Root, ParseError> {
    let data = std::fs::read(path.as_ref())
        .map_err(|err| ParseError::DocumentLoadFailed(err.to_string()))?;
    parse_schema(&data, options)
}

pub fn parse_schema_with_defaults(bytes: &[u8]) -> Result<Root, ParseError> {
    parse_schema(bytes, &ParserOptions::default())
}

pub fn parse_schema_str_with_defaults(schema: &str) -> Result<Root, ParseError> {
    parse_schema_str(schema, &ParserOptions::default())
}

pub fn parse_schema_file_with_defaults(
    path: impl AsRef<std::path::Path>,
) -> Result<Root, ParseError> {
    parse_schema_file(path, &ParserOptions::default())
}

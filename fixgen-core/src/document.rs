//! Multi-document handling: the document map, scheme-keyed fetchers, and
//! absolute `$ref` rewriting.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

use crate::error::ParseError;
use crate::reference::resolve_pointer;
use crate::schema::{ItemsField, SchemaNode, SchemaOrBool};

/// Synthetic id assigned to the root document when it declares no `$id`.
pub(crate) const ROOT_DOCUMENT_ID: &str = "urn:fixgen:root";

/// Options for fetching `$ref` documents over HTTP(S).
#[derive(Clone, Debug, Default)]
pub struct HttpFetchOptions {
    /// Enables the `http`/`https` schemes.
    pub enabled: bool,
    /// Hostnames that may be fetched from. Empty allows all hosts.
    pub allowed_hosts: Vec<String>,
    /// Allows plain-http URLs. When false only `https` is accepted.
    pub allow_insecure: bool,
}

impl HttpFetchOptions {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_allowed_hosts(mut self, allowed_hosts: Vec<String>) -> Self {
        self.allowed_hosts = allowed_hosts;
        self
    }

    pub fn with_allow_insecure(mut self, allow_insecure: bool) -> Self {
        self.allow_insecure = allow_insecure;
        self
    }
}

/// Options for fetching `$ref` documents from the filesystem.
#[derive(Clone, Debug, Default)]
pub struct FileSystemFetchOptions {
    /// Enables the `file` scheme.
    pub enabled: bool,
    /// Paths outside the working directory that may still be read.
    pub allowed_paths: Vec<String>,
    /// Allows reads outside the current working directory.
    pub allow_outside_cwd: bool,
}

impl FileSystemFetchOptions {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_allowed_paths(mut self, allowed_paths: Vec<String>) -> Self {
        self.allowed_paths = allowed_paths;
        self
    }

    pub fn with_allow_outside_cwd(mut self, allow_outside_cwd: bool) -> Self {
        self.allow_outside_cwd = allow_outside_cwd;
        self
    }
}

/// Transport options for resolving external `$ref` documents.
#[derive(Clone, Debug, Default)]
pub struct DocumentFetchOptions {
    pub http: HttpFetchOptions,
    pub file_system: FileSystemFetchOptions,
}

impl DocumentFetchOptions {
    pub fn with_http(mut self, http: HttpFetchOptions) -> Self {
        self.http = http;
        self
    }

    pub fn with_file_system(mut self, file_system: FileSystemFetchOptions) -> Self {
        self.file_system = file_system;
        self
    }
}

/// Synchronous transport for one URI scheme.
pub(crate) trait DocumentFetcher {
    /// Resolves a possibly-relative reference into an absolute document id.
    fn resolve_document_id(&self, relative_to: &str, reference: &str)
        -> Result<String, ParseError>;

    /// Fetches and decodes the document behind an absolute id.
    fn fetch(&self, document_id: &str) -> Result<SchemaNode, ParseError>;
}

struct HttpDocumentFetcher {
    allowed_hosts: Vec<String>,
    allow_insecure: bool,
}

impl DocumentFetcher for HttpDocumentFetcher {
    fn resolve_document_id(
        &self,
        relative_to: &str,
        reference: &str,
    ) -> Result<String, ParseError> {
        let resolved = match url::Url::parse(reference) {
            Ok(absolute) => absolute,
            Err(_) => {
                let base = url::Url::parse(relative_to).map_err(|err| {
                    ParseError::DocumentLoadFailed(format!(
                        "invalid base URL '{relative_to}': {err}"
                    ))
                })?;
                base.join(reference).map_err(|err| {
                    ParseError::DocumentLoadFailed(format!("invalid URL '{reference}': {err}"))
                })?
            }
        };

        if !self.allow_insecure && resolved.scheme() != "https" {
            return Err(ParseError::DocumentLoadFailed(format!(
                "insecure URL scheme '{}' not allowed for '{reference}'",
                resolved.scheme()
            )));
        }

        if !self.allowed_hosts.is_empty() {
            let host = resolved.host_str().unwrap_or_default();
            if !self.allowed_hosts.iter().any(|allowed| allowed == host) {
                return Err(ParseError::DocumentLoadFailed(format!(
                    "host '{host}' is not in the allowed host list"
                )));
            }
        }

        Ok(resolved.to_string())
    }

    fn fetch(&self, document_id: &str) -> Result<SchemaNode, ParseError> {
        let response = reqwest::blocking::get(document_id).map_err(|err| {
            ParseError::DocumentLoadFailed(format!("failed to fetch '{document_id}': {err}"))
        })?;
        if !response.status().is_success() {
            return Err(ParseError::DocumentLoadFailed(format!(
                "failed to fetch '{document_id}': status {}",
                response.status()
            )));
        }
        let body = response.text().map_err(|err| {
            ParseError::DocumentLoadFailed(format!("failed to read '{document_id}': {err}"))
        })?;
        serde_json::from_str(&body).map_err(|err| {
            ParseError::DocumentLoadFailed(format!(
                "failed to decode schema from '{document_id}': {err}"
            ))
        })
    }
}

struct FileSystemDocumentFetcher {
    allowed_paths: Vec<PathBuf>,
    allow_outside_cwd: bool,
}

impl FileSystemDocumentFetcher {
    fn new(options: &FileSystemFetchOptions) -> Result<Self, ParseError> {
        let mut allowed_paths = Vec::with_capacity(options.allowed_paths.len());
        for path in &options.allowed_paths {
            let canonical = std::fs::canonicalize(path).map_err(|err| {
                ParseError::DocumentLoadFailed(format!(
                    "failed to resolve allowed path '{path}': {err}"
                ))
            })?;
            allowed_paths.push(canonical);
        }
        Ok(Self {
            allowed_paths,
            allow_outside_cwd: options.allow_outside_cwd,
        })
    }
}

impl DocumentFetcher for FileSystemDocumentFetcher {
    fn resolve_document_id(
        &self,
        relative_to: &str,
        reference: &str,
    ) -> Result<String, ParseError> {
        let raw = reference.strip_prefix("file://").unwrap_or(reference);
        let mut path = PathBuf::from(raw);
        if path.is_relative() {
            let base = relative_to.strip_prefix("file://").unwrap_or(relative_to);
            // A trailing slash marks the base as a directory itself.
            let base_dir = if base.ends_with('/') {
                PathBuf::from(base)
            } else {
                std::path::Path::new(base)
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_default()
            };
            path = base_dir.join(path);
        }

        let canonical = std::fs::canonicalize(&path).map_err(|err| {
            ParseError::DocumentLoadFailed(format!(
                "failed to resolve path '{}': {err}",
                path.display()
            ))
        })?;

        let allowed_by_list = self
            .allowed_paths
            .iter()
            .any(|allowed| canonical.starts_with(allowed));
        if !allowed_by_list && !self.allow_outside_cwd {
            let cwd = std::env::current_dir().map_err(|err| {
                ParseError::DocumentLoadFailed(format!("failed to read working directory: {err}"))
            })?;
            if !canonical.starts_with(&cwd) {
                return Err(ParseError::DocumentLoadFailed(format!(
                    "access to '{}' outside the working directory is not allowed",
                    canonical.display()
                )));
            }
        }

        Ok(format!("file://{}", canonical.display()))
    }

    fn fetch(&self, document_id: &str) -> Result<SchemaNode, ParseError> {
        let path = document_id.strip_prefix("file://").unwrap_or(document_id);
        let data = std::fs::read_to_string(path).map_err(|err| {
            ParseError::DocumentLoadFailed(format!("failed to read '{path}': {err}"))
        })?;
        serde_json::from_str(&data).map_err(|err| {
            ParseError::DocumentLoadFailed(format!("failed to decode schema from '{path}': {err}"))
        })
    }
}

/// Splits a `$ref` into its document part and fragment part.
/// The fragment keeps its leading `#` and defaults to `#`.
pub(crate) fn split_reference(reference: &str) -> (String, String) {
    match reference.split_once('#') {
        Some((document, fragment)) => (document.to_string(), format!("#{fragment}")),
        None => (reference.to_string(), "#".to_string()),
    }
}

/// Holds every loaded document and lazily fetches the ones discovered
/// through cross-document references.
pub(crate) struct DocumentResolver {
    documents: BTreeMap<String, SchemaNode>,
    pending: VecDeque<String>,
    parsed: BTreeMap<String, bool>,
    current_document: String,
    resolving_document: Option<String>,
    fetchers: BTreeMap<&'static str, Box<dyn DocumentFetcher>>,
    relative_to: String,
}

impl DocumentResolver {
    pub(crate) fn new(
        options: &DocumentFetchOptions,
        relative_to: Option<&str>,
        root: SchemaNode,
    ) -> Result<Self, ParseError> {
        let mut fetchers: BTreeMap<&'static str, Box<dyn DocumentFetcher>> = BTreeMap::new();
        if options.http.enabled {
            let fetcher = HttpDocumentFetcher {
                allowed_hosts: options.http.allowed_hosts.clone(),
                allow_insecure: options.http.allow_insecure,
            };
            fetchers.insert("http", Box::new(fetcher));
            let fetcher = HttpDocumentFetcher {
                allowed_hosts: options.http.allowed_hosts.clone(),
                allow_insecure: options.http.allow_insecure,
            };
            fetchers.insert("https", Box::new(fetcher));
        }
        if options.file_system.enabled {
            fetchers.insert(
                "file",
                Box::new(FileSystemDocumentFetcher::new(&options.file_system)?),
            );
        }

        let relative_to = match relative_to {
            Some(base) => base.to_string(),
            None => match std::env::current_dir() {
                Ok(cwd) => format!("file://{}/", cwd.display()),
                Err(_) => "file://./".to_string(),
            },
        };

        let mut documents = BTreeMap::new();
        documents.insert(ROOT_DOCUMENT_ID.to_string(), root);
        let mut parsed = BTreeMap::new();
        parsed.insert(ROOT_DOCUMENT_ID.to_string(), true);

        Ok(Self {
            documents,
            pending: VecDeque::new(),
            parsed,
            current_document: ROOT_DOCUMENT_ID.to_string(),
            resolving_document: None,
            fetchers,
            relative_to,
        })
    }

    pub(crate) fn current_document(&self) -> &str {
        &self.current_document
    }

    pub(crate) fn set_current_document(&mut self, document: &str) {
        self.current_document = document.to_string();
    }

    pub(crate) fn set_resolving_document(&mut self, document: Option<String>) {
        self.resolving_document = document;
    }

    fn scope_document(&self) -> String {
        self.resolving_document
            .clone()
            .unwrap_or_else(|| self.current_document.clone())
    }

    /// Splits a reference and resolves its document part into an absolute
    /// document id, queueing unseen external documents for a later parse.
    pub(crate) fn resolve_id_and_path(
        &mut self,
        reference: &str,
    ) -> Result<(String, String), ParseError> {
        let (document, fragment) = split_reference(reference);
        if document.is_empty() {
            return Ok((self.scope_document(), fragment));
        }

        let fetcher = self.fetcher_for(&document)?;
        let base = if self.current_document == ROOT_DOCUMENT_ID {
            self.relative_to.clone()
        } else {
            self.current_document.clone()
        };
        let resolved = fetcher.resolve_document_id(&base, &document)?;

        if !self.parsed.get(&resolved).copied().unwrap_or(false)
            && !self.pending.contains(&resolved)
        {
            self.pending.push_back(resolved.clone());
        }

        Ok((resolved, fragment))
    }

    /// Resolves a reference all the way to the schema node it points at.
    pub(crate) fn resolve_path(
        &mut self,
        reference: &str,
    ) -> Result<(SchemaNode, String, String), ParseError> {
        let (document, fragment) = self.resolve_id_and_path(reference)?;
        self.ensure_document(&document)?;
        let node = self
            .documents
            .get(&document)
            .ok_or_else(|| ParseError::RefNotFound(format!("document '{document}' not loaded")))?;
        let target = resolve_pointer(node, &fragment)?.clone();
        Ok((target, document, fragment))
    }

    fn ensure_document(&mut self, document: &str) -> Result<(), ParseError> {
        if self.documents.contains_key(document) {
            return Ok(());
        }
        let fetcher = self.fetcher_for(document)?;
        let node = fetcher.fetch(document)?;
        self.documents.insert(document.to_string(), node);
        self.parsed.entry(document.to_string()).or_insert(false);
        Ok(())
    }

    fn fetcher_for(&self, document: &str) -> Result<&dyn DocumentFetcher, ParseError> {
        let scheme = match document.split_once("://") {
            Some((scheme, _)) => scheme.to_string(),
            None => {
                // Scheme-less references inherit the scheme of the base URI.
                let base = if self.current_document == ROOT_DOCUMENT_ID {
                    self.relative_to.clone()
                } else {
                    self.current_document.clone()
                };
                match base.split_once("://") {
                    Some((scheme, _)) => scheme.to_string(),
                    None => {
                        return Err(ParseError::DocumentLoadFailed(format!(
                            "reference '{document}' has no scheme and no resolvable base"
                        )))
                    }
                }
            }
        };

        self.fetchers
            .get(scheme.as_str())
            .map(Box::as_ref)
            .ok_or_else(|| {
                ParseError::DocumentLoadFailed(format!(
                    "no document fetcher enabled for scheme '{scheme}://'"
                ))
            })
    }

    pub(crate) fn has_more_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Pops the next deferred document, fetching it if necessary.
    pub(crate) fn next_pending(&mut self) -> Option<Result<(String, SchemaNode), ParseError>> {
        let document = self.pending.pop_front()?;
        if let Err(err) = self.ensure_document(&document) {
            return Some(Err(err));
        }
        self.parsed.insert(document.clone(), true);
        let node = self.documents.get(&document).cloned();
        node.map(|node| Ok((document, node)))
    }

    /// Rewrites every fragment-local `$ref` inside a subtree to the absolute
    /// `"docId#pointer"` form so the refs stay valid after the subtree is
    /// inlined into a different scope.
    pub(crate) fn rewrite_refs(&self, node: &SchemaNode, base_document: &str) -> SchemaNode {
        let mut rewritten = node.clone();
        rewrite_refs_in(&mut rewritten, base_document);
        rewritten
    }
}

fn rewrite_refs_in(node: &mut SchemaNode, base: &str) {
    if let Some(reference) = node.reference.take() {
        if let Some(stripped) = reference.strip_prefix('#') {
            node.reference = Some(format!("{base}#{stripped}"));
        } else {
            node.reference = Some(reference);
        }
    }

    let rewrite_map = |map: &mut Option<BTreeMap<String, SchemaNode>>| {
        if let Some(map) = map {
            for child in map.values_mut() {
                rewrite_refs_in(child, base);
            }
        }
    };
    rewrite_map(&mut node.properties);
    rewrite_map(&mut node.pattern_properties);
    rewrite_map(&mut node.defs);
    rewrite_map(&mut node.definitions);
    rewrite_map(&mut node.dependent_schemas);

    let rewrite_list = |list: &mut Option<Vec<SchemaNode>>| {
        if let Some(list) = list {
            for child in list.iter_mut() {
                rewrite_refs_in(child, base);
            }
        }
    };
    rewrite_list(&mut node.prefix_items);
    rewrite_list(&mut node.all_of);
    rewrite_list(&mut node.any_of);
    rewrite_list(&mut node.one_of);

    let rewrite_boxed = |child: &mut Option<Box<SchemaNode>>| {
        if let Some(child) = child {
            rewrite_refs_in(child, base);
        }
    };
    rewrite_boxed(&mut node.contains);
    rewrite_boxed(&mut node.not);
    rewrite_boxed(&mut node.if_);
    rewrite_boxed(&mut node.then_);
    rewrite_boxed(&mut node.else_);

    let rewrite_schema_or_bool = |child: &mut Option<SchemaOrBool>| {
        if let Some(SchemaOrBool::Schema(schema)) = child {
            rewrite_refs_in(schema, base);
        }
    };
    rewrite_schema_or_bool(&mut node.additional_properties);
    rewrite_schema_or_bool(&mut node.additional_items);
    rewrite_schema_or_bool(&mut node.unevaluated_items);

    match &mut node.items {
        Some(ItemsField::Schema(schema)) => rewrite_refs_in(schema, base),
        Some(ItemsField::Tuple(nodes)) => {
            for child in nodes.iter_mut() {
                rewrite_refs_in(child, base);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_reference_separates_document_and_fragment() {
        assert_eq!(
            split_reference("#/$defs/a"),
            (String::new(), "#/$defs/a".to_string())
        );
        assert_eq!(
            split_reference("file://b.json#/x"),
            ("file://b.json".to_string(), "#/x".to_string())
        );
        assert_eq!(
            split_reference("file://b.json"),
            ("file://b.json".to_string(), "#".to_string())
        );
    }

    #[test]
    fn rewrite_refs_absolutizes_local_refs_only() {
        let node: SchemaNode = serde_json::from_value(json!({
            "properties": {
                "a": {"$ref": "#/$defs/x"},
                "b": {"$ref": "file://other.json#/y"}
            }
        }))
        .expect("node");
        let resolver = DocumentResolver::new(
            &DocumentFetchOptions::default(),
            Some("file://./"),
            SchemaNode::default(),
        )
        .expect("resolver");

        let rewritten = resolver.rewrite_refs(&node, "file://doc.json");
        let properties = rewritten.properties.expect("properties");
        assert_eq!(
            properties["a"].reference.as_deref(),
            Some("file://doc.json#/$defs/x")
        );
        assert_eq!(
            properties["b"].reference.as_deref(),
            Some("file://other.json#/y")
        );
    }
}

//! Contract document resolution
//!
//! `resolve` loads a Swagger 2 or OpenAPI 3 document, checks its structure,
//! resolves every reference (internal, external, cyclic) into a schema arena
//! and indexes named schemas and GET operations. Resolution is all or
//! nothing: any failure aborts without exposing a partial document.

mod arena;
mod dialect;
mod loader;
mod resolve;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use apiconform_core::Violation;
use apiconform_core::envelope::is_placeholder;

use crate::validate::EnvelopeValidator;

pub use arena::{JsonType, NodeId, SchemaArena, SchemaNode};
pub use dialect::{Dialect, OpenApi3Schema, SchemaBackend, Swagger2Schema};
pub use resolve::Operation;

use loader::DocumentStore;
use resolve::Resolver;

/// A fully resolved contract, immutable after construction.
#[derive(Debug, Clone)]
pub struct ContractDocument {
    path: PathBuf,
    backend: SchemaBackend,
    arena: SchemaArena,
    resources: BTreeMap<String, NodeId>,
    operations: Vec<Operation>,
}

/// Resolve a contract document from disk.
///
/// # Errors
///
/// Returns `ContractError` if the file cannot be read or parsed, the dialect
/// is unknown, the document is structurally malformed, or any reference
/// cannot be resolved.
pub fn resolve(path: &Path) -> Result<ContractDocument, ContractError> {
    let mut store = DocumentStore::default();
    let (root, doc) = store.load(path)?;
    let source = path.display().to_string();

    let backend = SchemaBackend::detect(&doc, &source)?;
    backend.check_structure(&doc)?;
    debug!(dialect = %backend.dialect(), path = %root.display(), "contract structure ok");

    let mut resolver = Resolver::new(backend, store);
    resolver.check_refs(&root)?;
    let resources = resolver.resolve_named(&root)?;
    let operations = resolver.resolve_operations(&root)?;

    info!(
        dialect = %backend.dialect(),
        resources = resources.len(),
        operations = operations.len(),
        nodes = resolver.arena.len(),
        "contract resolved"
    );

    Ok(ContractDocument {
        path: path.to_path_buf(),
        backend,
        arena: resolver.arena,
        resources,
        operations,
    })
}

impl ContractDocument {
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn arena(&self) -> &SchemaArena {
        &self.arena
    }

    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Named resource schema.
    ///
    /// # Errors
    ///
    /// Returns `ContractError::UnknownResource` if the contract has no such schema.
    pub fn resource(&self, name: &str) -> Result<ResourceSchema<'_>, ContractError> {
        let (name, id) = self
            .resources
            .get_key_value(name)
            .ok_or_else(|| ContractError::UnknownResource(name.to_string()))?;
        Ok(ResourceSchema {
            name,
            id: *id,
            arena: &self.arena,
            backend: &self.backend,
        })
    }

    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// GET operation whose path template matches `endpoint` segment-wise.
    ///
    /// `{...}` segments on either side match any segment.
    #[must_use]
    pub fn operation(&self, endpoint: &str) -> Option<&Operation> {
        let wanted: Vec<&str> = endpoint.split('/').filter(|s| !s.is_empty()).collect();
        self.operations.iter().find(|op| {
            let declared: Vec<&str> = op.path.split('/').filter(|s| !s.is_empty()).collect();
            declared.len() == wanted.len()
                && declared
                    .iter()
                    .zip(&wanted)
                    .all(|(d, w)| d == w || is_placeholder(d) || is_placeholder(w))
        })
    }

    /// Validate a response body (resource envelope) against a named resource.
    ///
    /// `body` is `None` when the response was empty or not JSON.
    ///
    /// # Errors
    ///
    /// Returns `ContractError::UnknownResource` if the resource is not
    /// declared, or `Malformed` if its schema does not compile.
    pub fn validate(
        &self,
        body: Option<&Value>,
        resource: &str,
        nullable: &BTreeSet<String>,
    ) -> Result<Vec<Violation>, ContractError> {
        self.resource(resource)?.validate(body, nullable)
    }
}

/// Read-only view of one named resource schema.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSchema<'a> {
    name: &'a str,
    id: NodeId,
    arena: &'a SchemaArena,
    backend: &'a SchemaBackend,
}

/// One declared field of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    /// Empty when any type is accepted
    pub types: Vec<JsonType>,
    pub required: bool,
    pub nullable: bool,
}

impl<'a> ResourceSchema<'a> {
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn node(&self) -> &'a SchemaNode {
        self.arena.get(self.id)
    }

    /// Required field names, including those of `allOf` branches.
    #[must_use]
    pub fn required(&self) -> BTreeSet<String> {
        self.arena.flattened_required(self.id)
    }

    /// Declared top-level fields, including those of `allOf` branches.
    #[must_use]
    pub fn fields(&self) -> Vec<FieldInfo> {
        let required = self.required();
        self.arena
            .flattened_properties(self.id)
            .into_iter()
            .map(|(name, child)| {
                let node = self.arena.get(child);
                FieldInfo {
                    required: required.contains(&name),
                    types: node.types.clone(),
                    nullable: node.nullable,
                    name,
                }
            })
            .collect()
    }

    /// Compile this resource for validation, exempting `nullable` names.
    ///
    /// # Errors
    ///
    /// Returns `ContractError::Malformed` if the schema does not compile
    /// (e.g. an invalid `pattern`).
    pub fn compile(&self, nullable: &BTreeSet<String>) -> Result<EnvelopeValidator, ContractError> {
        EnvelopeValidator::compile(self.backend, self.arena, self.id, nullable)
            .map_err(|e| ContractError::Malformed(format!("schema '{}': {e}", self.name)))
    }

    /// Compile, then validate a response body (resource envelope).
    ///
    /// # Errors
    ///
    /// Returns `ContractError::Malformed` if the schema does not compile.
    pub fn validate(
        &self,
        body: Option<&Value>,
        nullable: &BTreeSet<String>,
    ) -> Result<Vec<Violation>, ContractError> {
        Ok(self.compile(nullable)?.validate(body))
    }

    /// Schema node of a top-level field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'a SchemaNode> {
        self.arena
            .flattened_properties(self.id)
            .get(name)
            .map(|id| self.arena.get(*id))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Unsupported spec version: {0} has neither a `swagger` nor an `openapi` key")]
    UnsupportedSpecVersion(String),
    #[error("Cannot resolve reference '{reference}': {reason}")]
    SchemaResolution { reference: String, reason: String },
    #[error("Malformed contract document: {0}")]
    Malformed(String),
    #[error("Unknown resource '{0}'")]
    UnknownResource(String),
}

//! Reference resolution into the schema arena
//!
//! A single depth-first pass. Every schema location `(document, pointer)` is
//! memoized with its `NodeId`; the id is registered before the node's children
//! are visited, so a location reached again mid-resolution becomes a
//! back-reference to the in-progress node.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use super::ContractError;
use super::arena::{CONSTRAINT_KEYWORDS, NodeId, SchemaArena, SchemaNode};
use super::dialect::SchemaBackend;
use super::loader::{DocumentStore, RefTarget, escape_token, parse_ref};

/// A GET operation declared in the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Path template as declared, e.g. `/account-indexes/{accountIndexCode}`
    pub path: String,
    /// Declared response status codes
    pub statuses: BTreeSet<u16>,
    /// Body schema per status code
    pub schemas: BTreeMap<u16, NodeId>,
}

/// Hops allowed when following a chain of `$ref`-only objects.
const MAX_REF_HOPS: usize = 64;

pub(crate) struct Resolver {
    backend: SchemaBackend,
    store: DocumentStore,
    pub(crate) arena: SchemaArena,
    memo: HashMap<(PathBuf, String), NodeId>,
}

impl Resolver {
    pub(crate) fn new(backend: SchemaBackend, store: DocumentStore) -> Self {
        Self {
            backend,
            store,
            arena: SchemaArena::default(),
            memo: HashMap::new(),
        }
    }

    /// Check that every `$ref` reachable from `root` (including inside
    /// external documents) points at an existing location.
    pub(crate) fn check_refs(&mut self, root: &Path) -> Result<(), ContractError> {
        let mut pending = vec![root.to_path_buf()];
        let mut visited = HashSet::new();
        while let Some(doc_path) = pending.pop() {
            if !visited.insert(doc_path.clone()) {
                continue;
            }
            let doc = self.store.get(&doc_path)?;
            let mut refs = Vec::new();
            collect_refs(&doc, &mut refs);
            for reference in refs {
                let target = self.target(reference, &doc_path)?;
                self.lookup(&target, reference)?;
                if target.doc != doc_path {
                    pending.push(target.doc);
                }
            }
        }
        debug!(documents = self.store.len(), "all references resolvable");
        Ok(())
    }

    /// Resolve every named schema under the dialect's schema mapping.
    pub(crate) fn resolve_named(&mut self, root: &Path) -> Result<BTreeMap<String, NodeId>, ContractError> {
        let doc = self.store.get(root)?;
        let base = self.backend.schemas_pointer();
        let names: Vec<String> = doc
            .pointer(base)
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();

        let mut named = BTreeMap::new();
        for name in names {
            let pointer = format!("{base}/{}", escape_token(&name));
            let id = self.resolve_at(root, &pointer, &mut HashSet::new())?;
            named.insert(name, id);
        }
        Ok(named)
    }

    /// Index GET operations with their declared statuses and body schemas.
    pub(crate) fn resolve_operations(&mut self, root: &Path) -> Result<Vec<Operation>, ContractError> {
        let doc = self.store.get(root)?;
        let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
            return Ok(Vec::new());
        };

        let mut operations = Vec::new();
        for template in paths.keys() {
            let item_ptr = format!("/paths/{}", escape_token(template));
            let (item_doc, item_ptr) = self.follow(root, &item_ptr)?;
            let get_ptr = format!("{item_ptr}/get");
            let Some(get) = self.value_at(&item_doc, &get_ptr)? else {
                continue;
            };
            let codes: Vec<String> = get
                .get("responses")
                .and_then(Value::as_object)
                .map(|r| r.keys().cloned().collect())
                .unwrap_or_default();

            let mut statuses = BTreeSet::new();
            let mut schemas = BTreeMap::new();
            for code in codes {
                let Ok(status) = code.parse::<u16>() else {
                    continue;
                };
                statuses.insert(status);
                let resp_ptr = format!("{get_ptr}/responses/{}", escape_token(&code));
                let (resp_doc, resp_ptr) = self.follow(&item_doc, &resp_ptr)?;
                let Some(response) = self.value_at(&resp_doc, &resp_ptr)? else {
                    continue;
                };
                if let Some(suffix) = self.backend.response_schema_suffix(&response) {
                    let id = self.resolve_at(&resp_doc, &format!("{resp_ptr}{suffix}"), &mut HashSet::new())?;
                    schemas.insert(status, id);
                }
            }

            operations.push(Operation {
                path: template.clone(),
                statuses,
                schemas,
            });
        }
        Ok(operations)
    }

    /// Resolve the schema at a location, reusing the node if already seen.
    fn resolve_at(
        &mut self,
        doc_path: &Path,
        pointer: &str,
        following: &mut HashSet<(PathBuf, String)>,
    ) -> Result<NodeId, ContractError> {
        let key = (doc_path.to_path_buf(), pointer.to_string());
        if let Some(id) = self.memo.get(&key) {
            return Ok(*id);
        }

        let doc = self.store.get(doc_path)?;
        let raw = doc.pointer(pointer).ok_or_else(|| ContractError::SchemaResolution {
            reference: format!("{}#{pointer}", doc_path.display()),
            reason: "no such location".into(),
        })?;

        if let Some(reference) = raw.get("$ref").and_then(Value::as_str) {
            if !following.insert(key.clone()) {
                return Err(ContractError::SchemaResolution {
                    reference: reference.to_string(),
                    reason: "reference cycle without any schema".into(),
                });
            }
            let target = self.target(reference, doc_path)?;
            let id = self.resolve_at(&target.doc, &target.pointer, following)?;
            self.memo.insert(key, id);
            return Ok(id);
        }

        let Some(raw) = raw.as_object() else {
            // Boolean schemas and other non-objects accept anything
            let id = self.arena.alloc();
            self.memo.insert(key, id);
            return Ok(id);
        };

        let id = self.arena.alloc();
        self.memo.insert(key, id);

        let (types, nullable) = self.backend.types(raw);
        let mut node = SchemaNode {
            types,
            nullable,
            required: raw
                .get("required")
                .and_then(Value::as_array)
                .map(|r| r.iter().filter_map(Value::as_str).map(String::from).collect())
                .unwrap_or_default(),
            enum_values: raw
                .get("enum")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            format: raw.get("format").and_then(Value::as_str).map(String::from),
            constraints: CONSTRAINT_KEYWORDS
                .iter()
                .filter_map(|k| raw.get(*k).map(|v| ((*k).to_string(), v.clone())))
                .collect(),
            ..SchemaNode::default()
        };

        if let Some(props) = raw.get("properties").and_then(Value::as_object) {
            for name in props.keys() {
                let child = format!("{pointer}/properties/{}", escape_token(name));
                let child_id = self.resolve_at(doc_path, &child, &mut HashSet::new())?;
                node.properties.insert(name.clone(), child_id);
            }
        }
        if raw.get("items").is_some_and(Value::is_object) {
            node.items = Some(self.resolve_at(doc_path, &format!("{pointer}/items"), &mut HashSet::new())?);
        }
        for keyword in self.backend.all_of_keys() {
            node.all_of.extend(self.branches(doc_path, pointer, raw, keyword)?);
        }
        for keyword in self.backend.any_of_keys() {
            node.any_of.extend(self.branches(doc_path, pointer, raw, keyword)?);
        }

        self.arena.set(id, node);
        Ok(id)
    }

    fn branches(
        &mut self,
        doc_path: &Path,
        pointer: &str,
        raw: &serde_json::Map<String, Value>,
        keyword: &str,
    ) -> Result<Vec<NodeId>, ContractError> {
        let count = raw.get(keyword).and_then(Value::as_array).map_or(0, Vec::len);
        (0..count)
            .map(|i| self.resolve_at(doc_path, &format!("{pointer}/{keyword}/{i}"), &mut HashSet::new()))
            .collect()
    }

    /// Follow `$ref`-only objects (path items, responses) to their target.
    fn follow(&mut self, doc_path: &Path, pointer: &str) -> Result<(PathBuf, String), ContractError> {
        let mut current = RefTarget {
            doc: doc_path.to_path_buf(),
            pointer: pointer.to_string(),
        };
        for _ in 0..MAX_REF_HOPS {
            let doc = self.store.get(&current.doc)?;
            let next = doc
                .pointer(&current.pointer)
                .and_then(|v| v.get("$ref"))
                .and_then(Value::as_str)
                .map(String::from);
            match next {
                Some(reference) => current = self.target(&reference, &current.doc)?,
                None => return Ok((current.doc, current.pointer)),
            }
        }
        Err(ContractError::SchemaResolution {
            reference: format!("{}#{pointer}", doc_path.display()),
            reason: "reference chain too long".into(),
        })
    }

    fn value_at(&mut self, doc_path: &Path, pointer: &str) -> Result<Option<Value>, ContractError> {
        let doc = self.store.get(doc_path)?;
        Ok(doc.pointer(pointer).cloned())
    }

    /// Parse a reference and canonicalize its document path.
    fn target(&mut self, reference: &str, base: &Path) -> Result<RefTarget, ContractError> {
        let mut target = parse_ref(reference, base)?;
        if target.doc != base {
            let (canonical, _) = self.store.load(&target.doc).map_err(|e| ContractError::SchemaResolution {
                reference: reference.to_string(),
                reason: e.to_string(),
            })?;
            target.doc = canonical;
        }
        Ok(target)
    }

    fn lookup(&mut self, target: &RefTarget, reference: &str) -> Result<Rc<Value>, ContractError> {
        let doc = self.store.get(&target.doc)?;
        if doc.pointer(&target.pointer).is_none() {
            return Err(ContractError::SchemaResolution {
                reference: reference.to_string(),
                reason: "no such location".into(),
            });
        }
        Ok(doc)
    }
}

fn collect_refs<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                out.push(reference);
            }
            for child in map.values() {
                collect_refs(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, out);
            }
        }
        _ => {}
    }
}

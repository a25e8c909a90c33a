//! Response body validation against resolved schemas
//!
//! A resource schema is exported from the arena as one self-contained JSON
//! Schema document: every reachable node becomes a `definitions` entry (`$defs`
//! under 2020-12) and children are `$ref`s, so cyclic schemas stay finite.
//! The document is compiled once with `jsonschema` under the dialect's draft.
//!
//! Open-world: fields present in the body but not declared in the schema are
//! never reported. Names in the nullable set may be absent or `null` at any
//! depth, even when the schema marks them required.

use std::collections::{BTreeMap, BTreeSet};

use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::{Draft, ValidationError, Validator};
use serde_json::{Map, Value, json};

use apiconform_core::envelope::ResourceData;
use apiconform_core::{Violation, ViolationKind};

use crate::contract::{JsonType, NodeId, SchemaArena, SchemaBackend, SchemaNode};

/// A compiled resource schema with its nullable exemptions applied.
#[derive(Debug, Clone)]
pub struct EnvelopeValidator {
    validator: Validator,
}

impl EnvelopeValidator {
    /// Export the schema rooted at `root` and compile it.
    ///
    /// # Errors
    ///
    /// Returns the build error when the schema does not compile, e.g. a
    /// `pattern` that is not a valid regular expression.
    pub fn compile(
        backend: &SchemaBackend,
        arena: &SchemaArena,
        root: NodeId,
        nullable: &BTreeSet<String>,
    ) -> Result<Self, ValidationError<'static>> {
        let draft = backend.draft();
        let schema = export_schema(arena, root, nullable, draft);
        let validator = jsonschema::options()
            .with_draft(draft)
            .should_validate_formats(false)
            .build(&schema)?;
        Ok(Self { validator })
    }

    /// Validate a resource envelope: every resource object under `data` (or
    /// `errors`) is checked independently.
    ///
    /// `body` is `None` when the response was empty or not JSON.
    #[must_use]
    pub fn validate(&self, body: Option<&Value>) -> Vec<Violation> {
        let Some(body) = body else {
            return vec![Violation::new(
                "",
                ViolationKind::MalformedBody {
                    detail: "body is empty or not JSON".into(),
                },
            )];
        };

        let (key, data) = match ResourceData::from_body(body) {
            Ok(data) => (if body.get("data").is_some() { "data" } else { "errors" }, data),
            Err(e) => {
                return vec![Violation::new(
                    "",
                    ViolationKind::MissingEnvelope {
                        detail: e.to_string(),
                    },
                )];
            }
        };

        match data {
            ResourceData::Single(_) => self.check(&body[key], &format!("/{key}")),
            ResourceData::Collection(items) => (0..items.len())
                .flat_map(|idx| self.check(&body[key][idx], &format!("/{key}/{idx}")))
                .collect(),
        }
    }

    /// Violations of one value, ordered by path.
    fn check(&self, value: &Value, prefix: &str) -> Vec<Violation> {
        let mut violations: Vec<Violation> = self
            .validator
            .iter_errors(value)
            .map(|e| to_violation(prefix, &e))
            .collect();
        violations.sort_by(|a, b| a.path.cmp(&b.path));
        violations
    }
}

fn to_violation(prefix: &str, error: &ValidationError<'_>) -> Violation {
    let path = format!("{prefix}{}", error.instance_path().as_str());
    let kind = match error.kind() {
        ValidationErrorKind::Required { property } => ViolationKind::MissingField {
            field: property
                .as_str()
                .map_or_else(|| property.to_string(), String::from),
        },
        ValidationErrorKind::Type { kind } => ViolationKind::TypeMismatch {
            expected: match kind {
                TypeKind::Single(t) => t.to_string(),
                TypeKind::Multiple(set) => set
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(" or "),
            },
            actual: JsonType::of(error.instance()).to_string(),
        },
        ValidationErrorKind::Enum { .. } => ViolationKind::NotInEnum {
            value: error.instance().to_string(),
        },
        ValidationErrorKind::AnyOf { .. } | ValidationErrorKind::OneOfNotValid { .. } => {
            ViolationKind::NoMatchingAlternative
        }
        _ => ViolationKind::Constraint {
            detail: error.to_string(),
        },
    };
    Violation::new(path, kind)
}

/// Export the nodes reachable from `root` as one JSON Schema document.
///
/// Every name in `nullable` is dropped from `required` and its property
/// schema also accepts `null`.
#[must_use]
pub fn export_schema(
    arena: &SchemaArena,
    root: NodeId,
    nullable: &BTreeSet<String>,
    draft: Draft,
) -> Value {
    let defs_key = if draft == Draft::Draft4 { "definitions" } else { "$defs" };
    let reference = |id: NodeId| json!({"$ref": format!("#/{defs_key}/n{}", id.index())});

    let reachable = reachable(arena, root);
    let skipped = composition_back_edges(arena, &reachable);

    let mut defs = Map::new();
    for id in &reachable {
        let node = arena.get(*id);
        let export = NodeExport {
            id: *id,
            node,
            nullable,
            skipped: &skipped,
            reference: &reference,
        };
        defs.insert(format!("n{}", id.index()), export.schema());
    }

    let mut document = Map::new();
    document.insert(defs_key.to_string(), Value::Object(defs));
    document.insert("$ref".into(), reference(root)["$ref"].clone());
    Value::Object(document)
}

struct NodeExport<'a> {
    id: NodeId,
    node: &'a SchemaNode,
    nullable: &'a BTreeSet<String>,
    skipped: &'a BTreeSet<(NodeId, NodeId)>,
    reference: &'a dyn Fn(NodeId) -> Value,
}

impl NodeExport<'_> {
    fn schema(&self) -> Value {
        let node = self.node;
        let mut schema = node.constraints.clone();
        let composed = !node.all_of.is_empty() || !node.any_of.is_empty();
        // a nullable composition is wrapped as a whole below
        let null_inline = node.nullable && !composed;

        let mut types: Vec<&str> = node.types.iter().map(|t| t.as_str()).collect();
        if null_inline && !types.is_empty() && !types.contains(&"null") {
            types.push("null");
        }
        match types.as_slice() {
            [] => {}
            [single] => {
                schema.insert("type".into(), json!(single));
            }
            _ => {
                schema.insert("type".into(), json!(types));
            }
        }

        if !node.enum_values.is_empty() {
            let mut values = node.enum_values.clone();
            if null_inline && !values.contains(&Value::Null) {
                values.push(Value::Null);
            }
            schema.insert("enum".into(), Value::Array(values));
        }

        if !node.properties.is_empty() {
            let properties: Map<String, Value> = node
                .properties
                .iter()
                .map(|(name, child)| {
                    let target = (self.reference)(*child);
                    let property = if self.nullable.contains(name) {
                        json!({"anyOf": [{"type": "null"}, target]})
                    } else {
                        target
                    };
                    (name.clone(), property)
                })
                .collect();
            schema.insert("properties".into(), Value::Object(properties));
        }

        let required: Vec<&String> = node
            .required
            .iter()
            .filter(|name| !self.nullable.contains(*name))
            .collect();
        if !required.is_empty() {
            schema.insert("required".into(), json!(required));
        }

        if let Some(items) = node.items {
            schema.insert("items".into(), (self.reference)(items));
        }
        if let Some(all_of) = self.branches(&node.all_of) {
            schema.insert("allOf".into(), all_of);
        }
        if let Some(any_of) = self.branches(&node.any_of) {
            schema.insert("anyOf".into(), any_of);
        }

        if node.nullable && composed {
            json!({"anyOf": [{"type": "null"}, Value::Object(schema)]})
        } else {
            Value::Object(schema)
        }
    }

    fn branches(&self, ids: &[NodeId]) -> Option<Value> {
        let refs: Vec<Value> = ids
            .iter()
            .filter(|b| !self.skipped.contains(&(self.id, **b)))
            .map(|b| (self.reference)(*b))
            .collect();
        (!refs.is_empty()).then(|| Value::Array(refs))
    }
}

fn children(node: &SchemaNode) -> impl Iterator<Item = NodeId> + '_ {
    node.properties
        .values()
        .copied()
        .chain(node.items)
        .chain(node.all_of.iter().copied())
        .chain(node.any_of.iter().copied())
}

fn reachable(arena: &SchemaArena, root: NodeId) -> BTreeSet<NodeId> {
    let mut seen = BTreeSet::from([root]);
    let mut pending = vec![root];
    while let Some(id) = pending.pop() {
        for child in children(arena.get(id)) {
            if seen.insert(child) {
                pending.push(child);
            }
        }
    }
    seen
}

/// `allOf`/`anyOf` edges that close a cycle without descending into the
/// value. Such a loop re-checks the same value forever, so it is cut.
fn composition_back_edges(arena: &SchemaArena, nodes: &BTreeSet<NodeId>) -> BTreeSet<(NodeId, NodeId)> {
    // true while the node is on the DFS stack
    let mut active: BTreeMap<NodeId, bool> = BTreeMap::new();
    let mut back = BTreeSet::new();
    for id in nodes {
        visit_composition(arena, *id, &mut active, &mut back);
    }
    back
}

fn visit_composition(
    arena: &SchemaArena,
    id: NodeId,
    active: &mut BTreeMap<NodeId, bool>,
    back: &mut BTreeSet<(NodeId, NodeId)>,
) {
    if active.contains_key(&id) {
        return;
    }
    active.insert(id, true);
    let node = arena.get(id);
    for branch in node.all_of.iter().chain(&node.any_of) {
        match active.get(branch) {
            Some(true) => {
                back.insert((id, *branch));
            }
            Some(false) => {}
            None => visit_composition(arena, *branch, active, back),
        }
    }
    active.insert(id, false);
}

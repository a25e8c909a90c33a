//! Schema node arena
//!
//! Every resolved schema node lives in one `Vec` and is addressed by a
//! `NodeId`. A `$ref` becomes a plain index, so a cyclic schema graph is a set
//! of back-references rather than an infinitely nested structure.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

/// Stable index of a node in a `SchemaArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// JSON value kinds a schema can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JsonType {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

impl JsonType {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    /// Most specific type of a JSON value.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolved schema node. Children are indices into the same arena.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNode {
    /// Accepted types; empty accepts any value
    pub types: Vec<JsonType>,
    pub nullable: bool,
    pub properties: BTreeMap<String, NodeId>,
    pub required: BTreeSet<String>,
    pub items: Option<NodeId>,
    pub enum_values: Vec<Value>,
    /// Every branch must hold
    pub all_of: Vec<NodeId>,
    /// At least one branch must hold (`anyOf` and `oneOf`)
    pub any_of: Vec<NodeId>,
    pub format: Option<String>,
    /// Value constraints carried verbatim (`pattern`, `maxLength`, `minimum`, ...)
    pub constraints: Map<String, Value>,
}

/// Keywords copied into `SchemaNode::constraints`.
pub const CONSTRAINT_KEYWORDS: &[&str] = &[
    "pattern",
    "minLength",
    "maxLength",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minItems",
    "maxItems",
    "uniqueItems",
    "minProperties",
    "maxProperties",
    "const",
];

#[derive(Debug, Clone, Default)]
pub struct SchemaArena {
    nodes: Vec<SchemaNode>,
}

impl SchemaArena {
    /// Allocate an empty placeholder, filled in later with `set`.
    pub fn alloc(&mut self) -> NodeId {
        self.nodes.push(SchemaNode::default());
        NodeId(self.nodes.len() - 1)
    }

    pub fn set(&mut self, id: NodeId, node: SchemaNode) {
        self.nodes[id.0] = node;
    }

    /// Ids are only minted by `alloc`, so indexing cannot go out of bounds.
    #[must_use]
    pub fn get(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Properties of a node merged with those of its `allOf` branches.
    #[must_use]
    pub fn flattened_properties(&self, id: NodeId) -> BTreeMap<String, NodeId> {
        let mut out = BTreeMap::new();
        let mut seen = BTreeSet::new();
        self.collect_properties(id, &mut out, &mut seen);
        out
    }

    /// Required names of a node merged with those of its `allOf` branches.
    #[must_use]
    pub fn flattened_required(&self, id: NodeId) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut seen = BTreeSet::new();
        self.collect_required(id, &mut out, &mut seen);
        out
    }

    fn collect_properties(
        &self,
        id: NodeId,
        out: &mut BTreeMap<String, NodeId>,
        seen: &mut BTreeSet<NodeId>,
    ) {
        if !seen.insert(id) {
            return;
        }
        let node = self.get(id);
        for (name, child) in &node.properties {
            out.entry(name.clone()).or_insert(*child);
        }
        for branch in &node.all_of {
            self.collect_properties(*branch, out, seen);
        }
    }

    fn collect_required(&self, id: NodeId, out: &mut BTreeSet<String>, seen: &mut BTreeSet<NodeId>) {
        if !seen.insert(id) {
            return;
        }
        let node = self.get(id);
        out.extend(node.required.iter().cloned());
        for branch in &node.all_of {
            self.collect_required(*branch, out, seen);
        }
    }
}

//! Contract document loading, reference parsing and JSON pointers

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;

use super::ContractError;

/// Parse a contract document from JSON or YAML.
///
/// Detection strategy: try extension first (`.yaml`/`.yml`/`.json`), then fall
/// back to content sniffing (leading `{` → JSON, otherwise YAML).
pub(crate) fn parse_document(path: &Path, content: &str) -> Result<Value, ContractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let as_json = |content: &str| -> Result<Value, ContractError> {
        serde_json::from_str(content)
            .map_err(|e| ContractError::Malformed(format!("{}: invalid JSON: {e}", path.display())))
    };
    let as_yaml = |content: &str| -> Result<Value, ContractError> {
        serde_yml::from_str(content)
            .map_err(|e| ContractError::Malformed(format!("{}: invalid YAML: {e}", path.display())))
    };

    match ext.as_str() {
        "yaml" | "yml" => as_yaml(content),
        "json" => as_json(content),
        _ if content.trim_start().starts_with('{') => as_json(content),
        _ => as_yaml(content),
    }
}

/// Loaded documents keyed by canonical path. Lives only for one resolution.
#[derive(Default)]
pub(crate) struct DocumentStore {
    docs: HashMap<PathBuf, Rc<Value>>,
}

impl DocumentStore {
    /// Load a document (once) and return its canonical path with its content.
    pub(crate) fn load(&mut self, path: &Path) -> Result<(PathBuf, Rc<Value>), ContractError> {
        let canonical = std::fs::canonicalize(path)
            .map_err(|e| ContractError::Io(path.to_path_buf(), e.to_string()))?;
        if let Some(doc) = self.docs.get(&canonical) {
            return Ok((canonical, Rc::clone(doc)));
        }
        let content = std::fs::read_to_string(&canonical)
            .map_err(|e| ContractError::Io(canonical.clone(), e.to_string()))?;
        let doc = Rc::new(parse_document(&canonical, &content)?);
        self.docs.insert(canonical.clone(), Rc::clone(&doc));
        Ok((canonical, doc))
    }

    /// A document already known by canonical path.
    pub(crate) fn get(&mut self, canonical: &Path) -> Result<Rc<Value>, ContractError> {
        self.load(canonical).map(|(_, doc)| doc)
    }

    pub(crate) fn len(&self) -> usize {
        self.docs.len()
    }
}

/// Target of a `$ref`: a canonical document path plus a JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RefTarget {
    pub(crate) doc: PathBuf,
    pub(crate) pointer: String,
}

/// Split a `$ref` into document and pointer, relative to the referencing document.
///
/// `#/a/b` stays in `base`; `other.yaml#/a` and `other.yaml` point into a
/// sibling file. Remote references are rejected.
pub(crate) fn parse_ref(reference: &str, base: &Path) -> Result<RefTarget, ContractError> {
    let unresolvable = |reason: &str| ContractError::SchemaResolution {
        reference: reference.to_string(),
        reason: reason.to_string(),
    };

    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Err(unresolvable("remote references are not supported"));
    }

    let (file, fragment) = match reference.split_once('#') {
        Some((file, fragment)) => (file, fragment),
        None => (reference, ""),
    };
    let pointer = percent_decode(fragment).ok_or_else(|| unresolvable("bad percent-encoding"))?;
    if !pointer.is_empty() && !pointer.starts_with('/') {
        return Err(unresolvable("fragment is not a JSON pointer"));
    }

    let doc = if file.is_empty() {
        base.to_path_buf()
    } else {
        base.parent().unwrap_or_else(|| Path::new(".")).join(file)
    };
    Ok(RefTarget { doc, pointer })
}

/// Escape one JSON pointer token (`~` → `~0`, `/` → `~1`).
pub(crate) fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Decode `%XX` sequences; `None` on malformed escapes or invalid UTF-8.
fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

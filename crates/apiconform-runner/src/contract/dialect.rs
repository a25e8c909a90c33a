//! Dialect detection and the per-dialect schema grammars
//!
//! Swagger 2 and OpenAPI 3 describe schemas differently (nullability,
//! composition keywords, where named schemas and response bodies live). The
//! backend is chosen once from the document root and never changes.

use jsonschema::Draft;
use serde_json::{Map, Value, json};

use super::ContractError;
use super::arena::JsonType;
use super::loader::escape_token;

/// Contract document dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Swagger2,
    OpenApi3,
}

impl Dialect {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Swagger2 => "swagger2",
            Self::OpenApi3 => "openapi3",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grammar rules that differ between dialects.
trait Grammar {
    fn dialect(&self) -> Dialect;

    /// Compact structural schema the raw document must satisfy
    fn meta_schema(&self) -> Value;

    /// JSON Schema draft response bodies are validated under
    fn draft(&self) -> Draft;

    /// Pointer to the mapping of named schemas
    fn schemas_pointer(&self) -> &'static str;

    /// Accepted types and nullability of a raw schema object
    fn types(&self, raw: &Map<String, Value>) -> (Vec<JsonType>, bool);

    /// Keywords whose branches must all hold
    fn all_of_keys(&self) -> &'static [&'static str];

    /// Keywords where one branch must hold
    fn any_of_keys(&self) -> &'static [&'static str];

    /// Pointer suffix of the body schema inside a response object
    fn response_schema_suffix(&self, response: &Value) -> Option<String>;
}

/// Swagger 2.0: single `type`, `x-nullable`, `allOf` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Swagger2Schema;

/// OpenAPI 3.x: `type` name or list, `nullable`, `allOf`/`anyOf`/`oneOf`.
///
/// 3.0 schemas keep draft 4 keyword semantics (boolean `exclusiveMinimum`);
/// 3.1 schemas are JSON Schema 2020-12.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenApi3Schema {
    json_schema_2020: bool,
}

impl OpenApi3Schema {
    #[must_use]
    pub const fn v3_0() -> Self {
        Self {
            json_schema_2020: false,
        }
    }

    #[must_use]
    pub const fn v3_1() -> Self {
        Self {
            json_schema_2020: true,
        }
    }
}

impl Grammar for Swagger2Schema {
    fn dialect(&self) -> Dialect {
        Dialect::Swagger2
    }

    fn meta_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["swagger", "info", "paths"],
            "properties": {
                "swagger": {"enum": ["2.0", 2.0]},
                "info": {"type": "object"},
                "paths": {"type": "object"},
                "definitions": {"type": "object"},
                "responses": {"type": "object"}
            }
        })
    }

    fn draft(&self) -> Draft {
        Draft::Draft4
    }

    fn schemas_pointer(&self) -> &'static str {
        "/definitions"
    }

    fn types(&self, raw: &Map<String, Value>) -> (Vec<JsonType>, bool) {
        let types = raw
            .get("type")
            .and_then(Value::as_str)
            .and_then(JsonType::parse)
            .into_iter()
            .collect();
        let nullable = raw.get("x-nullable").and_then(Value::as_bool).unwrap_or(false);
        (types, nullable)
    }

    fn all_of_keys(&self) -> &'static [&'static str] {
        &["allOf"]
    }

    fn any_of_keys(&self) -> &'static [&'static str] {
        &[]
    }

    fn response_schema_suffix(&self, response: &Value) -> Option<String> {
        response.get("schema").map(|_| "/schema".to_string())
    }
}

impl Grammar for OpenApi3Schema {
    fn dialect(&self) -> Dialect {
        Dialect::OpenApi3
    }

    fn meta_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["openapi", "info", "paths"],
            "properties": {
                "openapi": {
                    "anyOf": [
                        {"type": "string", "pattern": "^3\\."},
                        {"type": "number", "minimum": 3, "exclusiveMaximum": 4}
                    ]
                },
                "info": {"type": "object"},
                "paths": {"type": "object"},
                "components": {
                    "type": "object",
                    "properties": {
                        "schemas": {"type": "object"},
                        "responses": {"type": "object"}
                    }
                }
            }
        })
    }

    fn draft(&self) -> Draft {
        if self.json_schema_2020 {
            Draft::Draft202012
        } else {
            Draft::Draft4
        }
    }

    fn schemas_pointer(&self) -> &'static str {
        "/components/schemas"
    }

    fn types(&self, raw: &Map<String, Value>) -> (Vec<JsonType>, bool) {
        let types: Vec<JsonType> = match raw.get("type") {
            Some(Value::String(name)) => JsonType::parse(name).into_iter().collect(),
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .filter_map(JsonType::parse)
                .collect(),
            _ => Vec::new(),
        };
        let nullable = raw.get("nullable").and_then(Value::as_bool).unwrap_or(false)
            || types.contains(&JsonType::Null);
        (types, nullable)
    }

    fn all_of_keys(&self) -> &'static [&'static str] {
        &["allOf"]
    }

    fn any_of_keys(&self) -> &'static [&'static str] {
        &["anyOf", "oneOf"]
    }

    fn response_schema_suffix(&self, response: &Value) -> Option<String> {
        let content = response.get("content")?.as_object()?;
        let media = if content.contains_key("application/json") {
            "application/json"
        } else {
            content.keys().find(|k| k.contains("json"))?.as_str()
        };
        content
            .get(media)?
            .get("schema")
            .map(|_| format!("/content/{}/schema", escape_token(media)))
    }
}

/// The structural validation backend, fixed at resolution time.
#[derive(Debug, Clone, Copy)]
pub enum SchemaBackend {
    Swagger2(Swagger2Schema),
    OpenApi3(OpenApi3Schema),
}

impl SchemaBackend {
    /// Pick the backend from the document root: `swagger` → Swagger 2,
    /// `openapi` → OpenAPI 3 (3.1 when the version string says so).
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedSpecVersion` when neither key is present.
    pub fn detect(doc: &Value, source: &str) -> Result<Self, ContractError> {
        let Some(root) = doc.as_object() else {
            return Err(ContractError::Malformed(format!(
                "{source}: document root is not a mapping"
            )));
        };
        if root.contains_key("swagger") {
            Ok(Self::Swagger2(Swagger2Schema))
        } else if let Some(version) = root.get("openapi") {
            let v3_1 = version.as_str().is_some_and(|v| v.starts_with("3.1"));
            Ok(Self::OpenApi3(if v3_1 {
                OpenApi3Schema::v3_1()
            } else {
                OpenApi3Schema::v3_0()
            }))
        } else {
            Err(ContractError::UnsupportedSpecVersion(source.to_string()))
        }
    }

    fn grammar(&self) -> &dyn Grammar {
        match self {
            Self::Swagger2(g) => g,
            Self::OpenApi3(g) => g,
        }
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.grammar().dialect()
    }

    /// Check the raw document against the dialect's structural schema.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` listing the first structural problems.
    pub fn check_structure(&self, doc: &Value) -> Result<(), ContractError> {
        let meta = self.grammar().meta_schema();
        let validator = jsonschema::validator_for(&meta)
            .map_err(|e| ContractError::Malformed(format!("structural schema: {e}")))?;
        let errors: Vec<String> = validator
            .iter_errors(doc)
            .take(5)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ContractError::Malformed(errors.join("; ")))
        }
    }

    pub(crate) fn schemas_pointer(&self) -> &'static str {
        self.grammar().schemas_pointer()
    }

    pub(crate) fn types(&self, raw: &Map<String, Value>) -> (Vec<JsonType>, bool) {
        self.grammar().types(raw)
    }

    pub(crate) fn all_of_keys(&self) -> &'static [&'static str] {
        self.grammar().all_of_keys()
    }

    pub(crate) fn any_of_keys(&self) -> &'static [&'static str] {
        self.grammar().any_of_keys()
    }

    pub(crate) fn response_schema_suffix(&self, response: &Value) -> Option<String> {
        self.grammar().response_schema_suffix(response)
    }

    /// Draft used to compile response schemas.
    pub(crate) fn draft(&self) -> Draft {
        self.grammar().draft()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_swagger_and_openapi() {
        let swagger = json!({"swagger": "2.0", "info": {}, "paths": {}});
        let openapi = json!({"openapi": "3.0.1", "info": {}, "paths": {}});
        assert_eq!(
            SchemaBackend::detect(&swagger, "a").unwrap().dialect(),
            Dialect::Swagger2
        );
        assert_eq!(
            SchemaBackend::detect(&openapi, "b").unwrap().dialect(),
            Dialect::OpenApi3
        );
    }

    #[test]
    fn draft_follows_dialect_version() {
        let draft = |doc: Value| SchemaBackend::detect(&doc, "x").unwrap().draft();
        assert_eq!(draft(json!({"swagger": "2.0"})), Draft::Draft4);
        assert_eq!(draft(json!({"openapi": "3.0.3"})), Draft::Draft4);
        assert_eq!(draft(json!({"openapi": "3.1.0"})), Draft::Draft202012);
    }

    #[test]
    fn neither_key_is_unsupported() {
        let err = SchemaBackend::detect(&json!({"asyncapi": "2.0"}), "events.yaml").unwrap_err();
        assert!(matches!(err, ContractError::UnsupportedSpecVersion(ref s) if s == "events.yaml"));
    }

    #[test]
    fn non_mapping_root_is_malformed() {
        let err = SchemaBackend::detect(&json!(["swagger"]), "list.json").unwrap_err();
        assert!(matches!(err, ContractError::Malformed(_)));
    }

    #[test]
    fn structural_check_rejects_missing_paths() {
        let doc = json!({"openapi": "3.0.0", "info": {}});
        let backend = SchemaBackend::detect(&doc, "x").unwrap();
        let err = backend.check_structure(&doc).unwrap_err();
        assert!(err.to_string().contains("paths"));
    }

    #[test]
    fn structural_check_rejects_wrong_version() {
        let doc = json!({"swagger": "1.2", "info": {}, "paths": {}});
        let backend = SchemaBackend::detect(&doc, "x").unwrap();
        assert!(backend.check_structure(&doc).is_err());

        let ok = json!({"swagger": "2.0", "info": {}, "paths": {}, "definitions": {}});
        backend.check_structure(&ok).unwrap();
    }

    #[test]
    fn swagger_types_and_x_nullable() {
        let backend = SchemaBackend::Swagger2(Swagger2Schema);
        let raw = json!({"type": "string", "x-nullable": true});
        let (types, nullable) = backend.types(raw.as_object().unwrap());
        assert_eq!(types, vec![JsonType::String]);
        assert!(nullable);

        // `nullable` is an OpenAPI 3 keyword
        let raw = json!({"type": "string", "nullable": true});
        assert!(!backend.types(raw.as_object().unwrap()).1);
        assert!(backend.any_of_keys().is_empty());
    }

    #[test]
    fn openapi_type_list_with_null() {
        let backend = SchemaBackend::OpenApi3(OpenApi3Schema::v3_0());
        let raw = json!({"type": ["string", "null"]});
        let (types, nullable) = backend.types(raw.as_object().unwrap());
        assert_eq!(types, vec![JsonType::String, JsonType::Null]);
        assert!(nullable);

        let raw = json!({"type": "integer", "nullable": true});
        assert!(backend.types(raw.as_object().unwrap()).1);
    }

    #[test]
    fn response_schema_location_per_dialect() {
        let swagger = SchemaBackend::Swagger2(Swagger2Schema);
        assert_eq!(
            swagger.response_schema_suffix(&json!({"schema": {"type": "object"}})),
            Some("/schema".into())
        );

        let openapi = SchemaBackend::OpenApi3(OpenApi3Schema::v3_0());
        let response = json!({"content": {"application/vnd.api+json": {"schema": {}}}});
        assert_eq!(
            openapi.response_schema_suffix(&response),
            Some("/content/application~1vnd.api+json/schema".into())
        );
        assert_eq!(openapi.response_schema_suffix(&json!({"description": "gone"})), None);
    }
}

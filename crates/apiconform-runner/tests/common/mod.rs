//! Shared fixtures: contract documents and an in-process finance API.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use serde_json::{Value, json};
use tiny_http::{Header, Response, Server};

pub const FINANCE_OPENAPI: &str = r##"
openapi: 3.0.3
info:
  title: Finance API
  version: "1.0"
paths:
  /account-indexes:
    get:
      parameters:
        - name: accountIndexCode
          in: query
          schema:
            type: string
      responses:
        "200":
          description: Matching account indexes
          content:
            application/vnd.api+json:
              schema:
                $ref: "#/components/schemas/AccountIndexResultSet"
        "400":
          $ref: "#/components/responses/BadRequest"
  /account-indexes/{accountIndexCode}:
    get:
      responses:
        "200":
          description: One account index
          content:
            application/vnd.api+json:
              schema:
                $ref: "#/components/schemas/AccountIndexResult"
        "404":
          $ref: "#/components/responses/NotFound"
  /activity-codes:
    get:
      responses:
        "200":
          description: Matching activity codes
          content:
            application/json:
              schema:
                type: object
                properties:
                  data:
                    type: array
                    items:
                      $ref: "#/components/schemas/ActivityCodeResource"
        "400":
          $ref: "#/components/responses/BadRequest"
  /activity-codes/{activityCode}:
    $ref: "#/components/x-path-items/ActivityCodeByCode"
components:
  x-path-items:
    ActivityCodeByCode:
      get:
        responses:
          "200":
            description: One activity code
            content:
              application/json:
                schema:
                  type: object
                  properties:
                    data:
                      $ref: "#/components/schemas/ActivityCodeResource"
          "404":
            $ref: "#/components/responses/NotFound"
  responses:
    BadRequest:
      description: Invalid query
      content:
        application/json:
          schema:
            $ref: "#/components/schemas/ErrorResultSet"
    NotFound:
      description: No such resource
      content:
        application/json:
          schema:
            $ref: "#/components/schemas/ErrorResultSet"
  schemas:
    SelfLink:
      type: object
      properties:
        self:
          type: string
    AccountIndexResource:
      type: object
      required: [id, type, attributes]
      properties:
        id:
          type: string
        type:
          type: string
          enum: [account-index]
        links:
          $ref: "#/components/schemas/SelfLink"
        attributes:
          type: object
          required: [accountIndexCode, accountIndexTitle, terminationDate]
          properties:
            accountIndexCode:
              type: string
            accountIndexTitle:
              type: string
            terminationDate:
              type: string
              format: date
              nullable: true
            organizationCode:
              type: string
            fiscalYear:
              type: integer
    ActivityCodeResource:
      allOf:
        - $ref: "#/components/schemas/ResourceIdentity"
        - type: object
          required: [attributes]
          properties:
            attributes:
              type: object
              required: [activityCode, activityTitle, terminationDate]
              properties:
                activityCode:
                  type: string
                activityTitle:
                  type: string
                terminationDate:
                  type: string
                  nullable: true
    ResourceIdentity:
      type: object
      required: [id, type]
      properties:
        id:
          type: string
        type:
          type: string
    AccountIndexResultSet:
      type: object
      required: [data]
      properties:
        data:
          type: array
          items:
            $ref: "#/components/schemas/AccountIndexResource"
    AccountIndexResult:
      type: object
      required: [data]
      properties:
        data:
          $ref: "#/components/schemas/AccountIndexResource"
    ErrorObject:
      type: object
      required: [status, title]
      properties:
        status:
          type: string
        title:
          type: string
        code:
          type: string
        detail:
          type: string
        source:
          oneOf:
            - type: object
              properties:
                parameter:
                  type: string
            - type: object
              properties:
                pointer:
                  type: string
    ErrorResultSet:
      type: object
      required: [errors]
      properties:
        errors:
          type: array
          items:
            $ref: "#/components/schemas/ErrorObject"
    OrgNode:
      type: object
      required: [code]
      properties:
        code:
          type: string
        parent:
          $ref: "#/components/schemas/OrgNode"
        children:
          type: array
          items:
            $ref: "#/components/schemas/OrgNode"
"##;

pub const FINANCE_SWAGGER: &str = r##"{
  "swagger": "2.0",
  "info": {"title": "Finance API", "version": "1.0"},
  "basePath": "/api",
  "paths": {
    "/account-indexes/{accountIndexCode}": {
      "get": {
        "parameters": [{"name": "accountIndexCode", "in": "path", "required": true, "type": "string"}],
        "responses": {
          "200": {"description": "ok", "schema": {"$ref": "#/definitions/AccountIndexResult"}},
          "404": {"$ref": "#/responses/NotFound"}
        }
      }
    }
  },
  "responses": {
    "NotFound": {"description": "missing", "schema": {"$ref": "#/definitions/ErrorObject"}}
  },
  "definitions": {
    "AccountIndexResource": {
      "type": "object",
      "required": ["id", "attributes"],
      "properties": {
        "id": {"type": "string"},
        "attributes": {
          "type": "object",
          "required": ["accountIndexCode", "terminationDate"],
          "properties": {
            "accountIndexCode": {"type": "string"},
            "terminationDate": {"type": "string", "x-nullable": true}
          }
        }
      }
    },
    "AccountIndexResult": {
      "type": "object",
      "properties": {"data": {"$ref": "#/definitions/AccountIndexResource"}}
    },
    "ErrorObject": {
      "type": "object",
      "required": ["status", "title"],
      "properties": {
        "status": {"type": "string"},
        "title": {"type": "string"}
      }
    },
    "Category": {
      "allOf": [
        {"$ref": "#/definitions/Category"},
        {"type": "object", "properties": {"parent": {"$ref": "#/definitions/Category"}}}
      ]
    }
  }
}"##;

/// Write a file into `dir` and return its path.
pub fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// How the fake API behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// Filters correctly and returns well-formed resources
    Conforming,
    /// Ignores the query filter: every record comes back
    Regressed,
}

/// A running fake API and the number of requests it has served.
pub struct FakeApi {
    pub base_url: String,
    pub hits: Arc<AtomicUsize>,
}

impl FakeApi {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn account_indexes() -> Vec<Value> {
    vec![
        json!({"code": "ENG261", "title": "Engineering 261", "terminationDate": null}),
        json!({"code": "ENG300", "title": "Engineering 300"}),
        json!({"code": "eng26A", "title": "Engineering 26A", "terminationDate": "2030-06-30"}),
        json!({"code": "BUS100", "title": "Business 100", "terminationDate": null}),
    ]
}

fn activity_codes() -> Vec<Value> {
    vec![
        json!({"code": "AB1234", "title": "Advising", "terminationDate": null}),
        json!({"code": "ab1999", "title": "Advising (legacy)", "terminationDate": "2001-01-01"}),
        json!({"code": "XY0001", "title": "Other", "terminationDate": null}),
    ]
}

fn account_resource(raw: &Value) -> Value {
    let mut attributes = json!({
        "accountIndexCode": raw["code"],
        "accountIndexTitle": raw["title"],
        "organizationCode": "ORG1",
    });
    if let Some(date) = raw.get("terminationDate") {
        attributes["terminationDate"] = date.clone();
    }
    json!({
        "id": raw["code"],
        "type": "account-index",
        "links": {"self": format!("/account-indexes/{}", raw["code"].as_str().unwrap())},
        "attributes": attributes,
    })
}

fn activity_resource(raw: &Value) -> Value {
    json!({
        "id": raw["code"],
        "type": "activity-code",
        "attributes": {
            "activityCode": raw["code"],
            "activityTitle": raw["title"],
            "terminationDate": raw["terminationDate"],
        }
    })
}

fn error_body(status: u16, title: &str, detail: &str) -> Value {
    json!({"errors": [{
        "status": status.to_string(),
        "title": title,
        "detail": detail,
        "source": {"parameter": "code"}
    }]})
}

fn route(url: &str, behaviour: Behaviour) -> (u16, Value) {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let filter = query
        .split('&')
        .find_map(|pair| pair.split_once('='))
        .map(|(_, v)| v.to_string());
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let kind = segments.get(1).copied();
    let records = match kind {
        Some("account-indexes") => account_indexes(),
        Some("activity-codes") => activity_codes(),
        _ => return (404, error_body(404, "Not Found", "unknown route")),
    };
    let to_resource = |r: &Value| {
        if kind == Some("account-indexes") {
            account_resource(r)
        } else {
            activity_resource(r)
        }
    };

    match (segments.len(), filter) {
        (2, Some(prefix)) => {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                return (400, error_body(400, "Bad Request", "invalid filter"));
            }
            let data: Vec<Value> = records
                .iter()
                .filter(|r| {
                    behaviour == Behaviour::Regressed
                        || r["code"]
                            .as_str()
                            .unwrap()
                            .to_lowercase()
                            .starts_with(&prefix.to_lowercase())
                })
                .map(|r| to_resource(r))
                .collect();
            (200, json!({"data": data}))
        }
        (3, _) => match records.iter().find(|r| r["code"] == segments[2]) {
            Some(r) => (200, json!({"data": to_resource(r)})),
            None => (404, error_body(404, "Not Found", "no such code")),
        },
        _ => (400, error_body(400, "Bad Request", "missing filter")),
    }
}

/// Start the fake finance API on an ephemeral port, mounted under `/api`.
pub fn spawn_api(behaviour: Behaviour) -> FakeApi {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    thread::spawn(move || {
        for request in server.incoming_requests() {
            counter.fetch_add(1, Ordering::SeqCst);
            let (status, body) = route(request.url(), behaviour);
            let header =
                Header::from_bytes(&b"Content-Type"[..], &b"application/vnd.api+json"[..]).unwrap();
            let response = Response::from_string(body.to_string())
                .with_status_code(status)
                .with_header(header);
            let _ = request.respond(response);
        }
    });
    FakeApi {
        base_url: format!("http://{addr}/api"),
        hits,
    }
}

/// A base URL nothing listens on.
pub fn dead_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api")
}

//! OpenAPI document → flat endpoint index
//!
//! Walks the `paths` map of an OpenAPI document and records every defined
//! operation as an `EndpointRecord`. Operation bodies are not validated; the
//! fields the matcher does not read are carried through untouched.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::IntentError;

/// Path-item keys that name an operation.
const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// One (path, method) operation from the API description.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct EndpointRecord {
    /// URL path template (e.g. "/password/reset")
    pub path: String,
    /// HTTP method, upper-cased (GET, POST, etc.)
    pub method: String,
    /// Operation description, or summary when no description is given
    pub description: String,
    /// Raw parameter objects in declaration order
    pub parameters: Vec<Value>,
    /// Raw `requestBody`, if any
    pub request_body: Option<Value>,
    /// Raw `responses` map, if any
    pub responses: Option<Value>,
}

impl EndpointRecord {
    pub fn new(
        path: impl Into<String>,
        method: impl AsRef<str>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            method: method.as_ref().to_uppercase(),
            description: description.into(),
            parameters: Vec::new(),
            request_body: None,
            responses: None,
        }
    }
}

/// Read-only index of every endpoint in an API description.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    endpoints: Vec<EndpointRecord>,
}

impl SchemaIndex {
    /// Build the index from a parsed document.
    ///
    /// Accepts either a full OpenAPI document (uses its `paths` object) or a
    /// bare path map. A document with an `openapi` or `swagger` version key
    /// and no `paths` has no endpoints.
    pub fn build(document: &Value) -> Result<Self, IntentError> {
        let endpoints = extract_endpoints(document)?;
        debug!(endpoints = endpoints.len(), "built schema index");
        Ok(Self { endpoints })
    }

    /// Read and parse a JSON or YAML file, then build the index.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IntentError> {
        let document = load_document(path.as_ref())?;
        Self::build(&document)
    }

    pub fn endpoints(&self) -> &[EndpointRecord] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Find the record for a (path, method) pair. Method is case-insensitive.
    pub fn get(&self, path: &str, method: &str) -> Option<&EndpointRecord> {
        self.endpoints
            .iter()
            .find(|e| e.path == path && e.method.eq_ignore_ascii_case(method))
    }
}

impl From<Vec<EndpointRecord>> for SchemaIndex {
    fn from(endpoints: Vec<EndpointRecord>) -> Self {
        Self { endpoints }
    }
}

/// Extract all endpoints from a parsed API description.
pub fn extract_endpoints(document: &Value) -> Result<Vec<EndpointRecord>, IntentError> {
    let paths = match document.get("paths") {
        Some(p) => p,
        None if is_versioned_document(document) => return Ok(Vec::new()),
        None => document,
    };
    let paths = paths.as_object().ok_or_else(|| IntentError::SchemaShape {
        reason: format!("expected a map of paths, found {}", kind_of(paths)),
    })?;

    let mut endpoints = Vec::new();
    for (path, path_item) in paths {
        let path_item = match path_item {
            Value::Object(item) => item,
            Value::Null => continue,
            other => {
                return Err(IntentError::SchemaShape {
                    reason: format!(
                        "path {path:?} maps to {}, expected a map of methods",
                        kind_of(other)
                    ),
                })
            }
        };

        // `get` and `GET` name the same operation; the first one wins.
        let mut seen = HashSet::new();
        for (key, operation) in path_item {
            if operation.is_null() || !is_http_method(key) {
                continue;
            }
            if !seen.insert(key.to_ascii_uppercase()) {
                debug!(path = %path, method = %key, "skipping duplicate operation");
                continue;
            }
            endpoints.push(extract_single_endpoint(path, key, operation));
        }
    }

    Ok(endpoints)
}

fn extract_single_endpoint(path: &str, method: &str, operation: &Value) -> EndpointRecord {
    let description = operation
        .get("description")
        .or_else(|| operation.get("summary"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let parameters = match operation.get("parameters") {
        Some(Value::Array(params)) => params.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other.clone()],
    };

    EndpointRecord {
        path: path.to_string(),
        method: method.to_uppercase(),
        description,
        parameters,
        request_body: operation.get("requestBody").cloned(),
        responses: operation.get("responses").cloned(),
    }
}

fn is_versioned_document(document: &Value) -> bool {
    document.get("openapi").is_some() || document.get("swagger").is_some()
}

fn is_http_method(key: &str) -> bool {
    HTTP_METHODS.iter().any(|m| m.eq_ignore_ascii_case(key))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a map",
    }
}

/// Read an API description from disk.
///
/// `.json` files are parsed as JSON, `.yaml`/`.yml` as YAML; anything else is
/// tried as JSON first, then YAML.
pub fn load_document(path: &Path) -> Result<Value, IntentError> {
    if !path.is_file() {
        return Err(IntentError::SchemaLoad {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }
    let text = fs::read_to_string(path).map_err(|e| IntentError::SchemaLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let parse_err = |source: Box<dyn std::error::Error + Send + Sync>| IntentError::SchemaParse {
        path: path.to_path_buf(),
        source,
    };

    match ext.as_deref() {
        Some("json") => serde_json::from_str(&text).map_err(|e| parse_err(Box::new(e))),
        Some("yaml") | Some("yml") => parse_yaml(&text).map_err(|e| parse_err(Box::new(e))),
        _ => match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(_) => parse_yaml(&text).map_err(|e| parse_err(Box::new(e))),
        },
    }
}

fn parse_yaml(text: &str) -> Result<Value, serde_yaml::Error> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
    Ok(yaml_to_json(yaml))
}

/// YAML allows non-string keys (`200:` under `responses`); JSON does not, so
/// scalar keys are stringified.
fn yaml_to_json(yaml: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Y;

    match yaml {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Y::String(s) => Value::String(s),
        Y::Sequence(seq) => Value::Array(seq.into_iter().map(yaml_to_json).collect()),
        Y::Mapping(map) => {
            let mut obj = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                obj.insert(yaml_key(k), yaml_to_json(v));
            }
            Value::Object(obj)
        }
        Y::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Y;

    match key {
        Y::String(s) => s,
        Y::Number(n) => n.to_string(),
        Y::Bool(b) => b.to_string(),
        Y::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

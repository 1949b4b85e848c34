//! Resolve free-text requests to the endpoints of an OpenAPI description.
//!
//! Builds a flat index of the document's operations, shortlists endpoints whose
//! path or description shares a keyword with the request, asks a language
//! model to pick one, and decodes its JSON reply into an `IntentMatch`.
//!
//! # Usage
//!
//! ```no_run
//! use openapi_intent::{IntentResolver, ResolverConfig};
//!
//! let config = ResolverConfig::from_env()?.api_key("sk-...");
//! let resolver = IntentResolver::from_path("openapi.yaml", &config)?;
//!
//! let matched = resolver.infer_intent("how do I reset my password")?;
//! println!("{} {} ({:.2})", matched.method, matched.endpoint, matched.confidence);
//! # Ok::<(), openapi_intent::IntentError>(())
//! ```
//!
//! Any `Completion` implementation can stand in for the HTTP client:
//!
//! ```
//! use openapi_intent::{
//!     Completion, CompletionError, CompletionRequest, IntentResolver, ResolverConfig,
//!     SchemaIndex,
//! };
//! use serde_json::json;
//!
//! struct Canned;
//!
//! impl Completion for Canned {
//!     fn complete(&self, _: &CompletionRequest) -> Result<String, CompletionError> {
//!         Ok(r#"{"endpoint":"/users","method":"GET","confidence":0.9,"explanation":"lists users"}"#.into())
//!     }
//! }
//!
//! let index = SchemaIndex::build(&json!({
//!     "paths": { "/users": { "get": { "description": "List all users" } } }
//! }))?;
//! let resolver = IntentResolver::new(index, Canned, &ResolverConfig::default());
//! assert_eq!(resolver.infer_intent("list the users")?.endpoint, "/users");
//! # Ok::<(), openapi_intent::IntentError>(())
//! ```

pub mod completion;
pub mod config;
pub mod error;
pub mod prompt;
pub mod resolver;
pub mod select;
pub mod spec;

pub use completion::{Completion, CompletionRequest, HttpCompletion};
pub use config::{Provider, ResolverConfig};
pub use error::{CompletionError, DecodeError, IntentError};
pub use prompt::build_prompt;
pub use resolver::{decode_response, IntentMatch, IntentResolver};
pub use select::{extract_keywords, select_candidates, AnalyzedInput, SelectorConfig};
pub use spec::{extract_endpoints, load_document, EndpointRecord, SchemaIndex};

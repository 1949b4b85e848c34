//! Shortlist → model prompt
//!
//! The prompt is a fixed template; the only variable parts are the candidate
//! blocks and the quoted user request.

use crate::select::AnalyzedInput;
use crate::spec::EndpointRecord;

const PREAMBLE: &str = "You are matching a user's request to an HTTP API endpoint.\n\
Given the following available API endpoints:";

const INSTRUCTIONS: &str = "Analyze the user's request and:\n\
1. Identify the API endpoint that best serves the request.\n\
2. Explain why the endpoint matches the request.\n\
3. Respond with a single JSON object and nothing else.";

const OUTPUT_SCHEMA: &str = r#"Respond in this JSON format:
{
  "endpoint": "/path/of/endpoint",
  "method": "HTTP method such as GET or POST",
  "confidence": 0.0,
  "explanation": "why this endpoint matches the request"
}
"confidence" is a number between 0 and 1. "explanation" is a string."#;

/// Render the model prompt for `user_text` and its shortlist.
pub fn build_prompt(user_text: &str, analyzed: &AnalyzedInput<'_>) -> String {
    let blocks = analyzed
        .candidates
        .iter()
        .map(|e| endpoint_block(e))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{PREAMBLE}\n\n{blocks}\n\nUser request: \"{user_text}\"\n\n{INSTRUCTIONS}\n\n{OUTPUT_SCHEMA}\n")
}

fn endpoint_block(endpoint: &EndpointRecord) -> String {
    format!(
        "Path: {}\nMethod: {}\nDescription: {}\n",
        endpoint.path, endpoint.method, endpoint.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn analyzed<'a>(candidates: Vec<&'a EndpointRecord>) -> AnalyzedInput<'a> {
        AnalyzedInput {
            keywords: BTreeSet::new(),
            candidates,
        }
    }

    #[test]
    fn build_prompt_lists_candidates_in_order() {
        let reset = EndpointRecord::new("/password/reset", "POST", "Reset a user's password");
        let users = EndpointRecord::new("/users/list", "GET", "List all users");
        let prompt = build_prompt("reset or list", &analyzed(vec![&reset, &users]));

        let reset_at = prompt.find("Path: /password/reset").unwrap();
        let users_at = prompt.find("Path: /users/list").unwrap();
        assert!(reset_at < users_at);
        assert!(prompt.contains("Method: POST\nDescription: Reset a user's password"));
        assert!(prompt.contains("Method: GET\nDescription: List all users"));
    }

    #[test]
    fn build_prompt_with_no_candidates_still_quotes_user_text() {
        let prompt = build_prompt("how do I fly a kite?", &analyzed(Vec::new()));

        assert!(!prompt.is_empty());
        assert!(prompt.contains("User request: \"how do I fly a kite?\""));
        assert!(prompt.starts_with(PREAMBLE));
        assert!(!prompt.contains("Path: "));
    }

    #[test]
    fn build_prompt_includes_output_schema_keys() {
        let prompt = build_prompt("anything", &analyzed(Vec::new()));
        for key in ["\"endpoint\"", "\"method\"", "\"confidence\"", "\"explanation\""] {
            assert!(prompt.contains(key), "missing {key}");
        }
        assert!(prompt.contains("between 0 and 1"));
    }

    #[test]
    fn build_prompt_is_deterministic() {
        let users = EndpointRecord::new("/users", "GET", "List all users");
        let a = build_prompt("list users", &analyzed(vec![&users]));
        let b = build_prompt("list users", &analyzed(vec![&users]));
        assert_eq!(a, b);
    }

    #[test]
    fn build_prompt_keeps_user_text_verbatim() {
        let text = "  Reset   \"my\" PASSWORD  ";
        let prompt = build_prompt(text, &analyzed(Vec::new()));
        assert!(prompt.contains(text));
    }
}

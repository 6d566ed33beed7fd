//! Parsing structured (JSON) model output.

use serde::de::DeserializeOwned;

use taxwise_core::TaxwiseError;

/// Pull the JSON document out of a model reply.
///
/// Models constrained to JSON usually reply with the bare object, but some
/// wrap it in a Markdown fence or a sentence of prose.
pub fn extract_json_payload(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        // Skip the info string ("json") up to the first newline.
        let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
        let body = body.trim_end();
        let body = body.strip_suffix("```").unwrap_or(body);
        return body.trim();
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Deserialize a model reply into `T`, reporting any mismatch as malformed output.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, TaxwiseError> {
    let payload = extract_json_payload(text);
    if payload.is_empty() {
        return Err(TaxwiseError::MalformedOutput("model returned an empty reply".into()));
    }
    serde_json::from_str(payload).map_err(|e| TaxwiseError::MalformedOutput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Shape {
        suggestions: Vec<String>,
    }

    #[test]
    fn test_bare_json() {
        assert_eq!(extract_json_payload("  {\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn test_fenced_json() {
        let reply = "```json\n{\"suggestions\": [\"Consider X\"]}\n```";
        let shape: Shape = parse_structured(reply).unwrap();
        assert_eq!(shape.suggestions, vec!["Consider X"]);
    }

    #[test]
    fn test_json_with_prose() {
        let reply = "Here is the result: {\"suggestions\": []} Hope this helps.";
        let shape: Shape = parse_structured(reply).unwrap();
        assert!(shape.suggestions.is_empty());
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let err = parse_structured::<Shape>("{\"warnings\": []}").unwrap_err();
        assert!(matches!(err, TaxwiseError::MalformedOutput(_)));
    }

    #[test]
    fn test_empty_reply_is_malformed() {
        let err = parse_structured::<Shape>("   ").unwrap_err();
        assert!(matches!(err, TaxwiseError::MalformedOutput(_)));
    }
}

//! Interpretation of raw completion text as a structured reply.
//!
//! The normalizer is a two-step state machine: it starts in
//! [`NormalizerState::AwaitingText`] and moves to exactly one terminal state.
//! The fallback state is a valid outcome, not an error.

use log::{debug, warn};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizerState {
    AwaitingText,
    /// The reply was a JSON object.
    ParsedStructured(Map<String, Value>),
    /// The reply could not be interpreted; the raw text is kept.
    FallbackWrapped(String),
}

impl NormalizerState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::AwaitingText)
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::FallbackWrapped(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseNormalizer {
    state: NormalizerState,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self {
            state: NormalizerState::AwaitingText,
        }
    }

    pub fn state(&self) -> &NormalizerState {
        &self.state
    }

    /// Feeds the gateway's text. Only the first call has an effect.
    pub fn accept(&mut self, raw: &str) -> &NormalizerState {
        if self.state.is_terminal() {
            return &self.state;
        }

        self.state = match interpret(raw) {
            Some(object) => {
                debug!("Completion reply parsed as structured object ({} keys)", object.len());
                NormalizerState::ParsedStructured(object)
            }
            None => {
                warn!("Completion reply is not a JSON object; wrapping raw text");
                NormalizerState::FallbackWrapped(raw.to_string())
            }
        };
        &self.state
    }

    pub fn into_state(self) -> NormalizerState {
        self.state
    }

    /// Runs the whole machine on one reply.
    pub fn normalize(raw: &str) -> NormalizerState {
        let mut normalizer = Self::new();
        normalizer.accept(raw);
        normalizer.into_state()
    }
}

fn interpret(raw: &str) -> Option<Map<String, Value>> {
    let candidate = extract_object_span(strip_code_fence(raw.trim()))?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // A single-line fence has no body to strip; the brace scan handles it.
    let Some((_, body)) = rest.split_once('\n') else {
        return text;
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn extract_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_plain_object() {
        let state = ResponseNormalizer::normalize(r#"{"summary": "ok", "highlights": ["a"]}"#);
        match state {
            NormalizerState::ParsedStructured(object) => {
                assert_eq!(object["summary"], "ok");
            }
            other => panic!("expected structured reply, got {:?}", other),
        }
    }

    #[test]
    fn test_parses_fenced_object() {
        let raw = "```json\n{\"summary\": \"fenced\"}\n```";
        let state = ResponseNormalizer::normalize(raw);
        assert!(matches!(
            state,
            NormalizerState::ParsedStructured(ref o) if o["summary"] == "fenced"
        ));
    }

    #[test]
    fn test_parses_single_line_fence() {
        for raw in [r#"```{"summary":"x"}```"#, r#"```json{"summary":"x"}```"#] {
            let state = ResponseNormalizer::normalize(raw);
            assert!(
                matches!(state, NormalizerState::ParsedStructured(ref o) if o["summary"] == "x"),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn test_prose_is_wrapped() {
        let raw = "Population grew steadily over the decade.";
        assert_eq!(
            ResponseNormalizer::normalize(raw),
            NormalizerState::FallbackWrapped(raw.to_string())
        );
    }

    #[test]
    fn test_non_object_json_is_wrapped() {
        assert!(ResponseNormalizer::normalize("[1, 2, 3]").is_fallback());
        assert!(ResponseNormalizer::normalize("\"just a string\"").is_fallback());
        assert!(ResponseNormalizer::normalize("{not json}").is_fallback());
        assert!(ResponseNormalizer::normalize("").is_fallback());
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let mut normalizer = ResponseNormalizer::new();
        assert_eq!(normalizer.state(), &NormalizerState::AwaitingText);
        normalizer.accept("plain text");
        normalizer.accept(r#"{"summary": "late"}"#);
        assert!(normalizer.state().is_fallback());
    }
}

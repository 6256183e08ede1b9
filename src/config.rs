use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_DATASET_BASE_URL: &str = "http://127.0.0.1:8080/api/internal";
pub const DEFAULT_QA_EXCERPT_CHARS: usize = 4000;

/// Process-level settings, read once and passed to the gateway and provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub model: String,
    /// Completion-service credential. Requests fail with a configuration
    /// error when this is absent.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub completion_base_url: String,
    pub dataset_base_url: String,
    /// Token presented to the internal dataset endpoints.
    #[serde(skip_serializing)]
    pub internal_token: Option<String>,
    pub temperature: f32,
    /// Year used when a request or question does not name one.
    pub default_year: Option<i32>,
    /// Per-dataset character budget for raw JSON excerpts in Q&A prompts.
    pub qa_excerpt_chars: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            completion_base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            dataset_base_url: DEFAULT_DATASET_BASE_URL.to_string(),
            internal_token: None,
            temperature: 0.3,
            default_year: None,
            qa_excerpt_chars: DEFAULT_QA_EXCERPT_CHARS,
        }
    }
}

impl InsightConfig {
    /// Reads the configuration from the environment. Blank variables count as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            model: read("OPENAI_MODEL").unwrap_or(defaults.model),
            api_key: read("OPENAI_API_KEY"),
            completion_base_url: read("OPENAI_BASE_URL").unwrap_or(defaults.completion_base_url),
            dataset_base_url: read("DATASET_BASE_URL").unwrap_or(defaults.dataset_base_url),
            internal_token: read("INTERNAL_API_TOKEN"),
            temperature: defaults.temperature,
            default_year: read("REPORT_DEFAULT_YEAR").and_then(|year| year.parse().ok()),
            qa_excerpt_chars: defaults.qa_excerpt_chars,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub fn resolve_year(&self, requested: Option<i32>) -> i32 {
        requested
            .or(self.default_year)
            .unwrap_or_else(|| Local::now().year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_lookup_reads_values_and_ignores_blanks() {
        let vars: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "  "),
            ("DATASET_BASE_URL", "http://data.local/api"),
            ("REPORT_DEFAULT_YEAR", "2021"),
        ]
        .into_iter()
        .collect();

        let config = InsightConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.dataset_base_url, "http://data.local/api");
        assert_eq!(config.default_year, Some(2021));
        assert!(config.internal_token.is_none());
    }

    #[test]
    fn test_resolve_year_prefers_request() {
        let config = InsightConfig {
            default_year: Some(2020),
            ..Default::default()
        };
        assert_eq!(config.resolve_year(Some(2024)), 2024);
        assert_eq!(config.resolve_year(None), 2020);
    }

    #[test]
    fn test_has_api_key() {
        assert!(!InsightConfig::default().has_api_key());
        assert!(!InsightConfig::default().with_api_key("  ").has_api_key());
        assert!(InsightConfig::default().with_api_key("sk").has_api_key());
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let config = InsightConfig::default().with_api_key("sk-secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}

//! Final merge of the model's reply with the deterministic aggregates.

use crate::normalizer::NormalizerState;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which detail object a report advertises, and under which key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailKind {
    /// `projection`; `null` when no projection could be computed.
    Projection,
    /// `insights`; `{}` when nothing could be computed.
    Insights,
}

impl DetailKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Projection => "projection",
            Self::Insights => "insights",
        }
    }

    fn empty(&self) -> Value {
        match self {
            Self::Projection => Value::Null,
            Self::Insights => Value::Object(Map::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportDetail {
    Projection(Value),
    Insights(Value),
}

impl ReportDetail {
    fn new(kind: DetailKind, value: Value) -> Self {
        match kind {
            DetailKind::Projection => Self::Projection(value),
            DetailKind::Insights => Self::Insights(value),
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Self::Projection(value) | Self::Insights(value) => value,
        }
    }
}

/// The response contract shared by every report endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredReport {
    pub summary: String,
    pub highlights: Vec<String>,
    #[serde(flatten)]
    pub detail: ReportDetail,
    pub raw_prompt: String,
}

/// Builds the final report from the normalizer's terminal state.
///
/// `deterministic` is the aggregate computed locally (already serialised), or
/// `None` when the aggregator declined to produce one.
pub fn assemble(
    state: NormalizerState,
    kind: DetailKind,
    deterministic: Option<Value>,
    prompt: &str,
) -> StructuredReport {
    match state {
        NormalizerState::ParsedStructured(mut object) => {
            let summary = match object.remove("summary") {
                Some(Value::String(summary)) => summary,
                _ => String::new(),
            };
            let highlights = object
                .remove("highlights")
                .map(collect_highlights)
                .unwrap_or_default();
            let detail = merge_detail(object.remove(kind.key()), deterministic, kind);

            StructuredReport {
                summary,
                highlights,
                detail: ReportDetail::new(kind, detail),
                raw_prompt: prompt.to_string(),
            }
        }
        NormalizerState::FallbackWrapped(raw) => StructuredReport {
            summary: raw,
            highlights: Vec::new(),
            detail: ReportDetail::new(kind, deterministic.unwrap_or(Value::Null)),
            raw_prompt: prompt.to_string(),
        },
        NormalizerState::AwaitingText => StructuredReport {
            summary: String::new(),
            highlights: Vec::new(),
            detail: ReportDetail::new(kind, deterministic.unwrap_or_else(|| kind.empty())),
            raw_prompt: prompt.to_string(),
        },
    }
}

fn collect_highlights(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(text) if !text.trim().is_empty() => vec![text],
        _ => Vec::new(),
    }
}

/// The model's detail object wins key by key; anything it left out is filled
/// from the deterministic aggregate.
fn merge_detail(model: Option<Value>, deterministic: Option<Value>, kind: DetailKind) -> Value {
    match (model, deterministic) {
        (Some(Value::Object(mut supplied)), Some(Value::Object(computed))) => {
            for (key, value) in computed {
                if supplied.get(&key).map_or(true, Value::is_null) {
                    debug!("Filling '{}.{}' from deterministic aggregate", kind.key(), key);
                    supplied.insert(key, value);
                }
            }
            Value::Object(supplied)
        }
        (Some(Value::Object(supplied)), None) => Value::Object(supplied),
        (_, Some(computed)) => computed,
        (_, None) => kind.empty(),
    }
}

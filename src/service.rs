//! The report pipeline and its JSON boundary.

use crate::aggregator::{aggregate_internet, aggregate_urban_rural, summarize_population};
use crate::config::InsightConfig;
use crate::error::{ErrorResponse, InsightError, Result};
use crate::llm::assistant::{analyze_question, ChatReply, ChatRequest};
use crate::llm::client::CompletionGateway;
use crate::llm::prompts::{
    internet_prompt, population_prompt, qa_prompt, urban_rural_prompt, Prompt, PromptContext,
    ASSISTANT_SYSTEM_PROMPT, REPORT_SYSTEM_PROMPT,
};
use crate::llm::types::CompletionRequest;
use crate::normalizer::{NormalizerState, ResponseNormalizer};
use crate::provider::{internet_report_datasets, DatasetProvider, DatasetQuery, DatasetSource};
use crate::report::{assemble, DetailKind, StructuredReport};
use crate::schema::{
    InternetReportRequest, PopulationReportRequest, Topic, UrbanRuralReportRequest,
};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;

pub const YEAR_RANGE: RangeInclusive<i32> = 1900..=2100;
pub const PROJECTION_YEARS_RANGE: RangeInclusive<u32> = 1..=50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportEndpoint {
    Population,
    UrbanRural,
    InternetAccess,
    Chat,
}

impl ReportEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Population => "population",
            Self::UrbanRural => "urban_rural",
            Self::InternetAccess => "internet_access",
            Self::Chat => "chat",
        }
    }
}

/// What the routing layer sends back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: Value,
}

/// Runs the four report generators against one completion gateway and one dataset source.
pub struct ReportService<G, S> {
    config: InsightConfig,
    gateway: G,
    provider: DatasetProvider<S>,
}

#[cfg(feature = "remote")]
impl ReportService<crate::llm::client::OpenAiCompletionClient, crate::provider::HttpDatasetSource> {
    pub fn from_config(config: InsightConfig) -> Self {
        let gateway = crate::llm::client::OpenAiCompletionClient::from_config(&config);
        let source = crate::provider::HttpDatasetSource::from_config(&config);
        Self::new(config, gateway, source)
    }
}

impl<G: CompletionGateway, S: DatasetSource> ReportService<G, S> {
    pub fn new(config: InsightConfig, gateway: G, source: S) -> Self {
        Self {
            config,
            gateway,
            provider: DatasetProvider::new(source),
        }
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    pub async fn population_report(
        &self,
        request: PopulationReportRequest,
    ) -> Result<StructuredReport> {
        validate_year(request.year)?;
        validate_projection_years(request.projection_years)?;
        self.ensure_configured()?;

        let year = self.config.resolve_year(request.year);
        info!(
            "Building population report for {} (year {}, {} projection years)",
            scope_label(request.province.as_deref()),
            year,
            request.projection_years
        );

        let query = DatasetQuery::new(year, request.province.clone());
        let datasets = self
            .provider
            .resolve(Topic::Population, &query, request.datasets.as_ref())
            .await;
        debug!(
            "Population datasets: {} province rows, {} trend points",
            datasets.population_by_province.len(),
            datasets.population_trend.len()
        );

        let summary = summarize_population(&datasets, year, request.projection_years);
        let ctx = PromptContext::new(
            year,
            request.province.as_deref(),
            request.language.as_deref(),
            request.audience.as_deref(),
        );
        let prompt = population_prompt(&ctx, &summary)?;
        let deterministic = summary
            .projection
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        self.generate(prompt, DetailKind::Projection, deterministic)
            .await
    }

    pub async fn urban_rural_report(
        &self,
        request: UrbanRuralReportRequest,
    ) -> Result<StructuredReport> {
        let year = required_year(request.year)?;
        self.ensure_configured()?;

        info!(
            "Building urban/rural report for {} (year {})",
            scope_label(request.province.as_deref()),
            year
        );

        let query = DatasetQuery::new(year, request.province.clone());
        let datasets = self
            .provider
            .resolve(Topic::UrbanRural, &query, request.datasets.as_ref())
            .await;
        debug!("Urban/rural dataset: {} rows", datasets.urban_rural.len());

        let summary = aggregate_urban_rural(&datasets.urban_rural);
        let insights = summary.insights();
        let ctx = PromptContext::new(
            year,
            request.province.as_deref(),
            request.language.as_deref(),
            request.audience.as_deref(),
        );
        let prompt = urban_rural_prompt(&ctx, &summary, &insights)?;
        let deterministic = if summary.groups.is_empty() {
            None
        } else {
            Some(serde_json::to_value(&insights)?)
        };

        self.generate(prompt, DetailKind::Insights, deterministic)
            .await
    }

    pub async fn internet_report(
        &self,
        request: InternetReportRequest,
    ) -> Result<StructuredReport> {
        let year = required_year(request.year)?;
        let datasets = internet_report_datasets(request.datasets.as_ref())?;
        self.ensure_configured()?;

        info!(
            "Building internet-access report for {} (year {})",
            scope_label(request.province.as_deref()),
            year
        );
        debug!(
            "Internet datasets: {} access rows, {} trend points",
            datasets.internet_access.len(),
            datasets.internet_trend.len()
        );

        let summary = aggregate_internet(&datasets.internet_access, &datasets.internet_trend);
        let insights = summary.insights();
        let ctx = PromptContext::new(
            year,
            request.province.as_deref(),
            request.language.as_deref(),
            request.audience.as_deref(),
        );
        let prompt = internet_prompt(&ctx, &summary, &insights)?;
        let deterministic = Some(serde_json::to_value(&insights)?);

        self.generate(prompt, DetailKind::Insights, deterministic)
            .await
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatReply> {
        let (question, history) = request.split_latest()?;
        self.ensure_configured()?;

        let context = analyze_question(question, self.config.resolve_year(None));
        info!(
            "Answering question on {} for {} (year {})",
            context.topic,
            scope_label(context.region.as_deref()),
            context.year
        );

        let query = DatasetQuery::new(context.year, context.region.clone());
        let datasets = self.provider.resolve(context.topic, &query, None).await;
        let prompt = qa_prompt(&context, &datasets, self.config.qa_excerpt_chars, history)?;

        let raw = self.complete(ASSISTANT_SYSTEM_PROMPT, &prompt).await?;
        Ok(ChatReply {
            reply: reply_text(&raw),
            topic: context.topic,
            year: context.year,
        })
    }

    /// Decodes `body` for `endpoint`, runs it, and maps any failure to its public form.
    pub async fn dispatch(&self, endpoint: ReportEndpoint, body: Value) -> ServiceResponse {
        match self.run_endpoint(endpoint, body).await {
            Ok(body) => ServiceResponse { status: 200, body },
            Err(err) => {
                let response = ErrorResponse::from_error(&err);
                ServiceResponse {
                    status: response.status,
                    body: serde_json::to_value(&response).unwrap_or_default(),
                }
            }
        }
    }

    async fn run_endpoint(&self, endpoint: ReportEndpoint, body: Value) -> Result<Value> {
        debug!("Dispatching {} request", endpoint.as_str());
        let value = match endpoint {
            ReportEndpoint::Population => {
                serde_json::to_value(self.population_report(decode(body)?).await?)?
            }
            ReportEndpoint::UrbanRural => {
                serde_json::to_value(self.urban_rural_report(decode(body)?).await?)?
            }
            ReportEndpoint::InternetAccess => {
                serde_json::to_value(self.internet_report(decode(body)?).await?)?
            }
            ReportEndpoint::Chat => serde_json::to_value(self.chat(decode(body)?).await?)?,
        };
        Ok(value)
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.gateway.is_configured() {
            Ok(())
        } else {
            Err(InsightError::Configuration(
                "completion service API key is not set".to_string(),
            ))
        }
    }

    async fn generate(
        &self,
        prompt: Prompt,
        kind: DetailKind,
        deterministic: Option<Value>,
    ) -> Result<StructuredReport> {
        let raw = self.complete(REPORT_SYSTEM_PROMPT, &prompt).await?;
        let state = ResponseNormalizer::normalize(&raw);
        let report = assemble(state, kind, deterministic, &prompt.text());
        info!(
            "Report ready: {} highlight(s), {} summary chars",
            report.highlights.len(),
            report.summary.len()
        );
        Ok(report)
    }

    async fn complete(&self, system: &str, prompt: &Prompt) -> Result<String> {
        let text = prompt.text();
        debug!(
            "Prompt composed: {} chars, {} history message(s)",
            text.len(),
            prompt.history().len()
        );
        self.gateway
            .complete(CompletionRequest {
                model: self.config.model.clone(),
                system: system.to_string(),
                prompt: text,
                history: prompt.history().to_vec(),
            })
            .await
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T> {
    let body = match body {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(body)
        .map_err(|err| InsightError::validation(format!("invalid request body: {}", err)))
}

fn validate_year(year: Option<i32>) -> Result<()> {
    match year {
        Some(year) if !YEAR_RANGE.contains(&year) => Err(InsightError::validation(format!(
            "year must be between {} and {}, got {}",
            YEAR_RANGE.start(),
            YEAR_RANGE.end(),
            year
        ))),
        _ => Ok(()),
    }
}

fn required_year(year: Option<i32>) -> Result<i32> {
    validate_year(year)?;
    year.ok_or_else(|| InsightError::validation("year is required"))
}

fn validate_projection_years(years: u32) -> Result<()> {
    if PROJECTION_YEARS_RANGE.contains(&years) {
        Ok(())
    } else {
        Err(InsightError::validation(format!(
            "projection_years must be between {} and {}, got {}",
            PROJECTION_YEARS_RANGE.start(),
            PROJECTION_YEARS_RANGE.end(),
            years
        )))
    }
}

fn scope_label(province: Option<&str>) -> &str {
    match province.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => "nationwide",
    }
}

/// The assistant answers in prose; a JSON reply carrying a `reply` or
/// `answer` string is unwrapped.
fn reply_text(raw: &str) -> String {
    if let NormalizerState::ParsedStructured(object) = ResponseNormalizer::normalize(raw) {
        for key in ["reply", "answer"] {
            if let Some(Value::String(text)) = object.get(key) {
                return text.trim().to_string();
            }
        }
    }
    raw.trim().to_string()
}

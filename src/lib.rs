//! # Census Insights
//!
//! A library that turns tabular census datasets into short analytical reports,
//! written by a chat-completion model from deterministic aggregates.
//!
//! ## Core Concepts
//!
//! - **Datasets**: Loosely-typed JSON rows (population by province, trends, age
//!   structure, sex ratio, urban/rural splits, internet access) converted once
//!   into typed records
//! - **Aggregates**: Pure summaries computed locally (projections, shares,
//!   rankings, trend direction) that never depend on the model
//! - **Prompts**: Deterministic instructions embedding a bounded rendering of the
//!   aggregates and a mandatory JSON output contract
//! - **Reports**: The model's reply, normalised and merged key by key with the
//!   aggregates, so a report always carries the locally computed figures
//!
//! ## Pipeline
//!
//! ```text
//! request -> DatasetProvider -> aggregator -> prompts -> CompletionGateway
//!         -> ResponseNormalizer -> report::assemble -> StructuredReport
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use census_insights::*;
//! use serde_json::json;
//!
//! let service = ReportService::from_config(InsightConfig::from_env());
//!
//! let request: InternetReportRequest = serde_json::from_value(json!({
//!     "year": 2024,
//!     "datasets": {
//!         "internet_access": [
//!             {"province": "Hà Nội", "total_households": 100, "households_with_internet": 40},
//!             {"province": "Đà Nẵng", "total_households": 50, "households_with_internet": 45}
//!         ]
//!     }
//! }))?;
//!
//! let report = service.internet_report(request).await?;
//! println!("{}", report.summary);
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod llm;
pub mod normalizer;
pub mod provider;
pub mod report;
pub mod schema;
pub mod service;
pub mod utils;

pub use aggregator::*;
pub use config::InsightConfig;
pub use error::{ErrorKind, ErrorResponse, InsightError, Result};
pub use llm::{
    ChatMessage, ChatReply, ChatRequest, ChatRole, CompletionGateway, CompletionRequest,
};
#[cfg(feature = "remote")]
pub use llm::OpenAiCompletionClient;
pub use normalizer::{NormalizerState, ResponseNormalizer};
pub use provider::*;
pub use report::{assemble, DetailKind, ReportDetail, StructuredReport};
pub use schema::*;
pub use service::{ReportEndpoint, ReportService, ServiceResponse};

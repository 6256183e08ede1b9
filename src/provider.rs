//! Dataset acquisition: inline payloads or concurrent fetches from the
//! internal read endpoints.

use crate::error::{InsightError, Result};
use crate::schema::{DatasetName, Datasets, InlineDatasets, Topic};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetQuery {
    pub year: i32,
    pub province: Option<String>,
}

impl DatasetQuery {
    pub fn new(year: i32, province: Option<String>) -> Self {
        let province = province
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Self { year, province }
    }
}

/// A backend able to return the raw rows of one dataset.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn fetch(&self, dataset: DatasetName, query: &DatasetQuery) -> Result<Vec<Value>>;
}

#[async_trait]
impl<T: DatasetSource + ?Sized> DatasetSource for Arc<T> {
    async fn fetch(&self, dataset: DatasetName, query: &DatasetQuery) -> Result<Vec<Value>> {
        (**self).fetch(dataset, query).await
    }
}

/// A credential valid for a single outbound fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCredential {
    pub token: String,
    /// The endpoint the credential was issued for.
    pub scope: String,
    pub expires_at: DateTime<Utc>,
}

pub trait CredentialIssuer: Send + Sync {
    /// Issues a credential scoped to `scope`, or `None` when no credential is configured.
    fn issue(&self, scope: &str) -> Option<FetchCredential>;
}

/// Wraps a configured service token, stamping each use with a short expiry.
#[derive(Debug, Clone)]
pub struct StaticCredentialIssuer {
    token: Option<String>,
    ttl: Duration,
}

impl StaticCredentialIssuer {
    pub const DEFAULT_TTL_SECS: i64 = 60;

    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            ttl: Duration::seconds(Self::DEFAULT_TTL_SECS),
        }
    }
}

impl CredentialIssuer for StaticCredentialIssuer {
    fn issue(&self, scope: &str) -> Option<FetchCredential> {
        let token = self.token.as_deref()?.trim();
        if token.is_empty() {
            return None;
        }
        Some(FetchCredential {
            token: token.to_string(),
            scope: scope.to_string(),
            expires_at: Utc::now() + self.ttl,
        })
    }
}

pub struct DatasetProvider<S> {
    source: S,
}

impl<S: DatasetSource> DatasetProvider<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Datasets for `topic`. An inline payload is used verbatim; otherwise the
    /// topic's datasets are fetched concurrently and any failed fetch becomes
    /// an empty dataset.
    pub async fn resolve(
        &self,
        topic: Topic,
        query: &DatasetQuery,
        inline: Option<&InlineDatasets>,
    ) -> Datasets {
        match inline {
            Some(inline) => {
                debug!("Using {} inline dataset(s) for {}", inline.len(), topic);
                Datasets::from_inline(inline)
            }
            None => self.fetch_all(topic.datasets(), query).await,
        }
    }

    pub async fn fetch_all(&self, names: &[DatasetName], query: &DatasetQuery) -> Datasets {
        let fetches = names.iter().map(|&name| async move {
            let rows = match self.source.fetch(name, query).await {
                Ok(rows) => rows,
                Err(err) => {
                    warn!("Dataset {} unavailable, continuing with empty data: {}", name, err);
                    Vec::new()
                }
            };
            (name, rows)
        });

        let mut datasets = Datasets::default();
        for (name, rows) in join_all(fetches).await {
            debug!("Dataset {} resolved with {} row(s)", name, rows.len());
            datasets.ingest(name, &rows);
        }
        datasets
    }
}

/// Datasets for an internet-access report. These are never fetched: the
/// current-rate dataset must be supplied inline and be non-empty.
pub fn internet_report_datasets(inline: Option<&InlineDatasets>) -> Result<Datasets> {
    let supplied = inline
        .and_then(|datasets| datasets.get(DatasetName::InternetAccess.as_str()))
        .is_some_and(|rows| !rows.is_empty());
    if !supplied {
        return Err(InsightError::MissingDataset(DatasetName::InternetAccess));
    }
    Ok(inline.map(Datasets::from_inline).unwrap_or_default())
}

/// Accepts either a bare array of rows or an object wrapping them in `data`.
pub fn rows_from_body(dataset: DatasetName, body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Err(InsightError::DatasetFetch {
                dataset,
                details: "response object has no 'data' array".to_string(),
            }),
        },
        other => Err(InsightError::DatasetFetch {
            dataset,
            details: format!("unexpected response body: {}", other),
        }),
    }
}

#[cfg(feature = "remote")]
pub use self::http::HttpDatasetSource;

#[cfg(feature = "remote")]
mod http {
    use super::*;
    use crate::config::InsightConfig;
    use reqwest::header::AUTHORIZATION;
    use reqwest::Client;

    pub const SCOPE_HEADER: &str = "x-credential-scope";
    pub const EXPIRES_HEADER: &str = "x-credential-expires";

    /// Reads datasets from the internal HTTP endpoints.
    pub struct HttpDatasetSource {
        client: Client,
        base_url: String,
        credentials: Arc<dyn CredentialIssuer>,
    }

    impl HttpDatasetSource {
        pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialIssuer>) -> Self {
            Self {
                client: Client::new(),
                base_url: base_url.into(),
                credentials,
            }
        }

        pub fn from_config(config: &InsightConfig) -> Self {
            Self::new(
                config.dataset_base_url.clone(),
                Arc::new(StaticCredentialIssuer::new(config.internal_token.clone())),
            )
        }

        fn url_for(&self, dataset: DatasetName) -> String {
            format!("{}/{}", self.base_url.trim_end_matches('/'), dataset.endpoint())
        }
    }

    #[async_trait]
    impl DatasetSource for HttpDatasetSource {
        async fn fetch(&self, dataset: DatasetName, query: &DatasetQuery) -> Result<Vec<Value>> {
            let url = self.url_for(dataset);

            let mut params: Vec<(&str, String)> = Vec::new();
            if !dataset.is_time_series() {
                params.push(("year", query.year.to_string()));
            }
            if let Some(province) = &query.province {
                params.push(("province", province.clone()));
            }

            let mut request = self.client.get(&url).query(&params);
            if let Some(credential) = self.credentials.issue(dataset.endpoint()) {
                request = request
                    .header(AUTHORIZATION, format!("Bearer {}", credential.token))
                    .header(SCOPE_HEADER, credential.scope)
                    .header(EXPIRES_HEADER, credential.expires_at.timestamp().to_string());
            }

            let res = request.send().await?;
            let status = res.status();
            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(InsightError::DatasetFetch {
                    dataset,
                    details: format!("status {}: {}", status, body),
                });
            }

            let body: Value = res.json().await?;
            rows_from_body(dataset, body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedSource {
        responses: HashMap<DatasetName, Result<Vec<Value>>>,
        calls: Mutex<Vec<DatasetName>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<(DatasetName, Result<Vec<Value>>)>) -> Self {
            Self {
                responses: responses.into_iter().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DatasetSource for ScriptedSource {
        async fn fetch(&self, dataset: DatasetName, _query: &DatasetQuery) -> Result<Vec<Value>> {
            self.calls.lock().unwrap().push(dataset);
            match self.responses.get(&dataset) {
                Some(Ok(rows)) => Ok(rows.clone()),
                Some(Err(err)) => Err(InsightError::DatasetFetch {
                    dataset,
                    details: err.to_string(),
                }),
                None => Ok(Vec::new()),
            }
        }
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        futures::executor::block_on(future)
    }

    #[test]
    fn test_failed_fetch_yields_empty_dataset() {
        let source = ScriptedSource::new(vec![
            (
                DatasetName::PopulationByProvince,
                Ok(vec![json!({"province": "Ha Noi", "year": 2024, "population": 8_500_000})]),
            ),
            (
                DatasetName::PopulationTrend,
                Err(InsightError::Validation("boom".into())),
            ),
        ]);
        let provider = DatasetProvider::new(source);
        let query = DatasetQuery::new(2024, None);

        let datasets = block_on(provider.resolve(Topic::Population, &query, None));
        assert_eq!(datasets.population_by_province.len(), 1);
        assert!(datasets.population_trend.is_empty());

        let calls = provider.source.calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
    }

    #[test]
    fn test_inline_datasets_skip_fetching() {
        let provider = DatasetProvider::new(ScriptedSource::new(vec![]));
        let mut inline = InlineDatasets::new();
        inline.insert(
            "urban_rural".to_string(),
            vec![json!({"area_type": "urban", "population": 10})],
        );

        let query = DatasetQuery::new(2024, Some("Hue".into()));
        let datasets = block_on(provider.resolve(Topic::UrbanRural, &query, Some(&inline)));
        assert_eq!(datasets.urban_rural.len(), 1);
        assert!(provider.source.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_internet_report_requires_inline_rows() {
        let err = internet_report_datasets(None).unwrap_err();
        assert!(matches!(err, InsightError::MissingDataset(DatasetName::InternetAccess)));

        let mut inline = InlineDatasets::new();
        inline.insert("internet_access".to_string(), vec![]);
        assert!(internet_report_datasets(Some(&inline)).is_err());

        inline.insert("internet_access".to_string(), vec![json!({"hh": 10, "withNet": 5})]);
        let datasets = internet_report_datasets(Some(&inline)).unwrap();
        assert_eq!(datasets.internet_access.len(), 1);
        assert!(datasets.internet_trend.is_empty());
    }

    #[test]
    fn test_rows_from_body_shapes() {
        let rows = rows_from_body(DatasetName::UrbanRural, json!([{"a": 1}])).unwrap();
        assert_eq!(rows.len(), 1);
        let rows =
            rows_from_body(DatasetName::UrbanRural, json!({"data": [{"a": 1}, {"a": 2}]})).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows_from_body(DatasetName::UrbanRural, json!({"rows": []})).is_err());
        assert!(rows_from_body(DatasetName::UrbanRural, json!("nope")).is_err());
    }

    #[test]
    fn test_query_drops_blank_province() {
        assert_eq!(DatasetQuery::new(2024, Some("  ".into())).province, None);
        assert_eq!(
            DatasetQuery::new(2024, Some(" Hue ".into())).province.as_deref(),
            Some("Hue")
        );
    }

    #[test]
    fn test_static_credential_issuer() {
        assert!(StaticCredentialIssuer::new(None).issue("urban-rural").is_none());
        let credential = StaticCredentialIssuer::new(Some("svc".into()))
            .issue("urban-rural")
            .unwrap();
        assert_eq!(credential.token, "svc");
        assert_eq!(credential.scope, "urban-rural");
        assert!(credential.expires_at > Utc::now());
    }
}

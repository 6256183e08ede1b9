#![cfg(feature = "remote")]

use census_insights::*;
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn source_for(server: &MockServer, token: Option<&str>) -> HttpDatasetSource {
    HttpDatasetSource::new(
        format!("{}/api/internal/", server.base_url()),
        Arc::new(StaticCredentialIssuer::new(token.map(str::to_string))),
    )
}

#[tokio::test]
async fn population_datasets_are_fetched_with_scoped_credentials() {
    let server = MockServer::start_async().await;

    let by_province = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/internal/population/by-province")
                .query_param("year", "2019")
                .query_param("province", "Hà Nội")
                .header("authorization", "Bearer svc-token")
                .header("x-credential-scope", "population/by-province")
                .header_exists("x-credential-expires");
            then.status(200).json_body(json!([
                {"province": "Hà Nội", "year": 2019, "population": "8,053,663"}
            ]));
        })
        .await;

    // Trend endpoints are never filtered by year.
    let trend = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/internal/population/trend")
                .query_param_missing("year")
                .header("x-credential-scope", "population/trend");
            then.status(200).json_body(json!({
                "data": [
                    {"year": 2009, "population": 6_451_909},
                    {"year": 2019, "population": 8_053_663}
                ]
            }));
        })
        .await;

    let age = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/internal/population/age-structure");
            then.status(200).json_body(json!([
                {"group": "0-14", "male": 10, "female": 12},
                {"group": "15-64", "male": 40, "female": 38}
            ]));
        })
        .await;

    let sex_ratio = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/internal/population/sex-ratio");
            then.status(200).json_body(json!([{"male": 98, "female": 100}]));
        })
        .await;

    let provider = DatasetProvider::new(source_for(&server, Some("svc-token")));
    let query = DatasetQuery::new(2019, Some(" Hà Nội ".to_string()));
    let datasets = provider.resolve(Topic::Population, &query, None).await;

    by_province.assert_async().await;
    trend.assert_async().await;
    age.assert_async().await;
    sex_ratio.assert_async().await;

    assert_eq!(datasets.population_by_province[0].population, 8_053_663.0);
    assert_eq!(datasets.population_trend.len(), 2);
    assert_eq!(datasets.age_structure[1].total, 78.0);
    assert_eq!(datasets.sex_ratio[0].male, 98.0);
}

#[tokio::test]
async fn failed_endpoint_yields_empty_dataset() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/internal/internet/access");
            then.status(200).json_body(json!([
                {"province": "Đà Nẵng", "hh": 50, "withNet": 45}
            ]));
        })
        .await;
    let trend = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/internal/internet/trend");
            then.status(503).body("database offline");
        })
        .await;

    let provider = DatasetProvider::new(source_for(&server, None));
    let datasets = provider
        .resolve(Topic::InternetAccess, &DatasetQuery::new(2024, None), None)
        .await;

    trend.assert_calls_async(1).await;
    assert_eq!(datasets.internet_access.len(), 1);
    assert_eq!(datasets.internet_access[0].households_with_internet, 45.0);
    assert!(datasets.internet_trend.is_empty());
}

#[tokio::test]
async fn source_reports_status_and_shape_errors() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/internal/urban-rural");
            then.status(500).body("boom");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/internal/internet/access");
            then.status(200).json_body(json!({"rows": []}));
        })
        .await;

    let source = source_for(&server, None);
    let query = DatasetQuery::new(2024, None);

    let err = source.fetch(DatasetName::UrbanRural, &query).await.unwrap_err();
    assert!(matches!(
        err,
        InsightError::DatasetFetch {
            dataset: DatasetName::UrbanRural,
            ..
        }
    ));

    let err = source
        .fetch(DatasetName::InternetAccess, &query)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no 'data' array"));
}

#[tokio::test]
async fn requests_without_token_carry_no_credentials() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/internal/urban-rural")
                .header_missing("authorization");
            then.status(200).json_body(json!([]));
        })
        .await;

    let rows = source_for(&server, None)
        .fetch(DatasetName::UrbanRural, &DatasetQuery::new(2024, None))
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(rows.is_empty());
}

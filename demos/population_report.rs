use census_insights::*;
use dotenv::dotenv;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = InsightConfig::from_env();
    if !config.has_api_key() {
        anyhow::bail!("OPENAI_API_KEY must be set");
    }

    println!("📊 Building a population report with {}...\n", config.model);
    let service = ReportService::from_config(config);

    // Inline datasets keep the demo independent of the internal data service.
    let request: PopulationReportRequest = serde_json::from_value(json!({
        "year": 2019,
        "projection_years": 5,
        "language": "English",
        "audience": "provincial planning officers",
        "datasets": {
            "population_by_province": [
                {"province": "Hà Nội", "year": 2019, "population": 8_053_663},
                {"province": "Hồ Chí Minh", "year": 2019, "population": 8_993_082},
                {"province": "Hải Phòng", "year": 2019, "population": 2_028_514},
                {"province": "Đà Nẵng", "year": 2019, "population": 1_134_310},
                {"province": "Cần Thơ", "year": 2019, "population": 1_235_171},
                {"province": "Bắc Kạn", "year": 2019, "population": 313_905}
            ],
            "population_trend": [
                {"year": 1999, "population": 76_323_173},
                {"year": 2009, "population": 85_846_997},
                {"year": 2019, "population": 96_208_984}
            ],
            "age_structure": [
                {"age_group": "0-14", "male": 12_600_000, "female": 11_700_000},
                {"age_group": "15-64", "male": 33_600_000, "female": 33_200_000},
                {"age_group": "65+", "male": 2_100_000, "female": 3_100_000}
            ],
            "sex_ratio": [
                {"male": 47_881_061, "female": 48_327_923}
            ]
        }
    }))?;

    let report = service.population_report(request).await?;

    println!("Summary:\n{}\n", report.summary);
    println!("Highlights:");
    for highlight in &report.highlights {
        println!("  • {}", highlight);
    }
    println!(
        "\nProjection:\n{}",
        serde_json::to_string_pretty(report.detail.value())?
    );

    Ok(())
}

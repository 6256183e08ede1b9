use crate::ingestion::{lenient_year, FromRow};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// The closed set of datasets a report can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetName {
    PopulationByProvince,
    PopulationTrend,
    AgeStructure,
    SexRatio,
    UrbanRural,
    InternetAccess,
    InternetTrend,
}

impl DatasetName {
    pub const ALL: [DatasetName; 7] = [
        DatasetName::PopulationByProvince,
        DatasetName::PopulationTrend,
        DatasetName::AgeStructure,
        DatasetName::SexRatio,
        DatasetName::UrbanRural,
        DatasetName::InternetAccess,
        DatasetName::InternetTrend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PopulationByProvince => "population_by_province",
            Self::PopulationTrend => "population_trend",
            Self::AgeStructure => "age_structure",
            Self::SexRatio => "sex_ratio",
            Self::UrbanRural => "urban_rural",
            Self::InternetAccess => "internet_access",
            Self::InternetTrend => "internet_trend",
        }
    }

    /// Path of the internal read endpoint serving this dataset.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::PopulationByProvince => "population/by-province",
            Self::PopulationTrend => "population/trend",
            Self::AgeStructure => "population/age-structure",
            Self::SexRatio => "population/sex-ratio",
            Self::UrbanRural => "urban-rural",
            Self::InternetAccess => "internet/access",
            Self::InternetTrend => "internet/trend",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == name.trim())
    }

    /// Trend datasets span years, so they are never filtered by year.
    pub fn is_time_series(&self) -> bool {
        matches!(self, Self::PopulationTrend | Self::InternetTrend)
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report domains. The free-form Q&A assistant maps every question onto one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Population,
    UrbanRural,
    InternetAccess,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Population => "population",
            Self::UrbanRural => "urban_rural",
            Self::InternetAccess => "internet_access",
        }
    }

    /// Datasets fetched from the internal endpoints for this topic.
    pub fn datasets(&self) -> &'static [DatasetName] {
        match self {
            Self::Population => &[
                DatasetName::PopulationByProvince,
                DatasetName::PopulationTrend,
                DatasetName::AgeStructure,
                DatasetName::SexRatio,
            ],
            Self::UrbanRural => &[DatasetName::UrbanRural],
            Self::InternetAccess => &[DatasetName::InternetAccess, DatasetName::InternetTrend],
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProvincePopulationRow {
    pub province: String,
    pub year: i32,
    pub population: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PopulationTrendRow {
    pub year: i32,
    pub population: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgeGroupRow {
    pub age_group: String,
    pub male: f64,
    pub female: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SexRatioRow {
    pub province: String,
    pub year: i32,
    pub male: f64,
    pub female: f64,
    /// Males per 100 females, when the source reports it directly.
    pub ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UrbanRuralRow {
    pub province: String,
    pub area_type: String,
    pub population: f64,
    pub households: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InternetAccessRow {
    pub province: String,
    pub total_households: f64,
    pub households_with_internet: f64,
    /// Percentage supplied by the source; `None` when missing or unusable.
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InternetTrendRow {
    pub year: i32,
    pub rate: f64,
}

/// Raw, caller-supplied datasets keyed by dataset name.
pub type InlineDatasets = BTreeMap<String, Vec<Value>>;

/// Typed datasets for one request. A dataset that was not supplied or failed
/// to load is an empty vector.
///
/// The source rows are kept as received so that prompt excerpts show the
/// data exactly as the endpoints returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Datasets {
    pub population_by_province: Vec<ProvincePopulationRow>,
    pub population_trend: Vec<PopulationTrendRow>,
    pub age_structure: Vec<AgeGroupRow>,
    pub sex_ratio: Vec<SexRatioRow>,
    pub urban_rural: Vec<UrbanRuralRow>,
    pub internet_access: Vec<InternetAccessRow>,
    pub internet_trend: Vec<InternetTrendRow>,
    #[serde(skip)]
    raw: BTreeMap<DatasetName, Vec<Value>>,
}

impl Datasets {
    /// Builds typed datasets from an inline payload. Unknown names are skipped.
    pub fn from_inline(inline: &InlineDatasets) -> Self {
        let mut datasets = Self::default();
        for (name, rows) in inline {
            match DatasetName::parse(name) {
                Some(dataset) => datasets.ingest(dataset, rows),
                None => debug!("Ignoring unknown inline dataset '{}'", name),
            }
        }
        datasets
    }

    /// Converts raw JSON rows into the typed record for `name`, replacing any previous content.
    pub fn ingest(&mut self, name: DatasetName, rows: &[Value]) {
        self.raw.insert(name, rows.to_vec());
        match name {
            DatasetName::PopulationByProvince => {
                self.population_by_province = ingest_rows(rows);
            }
            DatasetName::PopulationTrend => self.population_trend = ingest_rows(rows),
            DatasetName::AgeStructure => self.age_structure = ingest_rows(rows),
            DatasetName::SexRatio => self.sex_ratio = ingest_rows(rows),
            DatasetName::UrbanRural => self.urban_rural = ingest_rows(rows),
            DatasetName::InternetAccess => self.internet_access = ingest_rows(rows),
            DatasetName::InternetTrend => self.internet_trend = ingest_rows(rows),
        }
    }

    /// Rows of `name` exactly as supplied or fetched.
    pub fn raw_rows(&self, name: DatasetName) -> &[Value] {
        self.raw.get(&name).map(Vec::as_slice).unwrap_or_default()
    }
}

fn ingest_rows<T: FromRow>(rows: &[Value]) -> Vec<T> {
    rows.iter().map(T::from_value).collect()
}

fn default_projection_years() -> u32 {
    5
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PopulationReportRequest {
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default = "default_projection_years")]
    pub projection_years: u32,
    #[serde(default)]
    pub datasets: Option<InlineDatasets>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UrbanRuralReportRequest {
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub datasets: Option<InlineDatasets>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InternetReportRequest {
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub datasets: Option<InlineDatasets>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

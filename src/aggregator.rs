//! Deterministic reducers from typed dataset rows to report summaries.
//!
//! Every function here is total: empty input produces an empty or zeroed
//! summary, never an error.

use crate::schema::{
    AgeGroupRow, Datasets, InternetAccessRow, InternetTrendRow, PopulationTrendRow,
    ProvincePopulationRow, SexRatioRow, UrbanRuralRow,
};
use crate::utils::{normalize_phrase, percent, round_to};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How many entries the ranked lists keep.
pub const RANKING_SIZE: usize = 5;

pub const OTHER_AREA: &str = "other";
pub const URBAN_AREA: &str = "urban";
pub const RURAL_AREA: &str = "rural";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectionPoint {
    pub year: i32,
    pub population: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PopulationProjection {
    #[schemars(description = "Last observed year the projection starts from")]
    pub base_year: i32,
    pub projection_years: u32,
    #[schemars(description = "Compound annual growth rate as a fraction (0.01 = 1%)")]
    pub annual_growth_rate: f64,
    pub projected_population: f64,
    pub series: Vec<ProjectionPoint>,
}

/// Compound-rate projection over a population trend.
///
/// Returns `None` when fewer than two points are available. The series is
/// rounded to whole people at every step, so each value compounds from the
/// previous rounded value.
pub fn project_population(
    trend: &[PopulationTrendRow],
    years: u32,
) -> Option<PopulationProjection> {
    if trend.len() < 2 {
        return None;
    }

    let mut sorted = trend.to_vec();
    sorted.sort_by_key(|point| point.year);

    let first = sorted.first()?;
    let last = sorted.last()?;
    let annual_growth_rate = growth_rate(first, last);

    let mut series = Vec::with_capacity(years as usize);
    let mut current = last.population;
    for step in 1..=years {
        let Some(year) = i32::try_from(step)
            .ok()
            .and_then(|step| last.year.checked_add(step))
        else {
            break;
        };
        current = (current * (1.0 + annual_growth_rate)).round();
        series.push(ProjectionPoint {
            year,
            population: current,
        });
    }

    Some(PopulationProjection {
        base_year: last.year,
        projection_years: years,
        annual_growth_rate,
        projected_population: series.last().map_or(last.population, |p| p.population),
        series,
    })
}

fn growth_rate(first: &PopulationTrendRow, last: &PopulationTrendRow) -> f64 {
    let span = i64::from(last.year) - i64::from(first.year);
    if span == 0 || first.population <= 0.0 {
        return 0.0;
    }
    let rate = (last.population / first.population).powf(1.0 / span as f64) - 1.0;
    if rate.is_finite() {
        rate
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TrendDirection {
    #[serde(rename = "strong increase")]
    StrongIncrease,
    #[serde(rename = "mild increase")]
    MildIncrease,
    #[serde(rename = "stable")]
    Stable,
    #[serde(rename = "mild decrease")]
    MildDecrease,
    #[serde(rename = "strong decrease")]
    StrongDecrease,
}

impl TrendDirection {
    pub fn classify(delta: f64) -> Self {
        if delta > 5.0 {
            Self::StrongIncrease
        } else if delta > 1.0 {
            Self::MildIncrease
        } else if delta < -5.0 {
            Self::StrongDecrease
        } else if delta < -1.0 {
            Self::MildDecrease
        } else {
            Self::Stable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::StrongIncrease => "strong increase",
            Self::MildIncrease => "mild increase",
            Self::Stable => "stable",
            Self::MildDecrease => "mild decrease",
            Self::StrongDecrease => "strong decrease",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub first_year: i32,
    pub last_year: i32,
    pub first_value: f64,
    pub last_value: f64,
    pub delta: f64,
    pub average_change_per_year: f64,
    pub direction: TrendDirection,
}

/// Summarises a rate series (percentage points). `None` for an empty series.
pub fn summarize_trend(points: &[InternetTrendRow]) -> Option<TrendSummary> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|point| point.year);

    let first = sorted.first()?;
    let last = sorted.last()?;
    let delta = last.rate - first.rate;
    let intervals = sorted.len().saturating_sub(1);
    let average_change_per_year = if intervals > 1 {
        delta / intervals as f64
    } else {
        delta
    };

    Some(TrendSummary {
        first_year: first.year,
        last_year: last.year,
        first_value: first.rate,
        last_value: last.rate,
        delta,
        average_change_per_year,
        direction: TrendDirection::classify(delta),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaGroup {
    pub area_type: String,
    pub population: f64,
    pub households: f64,
    pub population_percent: f64,
    pub household_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrbanRuralSummary {
    pub total_population: f64,
    pub total_households: f64,
    /// Groups in order of first appearance.
    pub groups: Vec<AreaGroup>,
}

/// Canonical grouping key for an area label.
pub fn area_key(raw: &str) -> String {
    let normalized = normalize_phrase(raw);
    match normalized.as_str() {
        "" => OTHER_AREA.to_string(),
        "urban" | "thanh thi" | "do thi" | "city" | "town" => URBAN_AREA.to_string(),
        "rural" | "nong thon" | "countryside" | "village" => RURAL_AREA.to_string(),
        _ => normalized,
    }
}

pub fn aggregate_urban_rural(rows: &[UrbanRuralRow]) -> UrbanRuralSummary {
    let mut groups: Vec<AreaGroup> = Vec::new();
    let mut total_population = 0.0;
    let mut total_households = 0.0;

    for row in rows {
        let key = area_key(&row.area_type);
        total_population += row.population;
        total_households += row.households;

        match groups.iter_mut().find(|group| group.area_type == key) {
            Some(group) => {
                group.population += row.population;
                group.households += row.households;
            }
            None => groups.push(AreaGroup {
                area_type: key,
                population: row.population,
                households: row.households,
                population_percent: 0.0,
                household_percent: 0.0,
            }),
        }
    }

    for group in &mut groups {
        group.population_percent = percent(group.population, total_population);
        group.household_percent = percent(group.households, total_households);
    }

    UrbanRuralSummary {
        total_population,
        total_households,
        groups,
    }
}

impl UrbanRuralSummary {
    pub fn group(&self, area_type: &str) -> Option<&AreaGroup> {
        self.groups.iter().find(|group| group.area_type == area_type)
    }

    /// Largest group by the given measure; the earlier group wins a tie.
    fn dominant_by(&self, total: f64, measure: impl Fn(&AreaGroup) -> f64) -> String {
        if total <= 0.0 {
            return String::new();
        }
        self.groups
            .iter()
            .fold(None::<&AreaGroup>, |best, group| match best {
                Some(current) if measure(group) <= measure(current) => Some(current),
                _ => Some(group),
            })
            .map(|group| group.area_type.clone())
            .unwrap_or_default()
    }

    pub fn insights(&self) -> UrbanRuralInsights {
        let share = |area: &str, pick: fn(&AreaGroup) -> f64| {
            self.group(area).map_or(0.0, |group| round_to(pick(group), 2))
        };
        UrbanRuralInsights {
            urban_population_share: share(URBAN_AREA, |g| g.population_percent),
            rural_population_share: share(RURAL_AREA, |g| g.population_percent),
            urban_household_share: share(URBAN_AREA, |g| g.household_percent),
            rural_household_share: share(RURAL_AREA, |g| g.household_percent),
            dominant_area_population: self.dominant_by(self.total_population, |g| g.population),
            dominant_area_household: self.dominant_by(self.total_households, |g| g.households),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UrbanRuralInsights {
    #[schemars(description = "Percentage of population living in urban areas")]
    pub urban_population_share: f64,
    pub rural_population_share: f64,
    pub urban_household_share: f64,
    pub rural_household_share: f64,
    #[schemars(description = "Area type holding the largest population")]
    pub dominant_area_population: String,
    pub dominant_area_household: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvinceRate {
    pub province: String,
    pub total_households: f64,
    pub households_with_internet: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternetSummary {
    pub total_households: f64,
    pub households_with_internet: f64,
    /// Computed from grand totals, not the mean of per-row rates.
    pub overall_rate: f64,
    pub max_rate: f64,
    pub min_rate: f64,
    pub provinces: Vec<ProvinceRate>,
    pub top5: Vec<ProvinceRate>,
    pub bottom5: Vec<ProvinceRate>,
    pub trend: Option<TrendSummary>,
}

/// Rate of one row: the supplied rate when usable, otherwise derived from counts.
pub fn row_rate(row: &InternetAccessRow) -> f64 {
    match row.rate {
        Some(rate) if rate.is_finite() && rate > 0.0 => rate,
        _ => percent(row.households_with_internet, row.total_households),
    }
}

pub fn aggregate_internet(
    rows: &[InternetAccessRow],
    trend: &[InternetTrendRow],
) -> InternetSummary {
    let provinces: Vec<ProvinceRate> = rows
        .iter()
        .map(|row| ProvinceRate {
            province: row.province.clone(),
            total_households: row.total_households,
            households_with_internet: row.households_with_internet,
            rate: row_rate(row),
        })
        .collect();

    let total_households: f64 = rows.iter().map(|row| row.total_households).sum();
    let households_with_internet: f64 = rows.iter().map(|row| row.households_with_internet).sum();

    let max_rate = provinces.iter().map(|p| p.rate).reduce(f64::max).unwrap_or(0.0);
    let min_rate = provinces.iter().map(|p| p.rate).reduce(f64::min).unwrap_or(0.0);

    InternetSummary {
        total_households,
        households_with_internet,
        overall_rate: percent(households_with_internet, total_households),
        max_rate,
        min_rate,
        top5: ranked(&provinces, |a, b| b.rate.total_cmp(&a.rate)),
        bottom5: ranked(&provinces, |a, b| a.rate.total_cmp(&b.rate)),
        provinces,
        trend: summarize_trend(trend),
    }
}

/// Stable sort, so equal rates keep their original row order.
fn ranked(
    provinces: &[ProvinceRate],
    order: impl FnMut(&ProvinceRate, &ProvinceRate) -> Ordering,
) -> Vec<ProvinceRate> {
    let mut sorted = provinces.to_vec();
    sorted.sort_by(order);
    sorted.truncate(RANKING_SIZE);
    sorted
}

impl InternetSummary {
    pub fn insights(&self) -> InternetInsights {
        InternetInsights {
            current_rate_pct: round_to(self.overall_rate, 2),
            max_rate_pct: round_to(self.max_rate, 2),
            min_rate_pct: round_to(self.min_rate, 2),
            top_provinces: self.top5.iter().map(|p| p.province.clone()).collect(),
            bottom_provinces: self.bottom5.iter().map(|p| p.province.clone()).collect(),
            trend_direction: self
                .trend
                .as_ref()
                .map(|trend| trend.direction.label().to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InternetInsights {
    #[schemars(description = "Share of households with internet access, in percent")]
    pub current_rate_pct: f64,
    pub max_rate_pct: f64,
    pub min_rate_pct: f64,
    pub top_provinces: Vec<String>,
    pub bottom_provinces: Vec<String>,
    #[schemars(
        description = "One of: strong increase, mild increase, stable, mild decrease, strong decrease"
    )]
    pub trend_direction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvincePopulation {
    pub province: String,
    pub population: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeShare {
    pub age_group: String,
    pub total: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationSummary {
    pub year: i32,
    pub total_population: f64,
    pub province_count: usize,
    pub top_provinces: Vec<ProvincePopulation>,
    pub bottom_provinces: Vec<ProvincePopulation>,
    pub age_groups: Vec<AgeShare>,
    /// Males per 100 females.
    pub sex_ratio: Option<f64>,
    pub projection: Option<PopulationProjection>,
}

pub fn summarize_population(
    datasets: &Datasets,
    year: i32,
    projection_years: u32,
) -> PopulationSummary {
    let provinces = rows_for_year(&datasets.population_by_province, year);
    let total_population: f64 = provinces.iter().map(|row| row.population).sum();

    let ranked_provinces: Vec<ProvincePopulation> = provinces
        .iter()
        .map(|row| ProvincePopulation {
            province: row.province.clone(),
            population: row.population,
        })
        .collect();

    let mut top = ranked_provinces.clone();
    top.sort_by(|a, b| b.population.total_cmp(&a.population));
    top.truncate(RANKING_SIZE);

    let mut bottom = ranked_provinces;
    bottom.sort_by(|a, b| a.population.total_cmp(&b.population));
    bottom.truncate(RANKING_SIZE);

    PopulationSummary {
        year,
        total_population,
        province_count: provinces.len(),
        top_provinces: top,
        bottom_provinces: bottom,
        age_groups: age_shares(&datasets.age_structure),
        sex_ratio: sex_ratio(&datasets.sex_ratio),
        projection: project_population(&datasets.population_trend, projection_years),
    }
}

/// Rows of the requested year, or every row when none carries that year.
fn rows_for_year(rows: &[ProvincePopulationRow], year: i32) -> Vec<&ProvincePopulationRow> {
    let matching: Vec<&ProvincePopulationRow> = rows.iter().filter(|r| r.year == year).collect();
    if matching.is_empty() {
        rows.iter().collect()
    } else {
        matching
    }
}

pub fn age_shares(rows: &[AgeGroupRow]) -> Vec<AgeShare> {
    let total: f64 = rows.iter().map(|row| row.total).sum();
    rows.iter()
        .map(|row| AgeShare {
            age_group: row.age_group.clone(),
            total: row.total,
            percent: percent(row.total, total),
        })
        .collect()
}

pub fn sex_ratio(rows: &[SexRatioRow]) -> Option<f64> {
    let males: f64 = rows.iter().map(|row| row.male).sum();
    let females: f64 = rows.iter().map(|row| row.female).sum();
    if females > 0.0 {
        return Some(males / females * 100.0);
    }

    let supplied: Vec<f64> = rows.iter().filter_map(|row| row.ratio).collect();
    if supplied.is_empty() {
        None
    } else {
        Some(supplied.iter().sum::<f64>() / supplied.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trend(points: &[(i32, f64)]) -> Vec<PopulationTrendRow> {
        points
            .iter()
            .map(|&(year, population)| PopulationTrendRow { year, population })
            .collect()
    }

    fn rate_trend(points: &[(i32, f64)]) -> Vec<InternetTrendRow> {
        points
            .iter()
            .map(|&(year, rate)| InternetTrendRow { year, rate })
            .collect()
    }

    fn access(province: &str, hh: f64, with_net: f64, rate: Option<f64>) -> InternetAccessRow {
        InternetAccessRow {
            province: province.to_string(),
            total_households: hh,
            households_with_internet: with_net,
            rate,
        }
    }

    fn area(area_type: &str, population: f64, households: f64) -> UrbanRuralRow {
        UrbanRuralRow {
            province: "Test".to_string(),
            area_type: area_type.to_string(),
            population,
            households,
        }
    }

    #[test]
    fn test_projection_growth_rate_and_compounding() {
        let projection =
            project_population(&trend(&[(2009, 90_000_000.0), (2019, 96_000_000.0)]), 3).unwrap();

        let expected_rate = (96.0f64 / 90.0).powf(1.0 / 10.0) - 1.0;
        assert!((projection.annual_growth_rate - expected_rate).abs() < 1e-12);
        assert!((projection.annual_growth_rate - 0.00642).abs() < 1e-4);
        assert_eq!(projection.base_year, 2019);
        assert_eq!(projection.projection_years, 3);
        assert_eq!(projection.series.len(), 3);

        let mut expected = 96_000_000.0f64;
        for (i, point) in projection.series.iter().enumerate() {
            expected = (expected * (1.0 + expected_rate)).round();
            assert_eq!(point.year, 2020 + i as i32);
            assert_eq!(point.population, expected);
        }
        assert_eq!(projection.projected_population, expected);
    }

    #[test]
    fn test_projection_sorts_by_year() {
        let projection =
            project_population(&trend(&[(2019, 96_000_000.0), (2009, 90_000_000.0)]), 1).unwrap();
        assert!(projection.annual_growth_rate > 0.0);
        assert_eq!(projection.base_year, 2019);
    }

    #[test]
    fn test_projection_requires_two_points() {
        assert!(project_population(&[], 5).is_none());
        assert!(project_population(&trend(&[(2019, 96_000_000.0)]), 5).is_none());
    }

    #[test]
    fn test_projection_guards_zero_span_and_zero_base() {
        let same_year = project_population(&trend(&[(2019, 10.0), (2019, 20.0)]), 2).unwrap();
        assert_eq!(same_year.annual_growth_rate, 0.0);

        let zero_first = project_population(&trend(&[(2009, 0.0), (2019, 20.0)]), 2).unwrap();
        assert_eq!(zero_first.annual_growth_rate, 0.0);
        assert_eq!(zero_first.projected_population, 20.0);
    }

    #[test]
    fn test_projection_with_extreme_years_does_not_overflow() {
        let projection =
            project_population(&trend(&[(i32::MAX, 100.0), (2019, 90.0)]), 3).unwrap();
        assert_eq!(projection.base_year, i32::MAX);
        assert!(projection.series.is_empty());
        assert_eq!(projection.projected_population, 100.0);
        assert!(projection.annual_growth_rate.is_finite());

        let projection =
            project_population(&trend(&[(i32::MIN, 100.0), (2019, 90.0)]), 1).unwrap();
        assert_eq!(projection.series[0].year, 2020);
        assert!(projection.annual_growth_rate.is_finite());
    }

    #[test]
    fn test_projection_with_zero_years_keeps_base_value() {
        let projection = project_population(&trend(&[(2009, 10.0), (2019, 20.0)]), 0).unwrap();
        assert!(projection.series.is_empty());
        assert_eq!(projection.projected_population, 20.0);
    }

    #[test]
    fn test_trend_direction_thresholds() {
        assert_eq!(TrendDirection::classify(6.0), TrendDirection::StrongIncrease);
        assert_eq!(TrendDirection::classify(5.0), TrendDirection::MildIncrease);
        assert_eq!(TrendDirection::classify(2.0), TrendDirection::MildIncrease);
        assert_eq!(TrendDirection::classify(1.0), TrendDirection::Stable);
        assert_eq!(TrendDirection::classify(0.0), TrendDirection::Stable);
        assert_eq!(TrendDirection::classify(-1.0), TrendDirection::Stable);
        assert_eq!(TrendDirection::classify(-2.0), TrendDirection::MildDecrease);
        assert_eq!(TrendDirection::classify(-5.0), TrendDirection::MildDecrease);
        assert_eq!(TrendDirection::classify(-6.0), TrendDirection::StrongDecrease);
    }

    #[test]
    fn test_trend_summary_average_change() {
        let summary =
            summarize_trend(&rate_trend(&[(2022, 70.0), (2020, 60.0), (2021, 66.0)])).unwrap();
        assert_eq!(summary.first_year, 2020);
        assert_eq!(summary.last_year, 2022);
        assert_eq!(summary.delta, 10.0);
        assert_eq!(summary.average_change_per_year, 5.0);
        assert_eq!(summary.direction, TrendDirection::StrongIncrease);

        let single = summarize_trend(&rate_trend(&[(2020, 60.0)])).unwrap();
        assert_eq!(single.delta, 0.0);
        assert_eq!(single.direction, TrendDirection::Stable);

        assert!(summarize_trend(&[]).is_none());
    }

    #[test]
    fn test_trend_direction_serializes_as_label() {
        let json = serde_json::to_string(&TrendDirection::MildDecrease).unwrap();
        assert_eq!(json, "\"mild decrease\"");
    }

    #[test]
    fn test_urban_rural_percentages_sum_to_100() {
        let summary = aggregate_urban_rural(&[
            area("Urban", 300.0, 90.0),
            area("Nông thôn", 600.0, 150.0),
            area("thành thị", 100.0, 30.0),
            area("", 50.0, 10.0),
        ]);

        assert_eq!(summary.total_population, 1050.0);
        assert_eq!(summary.groups.len(), 3);
        assert_eq!(summary.groups[0].area_type, "urban");
        assert_eq!(summary.groups[0].population, 400.0);
        assert_eq!(summary.groups[2].area_type, OTHER_AREA);

        let total: f64 = summary.groups.iter().map(|g| g.population_percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
        let total: f64 = summary.groups.iter().map(|g| g.household_percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_urban_rural_zero_total() {
        let summary = aggregate_urban_rural(&[area("urban", 0.0, 0.0), area("rural", 0.0, 0.0)]);
        assert!(summary.groups.iter().all(|g| g.population_percent == 0.0));

        let insights = summary.insights();
        assert_eq!(insights.urban_population_share, 0.0);
        assert_eq!(insights.dominant_area_population, "");
    }

    #[test]
    fn test_urban_rural_insights() {
        let summary =
            aggregate_urban_rural(&[area("urban", 400.0, 200.0), area("rural", 600.0, 200.0)]);
        let insights = summary.insights();
        assert_eq!(insights.urban_population_share, 40.0);
        assert_eq!(insights.rural_population_share, 60.0);
        assert_eq!(insights.urban_household_share, 50.0);
        assert_eq!(insights.dominant_area_population, "rural");
        // Tie on households: the first group wins.
        assert_eq!(insights.dominant_area_household, "urban");
    }

    #[test]
    fn test_internet_overall_rate_uses_grand_totals() {
        let summary = aggregate_internet(
            &[access("A", 100.0, 40.0, None), access("B", 50.0, 45.0, None)],
            &[],
        );
        assert!((summary.overall_rate - 85.0 / 150.0 * 100.0).abs() < 1e-12);
        assert_eq!(summary.insights().current_rate_pct, 56.67);
        // The mean of per-row rates would be 65%.
        assert!((summary.overall_rate - 65.0).abs() > 1.0);
        assert_eq!(summary.max_rate, 90.0);
        assert_eq!(summary.min_rate, 40.0);
    }

    #[test]
    fn test_internet_supplied_rate_used_when_positive() {
        assert_eq!(row_rate(&access("A", 100.0, 40.0, Some(55.0))), 55.0);
        assert_eq!(row_rate(&access("A", 100.0, 40.0, Some(0.0))), 40.0);
        assert_eq!(row_rate(&access("A", 100.0, 40.0, Some(-3.0))), 40.0);
        assert_eq!(row_rate(&access("A", 0.0, 40.0, None)), 0.0);
    }

    #[test]
    fn test_internet_rankings_are_stable() {
        let rows = vec![
            access("A", 100.0, 50.0, None),
            access("B", 100.0, 70.0, None),
            access("C", 100.0, 50.0, None),
            access("D", 100.0, 90.0, None),
            access("E", 100.0, 50.0, None),
            access("F", 100.0, 10.0, None),
            access("G", 100.0, 70.0, None),
        ];
        let summary = aggregate_internet(&rows, &[]);

        let top: Vec<&str> = summary.top5.iter().map(|p| p.province.as_str()).collect();
        assert_eq!(top, vec!["D", "B", "G", "A", "C"]);

        let bottom: Vec<&str> = summary.bottom5.iter().map(|p| p.province.as_str()).collect();
        assert_eq!(bottom, vec!["F", "A", "C", "E", "B"]);
    }

    #[test]
    fn test_internet_empty_input() {
        let summary = aggregate_internet(&[], &[]);
        assert_eq!(summary.overall_rate, 0.0);
        assert_eq!(summary.max_rate, 0.0);
        assert!(summary.top5.is_empty());
        assert_eq!(summary.insights().trend_direction, "");
    }

    #[test]
    fn test_population_summary() {
        let mut datasets = Datasets::default();
        datasets.population_by_province = vec![
            ProvincePopulationRow {
                province: "A".into(),
                year: 2024,
                population: 100.0,
            },
            ProvincePopulationRow {
                province: "B".into(),
                year: 2024,
                population: 300.0,
            },
            ProvincePopulationRow {
                province: "C".into(),
                year: 2023,
                population: 999.0,
            },
        ];
        datasets.sex_ratio = vec![SexRatioRow {
            province: String::new(),
            year: 2024,
            male: 99.0,
            female: 100.0,
            ratio: None,
        }];
        datasets.age_structure = vec![
            AgeGroupRow {
                age_group: "0-14".into(),
                male: 0.0,
                female: 0.0,
                total: 25.0,
            },
            AgeGroupRow {
                age_group: "15+".into(),
                male: 0.0,
                female: 0.0,
                total: 75.0,
            },
        ];

        let summary = summarize_population(&datasets, 2024, 5);
        assert_eq!(summary.total_population, 400.0);
        assert_eq!(summary.province_count, 2);
        assert_eq!(summary.top_provinces[0].province, "B");
        assert_eq!(summary.bottom_provinces[0].province, "A");
        assert_eq!(summary.sex_ratio, Some(99.0));
        assert_eq!(summary.age_groups[1].percent, 75.0);
        assert!(summary.projection.is_none());
    }

    #[test]
    fn test_sex_ratio_falls_back_to_supplied_ratio() {
        let rows = vec![
            SexRatioRow {
                ratio: Some(98.0),
                ..Default::default()
            },
            SexRatioRow {
                ratio: Some(100.0),
                ..Default::default()
            },
        ];
        assert_eq!(sex_ratio(&rows), Some(99.0));
        assert_eq!(sex_ratio(&[]), None);
    }
}

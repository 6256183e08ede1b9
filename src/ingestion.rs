//! Conversion of loosely-typed JSON rows into typed dataset records.
//!
//! All coercion happens here, once: downstream aggregation never re-checks
//! for missing or malformed values.

use crate::schema::{
    AgeGroupRow, InternetAccessRow, InternetTrendRow, PopulationTrendRow, ProvincePopulationRow,
    SexRatioRow, UrbanRuralRow,
};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

/// A typed record that can be built from any JSON value without failing.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Self;

    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(row) => Self::from_row(row),
            _ => Self::from_row(&Row::new()),
        }
    }
}

/// Reads the first present alias as a number. Missing or invalid values yield `0.0`.
pub fn number(row: &Row, keys: &[&str]) -> f64 {
    optional_number(row, keys).unwrap_or(0.0)
}

/// Reads the first present alias as a finite number.
pub fn optional_number(row: &Row, keys: &[&str]) -> Option<f64> {
    let value = first_present(row, keys)?;
    coerce_number(value)
}

pub fn coerce_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| *c != ',' && *c != '_')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

pub fn text(row: &Row, keys: &[&str]) -> String {
    match first_present(row, keys) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Row years outside this range are treated as absent.
pub const ROW_YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

/// Reads the row's year. Fractional or implausible years yield `0`.
pub fn year(row: &Row) -> i32 {
    let value = number(row, &["year", "nam"]);
    let (min, max) = (*ROW_YEAR_RANGE.start(), *ROW_YEAR_RANGE.end());
    if value.fract() == 0.0 && value >= f64::from(min) && value <= f64::from(max) {
        value as i32
    } else {
        0
    }
}

fn first_present<'a>(row: &'a Row, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| row.get(*key))
        .find(|value| !value.is_null())
}

impl FromRow for ProvincePopulationRow {
    fn from_row(row: &Row) -> Self {
        Self {
            province: text(row, &["province", "region", "name"]),
            year: year(row),
            population: number(row, &["population", "total_population", "value"]),
        }
    }
}

impl FromRow for PopulationTrendRow {
    fn from_row(row: &Row) -> Self {
        Self {
            year: year(row),
            population: number(row, &["population", "total_population", "value"]),
        }
    }
}

impl FromRow for AgeGroupRow {
    fn from_row(row: &Row) -> Self {
        let male = number(row, &["male", "males"]);
        let female = number(row, &["female", "females"]);
        let total = match number(row, &["total", "population"]) {
            t if t > 0.0 => t,
            _ => male + female,
        };
        Self {
            age_group: text(row, &["age_group", "group", "label"]),
            male,
            female,
            total,
        }
    }
}

impl FromRow for SexRatioRow {
    fn from_row(row: &Row) -> Self {
        Self {
            province: text(row, &["province", "region", "name"]),
            year: year(row),
            male: number(row, &["male", "males"]),
            female: number(row, &["female", "females"]),
            ratio: optional_number(row, &["ratio", "sex_ratio"]),
        }
    }
}

impl FromRow for UrbanRuralRow {
    fn from_row(row: &Row) -> Self {
        Self {
            province: text(row, &["province", "region", "name"]),
            area_type: text(row, &["area_type", "area", "type"]),
            population: number(row, &["population", "total_population"]),
            households: number(row, &["households", "total_households"]),
        }
    }
}

impl FromRow for InternetAccessRow {
    fn from_row(row: &Row) -> Self {
        Self {
            province: text(row, &["province", "region", "name"]),
            total_households: number(row, &["total_households", "households", "hh"]),
            households_with_internet: number(
                row,
                &["households_with_internet", "with_internet", "withNet"],
            ),
            rate: optional_number(row, &["rate", "internet_rate"]),
        }
    }
}

impl FromRow for InternetTrendRow {
    fn from_row(row: &Row) -> Self {
        Self {
            year: year(row),
            rate: number(row, &["rate", "internet_rate"]),
        }
    }
}

/// Accepts a year as a JSON number or numeric string; `null`/blank means absent.
pub fn lenient_year<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(other) => match coerce_number(&other) {
            Some(n) if n.fract() == 0.0 && n.abs() < 100_000.0 => Ok(Some(n as i32)),
            _ => Err(de::Error::custom(format!(
                "year must be a whole number, got {}",
                other
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_number_coercion() {
        let r = row(json!({
            "a": 12.5,
            "b": " 1,234 ",
            "c": "abc",
            "d": true,
            "e": null,
        }));
        assert_eq!(number(&r, &["a"]), 12.5);
        assert_eq!(number(&r, &["b"]), 1234.0);
        assert_eq!(number(&r, &["c"]), 0.0);
        assert_eq!(number(&r, &["d"]), 0.0);
        assert_eq!(number(&r, &["e"]), 0.0);
        assert_eq!(number(&r, &["missing"]), 0.0);
        assert_eq!(optional_number(&r, &["c"]), None);
    }

    #[test]
    fn test_aliases_are_checked_in_order() {
        let r = row(json!({"value": 5, "total_population": null, "population": "7"}));
        assert_eq!(number(&r, &["population", "total_population", "value"]), 7.0);

        let r = row(json!({"total_population": null, "value": 5}));
        assert_eq!(number(&r, &["population", "total_population", "value"]), 5.0);
    }

    #[test]
    fn test_internet_row_aliases() {
        let parsed = InternetAccessRow::from_value(&json!({"hh": 100, "withNet": 40}));
        assert_eq!(parsed.total_households, 100.0);
        assert_eq!(parsed.households_with_internet, 40.0);
        assert_eq!(parsed.rate, None);
        assert_eq!(parsed.province, "");
    }

    #[test]
    fn test_non_object_row_becomes_default() {
        let parsed = PopulationTrendRow::from_value(&json!("garbage"));
        assert_eq!(parsed, PopulationTrendRow::default());
    }

    #[test]
    fn test_age_group_total_derived_from_sexes() {
        let parsed = AgeGroupRow::from_value(&json!({"group": "0-14", "male": 10, "female": 12}));
        assert_eq!(parsed.total, 22.0);
        assert_eq!(parsed.age_group, "0-14");
    }

    #[test]
    fn test_year_parsing() {
        assert_eq!(year(&row(json!({"year": "2019"}))), 2019);
        assert_eq!(year(&row(json!({"year": 2019.5}))), 0);
        assert_eq!(year(&row(json!({}))), 0);
        assert_eq!(year(&row(json!({"year": 2147483647}))), 0);
        assert_eq!(year(&row(json!({"year": -2147483648i64}))), 0);
        assert_eq!(year(&row(json!({"nam": 9999}))), 9999);
    }
}

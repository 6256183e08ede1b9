//! Prompt composition for the report generators and the Q&A assistant.
//!
//! Prompts are deterministic: the same summary always yields the same text,
//! which is echoed back to callers as `raw_prompt`.

use crate::aggregator::{
    InternetInsights, InternetSummary, PopulationProjection, PopulationSummary, ProvinceRate,
    TrendSummary, UrbanRuralInsights, UrbanRuralSummary, RANKING_SIZE,
};
use crate::error::Result;
use crate::llm::types::ChatMessage;
use crate::schema::{DatasetName, Datasets, Topic};
use crate::utils::{format_count, truncate_chars};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_AUDIENCE: &str = "policy makers";

/// Age groups rendered into a prompt; the rest are summarised by count.
const MAX_AGE_GROUPS: usize = 10;

pub const REPORT_SYSTEM_PROMPT: &str = "You are a senior demographic analyst at a national statistics office. \
You interpret census aggregates accurately, never invent figures that are not in the data you are given, \
and always answer with a single JSON object that follows the requested schema.";

pub const ASSISTANT_SYSTEM_PROMPT: &str = "You are a census data assistant. \
Answer questions about population, urban and rural areas, and internet access using only the data excerpts provided. \
When the data does not cover the question, say so plainly.";

/// Geographic scope of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    National,
    Region(String),
}

impl Scope {
    pub fn from_province(province: Option<&str>) -> Self {
        match province.map(str::trim) {
            Some(name) if !name.is_empty() => Self::Region(name.to_string()),
            _ => Self::National,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::National => "nationwide (all provinces)".to_string(),
            Self::Region(name) => format!("the province of {}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub year: i32,
    pub scope: Scope,
    pub language: String,
    pub audience: String,
}

impl PromptContext {
    pub fn new(
        year: i32,
        province: Option<&str>,
        language: Option<&str>,
        audience: Option<&str>,
    ) -> Self {
        let or_default = |value: Option<&str>, default: &str| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };
        Self {
            year,
            scope: Scope::from_province(province),
            language: or_default(language, DEFAULT_LANGUAGE),
            audience: or_default(audience, DEFAULT_AUDIENCE),
        }
    }

    fn role_line(&self, subject: &str) -> String {
        format!(
            "You are preparing a short {} report for {}. Write every text field in {}.",
            subject, self.audience, self.language
        )
    }

    fn scope_line(&self) -> String {
        format!("Scope: {}. Reference year: {}.", self.scope.describe(), self.year)
    }
}

/// A composed instruction plus any conversation it continues.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Prompt {
    lines: Vec<String>,
    history: Vec<ChatMessage>,
}

impl Prompt {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }
}

/// Reply shape advertised for population reports.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PopulationReply {
    #[schemars(description = "3-5 sentence narrative summary")]
    pub summary: String,
    #[schemars(description = "3-5 short findings, one sentence each")]
    pub highlights: Vec<String>,
    pub projection: Option<PopulationProjection>,
}

/// Reply shape advertised for urban/rural reports.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UrbanRuralReply {
    pub summary: String,
    pub highlights: Vec<String>,
    pub insights: UrbanRuralInsights,
}

/// Reply shape advertised for internet-access reports.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InternetReply {
    pub summary: String,
    pub highlights: Vec<String>,
    pub insights: InternetInsights,
}

fn output_contract<T: JsonSchema>(fields: &[&str]) -> Result<Vec<String>> {
    let schema = serde_json::to_string(&schema_for!(T))?;
    let mut lines = vec![
        String::new(),
        "OUTPUT FORMAT (mandatory)".to_string(),
        "Return exactly one JSON object with these fields and no others:".to_string(),
    ];
    lines.extend(fields.iter().map(|field| format!("- {}", field)));
    lines.push(format!("JSON Schema: {}", schema));
    lines.push("Do not write any text before or after the JSON object.".to_string());
    lines.push("Do not wrap the JSON in code fences or Markdown.".to_string());
    Ok(lines)
}

fn ranked_line<T>(label: &str, items: &[T], render: impl Fn(&T) -> String) -> String {
    if items.is_empty() {
        return format!("- {}: no data", label);
    }
    let rendered: Vec<String> = items.iter().take(RANKING_SIZE).map(render).collect();
    format!("- {}: {}", label, rendered.join("; "))
}

fn province_name(name: &str) -> &str {
    if name.is_empty() {
        "(unnamed)"
    } else {
        name
    }
}

fn projection_lines(projection: Option<&PopulationProjection>) -> Vec<String> {
    let Some(projection) = projection else {
        return vec!["- Projection: not available (fewer than two trend points)".to_string()];
    };
    let series: Vec<String> = projection
        .series
        .iter()
        .map(|point| format!("{}: {}", point.year, format_count(point.population)))
        .collect();
    vec![
        format!(
            "- Projection: base year {}, compound annual growth {:.3}%, projected population after {} year(s): {}",
            projection.base_year,
            projection.annual_growth_rate * 100.0,
            projection.projection_years,
            format_count(projection.projected_population)
        ),
        format!("- Projected series: {}", series.join("; ")),
    ]
}

pub fn population_prompt(ctx: &PromptContext, summary: &PopulationSummary) -> Result<Prompt> {
    let mut lines = vec![
        ctx.role_line("population"),
        ctx.scope_line(),
        String::new(),
        "DATA SUMMARY".to_string(),
        format!(
            "- Total population: {} across {} province(s)",
            format_count(summary.total_population),
            summary.province_count
        ),
        ranked_line("Most populous", &summary.top_provinces, |p| {
            format!("{} ({})", province_name(&p.province), format_count(p.population))
        }),
        ranked_line("Least populous", &summary.bottom_provinces, |p| {
            format!("{} ({})", province_name(&p.province), format_count(p.population))
        }),
    ];

    if summary.age_groups.is_empty() {
        lines.push("- Age structure: no data".to_string());
    } else {
        let shown: Vec<String> = summary
            .age_groups
            .iter()
            .take(MAX_AGE_GROUPS)
            .map(|group| format!("{} {:.1}%", group.age_group, group.percent))
            .collect();
        let hidden = summary.age_groups.len().saturating_sub(MAX_AGE_GROUPS);
        let suffix = if hidden > 0 {
            format!(" (+{} more groups)", hidden)
        } else {
            String::new()
        };
        lines.push(format!("- Age structure: {}{}", shown.join(", "), suffix));
    }

    lines.push(match summary.sex_ratio {
        Some(ratio) => format!("- Sex ratio: {:.1} males per 100 females", ratio),
        None => "- Sex ratio: no data".to_string(),
    });
    lines.extend(projection_lines(summary.projection.as_ref()));

    lines.push(String::new());
    lines.push("TASK".to_string());
    lines.push(
        "Describe the size and distribution of the population, its age and sex structure, and what the projection implies for planning."
            .to_string(),
    );
    lines.push("Copy the projection figures exactly as given; do not recompute them.".to_string());
    lines.extend(output_contract::<PopulationReply>(&[
        "summary: string",
        "highlights: array of strings",
        "projection: object {base_year: integer, projection_years: integer, annual_growth_rate: number, projected_population: number, series: array of {year: integer, population: number}} or null",
    ])?);

    Ok(Prompt::from_lines(lines))
}

pub fn urban_rural_prompt(
    ctx: &PromptContext,
    summary: &UrbanRuralSummary,
    insights: &UrbanRuralInsights,
) -> Result<Prompt> {
    let mut lines = vec![
        ctx.role_line("urban/rural distribution"),
        ctx.scope_line(),
        String::new(),
        "DATA SUMMARY".to_string(),
        format!(
            "- Total population: {}; total households: {}",
            format_count(summary.total_population),
            format_count(summary.total_households)
        ),
    ];

    if summary.groups.is_empty() {
        lines.push("- Area groups: no data".to_string());
    }
    for group in &summary.groups {
        lines.push(format!(
            "- {}: population {} ({:.2}%), households {} ({:.2}%)",
            group.area_type,
            format_count(group.population),
            group.population_percent,
            format_count(group.households),
            group.household_percent
        ));
    }
    lines.push(format!(
        "- Dominant area by population: {}; by households: {}",
        or_none(&insights.dominant_area_population),
        or_none(&insights.dominant_area_household)
    ));

    lines.push(String::new());
    lines.push("TASK".to_string());
    lines.push(
        "Explain the balance between urban and rural areas, for both people and households, and what it suggests about urbanisation."
            .to_string(),
    );
    lines.extend(output_contract::<UrbanRuralReply>(&[
        "summary: string",
        "highlights: array of strings",
        "insights: object {urban_population_share: number, rural_population_share: number, urban_household_share: number, rural_household_share: number, dominant_area_population: string, dominant_area_household: string}",
    ])?);

    Ok(Prompt::from_lines(lines))
}

fn or_none(value: &str) -> &str {
    if value.is_empty() {
        "n/a"
    } else {
        value
    }
}

fn rate_entry(rate: &ProvinceRate) -> String {
    format!("{} {:.2}%", province_name(&rate.province), rate.rate)
}

fn trend_line(trend: Option<&TrendSummary>) -> String {
    match trend {
        Some(trend) => format!(
            "- Trend {}-{}: {:.2}% -> {:.2}% ({:+.2} points, {:+.2} per year), {}",
            trend.first_year,
            trend.last_year,
            trend.first_value,
            trend.last_value,
            trend.delta,
            trend.average_change_per_year,
            trend.direction.label()
        ),
        None => "- Trend: no data".to_string(),
    }
}

pub fn internet_prompt(
    ctx: &PromptContext,
    summary: &InternetSummary,
    insights: &InternetInsights,
) -> Result<Prompt> {
    let mut lines = vec![
        ctx.role_line("household internet access"),
        ctx.scope_line(),
        String::new(),
        "DATA SUMMARY".to_string(),
        format!(
            "- Households with internet: {} of {} ({:.2}%)",
            format_count(summary.households_with_internet),
            format_count(summary.total_households),
            insights.current_rate_pct
        ),
        format!(
            "- Highest provincial rate: {:.2}%; lowest: {:.2}%",
            insights.max_rate_pct, insights.min_rate_pct
        ),
        ranked_line("Top provinces", &summary.top5, rate_entry),
        ranked_line("Bottom provinces", &summary.bottom5, rate_entry),
        trend_line(summary.trend.as_ref()),
        String::new(),
        "TASK".to_string(),
        "Assess the current level of household internet access, the gap between leading and lagging provinces, and the direction of change."
            .to_string(),
    ];
    lines.extend(output_contract::<InternetReply>(&[
        "summary: string",
        "highlights: array of strings",
        "insights: object {current_rate_pct: number, max_rate_pct: number, min_rate_pct: number, top_provinces: array of strings, bottom_provinces: array of strings, trend_direction: string}",
    ])?);

    Ok(Prompt::from_lines(lines))
}

/// Everything the assistant prompt needs besides the datasets themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionContext {
    pub question: String,
    pub topic: Topic,
    pub region: Option<String>,
    pub year: i32,
}

pub fn qa_prompt(
    context: &QuestionContext,
    datasets: &Datasets,
    excerpt_chars: usize,
    history: Vec<ChatMessage>,
) -> Result<Prompt> {
    let mut lines = vec![
        "Answer the user's question using the census data below.".to_string(),
        format!(
            "Detected topic: {}. Region: {}. Year: {}.",
            context.topic,
            context.region.as_deref().unwrap_or("nationwide"),
            context.year
        ),
        String::new(),
        format!(
            "DATA EXCERPTS (JSON, each cut to at most {} characters)",
            excerpt_chars
        ),
    ];

    for &name in context.topic.datasets() {
        lines.push(dataset_excerpt(datasets, name, excerpt_chars)?);
    }

    lines.push(String::new());
    lines.push("QUESTION".to_string());
    lines.push(context.question.trim().to_string());
    lines.push(String::new());
    lines.push("OUTPUT FORMAT (mandatory)".to_string());
    lines.push(
        "Reply in the language of the question with a short plain-text answer, citing figures from the excerpts."
            .to_string(),
    );
    lines.push("Do not return JSON, code fences, or Markdown tables.".to_string());

    Ok(Prompt::from_lines(lines).with_history(history))
}

fn dataset_excerpt(datasets: &Datasets, name: DatasetName, budget: usize) -> Result<String> {
    let rows = datasets.raw_rows(name);
    if rows.is_empty() {
        return Ok(format!("[{}] no data", name));
    }
    let json = serde_json::to_string(rows)?;
    let (excerpt, truncated) = truncate_chars(&json, budget);
    Ok(if truncated {
        format!("[{}] {}…(truncated)", name, excerpt)
    } else {
        format!("[{}] {}", name, excerpt)
    })
}

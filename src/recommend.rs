//! Storage, layout and schedule recommendations derived from a [`TableProfile`].
//!
//! Rules always produce an answer. An injected [`Advisor`] may propose its own
//! recommendation as loose JSON; the answer is normalised into the canonical
//! shape and any answer that cannot be salvaged falls back to the rules.

use std::fmt::{self, Write as _};

use anyhow::{Context, Result, anyhow, bail};
use clap::ValueEnum;
use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use crate::{
    ddl::{self, DdlHints, DdlOutput, TargetSystem},
    profile::TableProfile,
};

pub const DEFAULT_TABLE: &str = "data";
pub const DEFAULT_WINDOW: &str = "last_30d";
pub const ANALYTICAL_ROWS: usize = 1_000_000;
pub const FILE_STORE_ROWS: usize = 5_000_000;
pub const FALLBACK_RISK: &str = "advisor unavailable or answer invalid; rule-based recommendation applied";

const EXTRACT_SOURCE_KEYS: &[&str] = &[
    "type", "format", "name", "path", "dsn", "host", "port", "database", "user", "password",
];
const TEMPORAL_HINTS: &[&str] = &["date", "time", "day", "ts"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadMode {
    /// Transactional access, many point reads and writes
    Oltp,
    /// Analytical scans and aggregations
    Olap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Latency {
    Hour,
    #[default]
    Day,
    Week,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<WorkloadMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<Latency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
}

impl Preferences {
    fn table_name(&self) -> String {
        self.table_name
            .clone()
            .unwrap_or_else(|| DEFAULT_TABLE.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableHints {
    pub table_name: String,
    pub primary_key: Option<String>,
    pub partition_by: Option<String>,
    pub order_by: Vec<String>,
}

impl TableHints {
    pub fn to_ddl_hints(&self) -> DdlHints {
        DdlHints {
            primary_key: self.primary_key.clone(),
            partition_by: self.partition_by.clone(),
            order_by: self.order_by.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "params")]
pub enum PipelineStep {
    Extract { source: JsonValue },
    FilterByDate { column: String, window: String },
    Load { target: TargetSystem, table: String },
}

impl PipelineStep {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStep::Extract { .. } => "Extract",
            PipelineStep::FilterByDate { .. } => "FilterByDate",
            PipelineStep::Load { .. } => "Load",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub dag: Vec<PipelineStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub cron: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Rules,
    Advisor,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Rules => "rules",
            Origin::Advisor => "advisor",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub target_store: TargetSystem,
    pub ddl_hints: TableHints,
    pub pipeline: Pipeline,
    pub schedule: Schedule,
    pub risks: Vec<String>,
    pub origin: Origin,
}

impl Recommendation {
    /// Render the recommended table for the recommended store.
    pub fn ddl(&self, profile: &TableProfile) -> DdlOutput {
        ddl::generate_ddl(
            &self.ddl_hints.table_name,
            &profile.columns,
            self.target_store,
            &self.ddl_hints.to_ddl_hints(),
        )
    }
}

/// External source of recommendations, such as a language model service.
/// Answers are loose JSON and are normalised before use.
pub trait Advisor: Send + Sync {
    fn advise(&self, profile: &TableProfile, prefs: &Preferences) -> Result<JsonValue>;
}

#[derive(Default)]
pub struct Recommender {
    advisor: Option<Box<dyn Advisor>>,
}

impl Recommender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_advisor(mut self, advisor: Box<dyn Advisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn recommend(&self, profile: &TableProfile, prefs: &Preferences) -> Recommendation {
        let Some(advisor) = &self.advisor else {
            return recommend_by_rules(profile, prefs);
        };
        let answer = advisor
            .advise(profile, prefs)
            .context("advisor request failed")
            .and_then(|answer| normalize_answer(answer, profile, prefs));
        match answer {
            Ok(recommendation) => recommendation,
            Err(err) => {
                warn!("Falling back to rule-based recommendation: {err:#}");
                let mut recommendation = recommend_by_rules(profile, prefs);
                recommendation.risks.push(FALLBACK_RISK.to_string());
                recommendation
            }
        }
    }
}

pub fn recommend_by_rules(profile: &TableProfile, prefs: &Preferences) -> Recommendation {
    let target_store = choose_store(profile, prefs);
    let ddl_hints = table_hints(profile, prefs);
    let pipeline = build_pipeline(profile, target_store, &ddl_hints);
    let schedule = schedule_for(prefs.latency);
    debug!(
        "Rules chose {target_store} for {} row(s), partition {:?}",
        profile.rows, ddl_hints.partition_by
    );
    Recommendation {
        target_store,
        ddl_hints,
        pipeline,
        schedule,
        risks: Vec::new(),
        origin: Origin::Rules,
    }
}

pub fn choose_store(profile: &TableProfile, prefs: &Preferences) -> TargetSystem {
    if prefs.mode == Some(WorkloadMode::Oltp) {
        return TargetSystem::Postgres;
    }
    if profile.rows >= FILE_STORE_ROWS {
        return TargetSystem::Parquet;
    }
    if profile.rows >= ANALYTICAL_ROWS || profile.is_time_series {
        return TargetSystem::ClickHouse;
    }
    TargetSystem::Postgres
}

pub fn table_hints(profile: &TableProfile, prefs: &Preferences) -> TableHints {
    let primary_key = prefs.primary_key.clone().or_else(|| {
        profile
            .columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case("id"))
            .map(|column| column.name.clone())
    });
    let partition_by = profile
        .temporal_columns()
        .next()
        .or_else(|| {
            profile.columns.iter().find(|column| {
                let name = column.name.to_ascii_lowercase();
                name.contains("date") || name.contains("time")
            })
        })
        .map(|column| column.name.clone());
    let order_by = match (&primary_key, &partition_by) {
        (Some(key), _) => vec![key.clone()],
        (None, Some(partition)) => vec![partition.clone()],
        (None, None) => profile
            .columns
            .first()
            .map(|column| vec![column.name.clone()])
            .unwrap_or_default(),
    };
    TableHints {
        table_name: prefs.table_name(),
        primary_key,
        partition_by,
        order_by,
    }
}

pub fn build_pipeline(profile: &TableProfile, target: TargetSystem, hints: &TableHints) -> Pipeline {
    let mut dag = vec![PipelineStep::Extract {
        source: extract_source(profile),
    }];
    if let Some(column) = &hints.partition_by {
        dag.push(PipelineStep::FilterByDate {
            column: column.clone(),
            window: DEFAULT_WINDOW.to_string(),
        });
    }
    dag.push(PipelineStep::Load {
        target,
        table: hints.table_name.clone(),
    });
    Pipeline { dag }
}

pub fn schedule_for(latency: Option<Latency>) -> Schedule {
    let (cron, reason) = match latency.unwrap_or_default() {
        Latency::Hour => ("0 * * * *", "hourly freshness"),
        Latency::Day => ("0 3 * * *", "daily at 03:00"),
        Latency::Week => ("0 3 * * 1", "weekly on Mondays at 03:00"),
    };
    Schedule {
        cron: cron.to_string(),
        reason: reason.to_string(),
    }
}

fn extract_source(profile: &TableProfile) -> JsonValue {
    profile
        .source
        .as_ref()
        .and_then(|source| serde_json::to_value(source).ok())
        .unwrap_or_else(|| json!({}))
}

fn parse_store(value: &JsonValue) -> Option<TargetSystem> {
    match value.as_str()?.trim().to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Some(TargetSystem::Postgres),
        "clickhouse" => Some(TargetSystem::ClickHouse),
        "hdfs" | "parquet" => Some(TargetSystem::Parquet),
        "hive" => Some(TargetSystem::Hive),
        _ => None,
    }
}

fn looks_temporal(name: &str, profile: &TableProfile) -> bool {
    let lowered = name.to_ascii_lowercase();
    TEMPORAL_HINTS.iter().any(|hint| lowered.contains(hint))
        || profile
            .column(name)
            .is_some_and(|column| column.logical_type.is_temporal())
}

fn string_field(object: &Map<String, JsonValue>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Turn a loose advisor answer into a [`Recommendation`].
///
/// The pipeline is rebuilt in canonical `{op, params}` form (including answers
/// that pack every step into one object), a schedule misplaced inside the DAG
/// is moved back out, a `Load` step is always present and a partition column
/// that does not look temporal is dropped.
pub fn normalize_answer(
    answer: JsonValue,
    profile: &TableProfile,
    prefs: &Preferences,
) -> Result<Recommendation> {
    let JsonValue::Object(answer) = answer else {
        bail!("advisor answer is not a JSON object");
    };
    let store_value = answer
        .get("target_store")
        .ok_or_else(|| anyhow!("advisor answer is missing target_store"))?;
    let target_store = parse_store(store_value)
        .ok_or_else(|| anyhow!("advisor proposed an unknown store: {store_value}"))?;
    let risks = match answer.get("risks") {
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| match item {
                JsonValue::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(other) => bail!("advisor risks must be a list, got {other}"),
        None => bail!("advisor answer is missing risks"),
    };

    let hints_object = answer
        .get("ddl_hints")
        .and_then(JsonValue::as_object)
        .cloned()
        .unwrap_or_default();
    let table_name = string_field(&hints_object, "table_name").unwrap_or_else(|| prefs.table_name());
    let mut ddl_hints = TableHints {
        table_name: table_name.clone(),
        primary_key: string_field(&hints_object, "primary_key"),
        partition_by: string_field(&hints_object, "partition_by"),
        order_by: match hints_object.get("order_by") {
            Some(JsonValue::Array(items)) => items
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect(),
            Some(JsonValue::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        },
    };
    if let Some(partition) = &ddl_hints.partition_by
        && !looks_temporal(partition, profile)
    {
        debug!("Dropping non-temporal partition column '{partition}'");
        ddl_hints.partition_by = None;
    }

    let raw_dag = answer
        .get("pipeline")
        .and_then(|pipeline| pipeline.get("dag"))
        .and_then(JsonValue::as_array)
        .cloned()
        .unwrap_or_default();
    let schedule = match answer.get("schedule").and_then(JsonValue::as_object) {
        Some(schedule) if string_field(schedule, "cron").is_some() => Schedule {
            cron: string_field(schedule, "cron").unwrap_or_default(),
            reason: string_field(schedule, "reason").unwrap_or_default(),
        },
        _ => rescue_schedule(&raw_dag).unwrap_or_else(|| schedule_for(None)),
    };

    let mut dag = canonical_steps(&raw_dag)
        .into_iter()
        .filter_map(|(op, params)| build_step(&op, params, target_store, &table_name))
        .collect::<Vec<_>>();
    if !dag.iter().any(|step| matches!(step, PipelineStep::Load { .. })) {
        dag.push(PipelineStep::Load {
            target: target_store,
            table: table_name.clone(),
        });
    }

    Ok(Recommendation {
        target_store,
        ddl_hints,
        pipeline: Pipeline { dag },
        schedule,
        risks,
        origin: Origin::Advisor,
    })
}

fn rescue_schedule(raw_dag: &[JsonValue]) -> Option<Schedule> {
    raw_dag.iter().filter_map(JsonValue::as_object).find_map(|item| {
        let cron = string_field(item, "cron")?;
        Some(Schedule {
            cron,
            reason: string_field(item, "reason").unwrap_or_default(),
        })
    })
}

/// `(op, params)` pairs in DAG order.
fn canonical_steps(raw_dag: &[JsonValue]) -> Vec<(String, Map<String, JsonValue>)> {
    let params_of = |value: Option<&JsonValue>| {
        value
            .and_then(JsonValue::as_object)
            .cloned()
            .unwrap_or_default()
    };

    if raw_dag.is_empty() {
        return vec![("Extract".to_string(), Map::new()), ("Load".to_string(), Map::new())];
    }
    if let Some(blob) = raw_dag[0].as_object()
        && ["Extract", "FilterByDate", "Load"]
            .iter()
            .any(|op| blob.contains_key(*op))
    {
        let mut steps = Vec::new();
        if blob.contains_key("Extract") {
            steps.push(("Extract".to_string(), params_of(blob.get("Extract"))));
        }
        if blob.get("FilterByDate").is_some_and(|params| !params.is_null()) {
            steps.push(("FilterByDate".to_string(), params_of(blob.get("FilterByDate"))));
        }
        if blob.contains_key("Load") {
            let mut params = params_of(blob.get("Load"));
            // Some answers nest the table name inside the target object.
            if let Some(JsonValue::Object(target)) = params.remove("target")
                && let Some(name) = string_field(&target, "name")
            {
                params.insert("table".to_string(), JsonValue::String(name));
            }
            steps.push(("Load".to_string(), params));
        }
        return steps;
    }
    raw_dag
        .iter()
        .filter_map(JsonValue::as_object)
        .filter_map(|item| {
            let op = item.get("op")?.as_str()?.to_string();
            Some((op, params_of(item.get("params"))))
        })
        .collect()
}

fn build_step(
    op: &str,
    mut params: Map<String, JsonValue>,
    target_store: TargetSystem,
    table_name: &str,
) -> Option<PipelineStep> {
    match op {
        "Extract" => {
            let source = match params.remove("source") {
                Some(source @ JsonValue::Object(_)) => source,
                _ => JsonValue::Object(
                    params
                        .into_iter()
                        .filter(|(key, _)| EXTRACT_SOURCE_KEYS.contains(&key.as_str()))
                        .collect(),
                ),
            };
            Some(PipelineStep::Extract { source })
        }
        "FilterByDate" => {
            let Some(column) = string_field(&params, "column") else {
                debug!("Dropping FilterByDate step without a column");
                return None;
            };
            Some(PipelineStep::FilterByDate {
                column,
                window: string_field(&params, "window").unwrap_or_else(|| DEFAULT_WINDOW.to_string()),
            })
        }
        "Load" => Some(PipelineStep::Load {
            target: params.get("target").and_then(parse_store).unwrap_or(target_store),
            table: string_field(&params, "table").unwrap_or_else(|| table_name.to_string()),
        }),
        other => {
            debug!("Dropping unknown pipeline step '{other}'");
            None
        }
    }
}

/// Short Markdown summary of a recommendation.
pub fn render_report(recommendation: &Recommendation, profile: Option<&TableProfile>) -> String {
    let hints = &recommendation.ddl_hints;
    let mut out = String::new();
    let _ = writeln!(out, "# Data loading recommendation");
    if let Some(profile) = profile {
        let _ = writeln!(
            out,
            "_Source profile_: {} rows x {} columns",
            profile.rows,
            profile.columns.len()
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## Storage");
    let _ = writeln!(
        out,
        "- Recommended: **{}** ({})",
        recommendation.target_store,
        recommendation.target_store.role()
    );
    let _ = writeln!(out, "- Decided by: {}", recommendation.origin);
    let _ = writeln!(out);
    let _ = writeln!(out, "## DDL hints");
    let _ = writeln!(out, "- Table: `{}`", hints.table_name);
    match &hints.primary_key {
        Some(key) => {
            let _ = writeln!(out, "- Primary key: `{key}`");
        }
        None => {
            let _ = writeln!(out, "- Primary key: none");
        }
    }
    match &hints.partition_by {
        Some(column) => {
            let _ = writeln!(out, "- Partition by: `{column}`");
        }
        None => {
            let _ = writeln!(out, "- Partition by: not required");
        }
    }
    if hints.order_by.is_empty() {
        let _ = writeln!(out, "- Order by: none");
    } else {
        let _ = writeln!(out, "- Order by: {}", hints.order_by.join(", "));
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## Pipeline");
    let steps = recommendation
        .pipeline
        .dag
        .iter()
        .map(PipelineStep::name)
        .join(" -> ");
    let _ = writeln!(out, "- Steps: {steps}");
    let _ = writeln!(out);
    let _ = writeln!(out, "## Schedule");
    let _ = writeln!(out, "- CRON: `{}`", recommendation.schedule.cron);
    if !recommendation.schedule.reason.is_empty() {
        let _ = writeln!(out, "- Reason: {}", recommendation.schedule.reason);
    }
    if let Some(profile) = profile {
        let ddl = recommendation.ddl(profile);
        let _ = writeln!(out);
        let _ = writeln!(out, "## DDL");
        let _ = writeln!(out, "```sql\n{}\n```", ddl.ddl_sql);
        for suggestion in &ddl.suggestions {
            let _ = writeln!(out, "- {suggestion}");
        }
    }
    if !recommendation.risks.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Risks");
        for risk in &recommendation.risks {
            let _ = writeln!(out, "- {risk}");
        }
    }
    out
}

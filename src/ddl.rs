//! Logical type to target column type mapping and `CREATE TABLE` rendering.

use std::{fmt, path::Path};

use clap::ValueEnum;
use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};

use crate::{data::normalize_column_name, inference::LogicalType, stats::ColumnProfile};

const DEFAULT_TABLE_NAME: &str = "source_table";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TargetSystem {
    /// Relational row store
    Postgres,
    /// Columnar analytical store
    #[value(name = "clickhouse")]
    ClickHouse,
    /// Generic row store
    Hive,
    /// Columnar file store
    Parquet,
}

impl TargetSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetSystem::Postgres => "postgres",
            TargetSystem::ClickHouse => "clickhouse",
            TargetSystem::Hive => "hive",
            TargetSystem::Parquet => "parquet",
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            TargetSystem::Postgres => "relational-row-store",
            TargetSystem::ClickHouse => "columnar-analytical-store",
            TargetSystem::Hive => "generic-row-store",
            TargetSystem::Parquet => "columnar-file-store",
        }
    }
}

impl fmt::Display for TargetSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed lookup from logical type to the target's column type.
pub fn map_type(logical_type: LogicalType, target: TargetSystem) -> &'static str {
    use LogicalType as L;
    match target {
        TargetSystem::Postgres => match logical_type {
            L::Integer => "INTEGER",
            L::Float => "DOUBLE PRECISION",
            L::Boolean => "BOOLEAN",
            L::Timestamp => "TIMESTAMP",
            L::Date => "DATE",
            L::Text | L::Mixed | L::Null => "TEXT",
        },
        TargetSystem::ClickHouse => match logical_type {
            L::Integer => "Int64",
            L::Float => "Float64",
            L::Boolean => "UInt8",
            L::Timestamp => "DateTime",
            L::Date => "Date",
            L::Text | L::Mixed | L::Null => "String",
        },
        TargetSystem::Hive => match logical_type {
            L::Integer => "BIGINT",
            L::Float => "DOUBLE",
            L::Boolean => "BOOLEAN",
            L::Timestamp => "TIMESTAMP",
            L::Date => "DATE",
            L::Text | L::Mixed | L::Null => "STRING",
        },
        TargetSystem::Parquet => match logical_type {
            L::Integer => "int64",
            L::Float => "double",
            L::Boolean => "boolean",
            L::Timestamp => "int64 (TIMESTAMP(MILLIS,false))",
            L::Date => "int32 (DATE)",
            L::Text | L::Mixed | L::Null => "binary (STRING)",
        },
    }
}

/// Optional physical layout hints; unset fields are left to the target's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DdlHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_by: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdlOutput {
    pub ddl_sql: String,
    pub suggestions: Vec<String>,
}

/// Snake-cased file stem, usable as a table name.
pub fn table_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_snake_case())
        .unwrap_or_default();
    sanitize_table_name(&stem)
}

pub fn sanitize_table_name(name: &str) -> String {
    let cleaned = normalize_column_name(&name.to_snake_case());
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        DEFAULT_TABLE_NAME.to_string()
    } else if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("t_{trimmed}")
    } else {
        trimmed.to_string()
    }
}

pub fn generate_ddl(
    table: &str,
    columns: &[ColumnProfile],
    target: TargetSystem,
    hints: &DdlHints,
) -> DdlOutput {
    let table = sanitize_table_name(table);
    match target {
        TargetSystem::Postgres => postgres_ddl(&table, columns, hints),
        TargetSystem::ClickHouse => clickhouse_ddl(&table, columns, hints),
        TargetSystem::Hive => hive_ddl(&table, columns),
        TargetSystem::Parquet => parquet_schema(&table, columns),
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote_double(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn quote_backtick(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

fn has_column(columns: &[ColumnProfile], name: &str) -> bool {
    columns.iter().any(|column| column.name == name)
}

fn postgres_ddl(table: &str, columns: &[ColumnProfile], hints: &DdlHints) -> DdlOutput {
    let primary_key = hints
        .primary_key
        .as_deref()
        .filter(|pk| has_column(columns, pk));
    let mut lines = columns
        .iter()
        .map(|column| {
            let not_null = !column.nullable || primary_key == Some(column.name.as_str());
            format!(
                "{} {}{}",
                quote_double(&column.name),
                map_type(column.logical_type, TargetSystem::Postgres),
                if not_null { " NOT NULL" } else { "" }
            )
        })
        .collect::<Vec<_>>();
    if let Some(pk) = primary_key {
        lines.push(format!("PRIMARY KEY ({})", quote_double(pk)));
    }

    let mut suggestions = vec!["Add indexes on frequently filtered columns".to_string()];
    if primary_key.is_none() {
        suggestions.push("No primary key selected; consider a surrogate key".to_string());
    }
    for column in columns.iter().filter(|c| c.logical_type.is_temporal()) {
        suggestions.push(format!(
            "Consider a BRIN index on time column '{}'",
            column.name
        ));
    }
    DdlOutput {
        ddl_sql: format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n  {}\n);",
            lines.join(",\n  ")
        ),
        suggestions,
    }
}

fn clickhouse_ddl(table: &str, columns: &[ColumnProfile], hints: &DdlHints) -> DdlOutput {
    let partition = hints
        .partition_by
        .as_deref()
        .and_then(|name| columns.iter().find(|column| column.name == name))
        .filter(|column| column.logical_type.is_temporal());
    let mut order_by = hints
        .order_by
        .iter()
        .filter(|name| has_column(columns, name))
        .cloned()
        .collect::<Vec<_>>();
    if order_by.is_empty() {
        if let Some(pk) = hints
            .primary_key
            .as_deref()
            .filter(|pk| has_column(columns, pk))
        {
            order_by.push(pk.to_string());
        } else if let Some(column) = partition {
            order_by.push(column.name.clone());
        }
    }

    // Sorting and partition keys cannot be Nullable.
    let is_key = |name: &str| {
        order_by.iter().any(|key| key == name) || partition.is_some_and(|p| p.name == name)
    };
    let lines = columns
        .iter()
        .map(|column| {
            let base = map_type(column.logical_type, TargetSystem::ClickHouse);
            let rendered = if column.nullable && !is_key(&column.name) {
                format!("Nullable({base})")
            } else {
                base.to_string()
            };
            format!("{} {rendered}", quote_backtick(&column.name))
        })
        .collect::<Vec<_>>();

    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n  {}\n) ENGINE = MergeTree()",
        lines.join(",\n  ")
    );
    let mut suggestions = Vec::new();
    if let Some(column) = partition {
        ddl.push_str(&format!(
            "\nPARTITION BY toYYYYMM({})",
            quote_backtick(&column.name)
        ));
        suggestions.push(format!(
            "Partition by month on '{}' for time-based data",
            column.name
        ));
    } else {
        suggestions.push("No temporal partition column; table is unpartitioned".to_string());
    }
    if order_by.is_empty() {
        ddl.push_str("\nORDER BY tuple();");
        suggestions.push("Choose an ORDER BY key matching the most common filters".to_string());
    } else {
        let keys = order_by
            .iter()
            .map(|key| quote_backtick(key))
            .collect::<Vec<_>>();
        ddl.push_str(&format!("\nORDER BY ({});", keys.join(", ")));
    }
    DdlOutput {
        ddl_sql: ddl,
        suggestions,
    }
}

fn hive_ddl(table: &str, columns: &[ColumnProfile]) -> DdlOutput {
    let lines = columns
        .iter()
        .map(|column| {
            format!(
                "{} {}",
                quote_backtick(&column.name),
                map_type(column.logical_type, TargetSystem::Hive)
            )
        })
        .collect::<Vec<_>>();
    DdlOutput {
        ddl_sql: format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n  {}\n)\nROW FORMAT DELIMITED FIELDS TERMINATED BY ','\nSTORED AS TEXTFILE;",
            lines.join(",\n  ")
        ),
        suggestions: vec!["Store raw data in a columnar format".to_string()],
    }
}

/// Parquet message type; field names are normalized to identifiers.
fn parquet_schema(table: &str, columns: &[ColumnProfile]) -> DdlOutput {
    let mut suggestions = Vec::new();
    let lines = columns
        .iter()
        .map(|column| {
            let name = normalize_column_name(&column.name);
            if name != column.name {
                suggestions.push(format!(
                    "Column '{}' is written as '{name}'",
                    column.name
                ));
            }
            let repetition = if column.nullable { "optional" } else { "required" };
            // The logical annotation follows the field name.
            match map_type(column.logical_type, TargetSystem::Parquet).split_once(' ') {
                Some((physical, annotation)) => {
                    format!("  {repetition} {physical} {name} {annotation};")
                }
                None => format!(
                    "  {repetition} {} {name};",
                    map_type(column.logical_type, TargetSystem::Parquet)
                ),
            }
        })
        .collect::<Vec<_>>();
    suggestions.push("Use SNAPPY or ZSTD compression for the columnar files".to_string());
    DdlOutput {
        ddl_sql: format!("message {table} {{\n{}\n}}", lines.join("\n")),
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, logical_type: LogicalType, nullable: bool) -> ColumnProfile {
        ColumnProfile {
            name: name.to_string(),
            logical_type,
            nullable,
            example: serde_json::Value::Null,
            distinct_count: 0,
            null_count: usize::from(nullable),
            null_percentage: 0.0,
            numeric_stats: None,
        }
    }

    #[test]
    fn lookup_table_covers_every_target() {
        assert_eq!(map_type(LogicalType::Integer, TargetSystem::Postgres), "INTEGER");
        assert_eq!(map_type(LogicalType::Boolean, TargetSystem::ClickHouse), "UInt8");
        assert_eq!(map_type(LogicalType::Mixed, TargetSystem::Hive), "STRING");
        assert_eq!(map_type(LogicalType::Date, TargetSystem::Parquet), "int32 (DATE)");
        assert_eq!(TargetSystem::ClickHouse.role(), "columnar-analytical-store");
    }

    #[test]
    fn table_names_are_snake_cased() {
        assert_eq!(table_name_for(Path::new("data/Sales Report.csv")), "sales_report");
        assert_eq!(table_name_for(Path::new("2024-orders.json")), "t_2024_orders");
        assert_eq!(sanitize_table_name("!!!"), DEFAULT_TABLE_NAME);
    }

    #[test]
    fn postgres_renders_primary_key() {
        let columns = vec![
            column("id", LogicalType::Integer, false),
            column("note", LogicalType::Text, true),
        ];
        let hints = DdlHints {
            primary_key: Some("id".to_string()),
            ..DdlHints::default()
        };
        let output = generate_ddl("events", &columns, TargetSystem::Postgres, &hints);
        assert_eq!(
            output.ddl_sql,
            "CREATE TABLE IF NOT EXISTS events (\n  id INTEGER NOT NULL,\n  note TEXT,\n  PRIMARY KEY (id)\n);"
        );
    }

    #[test]
    fn clickhouse_keys_are_not_nullable() {
        let columns = vec![
            column("ts", LogicalType::Timestamp, true),
            column("user id", LogicalType::Integer, true),
        ];
        let hints = DdlHints {
            partition_by: Some("ts".to_string()),
            ..DdlHints::default()
        };
        let output = generate_ddl("events", &columns, TargetSystem::ClickHouse, &hints);
        assert!(output.ddl_sql.contains("  ts DateTime,\n"));
        assert!(output.ddl_sql.contains("`user id` Nullable(Int64)"));
        assert!(output.ddl_sql.ends_with("PARTITION BY toYYYYMM(ts)\nORDER BY (ts);"));
    }

    #[test]
    fn parquet_schema_marks_optional_fields() {
        let columns = vec![
            column("id", LogicalType::Integer, false),
            column("Full Name", LogicalType::Text, true),
        ];
        let output = generate_ddl("people", &columns, TargetSystem::Parquet, &DdlHints::default());
        assert_eq!(
            output.ddl_sql,
            "message people {\n  required int64 id;\n  optional binary full_name (STRING);\n}"
        );
        assert!(output.suggestions[0].contains("full_name"));
    }
}

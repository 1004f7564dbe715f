//! Plain-text rendering of profiles and row previews.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{data::RawValue, profile::TableProfile, sources::RawTable};

const MAX_CELL_WIDTH: usize = 40;
const ELLIPSIS: &str = "...";
const COLUMN_GAP: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

/// Render rows under a header line and a dashed separator. Cells are
/// flattened to one line and cut at a fixed width; columns without an
/// explicit alignment are left-aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>], aligns: &[Align]) -> String {
    let headers = headers.iter().map(|h| fit_cell(h)).collect::<Vec<_>>();
    let rows = rows
        .iter()
        .map(|row| row.iter().map(|cell| fit_cell(cell)).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(&headers, &widths, &[]));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths, &[]));
    for row in &rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, aligns));
    }
    output
}

/// Column summary followed by the data-quality scores.
pub fn render_profile(profile: &TableProfile) -> String {
    let mut output = String::new();
    if let Some(source) = &profile.source {
        let mut details = vec![source.format.clone()];
        details.extend(source.encoding.clone());
        if let Some(delimiter) = &source.delimiter {
            details.push(format!("delimiter '{delimiter}'"));
        }
        let _ = writeln!(output, "source: {} ({})", source.file_name, details.join(", "));
    }
    let _ = writeln!(
        output,
        "rows: {}  columns: {}  time series: {}",
        profile.rows,
        profile.columns.len(),
        if profile.is_time_series { "yes" } else { "no" }
    );
    let _ = writeln!(output);

    let headers = ["column", "type", "nullable", "unique", "nulls", "null %", "example"]
        .map(String::from)
        .to_vec();
    let rows = profile
        .columns
        .iter()
        .map(|column| {
            vec![
                column.name.clone(),
                column.logical_type.to_string(),
                if column.nullable { "yes" } else { "no" }.to_string(),
                column.distinct_count.to_string(),
                column.null_count.to_string(),
                format!("{:.1}", column.null_percentage),
                json_cell(&column.example),
            ]
        })
        .collect::<Vec<_>>();
    let aligns = [
        Align::Left,
        Align::Left,
        Align::Left,
        Align::Right,
        Align::Right,
        Align::Right,
        Align::Left,
    ];
    output.push_str(&render_table(&headers, &rows, &aligns));

    let quality = &profile.data_quality;
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "quality: completeness {:.1}  consistency {:.1}  uniqueness {:.1}",
        quality.completeness_score, quality.consistency_score, quality.uniqueness_score
    );
    for issue in &quality.issues {
        let _ = writeln!(output, "  - {issue}");
    }
    output
}

/// First `limit` rows of a materialized table, numbers right-aligned.
pub fn render_preview(table: &RawTable, limit: usize) -> String {
    let headers = table.headers();
    let shown = table.row_count().min(limit);
    let rows = (0..shown)
        .filter_map(|index| table.row(index))
        .map(|row| {
            row.into_iter()
                .map(|value| value.as_text().unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let aligns = table
        .columns()
        .iter()
        .map(|column| {
            let numeric = column.values[..shown].iter().all(|value| {
                matches!(
                    value,
                    RawValue::Missing | RawValue::Integer(_) | RawValue::Float(_)
                )
            });
            if numeric && shown > 0 {
                Align::Right
            } else {
                Align::Left
            }
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows, &aligns)
}

fn json_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn format_row(values: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (value, width))| {
            let padding = " ".repeat(width.saturating_sub(display_width(value)));
            match aligns.get(idx).copied().unwrap_or_default() {
                Align::Left => format!("{value}{padding}"),
                Align::Right => format!("{padding}{value}"),
            }
        })
        .collect::<Vec<_>>();
    cells.join(COLUMN_GAP).trim_end().to_string()
}

fn fit_cell(value: &str) -> String {
    let flattened = sanitize_cell(value);
    if display_width(&flattened) <= MAX_CELL_WIDTH {
        return flattened.into_owned();
    }
    let kept = flattened
        .chars()
        .take(MAX_CELL_WIDTH - ELLIPSIS.len())
        .collect::<String>();
    format!("{kept}{ELLIPSIS}")
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{inference::TypeInferencer, profile::profile_table};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn columns_are_padded_and_aligned() {
        let rendered = render_table(
            &strings(&["name", "n"]),
            &[strings(&["Alex", "7"]), strings(&["Ivanka", "12"])],
            &[Align::Left, Align::Right],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "name    n");
        assert_eq!(lines[1], "------  ---");
        assert_eq!(lines[2], "Alex      7");
        assert_eq!(lines[3], "Ivanka   12");
    }

    #[test]
    fn long_and_multiline_cells_are_flattened() {
        let long = "x".repeat(MAX_CELL_WIDTH + 10);
        let rendered = render_table(
            &strings(&["note"]),
            &[strings(&["first\nsecond"]), vec![long]],
            &[],
        );
        assert!(rendered.contains("first second"));
        let last = rendered.lines().last().unwrap();
        assert_eq!(last.chars().count(), MAX_CELL_WIDTH);
        assert!(last.ends_with(ELLIPSIS));
    }

    #[test]
    fn profile_summary_lists_columns_and_issues() {
        let table = RawTable::from_rows(
            strings(&["id", "comment"]),
            vec![
                vec![RawValue::text("1"), RawValue::Missing],
                vec![RawValue::text("2"), RawValue::Missing],
            ],
        );
        let profile = profile_table(&table, &TypeInferencer::default(), 5);
        let rendered = render_profile(&profile);
        assert!(rendered.contains("rows: 2  columns: 2  time series: no"));
        assert!(rendered.lines().any(|line| line.starts_with("id ") && line.contains("integer")));
        assert!(rendered.contains("  - column 'comment' contains mostly empty values"));
    }

    #[test]
    fn preview_right_aligns_native_numbers() {
        let table = RawTable::from_rows(
            strings(&["qty", "item"]),
            vec![
                vec![RawValue::Integer(5), RawValue::text("pen")],
                vec![RawValue::Integer(120), RawValue::text("notebook")],
                vec![RawValue::Integer(1), RawValue::text("skipped")],
            ],
        );
        let rendered = render_preview(&table, 2);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "  5  pen");
        assert_eq!(lines[3], "120  notebook");
    }
}

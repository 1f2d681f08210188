use std::fmt::Write;

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use tracing::info;

use crate::aggregate::fold_responses;
use crate::chart::{composite_chart, indicator_chart, Chart, ChartType};
use crate::db;
use crate::error::Result;
use crate::models::{
    Column, CompositeSummary, DimensionFilter, FieldPair, FieldType, Indicator, RawEntry,
    ReportRow, SummaryMode,
};
use crate::summary::{round_to, summarize};

/// Value of the `gwgi` filter that switches a report to composite mode.
pub const GWGI_SENTINEL: &str = "GWGI";
pub const PROJECT_FIELD: &str = "project_title";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilters {
    #[serde(default)]
    pub project_title: Option<String>,
    #[serde(default)]
    pub dimension: DimensionFilter,
    #[serde(default)]
    pub gwgi: Option<String>,
    #[serde(default)]
    pub chart_type: ChartType,
}

impl ReportFilters {
    pub fn project_title(&self) -> Option<&str> {
        self.project_title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }

    pub fn mode(&self) -> SummaryMode {
        match self.gwgi.as_deref() {
            Some(GWGI_SENTINEL) => SummaryMode::CompositeIndex,
            _ => SummaryMode::PlainAverage,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportOutput {
    pub columns: Vec<Column>,
    pub rows: Vec<ReportRow>,
    /// Always empty; kept so the output lines up with grouped report views.
    pub grouped_by: Option<String>,
    pub chart: Option<Chart>,
    pub composite: Option<CompositeSummary>,
}

/// Loads the template's schema and entries and runs the report over them.
pub async fn execute(pool: &PgPool, filters: &ReportFilters, precision: u32) -> Result<ReportOutput> {
    let Some(template) = filters.project_title() else {
        info!("no project selected, returning empty report");
        return Ok(ReportOutput::default());
    };

    let schema = db::fetch_indicators(pool, template, &filters.dimension).await?;
    let entries = db::fetch_raw_entries(pool, template, &filters.dimension).await?;
    Ok(build_report(filters, &schema, &entries, precision))
}

pub fn build_report(
    filters: &ReportFilters,
    schema: &[Indicator],
    entries: &[RawEntry],
    precision: u32,
) -> ReportOutput {
    if filters.project_title().is_none() {
        return ReportOutput::default();
    }

    let aggregation = fold_responses(schema, entries);
    let summary = summarize(schema, &aggregation.rows, filters.mode());

    let mut rows: Vec<ReportRow> = aggregation
        .rows
        .iter()
        .map(|row| ReportRow {
            label: row.response_id.clone(),
            summary: None,
            fields: row
                .values
                .iter()
                .map(|pair| FieldPair {
                    var1: Some(round_to(pair.var1, precision)),
                    var2: Some(round_to(pair.var2, precision)),
                })
                .collect(),
        })
        .collect();

    rows.extend(
        summary
            .rows(&filters.dimension, precision)
            .into_iter()
            .map(|row| ReportRow {
                label: row.label,
                summary: Some(row.kind),
                fields: row.fields,
            }),
    );

    let chart = match &summary.composite {
        Some(composite) => composite_chart(composite, filters.chart_type, precision),
        None => indicator_chart(
            schema,
            &summary,
            &filters.dimension,
            filters.chart_type,
            precision,
        ),
    };

    debug_assert!(chart.is_aligned());

    info!(
        responses = aggregation.rows.len(),
        indicators = schema.len(),
        "survey report computed"
    );

    ReportOutput {
        columns: build_columns(schema),
        rows,
        grouped_by: None,
        chart: Some(chart),
        composite: summary.composite.map(|c| c.rounded(precision)),
    }
}

/// Field names for the indicator at `position`. Keyed by schema position so
/// that indicator spelling never affects lookups.
pub fn field_names(position: usize) -> (String, String) {
    (
        format!("ind{}_variable1", position + 1),
        format!("ind{}_variable2", position + 1),
    )
}

pub fn build_columns(schema: &[Indicator]) -> Vec<Column> {
    let mut columns = vec![Column {
        fieldname: PROJECT_FIELD.to_string(),
        label: "Project".to_string(),
        fieldtype: FieldType::Data,
        width: 150,
    }];

    for (position, indicator) in schema.iter().enumerate() {
        let (var1, var2) = field_names(position);
        columns.push(Column {
            fieldname: var1,
            label: format!("{} Variable 1", indicator.name),
            fieldtype: FieldType::Float,
            width: 150,
        });
        columns.push(Column {
            fieldname: var2,
            label: format!("{} Variable 2", indicator.name),
            fieldtype: FieldType::Float,
            width: 200,
        });
    }

    columns
}

impl ReportRow {
    /// The value for `fieldname`, if the row has one.
    pub fn value(&self, fieldname: &str) -> Option<Value> {
        if fieldname == PROJECT_FIELD {
            return Some(Value::String(self.label.clone()));
        }
        self.fields
            .iter()
            .enumerate()
            .find_map(|(position, pair)| {
                let (var1, var2) = field_names(position);
                if fieldname == var1 {
                    Some(pair.var1)
                } else if fieldname == var2 {
                    Some(pair.var2)
                } else {
                    None
                }
            })
            .flatten()
            .map(|v| json!(v))
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert(PROJECT_FIELD.to_string(), Value::String(self.label.clone()));
        for (position, pair) in self.fields.iter().enumerate() {
            let (var1, var2) = field_names(position);
            if let Some(value) = pair.var1 {
                object.insert(var1, json!(value));
            }
            if let Some(value) = pair.var2 {
                object.insert(var2, json!(value));
            }
        }
        Value::Object(object)
    }
}

pub fn to_json(output: &ReportOutput) -> Result<Value> {
    Ok(json!({
        "columns": serde_json::to_value(&output.columns)?,
        "rows": output.rows.iter().map(ReportRow::to_json).collect::<Vec<_>>(),
        "grouped_by": output.grouped_by,
        "chart": serde_json::to_value(&output.chart)?,
        "composite": serde_json::to_value(&output.composite)?,
    }))
}

pub fn render_markdown(
    title: &str,
    filters: &ReportFilters,
    generated_at: NaiveDateTime,
    output: &ReportOutput,
    precision: u32,
) -> String {
    let mut out = String::new();
    let digits = precision as usize;
    let project = filters.project_title().unwrap_or("no project selected");
    let scope = match &filters.dimension {
        DimensionFilter::Dimension(name) => name.as_str(),
        _ => "all indicators",
    };

    let _ = writeln!(out, "# {title}");
    let _ = writeln!(
        out,
        "Generated for {project} ({scope}) on {}",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "## Detailed Data");

    if output.columns.is_empty() {
        let _ = writeln!(out, "No project selected.");
        return out;
    }

    let header: Vec<String> = output
        .columns
        .iter()
        .map(|c| escape_cell(&c.label))
        .collect();
    let _ = writeln!(out, "| {} |", header.join(" | "));
    let _ = writeln!(out, "|{}", "---|".repeat(header.len()));

    for row in &output.rows {
        let cells: Vec<String> = output
            .columns
            .iter()
            .map(|column| match row.value(&column.fieldname) {
                Some(Value::Number(n)) => format!("{:.digits$}", n.as_f64().unwrap_or(0.0)),
                Some(Value::String(s)) => escape_cell(&s),
                _ => String::new(),
            })
            .collect();
        let _ = writeln!(out, "| {} |", cells.join(" | "));
    }

    if let Some(chart) = &output.chart {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Chart Series");
        for series in &chart.data.datasets {
            let points: Vec<String> = chart
                .data
                .labels
                .iter()
                .zip(&series.values)
                .map(|(label, value)| format!("{label} {value:.digits$}"))
                .collect();
            let _ = writeln!(out, "- {}: {}", series.name, points.join(", "));
        }
    }

    if let Some(composite) = &output.composite {
        let _ = writeln!(out);
        let _ = writeln!(out, "## GWGI Breakdown");
        for score in &composite.dimension_averages {
            let _ = writeln!(
                out,
                "- {}: average {:.digits$} x weight {}% = {:.digits$}",
                score.dimension, score.average, score.weight, score.weighted_value
            );
        }
        let _ = writeln!(out, "- GWGI: {:.digits$}", composite.gwgi_value);
    }

    out
}

/// Keeps a pipe inside a value from splitting the markdown table cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SummaryKind;
    use chrono::NaiveDate;

    fn indicator(name: &str, dimension: &str, weight: f64) -> Indicator {
        Indicator {
            name: name.to_string(),
            dimension: dimension.to_string(),
            weight,
        }
    }

    fn entry(response: &str, indicator: &str, v1: f64, v2: f64) -> RawEntry {
        RawEntry {
            response_id: response.to_string(),
            indicator: indicator.to_string(),
            variable1: v1,
            variable2: v2,
        }
    }

    fn schema() -> Vec<Indicator> {
        vec![indicator("A", "dim1", 60.0), indicator("B", "dim2", 40.0)]
    }

    fn entries() -> Vec<RawEntry> {
        vec![
            entry("r1", "A", 2.0, 4.0),
            entry("r1", "B", 6.0, 10.0),
            entry("r2", "A", 6.0, 4.0),
            entry("r2", "B", 10.0, 6.0),
        ]
    }

    fn filters(gwgi: Option<&str>) -> ReportFilters {
        ReportFilters {
            project_title: Some("Groundwater".to_string()),
            gwgi: gwgi.map(str::to_string),
            ..ReportFilters::default()
        }
    }

    #[test]
    fn missing_project_title_returns_empty() {
        let output = build_report(&ReportFilters::default(), &schema(), &entries(), 2);
        assert!(output.columns.is_empty());
        assert!(output.rows.is_empty());
        assert!(output.chart.is_none());

        let parsed: ReportFilters = serde_json::from_str("{}").expect("empty filters parse");
        assert!(parsed.project_title().is_none());
        assert_eq!(parsed.dimension, DimensionFilter::Unset);
    }

    #[test]
    fn plain_report_lists_responses_then_summaries() {
        let output = build_report(&filters(None), &schema(), &entries(), 2);

        assert_eq!(output.columns.len(), 5);
        assert_eq!(output.columns[1].fieldname, "ind1_variable1");
        assert_eq!(output.columns[4].label, "B Variable 2");

        let kinds: Vec<Option<SummaryKind>> = output.rows.iter().map(|r| r.summary).collect();
        assert_eq!(
            kinds,
            vec![
                None,
                None,
                Some(SummaryKind::Sum),
                Some(SummaryKind::IndicatorAverage),
                Some(SummaryKind::OverallAverage),
            ]
        );
        assert_eq!(output.rows[2].value("ind2_variable1"), Some(json!(16.0)));
        assert_eq!(output.rows[3].value("ind1_variable1"), Some(json!(8.0)));
        assert_eq!(output.rows[3].value("ind1_variable2"), None);
        assert_eq!(output.rows[4].label, "Average of All Indicators");
        assert_eq!(output.rows[4].value("ind1_variable1"), Some(json!(12.0)));
        assert!(output.composite.is_none());
        assert!(output.chart.as_ref().is_some_and(|c| c.data.datasets.len() == 4));
    }

    #[test]
    fn gwgi_sentinel_switches_to_composite() {
        let output = build_report(&filters(Some("GWGI")), &schema(), &entries(), 2);

        let composite = output.composite.as_ref().expect("composite mode");
        assert_eq!(composite.gwgi_value, 11.2);
        assert_eq!(
            output.rows.last().map(|r| r.summary),
            Some(Some(SummaryKind::CompositeIndex))
        );
        let chart = output.chart.as_ref().expect("chart");
        assert_eq!(chart.data.labels.last().map(String::as_str), Some("GWGI"));
        assert!(chart.is_aligned());

        let other = build_report(&filters(Some("gwgi")), &schema(), &entries(), 2);
        assert!(other.composite.is_none());
    }

    #[test]
    fn filters_parse_from_json() {
        let parsed: ReportFilters = serde_json::from_str(
            r#"{"project_title": "Groundwater", "dimension": "All Indicators", "gwgi": "GWGI", "chart_type": "radar"}"#,
        )
        .expect("filters parse");
        assert_eq!(parsed.dimension, DimensionFilter::AllIndicators);
        assert_eq!(parsed.mode(), SummaryMode::CompositeIndex);
        assert_eq!(parsed.chart_type, ChartType::Radar);
    }

    #[test]
    fn json_rows_are_keyed_by_field_name() {
        let output = build_report(&filters(None), &schema(), &entries(), 2);
        let value = to_json(&output).expect("serializes");

        assert_eq!(value["rows"][0]["project_title"], "r1");
        assert_eq!(value["rows"][0]["ind2_variable2"], 10.0);
        assert!(value["rows"][3].get("ind1_variable2").is_none());
        assert_eq!(value["grouped_by"], Value::Null);
    }

    #[test]
    fn markdown_contains_table_and_breakdown() {
        let generated_at = NaiveDate::from_ymd_opt(2026, 3, 1)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .expect("valid timestamp");
        let f = filters(Some("GWGI"));
        let output = build_report(&f, &schema(), &entries(), 2);
        let markdown = render_markdown("Survey Report", &f, generated_at, &output, 2);

        assert!(markdown.contains("# Survey Report"));
        assert!(markdown.contains("| Project | A Variable 1 |"));
        assert!(markdown.contains("| Sum of Variables | 8.00 | 8.00 | 16.00 | 16.00 |"));
        assert!(markdown.contains("- GWGI: 11.20"));
    }

    #[test]
    fn markdown_escapes_pipes_in_labels() {
        let generated_at = NaiveDate::from_ymd_opt(2026, 3, 1)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .expect("valid timestamp");
        let f = filters(None);
        let schema = vec![indicator("Wells | Pumps", "dim1", 100.0)];
        let entries = vec![entry("r|1", "Wells | Pumps", 1.0, 2.0)];
        let output = build_report(&f, &schema, &entries, 2);
        let markdown = render_markdown("Survey Report", &f, generated_at, &output, 2);

        assert!(markdown.contains("| Project | Wells \\| Pumps Variable 1 | Wells \\| Pumps Variable 2 |"));
        assert!(markdown.contains("| r\\|1 | 1.00 | 2.00 |"));
    }
}

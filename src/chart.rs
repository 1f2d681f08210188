use serde::{Deserialize, Serialize};

use crate::models::{ChartSeries, CompositeSummary, DimensionFilter, Indicator};
use crate::summary::{round_to, Summary};

pub const GWGI_LABEL: &str = "GWGI";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Bar,
    Radar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisOptions {
    pub x_axis_mode: String,
    pub y_axis_mode: String,
    pub x_is_series: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarOptions {
    pub space_ratio: f64,
}

/// Chart payload in the shape the report front end renders directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub data: ChartData,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub colors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis_options: Option<AxisOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_options: Option<BarOptions>,
}

impl Chart {
    /// True when every series has one value per label.
    pub fn is_aligned(&self) -> bool {
        self.data
            .datasets
            .iter()
            .all(|series| series.values.len() == self.data.labels.len())
    }
}

pub fn chart_average_label(filter: &DimensionFilter) -> String {
    match filter {
        DimensionFilter::Dimension(name) => format!("Average of {name} Dimension"),
        DimensionFilter::AllIndicators | DimensionFilter::Unset => {
            "Average of All Indicators".to_string()
        }
    }
}

/// Per-indicator chart: one slot per indicator plus a trailing overall slot.
pub fn indicator_chart(
    schema: &[Indicator],
    summary: &Summary,
    filter: &DimensionFilter,
    chart_type: ChartType,
    precision: u32,
) -> Chart {
    let average_label = chart_average_label(filter);
    let mut labels: Vec<String> = schema.iter().map(|i| i.name.clone()).collect();
    labels.push(average_label.clone());

    let padded = |values: Vec<f64>| -> Vec<f64> {
        let mut values: Vec<f64> = values.into_iter().map(|v| round_to(v, precision)).collect();
        values.push(0.0);
        values
    };

    let mut overall = vec![0.0; schema.len()];
    overall.push(round_to(summary.overall_average, precision));

    let datasets = vec![
        ChartSeries {
            name: "Variable 1".to_string(),
            values: padded(summary.sums.iter().map(|p| p.var1).collect()),
        },
        ChartSeries {
            name: "Variable 2".to_string(),
            values: padded(summary.sums.iter().map(|p| p.var2).collect()),
        },
        ChartSeries {
            name: "Average of Variables".to_string(),
            values: padded(summary.indicator_averages.clone()),
        },
        ChartSeries {
            name: average_label,
            values: overall,
        },
    ];

    Chart {
        data: ChartData { labels, datasets },
        chart_type,
        title: Some("Average of Variables".to_string()),
        colors: ["#7cd6fd", "#743ee2", "#ffa3ef", "#ffcc00"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        height: None,
        axis_options: None,
        bar_options: None,
    }
}

/// Composite chart: one slot per dimension average, then the index itself.
pub fn composite_chart(composite: &CompositeSummary, chart_type: ChartType, precision: u32) -> Chart {
    let mut labels: Vec<String> = composite
        .dimension_averages
        .iter()
        .map(|d| d.dimension.clone())
        .collect();
    let mut values: Vec<f64> = composite
        .dimension_averages
        .iter()
        .map(|d| round_to(d.average, precision))
        .collect();

    labels.push(GWGI_LABEL.to_string());
    values.push(round_to(composite.gwgi_value, precision));

    Chart {
        data: ChartData {
            labels,
            datasets: vec![ChartSeries {
                name: "Average Score".to_string(),
                values,
            }],
        },
        chart_type,
        title: None,
        colors: vec!["#ffa3ef".to_string()],
        height: Some(300),
        axis_options: Some(AxisOptions {
            x_axis_mode: "tick".to_string(),
            y_axis_mode: "span".to_string(),
            x_is_series: 1,
        }),
        bar_options: Some(BarOptions { space_ratio: 0.5 }),
    }
}

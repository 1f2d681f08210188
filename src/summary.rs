use crate::models::{
    CompositeSummary, DimensionFilter, DimensionScore, FieldPair, Indicator, SummaryKind,
    SummaryMode, SummaryRow, VariablePair, WideResponseRow,
};

pub const SUM_LABEL: &str = "Sum of Variables";
pub const INDICATOR_AVERAGE_LABEL: &str = "Average of Each Indicator";
pub const COMPOSITE_LABEL: &str = "GWGI Index";

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Per-indicator column sums across all responses.
    pub sums: Vec<VariablePair>,
    /// Mean of each indicator's var1 and var2 sums.
    pub indicator_averages: Vec<f64>,
    /// Mean of `indicator_averages`, 0 when there are none.
    pub overall_average: f64,
    pub composite: Option<CompositeSummary>,
}

pub fn summarize(schema: &[Indicator], rows: &[WideResponseRow], mode: SummaryMode) -> Summary {
    let mut sums = vec![VariablePair::default(); schema.len()];
    for row in rows {
        for (total, pair) in sums.iter_mut().zip(&row.values) {
            total.var1 += pair.var1;
            total.var2 += pair.var2;
        }
    }

    let indicator_averages: Vec<f64> = sums
        .iter()
        .map(|pair| (pair.var1 + pair.var2) / 2.0)
        .collect();

    let overall_average = mean(&indicator_averages);

    let composite = match mode {
        SummaryMode::CompositeIndex => Some(composite_index(schema, &indicator_averages)),
        SummaryMode::PlainAverage => None,
    };

    Summary {
        sums,
        indicator_averages,
        overall_average,
        composite,
    }
}

/// Groups indicators by dimension in schema order, averages each dimension's
/// indicator averages and sums the weighted dimension averages. A dimension
/// takes its weight from its first indicator.
pub fn composite_index(schema: &[Indicator], indicator_averages: &[f64]) -> CompositeSummary {
    let mut groups: Vec<(&str, f64, Vec<f64>)> = Vec::new();

    for (indicator, average) in schema.iter().zip(indicator_averages) {
        match groups
            .iter_mut()
            .find(|(dimension, _, _)| *dimension == indicator.dimension)
        {
            Some((_, _, values)) => values.push(*average),
            None => groups.push((indicator.dimension.as_str(), indicator.weight, vec![*average])),
        }
    }

    let dimension_averages: Vec<DimensionScore> = groups
        .into_iter()
        .map(|(dimension, weight, values)| {
            let average = mean(&values);
            DimensionScore {
                dimension: dimension.to_string(),
                average,
                weight,
                weighted_value: average * weight / 100.0,
            }
        })
        .collect();

    let gwgi_value = dimension_averages.iter().map(|d| d.weighted_value).sum();

    CompositeSummary {
        dimension_averages,
        gwgi_value,
    }
}

/// Label for the overall-average row.
pub fn overall_average_label(filter: &DimensionFilter) -> String {
    match filter {
        DimensionFilter::AllIndicators => "Average of All Dimension".to_string(),
        DimensionFilter::Dimension(name) => format!("Average of {name} Indicators"),
        DimensionFilter::Unset => "Average of All Indicators".to_string(),
    }
}

impl Summary {
    /// Materializes the summary levels as rounded table rows.
    pub fn rows(&self, filter: &DimensionFilter, precision: u32) -> Vec<SummaryRow> {
        let width = self.sums.len();
        let mut rows = vec![
            SummaryRow {
                kind: SummaryKind::Sum,
                label: SUM_LABEL.to_string(),
                fields: self
                    .sums
                    .iter()
                    .map(|pair| FieldPair {
                        var1: Some(round_to(pair.var1, precision)),
                        var2: Some(round_to(pair.var2, precision)),
                    })
                    .collect(),
            },
            SummaryRow {
                kind: SummaryKind::IndicatorAverage,
                label: INDICATOR_AVERAGE_LABEL.to_string(),
                fields: self
                    .indicator_averages
                    .iter()
                    .map(|average| FieldPair {
                        var1: Some(round_to(*average, precision)),
                        var2: None,
                    })
                    .collect(),
            },
            SummaryRow {
                kind: SummaryKind::OverallAverage,
                label: overall_average_label(filter),
                fields: leading_scalar(width, round_to(self.overall_average, precision)),
            },
        ];

        if let Some(composite) = &self.composite {
            rows.push(SummaryRow {
                kind: SummaryKind::CompositeIndex,
                label: COMPOSITE_LABEL.to_string(),
                fields: leading_scalar(width, round_to(composite.gwgi_value, precision)),
            });
        }

        rows
    }
}

impl CompositeSummary {
    pub fn rounded(&self, precision: u32) -> CompositeSummary {
        CompositeSummary {
            dimension_averages: self
                .dimension_averages
                .iter()
                .map(|score| DimensionScore {
                    dimension: score.dimension.clone(),
                    average: round_to(score.average, precision),
                    weight: score.weight,
                    weighted_value: round_to(score.weighted_value, precision),
                })
                .collect(),
            gwgi_value: round_to(self.gwgi_value, precision),
        }
    }
}

/// A row holding one scalar in the first indicator's var1 slot.
fn leading_scalar(width: usize, value: f64) -> Vec<FieldPair> {
    let mut fields = vec![FieldPair::default(); width];
    if let Some(first) = fields.first_mut() {
        first.var1 = Some(value);
    }
    fields
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

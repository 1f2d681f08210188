use serde::{Deserialize, Serialize};

/// One indicator configured on a research template.
#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    pub name: String,
    pub dimension: String,
    /// Dimension weight as a percentage (0-100).
    pub weight: f64,
}

/// A single (response, indicator) measurement as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub response_id: String,
    pub indicator: String,
    pub variable1: f64,
    pub variable2: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VariablePair {
    pub var1: f64,
    pub var2: f64,
}

/// One survey response flattened across the schema. `values[i]` belongs to
/// the i-th indicator of the schema it was folded against.
#[derive(Debug, Clone, PartialEq)]
pub struct WideResponseRow {
    pub response_id: String,
    pub values: Vec<VariablePair>,
}

/// Dimension selection applied to both the schema and the raw entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<String>")]
pub enum DimensionFilter {
    /// No dimension supplied.
    #[default]
    Unset,
    /// The explicit "All Indicators" choice.
    AllIndicators,
    Dimension(String),
}

pub const ALL_INDICATORS: &str = "All Indicators";

impl DimensionFilter {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => DimensionFilter::Unset,
            Some(ALL_INDICATORS) => DimensionFilter::AllIndicators,
            Some(dimension) => DimensionFilter::Dimension(dimension.to_string()),
        }
    }

    /// The dimension to restrict queries to, if any.
    pub fn dimension(&self) -> Option<&str> {
        match self {
            DimensionFilter::Dimension(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

impl From<Option<String>> for DimensionFilter {
    fn from(value: Option<String>) -> Self {
        DimensionFilter::parse(value.as_deref())
    }
}

/// Which final summary level and chart shape a report produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    PlainAverage,
    CompositeIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    Sum,
    IndicatorAverage,
    OverallAverage,
    CompositeIndex,
}

/// A var1/var2 cell pair where either side may be left blank.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldPair {
    pub var1: Option<f64>,
    pub var2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub kind: SummaryKind,
    pub label: String,
    pub fields: Vec<FieldPair>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionScore {
    pub dimension: String,
    pub average: f64,
    pub weight: f64,
    pub weighted_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeSummary {
    pub dimension_averages: Vec<DimensionScore>,
    pub gwgi_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldType {
    Data,
    Float,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub fieldname: String,
    pub label: String,
    pub fieldtype: FieldType,
    pub width: u32,
}

/// A rendered table row: a response or one of the summary levels.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub label: String,
    pub summary: Option<SummaryKind>,
    pub fields: Vec<FieldPair>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub values: Vec<f64>,
}

use std::collections::HashMap;

use tracing::debug;

use crate::models::{Indicator, RawEntry, VariablePair, WideResponseRow};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// Rows in order of first appearance of each response id.
    pub rows: Vec<WideResponseRow>,
    /// Entries skipped because their indicator is not in the schema.
    pub dropped_entries: usize,
}

/// Maps indicator names to their schema position. The first occurrence wins
/// when a template lists the same name twice.
pub fn indicator_positions(schema: &[Indicator]) -> HashMap<&str, usize> {
    let mut positions = HashMap::with_capacity(schema.len());
    for (idx, indicator) in schema.iter().enumerate() {
        positions.entry(indicator.name.as_str()).or_insert(idx);
    }
    positions
}

/// Folds raw entries into one wide row per response. Every response that
/// appears in `entries` gets a row, even when none of its entries match the
/// schema, and every slot starts at zero. Repeated (response, indicator)
/// entries accumulate.
pub fn fold_responses(schema: &[Indicator], entries: &[RawEntry]) -> Aggregation {
    let positions = indicator_positions(schema);
    let mut row_index: HashMap<&str, usize> = HashMap::new();
    let mut aggregation = Aggregation::default();

    for entry in entries {
        let slot = *row_index
            .entry(entry.response_id.as_str())
            .or_insert_with(|| {
                aggregation.rows.push(WideResponseRow {
                    response_id: entry.response_id.clone(),
                    values: vec![VariablePair::default(); schema.len()],
                });
                aggregation.rows.len() - 1
            });

        let Some(&position) = positions.get(entry.indicator.as_str()) else {
            aggregation.dropped_entries += 1;
            continue;
        };

        let pair = &mut aggregation.rows[slot].values[position];
        pair.var1 += entry.variable1;
        pair.var2 += entry.variable2;
    }

    if aggregation.dropped_entries > 0 {
        debug!(
            dropped = aggregation.dropped_entries,
            "skipped entries for indicators outside the template"
        );
    }

    aggregation
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn one_row_per_response_with_every_indicator() {
        let schema = vec![indicator("A", "dim1", 60.0), indicator("B", "dim2", 40.0)];
        let entries = vec![
            entry("r1", "A", 2.0, 4.0),
            entry("r2", "B", 10.0, 6.0),
            entry("r1", "B", 6.0, 10.0),
        ];

        let aggregation = fold_responses(&schema, &entries);
        assert_eq!(aggregation.rows.len(), 2);
        assert_eq!(aggregation.rows[0].response_id, "r1");
        assert_eq!(aggregation.rows[1].response_id, "r2");
        for row in &aggregation.rows {
            assert_eq!(row.values.len(), schema.len());
        }
        assert_eq!(aggregation.rows[1].values[0], VariablePair::default());
        assert_eq!(
            aggregation.rows[1].values[1],
            VariablePair { var1: 10.0, var2: 6.0 }
        );
    }

    #[test]
    fn duplicate_entries_accumulate() {
        let schema = vec![indicator("A", "dim1", 100.0)];
        let entries = vec![entry("r1", "A", 1.5, 2.0), entry("r1", "A", 3.0, 0.5)];

        let aggregation = fold_responses(&schema, &entries);
        assert_eq!(aggregation.rows.len(), 1);
        assert_eq!(
            aggregation.rows[0].values[0],
            VariablePair { var1: 4.5, var2: 2.5 }
        );
    }

    #[test]
    fn unknown_indicators_are_dropped_but_response_kept() {
        let schema = vec![indicator("A", "dim1", 100.0)];
        let entries = vec![entry("r1", "Retired", 9.0, 9.0), entry("r2", "A", 1.0, 1.0)];

        let aggregation = fold_responses(&schema, &entries);
        assert_eq!(aggregation.dropped_entries, 1);
        assert_eq!(aggregation.rows.len(), 2);
        assert_eq!(aggregation.rows[0].values[0], VariablePair::default());
    }

    #[test]
    fn names_differing_by_whitespace_stay_separate() {
        let schema = vec![
            indicator("Srishant Dai", "dim1", 50.0),
            indicator("SrishantDai", "dim1", 50.0),
        ];
        let entries = vec![entry("r1", "Srishant Dai", 1.0, 2.0), entry("r1", "SrishantDai", 3.0, 4.0)];

        let aggregation = fold_responses(&schema, &entries);
        let values = &aggregation.rows[0].values;
        assert_eq!(values[0], VariablePair { var1: 1.0, var2: 2.0 });
        assert_eq!(values[1], VariablePair { var1: 3.0, var2: 4.0 });
    }

    #[test]
    fn no_entries_yields_no_rows() {
        let schema = vec![indicator("A", "dim1", 100.0)];
        let aggregation = fold_responses(&schema, &[]);
        assert!(aggregation.rows.is_empty());
        assert_eq!(aggregation.dropped_entries, 0);
    }
}

use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{DimensionFilter, Indicator, RawEntry};

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const DEMO_TEMPLATE: &str = "Groundwater Governance 2026";

pub async fn seed(pool: &PgPool) -> Result<()> {
    let indicators = vec![
        ("Policy Framework", "Institutional", 40.0),
        ("Stakeholder Coordination", "Institutional", 40.0),
        ("Monitoring Network", "Technical", 35.0),
        ("Data Sharing", "Technical", 35.0),
        ("Community Participation", "Social", 25.0),
    ];

    for (indicator, dimension, weight) in indicators {
        upsert_indicator(pool, DEMO_TEMPLATE, indicator, dimension, weight).await?;
    }

    let entries = vec![
        ("seed-001", "GW-0001", "Policy Framework", "Institutional", 3.0, 4.0),
        ("seed-002", "GW-0001", "Stakeholder Coordination", "Institutional", 2.0, 3.0),
        ("seed-003", "GW-0001", "Monitoring Network", "Technical", 4.0, 4.0),
        ("seed-004", "GW-0001", "Data Sharing", "Technical", 1.0, 2.0),
        ("seed-005", "GW-0001", "Community Participation", "Social", 5.0, 4.0),
        ("seed-006", "GW-0002", "Policy Framework", "Institutional", 4.0, 4.0),
        ("seed-007", "GW-0002", "Monitoring Network", "Technical", 3.0, 2.0),
        ("seed-008", "GW-0002", "Community Participation", "Social", 3.0, 3.0),
        ("seed-009", "GW-0003", "Stakeholder Coordination", "Institutional", 5.0, 4.0),
        ("seed-010", "GW-0003", "Data Sharing", "Technical", 2.0, 3.0),
    ];

    for (source_key, response_id, indicator, dimension, variable1, variable2) in entries {
        upsert_response(pool, DEMO_TEMPLATE, response_id).await?;
        insert_entry(
            pool,
            response_id,
            indicator,
            dimension,
            Some(variable1),
            Some(variable2),
            source_key,
        )
        .await?;
    }

    Ok(())
}

/// Indicators for a template in definition order. An unknown template
/// yields an empty list.
pub async fn fetch_indicators(
    pool: &PgPool,
    template: &str,
    filter: &DimensionFilter,
) -> Result<Vec<Indicator>> {
    let mut query = String::from(
        "SELECT i.indicator, i.dimension, i.weight_dimension \
         FROM survey_report.indicators i \
         WHERE i.template_name = $1",
    );

    if filter.dimension().is_some() {
        query.push_str(" AND i.dimension = $2");
    }
    query.push_str(" ORDER BY i.position, i.id");

    let mut rows = sqlx::query(&query).bind(template);
    if let Some(dimension) = filter.dimension() {
        rows = rows.bind(dimension);
    }

    let indicators: Vec<Indicator> = rows
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| Indicator {
            name: row.get("indicator"),
            dimension: row.get("dimension"),
            weight: row.get("weight_dimension"),
        })
        .collect();

    info!(template, count = indicators.len(), "loaded indicator schema");
    Ok(indicators)
}

/// Raw entries for every response of a template, ordered by submission.
/// Missing variables read as zero.
pub async fn fetch_raw_entries(
    pool: &PgPool,
    template: &str,
    filter: &DimensionFilter,
) -> Result<Vec<RawEntry>> {
    let mut query = String::from(
        "SELECT e.response_id, e.indicator, \
         COALESCE(e.variable1, 0) AS variable1, COALESCE(e.variable2, 0) AS variable2 \
         FROM survey_report.data_entries e \
         JOIN survey_report.survey_responses r ON r.id = e.response_id \
         WHERE r.template_name = $1",
    );

    if filter.dimension().is_some() {
        query.push_str(" AND e.dimension = $2");
    }
    query.push_str(" ORDER BY r.submitted_at, r.id, e.line_no");

    let mut rows = sqlx::query(&query).bind(template);
    if let Some(dimension) = filter.dimension() {
        rows = rows.bind(dimension);
    }

    let entries: Vec<RawEntry> = rows
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| RawEntry {
            response_id: row.get("response_id"),
            indicator: row.get("indicator"),
            variable1: row.get("variable1"),
            variable2: row.get("variable2"),
        })
        .collect();

    info!(template, count = entries.len(), "loaded raw survey entries");
    Ok(entries)
}

/// Distinct dimensions of a template in the order they are first used.
pub async fn fetch_dimensions(pool: &PgPool, template: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        SELECT dimension
        FROM survey_report.indicators
        WHERE template_name = $1
        GROUP BY dimension
        ORDER BY MIN(position)
        "#,
    )
    .bind(template)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.get("dimension")).collect())
}

pub async fn import_indicators_csv(pool: &PgPool, csv_path: &std::path::Path) -> Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        project_title: String,
        indicator: String,
        dimension: String,
        weight: f64,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut written = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        upsert_indicator(
            pool,
            &row.project_title,
            &row.indicator,
            &row.dimension,
            row.weight,
        )
        .await?;
        written += 1;
    }

    Ok(written)
}

pub async fn import_entries_csv(pool: &PgPool, csv_path: &std::path::Path) -> Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        project_title: String,
        response_id: String,
        indicator: String,
        dimension: String,
        variable1: Option<f64>,
        variable2: Option<f64>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        upsert_response(pool, &row.project_title, &row.response_id).await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        inserted += insert_entry(
            pool,
            &row.response_id,
            &row.indicator,
            &row.dimension,
            row.variable1,
            row.variable2,
            &source_key,
        )
        .await? as usize;
    }

    Ok(inserted)
}

async fn upsert_template(pool: &PgPool, template: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO survey_report.research_templates (name)
        VALUES ($1)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(template)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_indicator(
    pool: &PgPool,
    template: &str,
    indicator: &str,
    dimension: &str,
    weight: f64,
) -> Result<()> {
    upsert_template(pool, template).await?;
    sqlx::query(
        r#"
        INSERT INTO survey_report.indicators
        (template_name, position, indicator, dimension, weight_dimension)
        VALUES (
            $1,
            (SELECT COALESCE(MAX(position), 0) + 1
             FROM survey_report.indicators WHERE template_name = $1),
            $2, $3, $4
        )
        ON CONFLICT (template_name, indicator) DO UPDATE
        SET dimension = EXCLUDED.dimension, weight_dimension = EXCLUDED.weight_dimension
        "#,
    )
    .bind(template)
    .bind(indicator)
    .bind(dimension)
    .bind(weight)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_response(pool: &PgPool, template: &str, response_id: &str) -> Result<()> {
    upsert_template(pool, template).await?;
    sqlx::query(
        r#"
        INSERT INTO survey_report.survey_responses (id, template_name)
        VALUES ($1, $2)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(response_id)
    .bind(template)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns whether a new row was written; a repeated `source_key` is a no-op.
async fn insert_entry(
    pool: &PgPool,
    response_id: &str,
    indicator: &str,
    dimension: &str,
    variable1: Option<f64>,
    variable2: Option<f64>,
    source_key: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO survey_report.data_entries
        (id, response_id, line_no, indicator, dimension, variable1, variable2, source_key)
        VALUES (
            $1, $2,
            (SELECT COALESCE(MAX(line_no), 0) + 1
             FROM survey_report.data_entries WHERE response_id = $2),
            $3, $4, $5, $6, $7
        )
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(response_id)
    .bind(indicator)
    .bind(dimension)
    .bind(variable1)
    .bind(variable2)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

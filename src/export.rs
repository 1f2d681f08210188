use std::fmt::Write;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use chrono::NaiveDateTime;
use serde_json::Value;
use tokio::fs;
use tracing::info;

use crate::error::ExportError;
use crate::models::Column;
use crate::report::ReportOutput;

pub type Result<T> = std::result::Result<T, ExportError>;

const STYLE: &str = r#"
body { font-family: Arial, sans-serif; margin: 0; padding: 0; }
.report-header { text-align: center; margin-bottom: 20px; }
.report-title { font-size: 18px; font-weight: bold; }
.report-date { font-size: 12px; color: #666; }
.chart-container { text-align: center; margin: 20px 0; }
.chart-container img { max-width: 100%; height: auto; }
.table-container { overflow: visible; width: 100%; }
table { width: 100%; border-collapse: collapse; margin-top: 20px; page-break-inside: auto; }
thead { display: table-header-group; }
tr { page-break-inside: avoid; page-break-after: auto; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; font-size: 10px; }
th { background-color: #f2f2f2; font-weight: bold; }
tr:nth-child(even) { background-color: #f9f9f9; }
@page { size: landscape; margin: 1cm; }
"#;

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub report_name: String,
    /// Base64 PNG, optionally carrying a `data:image/png;base64,` prefix.
    pub chart_image: Option<String>,
    pub generated_at: NaiveDateTime,
}

/// Turns the HTML page into the bytes that get stored.
pub trait DocumentRenderer {
    fn extension(&self) -> &'static str;
    fn render(&self, html: &str) -> Result<Vec<u8>>;
}

/// Stores the page as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlDocument;

impl DocumentRenderer for HtmlDocument {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, html: &str) -> Result<Vec<u8>> {
        if html.is_empty() {
            return Err(ExportError::Render("empty document".to_string()));
        }
        Ok(html.as_bytes().to_vec())
    }
}

/// Strips any data-URL prefix and checks the payload decodes.
pub fn normalize_chart_image(image: &str) -> Result<String> {
    let payload = match image.split_once("base64,") {
        Some((_, rest)) => rest,
        None => image,
    }
    .trim();

    general_purpose::STANDARD
        .decode(payload)
        .map_err(|err| ExportError::InvalidChartImage(err.to_string()))?;
    Ok(payload.to_string())
}

pub fn encode_chart_image(png: &[u8]) -> String {
    general_purpose::STANDARD.encode(png)
}

/// Lays the report out as a standalone landscape page. Numeric cells always
/// show two decimals.
pub fn render_html(request: &ExportRequest, output: &ReportOutput) -> Result<String> {
    let title = escape_html(&request.report_name);
    let mut html = String::new();

    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html>");
    let _ = writeln!(html, "<head>");
    let _ = writeln!(html, "<meta charset=\"utf-8\">");
    let _ = writeln!(html, "<title>{title}</title>");
    let _ = writeln!(html, "<style>{STYLE}</style>");
    let _ = writeln!(html, "</head>");
    let _ = writeln!(html, "<body>");
    let _ = writeln!(html, "<div class=\"report-header\">");
    let _ = writeln!(html, "<div class=\"report-title\">{title}</div>");
    let _ = writeln!(
        html,
        "<div class=\"report-date\">Generated on: {}</div>",
        request.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(html, "</div>");

    if let Some(image) = &request.chart_image {
        let payload = normalize_chart_image(image)?;
        let _ = writeln!(html, "<div class=\"chart-container\">");
        let _ = writeln!(html, "<h3>Chart Visualization</h3>");
        let _ = writeln!(
            html,
            "<img src=\"data:image/png;base64,{payload}\" alt=\"Survey Chart\">"
        );
        let _ = writeln!(html, "</div>");
    }

    let visible: Vec<&Column> = output
        .columns
        .iter()
        .filter(|column| !column.fieldname.starts_with("parent"))
        .collect();

    let _ = writeln!(html, "<h3>Detailed Data</h3>");
    let _ = write!(html, "<div class=\"table-container\"><table><thead><tr>");
    for column in &visible {
        let _ = write!(html, "<th>{}</th>", escape_html(&column.label));
    }
    let _ = writeln!(html, "</tr></thead><tbody>");

    for row in &output.rows {
        let _ = write!(html, "<tr>");
        for column in &visible {
            let cell = match row.value(&column.fieldname) {
                Some(Value::Number(n)) => format!("{:.2}", n.as_f64().unwrap_or(0.0)),
                Some(Value::String(s)) => escape_html(&s),
                _ => String::new(),
            };
            let _ = write!(html, "<td>{cell}</td>");
        }
        let _ = writeln!(html, "</tr>");
    }

    let _ = writeln!(html, "</tbody></table></div>");
    let _ = writeln!(html, "</body>");
    let _ = writeln!(html, "</html>");

    Ok(html)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Directory-backed store for rendered exports.
#[derive(Debug, Clone)]
pub struct ExportStore {
    root: PathBuf,
}

impl ExportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_id(report_name: &str, generated_at: NaiveDateTime, extension: &str) -> String {
        let base: String = report_name
            .trim()
            .to_lowercase()
            .chars()
            .map(|ch| match ch {
                ' ' => '_',
                '/' | '\\' => '-',
                other => other,
            })
            .collect();
        let base = base.replace("..", "_");
        format!("{base}_{}.{extension}", generated_at.format("%Y%m%d_%H%M%S"))
    }

    pub async fn save(&self, file_id: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(file_id)?;
        fs::create_dir_all(&self.root).await?;
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    pub async fn load(&self, file_id: &str) -> Result<Vec<u8>> {
        let path = self.path_for(file_id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ExportError::NotFound(file_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn path_for(&self, file_id: &str) -> Result<PathBuf> {
        if file_id.is_empty()
            || file_id.contains('/')
            || file_id.contains('\\')
            || file_id.contains("..")
        {
            return Err(ExportError::InvalidFileId(file_id.to_string()));
        }
        Ok(self.root.join(file_id))
    }
}

/// Renders a computed report and persists it. Returns the stored file id.
pub async fn export_report(
    store: &ExportStore,
    renderer: &dyn DocumentRenderer,
    request: &ExportRequest,
    output: &ReportOutput,
) -> Result<String> {
    let html = render_html(request, output)?;
    let bytes = renderer.render(&html)?;
    let file_id = ExportStore::file_id(
        &request.report_name,
        request.generated_at,
        renderer.extension(),
    );
    let path = store.save(&file_id, &bytes).await?;
    info!(file_id = %file_id, path = %path.display(), "export written");
    Ok(file_id)
}

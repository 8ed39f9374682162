// Bundled HTML report renderer

use async_trait::async_trait;
use serpwatch_core::domain::StagingRecord;
use serpwatch_core::port::{RenderError, ResultRenderer};
use std::fmt::Write;

/// Renders a static HTML table of the listings. PNG snapshots need a
/// headless browser and are reported as unsupported.
#[derive(Debug, Default)]
pub struct HtmlReportRenderer;

impl HtmlReportRenderer {
    pub fn new() -> Self {
        Self
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render(record: &StagingRecord) -> Result<String, std::fmt::Error> {
    let mut html = String::new();
    let title = format!("{} ({})", escape(&record.query), escape(&record.location));

    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html><head><meta charset=\"utf-8\"><title>{}</title></head><body>", title)?;
    writeln!(html, "<h1>{}</h1>", title)?;
    writeln!(
        html,
        "<p>Job {} captured {} &middot; {} total results</p>",
        escape(&record.external_job_id),
        record.timestamp.to_rfc3339(),
        record.content.total_results
    )?;

    writeln!(html, "<h2>Paid ({})</h2><table>", record.content.paid.len())?;
    writeln!(html, "<tr><th>#</th><th>Title</th><th>Shown URL</th></tr>")?;
    for ad in &record.content.paid {
        writeln!(
            html,
            "<tr><td>{}</td><td><a href=\"{}\">{}</a></td><td>{}</td></tr>",
            ad.pos,
            escape(&ad.url),
            escape(&ad.title),
            escape(&ad.url_shown)
        )?;
    }
    writeln!(html, "</table>")?;

    writeln!(html, "<h2>Organic ({})</h2><table>", record.content.organic.len())?;
    writeln!(html, "<tr><th>#</th><th>Overall</th><th>Title</th></tr>")?;
    for result in &record.content.organic {
        writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td><a href=\"{}\">{}</a></td></tr>",
            result.pos,
            result.pos_overall,
            escape(&result.url),
            escape(&result.title)
        )?;
    }
    writeln!(html, "</table></body></html>")?;
    Ok(html)
}

#[async_trait]
impl ResultRenderer for HtmlReportRenderer {
    async fn render_html(&self, record: &StagingRecord) -> Result<String, RenderError> {
        render(record).map_err(|e| RenderError::Failed(e.to_string()))
    }

    async fn render_png(&self, _html: &str) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Unsupported(
            "png snapshots need a headless browser".to_string(),
        ))
    }
}

//! Standalone HTML rendering of an evaluation run.
use std::fs;
use std::path::Path;

use maud::{html, Markup, DOCTYPE};

use crate::config::Selection;
use crate::error::Result;
use crate::evaluation::EvaluationReport;

const STYLE: &str = "body{font-family:sans-serif;margin:2em;}\
table{border-collapse:collapse;margin:1em 0;}\
td,th{border:1px solid #ccc;padding:4px 10px;text-align:right;}\
th{background:#f0f0f0;}";

pub fn render_html_report(report: &EvaluationReport, selection: &Selection) -> Markup {
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let labels: Vec<&str> = report.per_class.iter().map(|m| m.label.as_str()).collect();

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { "emoface comparison report" }
                style { (STYLE) }
            }
            body {
                h1 { "Facial expression recognition" }
                p { "Generated " (generated) }

                h2 { "Overview" }
                table {
                    tr { th { "Model" } td { (selection.model) } }
                    tr { th { "Dataset" } td { (selection.dataset) } }
                    tr { th { "Features" } td { (selection.algorithm) } }
                    tr { th { "Test samples" } td { (report.n_samples) } }
                    tr { th { "Accuracy" } td { (format!("{:.4}", report.accuracy)) } }
                }

                h2 { "Per-class metrics" }
                table {
                    tr { th { "Class" } th { "Precision" } th { "Recall" } th { "Support" } }
                    @for m in &report.per_class {
                        tr {
                            td { (m.label) }
                            td { (format!("{:.3}", m.precision)) }
                            td { (format!("{:.3}", m.recall)) }
                            td { (m.support) }
                        }
                    }
                }

                h2 { "Confusion matrix" }
                p { "Rows are true classes, columns predicted classes." }
                table {
                    tr {
                        th {}
                        @for l in &labels { th { (l) } }
                    }
                    @for (i, row) in report.confusion.rows().into_iter().enumerate() {
                        tr {
                            th { (labels.get(i).copied().unwrap_or("?")) }
                            @for v in row.iter() { td { (v) } }
                        }
                    }
                }
            }
        }
    }
}

/// Render the report and write it to `path`.
pub fn write_html_report(report: &EvaluationReport, selection: &Selection, path: &Path) -> Result<()> {
    fs::write(path, render_html_report(report, selection).into_string())?;
    log::info!("Report written to {}", path.display());
    Ok(())
}

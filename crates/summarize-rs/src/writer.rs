//! Report rendering: CSV and Markdown output.

use std::path::Path;

use serde_json::Value;

use crate::merge::SummaryEntry;

/// Default CSV column order: the summary fields first, then the ticket
/// fields attached by the pipeline.
pub const DEFAULT_CSV_COLUMNS: &[&str] = &[
    "incident",
    "summary",
    "number",
    "description",
    "work_notes",
    "comments",
    "opened_at",
    "resolved_at",
    "closed_at",
    "assignment_group",
    "original_assignment_group",
];

/// Write rows as a comma-delimited table with a fixed column ordering.
/// Fields a row doesn't carry render as empty cells.
pub fn write_csv(rows: &[SummaryEntry], path: &Path, columns: &[&str]) -> Result<(), String> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| format!("failed to create '{}': {e}", path.display()))?;

    writer
        .write_record(columns)
        .map_err(|e| format!("failed to write CSV header: {e}"))?;

    for row in rows {
        let record: Vec<String> = columns.iter().map(|col| cell_text(row.get(*col))).collect();
        writer
            .write_record(&record)
            .map_err(|e| format!("failed to write CSV row: {e}"))?;
    }

    writer
        .flush()
        .map_err(|e| format!("failed to flush '{}': {e}", path.display()))
}

/// Write rows as a two-column Markdown pipe table (`incident`, `summary`).
/// Literal pipes in values are escaped so they can't break table structure.
pub fn write_markdown(rows: &[SummaryEntry], path: &Path) -> Result<(), String> {
    let mut out = String::from("| incident | summary |\n|---|---|\n");
    for row in rows {
        let incident = escape_pipes(&cell_text(row.get("incident")));
        let summary = escape_pipes(&cell_text(row.get("summary")));
        out.push_str(&format!("| {incident} | {summary} |\n"));
    }
    std::fs::write(path, out).map_err(|e| format!("failed to write '{}': {e}", path.display()))
}

/// Render one JSON value as cell text: strings verbatim, missing/null as
/// empty, anything else via its JSON form.
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn escape_pipes(text: &str) -> String {
    text.replace('|', "&#124;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(pairs: &[(&str, Value)]) -> SummaryEntry {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn csv_uses_fixed_column_order_with_empty_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let rows = vec![
            entry(&[
                ("incident", json!("INC1")),
                ("summary", json!("printer fire")),
                ("number", json!("INC1")),
            ]),
            entry(&[("incident", json!("INC2")), ("priority", json!(1))]),
        ];

        write_csv(&rows, &path, &["incident", "summary", "number"]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("incident,summary,number"));
        assert_eq!(lines.next(), Some("INC1,printer fire,INC1"));
        // Missing summary and number render empty; extra keys are not emitted.
        assert_eq!(lines.next(), Some("INC2,,"));
    }

    #[test]
    fn csv_renders_non_string_values_as_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let rows = vec![entry(&[("incident", json!(7)), ("summary", json!("ok"))])];

        write_csv(&rows, &path, &["incident", "summary"]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("7,ok"));
    }

    #[test]
    fn markdown_escapes_pipes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.md");
        let rows = vec![entry(&[
            ("incident", json!("INC|1")),
            ("summary", json!("a | b")),
        ])];

        write_markdown(&rows, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "| incident | summary |\n|---|---|\n| INC&#124;1 | a &#124; b |\n"
        );
    }

    #[test]
    fn markdown_empty_rows_still_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.md");
        write_markdown(&[], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "| incident | summary |\n|---|---|\n");
    }
}

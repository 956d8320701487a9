use airtable_rs::config::DisplayConfig;
use airtable_rs::RecordDict;
use anyhow::Result;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use crossterm::style::Stylize;
use serde_json::Value;

/// Column order: every field name in first-seen order across all records
pub fn collect_field_names(records: &[RecordDict]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        for key in record.fields.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
    }
    names
}

/// Render a cell for humans: strings bare, arrays of scalars comma-joined,
/// attachments and collaborators by their most readable key
pub fn format_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| format_cell(Some(item)))
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::Object(obj)) => ["name", "filename", "email", "label", "text", "url", "id"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
    }
}

fn truncate(text: String, max_width: usize) -> String {
    if max_width == 0 || text.chars().count() <= max_width {
        return text;
    }
    let kept: String = text.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", kept)
}

pub fn build_table(records: &[RecordDict], config: &DisplayConfig) -> Table {
    let field_names = collect_field_names(records);

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut headers: Vec<Cell> = Vec::new();
    if config.show_record_id {
        headers.push(Cell::new("id").add_attribute(Attribute::Bold));
    }
    headers.extend(
        field_names
            .iter()
            .map(|f| Cell::new(f).add_attribute(Attribute::Bold)),
    );
    table.set_header(headers);

    for record in records {
        let mut row: Vec<String> = Vec::new();
        if config.show_record_id {
            row.push(record.id.clone());
        }
        row.extend(field_names.iter().map(|field| {
            truncate(format_cell(record.fields.get(field)), config.max_column_width)
        }));
        table.add_row(row);
    }

    table
}

pub fn display_records(records: &[RecordDict], config: &DisplayConfig) {
    if records.is_empty() {
        println!("{}", "No records found.".yellow());
        return;
    }

    println!("{}", build_table(records, config));
    println!("\n{}", format!("{} records returned", records.len()).green());
}

/// Write records to a CSV file; the first columns are `id` and `createdTime`
pub fn export_to_csv(records: &[RecordDict], filename: &str) -> Result<()> {
    let mut wtr = csv::Writer::from_path(filename)?;
    let field_names = collect_field_names(records);

    let mut headers = vec!["id".to_string(), "createdTime".to_string()];
    headers.extend(field_names.iter().cloned());
    wtr.write_record(&headers)?;

    for record in records {
        let mut row = vec![record.id.clone(), record.created_time.clone()];
        row.extend(field_names.iter().map(|f| match record.fields.get(f) {
            Some(Value::String(s)) => s.clone(),
            None | Some(Value::Null) => String::new(),
            Some(v) => v.to_string(),
        }));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    println!(
        "{}",
        format!("{} records exported to {}", records.len(), filename).green()
    );
    Ok(())
}

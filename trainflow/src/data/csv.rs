//! CSV reading and writing for [`Table`].
//!
//! Fields follow RFC 4180 quoting. Unquoted fields that look numeric load as
//! numbers, empty unquoted fields as missing; everything else is text. The
//! writer quotes any text that would otherwise read back as a number or as
//! missing, so a written table loads back unchanged.

use super::table::{Cell, Table};
use crate::errors::{PipelineError, Result};
use crate::utils::ensure_parent_dir;
use std::path::Path;

/// Reads a CSV file with a header row.
pub fn read_csv(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let table = parse_csv(&text)
        .map_err(|e| PipelineError::data(format!("{}: {e}", path.display())))?;
    tracing::debug!(
        path = %path.display(),
        rows = table.n_rows(),
        cols = table.n_cols(),
        "Read CSV"
    );
    Ok(table)
}

/// Writes a table with a header row, creating parent directories.
pub fn write_csv(path: &Path, table: &Table) -> Result<()> {
    ensure_parent_dir(path)?;
    std::fs::write(path, to_csv_string(table)).map_err(|e| PipelineError::io(path, e))?;
    tracing::debug!(path = %path.display(), rows = table.n_rows(), "Wrote CSV");
    Ok(())
}

/// Parses CSV text. An empty input yields an empty table.
pub fn parse_csv(text: &str) -> std::result::Result<Table, String> {
    let mut records = split_records(text)?.into_iter();
    let Some(header) = records.next() else {
        return Ok(Table::default());
    };
    let columns: Vec<String> = header.into_iter().map(|f| f.value).collect();

    let mut table = Table::new(columns);
    for (line, record) in records.enumerate() {
        let row: Vec<Cell> = record.into_iter().map(Field::into_cell).collect();
        table
            .push_row(row)
            .map_err(|e| format!("record {}: {e}", line + 2))?;
    }
    Ok(table)
}

/// Renders a table as CSV text.
#[must_use]
pub fn to_csv_string(table: &Table) -> String {
    let mut out = String::new();
    write_record(&mut out, table.columns().iter().map(|c| quote_text(c, false)));
    for row in table.rows() {
        write_record(&mut out, row.iter().map(render_cell));
    }
    out
}

fn write_record(out: &mut String, fields: impl Iterator<Item = String>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&field);
    }
    out.push('\n');
}

fn render_cell(cell: &Cell) -> String {
    match cell {
        Cell::Missing => String::new(),
        // Non-finite numbers have no CSV spelling that reads back as a number.
        Cell::Number(n) if !n.is_finite() => String::new(),
        Cell::Number(n) => n.to_string(),
        Cell::Text(s) => quote_text(s, true),
    }
}

fn quote_text(s: &str, protect_value: bool) -> String {
    let needs_quotes = s.contains([',', '"', '\n', '\r'])
        || (protect_value && (s.is_empty() || parse_number(s).is_some()));
    if needs_quotes {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Only finite values count as numbers; spellings such as `-nan` or `+inf`
/// stay text.
fn parse_number(s: &str) -> Option<f64> {
    let first = s.chars().next()?;
    if first.is_ascii_digit() || matches!(first, '+' | '-' | '.') {
        s.parse().ok().filter(|n: &f64| n.is_finite())
    } else {
        None
    }
}

struct Field {
    value: String,
    quoted: bool,
}

impl Field {
    fn into_cell(self) -> Cell {
        if self.quoted {
            return Cell::Text(self.value);
        }
        if self.value.is_empty() {
            return Cell::Missing;
        }
        parse_number(&self.value).map_or(Cell::Text(self.value), Cell::Number)
    }
}

fn split_records(text: &str) -> std::result::Result<Vec<Vec<Field>>, String> {
    let mut records = Vec::new();
    let mut record: Vec<Field> = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            ',' => record.push(Field {
                value: std::mem::take(&mut field),
                quoted: std::mem::replace(&mut quoted, false),
            }),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(Field {
                    value: std::mem::take(&mut field),
                    quoted: std::mem::replace(&mut quoted, false),
                });
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if !field.is_empty() || quoted || !record.is_empty() {
        record.push(Field {
            value: field,
            quoted,
        });
        records.push(record);
    }
    Ok(records)
}

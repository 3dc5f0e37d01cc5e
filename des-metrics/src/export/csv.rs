//! CSV export and import for trial results
//!
//! Layout: a header row `Run,<column>,...` followed by one row per run. Values
//! are written as the shortest decimal text that parses back to the same
//! `f64`, so a table survives an export/import cycle bit for bit.

use crate::error::MetricsError;
use crate::export::TrialExporter;
use crate::run_result::RunResult;
use crate::trial::TrialResultTable;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the leading run-index column.
pub const RUN_COLUMN: &str = "Run";

/// CSV exporter for trial tables
#[derive(Debug)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    /// Create a new CSV exporter writing to `path`. Missing parent directories
    /// are created on export.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl TrialExporter for CsvExporter {
    fn export(&self, table: &TrialResultTable) -> Result<(), MetricsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(&self.path)?);
        write_csv(table, &mut writer)?;
        writer.flush()?;
        info!(path = %self.path.display(), runs = table.len(), "Trial results written");
        Ok(())
    }
}

/// Writes `table` as CSV to `writer`.
pub fn write_csv<W: Write>(table: &TrialResultTable, writer: &mut W) -> Result<(), MetricsError> {
    let header: Vec<String> = std::iter::once(RUN_COLUMN.to_string())
        .chain(table.columns().iter().map(|c| escape_csv(c)))
        .collect();
    writeln!(writer, "{}", header.join(","))?;

    for row in table.rows() {
        write!(writer, "{}", row.run_index)?;
        for (_, value) in &row.values {
            write!(writer, ",{value}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Reads a trial table from the CSV file at `path`.
pub fn import_csv(path: impl AsRef<Path>) -> Result<TrialResultTable, MetricsError> {
    let file = File::open(path.as_ref())?;
    read_csv(BufReader::new(file))
}

/// Reads a trial table from CSV text. The returned table is finalized.
pub fn read_csv<R: BufRead>(reader: R) -> Result<TrialResultTable, MetricsError> {
    let mut lines = reader
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !matches!(line, Ok(l) if l.trim().is_empty()));

    let (header_line, header) = match lines.next() {
        Some((n, line)) => (n, line?),
        None => {
            return Err(MetricsError::Parse {
                line: 1,
                reason: "missing header row".to_string(),
            })
        }
    };

    let header = split_csv_line(header.trim_end_matches('\r')).map_err(|reason| {
        MetricsError::Parse {
            line: header_line,
            reason,
        }
    })?;
    if header.first().map(String::as_str) != Some(RUN_COLUMN) {
        return Err(MetricsError::Parse {
            line: header_line,
            reason: format!("first column must be '{RUN_COLUMN}'"),
        });
    }
    let columns: Vec<String> = header[1..].to_vec();
    let mut table = TrialResultTable::new(columns.iter().cloned());

    for (line_no, line) in lines {
        let line = line?;
        let fields = split_csv_line(line.trim_end_matches('\r')).map_err(|reason| {
            MetricsError::Parse {
                line: line_no,
                reason,
            }
        })?;
        if fields.len() != columns.len() + 1 {
            return Err(MetricsError::Parse {
                line: line_no,
                reason: format!(
                    "expected {} fields, found {}",
                    columns.len() + 1,
                    fields.len()
                ),
            });
        }

        let run_index = fields[0].trim().parse::<usize>().map_err(|e| MetricsError::Parse {
            line: line_no,
            reason: format!("invalid run index '{}': {e}", fields[0]),
        })?;

        let values = columns
            .iter()
            .zip(&fields[1..])
            .map(|(column, field)| {
                field
                    .trim()
                    .parse::<f64>()
                    .map(|v| (column.clone(), v))
                    .map_err(|e| MetricsError::Parse {
                        line: line_no,
                        reason: format!("invalid value '{field}' for {column}: {e}"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        table.push(RunResult::new(run_index, None, values))?;
    }

    table.finalize();
    Ok(table)
}

/// Escape CSV field (add quotes if needed)
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Splits one CSV line, honouring double-quoted fields.
fn split_csv_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            (true, '"') => quoted = false,
            (true, c) => field.push(c),
            (false, '"') if field.is_empty() => quoted = true,
            (false, ',') => fields.push(std::mem::take(&mut field)),
            (false, c) => field.push(c),
        }
    }

    if quoted {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

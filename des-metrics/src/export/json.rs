//! JSON export for trial results
//!
//! Exports runs and cross-run aggregates in a structure suitable for
//! programmatic consumption and plotting tools.

use crate::error::MetricsError;
use crate::export::TrialExporter;
use crate::summary::Summary;
use crate::trial::TrialResultTable;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// JSON exporter for trial tables
#[derive(Debug)]
pub struct JsonExporter {
    path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    /// Create a new JSON exporter
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `pretty` - Whether to pretty-print the JSON (adds whitespace for readability)
    pub fn new(path: &Path, pretty: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            pretty,
        }
    }
}

impl TrialExporter for JsonExporter {
    fn export(&self, table: &TrialResultTable) -> Result<(), MetricsError> {
        let json = to_json(table, self.pretty)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// Renders `table` as a JSON document.
pub fn to_json(table: &TrialResultTable, pretty: bool) -> Result<String, MetricsError> {
    let export_data = ExportData::from(table);
    let json = if pretty {
        serde_json::to_string_pretty(&export_data)?
    } else {
        serde_json::to_string(&export_data)?
    };
    Ok(json)
}

/// Complete export data structure
#[derive(Debug, Serialize)]
struct ExportData<'a> {
    columns: &'a [String],
    runs: Vec<RunEntry<'a>>,
    aggregates: Vec<AggregateEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct RunEntry<'a> {
    run: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    entities: Option<usize>,
    values: BTreeMap<&'a str, f64>,
}

#[derive(Debug, Serialize)]
struct AggregateEntry<'a> {
    column: &'a str,
    #[serde(flatten)]
    summary: Summary,
}

impl<'a> From<&'a TrialResultTable> for ExportData<'a> {
    fn from(table: &'a TrialResultTable) -> Self {
        let runs = table
            .rows()
            .iter()
            .map(|row| RunEntry {
                run: row.run_index,
                entities: row.entities,
                values: row.values.iter().map(|(c, v)| (c.as_str(), *v)).collect(),
            })
            .collect();

        // Columns without data are left out rather than reported as zeros.
        let aggregates = table
            .columns()
            .iter()
            .filter_map(|c| {
                table.aggregate(c).ok().map(|summary| AggregateEntry {
                    column: c.as_str(),
                    summary,
                })
            })
            .collect();

        Self {
            columns: table.columns(),
            runs,
            aggregates,
        }
    }
}

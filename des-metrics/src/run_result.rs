use serde::{Deserialize, Serialize};

use crate::collector::StatisticsCollector;
use crate::error::MetricsError;

/// Prefix added to a metric name to form its per-run column.
pub const MEAN_PREFIX: &str = "Mean_";

/// Column name holding the mean of `metric`.
pub fn mean_column(metric: &str) -> String {
    format!("{MEAN_PREFIX}{metric}")
}

/// Summary of a single replication: one mean per declared metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_index: usize,
    /// Entities whose records were accepted. Unknown for rows read back from CSV.
    pub entities: Option<usize>,
    /// `(column, value)` pairs in column order.
    pub values: Vec<(String, f64)>,
}

impl RunResult {
    pub fn new(run_index: usize, entities: Option<usize>, values: Vec<(String, f64)>) -> Self {
        Self {
            run_index,
            entities,
            values,
        }
    }

    /// Builds the row for `run_index` from the means of every declared metric.
    ///
    /// Fails with [`MetricsError::InsufficientData`] if any metric has no
    /// samples; no value is ever zero-filled.
    pub fn from_collector(
        run_index: usize,
        collector: &StatisticsCollector,
    ) -> Result<Self, MetricsError> {
        let values = collector
            .metric_names()
            .map(|name| Ok((mean_column(name), collector.mean(name)?)))
            .collect::<Result<Vec<_>, MetricsError>>()?;
        Ok(Self::new(run_index, Some(collector.entities()), values))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    pub fn value(&self, column: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_collector() {
        let mut c = StatisticsCollector::with_metrics(["Q_Time_Nurse", "Time_In_System"]);
        c.record("Q_Time_Nurse", 2.0).unwrap();
        c.record("Q_Time_Nurse", 4.0).unwrap();
        c.record("Time_In_System", 10.0).unwrap();
        c.record_entity();

        let row = RunResult::from_collector(3, &c).unwrap();
        assert_eq!(row.run_index, 3);
        assert_eq!(row.entities, Some(1));
        assert_eq!(
            row.columns().collect::<Vec<_>>(),
            vec!["Mean_Q_Time_Nurse", "Mean_Time_In_System"]
        );
        assert_eq!(row.value("Mean_Q_Time_Nurse"), Some(3.0));
        assert_eq!(row.value("missing"), None);
    }

    #[test]
    fn test_empty_stage_fails() {
        let mut c = StatisticsCollector::with_metrics(["Q_Time_Nurse", "Q_Time_ACU"]);
        c.record("Q_Time_Nurse", 2.0).unwrap();
        let err = RunResult::from_collector(0, &c).unwrap_err();
        assert!(matches!(err, MetricsError::InsufficientData { stage } if stage == "Q_Time_ACU"));
    }
}

//! Per-run sample collection.
//!
//! One [`StatisticsCollector`] lives for one replication. Processes push their
//! per-stage queue times and their time in system into it when they depart;
//! the run controller turns it into a [`RunResult`](crate::RunResult) at the
//! end of the run.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::error::MetricsError;
use crate::summary::Summary;

/// Collector shared by the processes of one run.
pub type SharedCollector = Rc<RefCell<StatisticsCollector>>;

/// Named sample series, kept in declaration order.
#[derive(Debug, Clone, Default)]
pub struct StatisticsCollector {
    metrics: Vec<(String, Vec<f64>)>,
    entities: usize,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector with `names` declared up front, fixing the column order.
    pub fn with_metrics<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut collector = Self::new();
        for name in names {
            collector.declare(name);
        }
        collector
    }

    pub fn shared(self) -> SharedCollector {
        Rc::new(RefCell::new(self))
    }

    /// Declares a metric. Declaring an existing metric is a no-op.
    pub fn declare(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.position(&name).is_none() {
            self.metrics.push((name, Vec::new()));
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.metrics.iter().position(|(n, _)| n == name)
    }

    /// Records one sample, declaring the metric on first use.
    ///
    /// Negative and non-finite values are rejected.
    pub fn record(&mut self, name: &str, value: f64) -> Result<(), MetricsError> {
        if !value.is_finite() || value < 0.0 {
            return Err(MetricsError::InvalidSample {
                metric: name.to_string(),
                value,
            });
        }
        let index = match self.position(name) {
            Some(index) => index,
            None => {
                self.metrics.push((name.to_string(), Vec::new()));
                self.metrics.len() - 1
            }
        };
        self.metrics[index].1.push(value);
        trace!(metric = name, value, "Sample recorded");
        Ok(())
    }

    /// Counts one entity whose records were accepted.
    pub fn record_entity(&mut self) {
        self.entities += 1;
    }

    pub fn entities(&self) -> usize {
        self.entities
    }

    /// Samples recorded for `name`.
    pub fn samples(&self, name: &str) -> Option<&[f64]> {
        self.position(name).map(|i| self.metrics[i].1.as_slice())
    }

    pub fn count(&self, name: &str) -> usize {
        self.samples(name).map_or(0, <[f64]>::len)
    }

    /// Mean of `name`. An undeclared or empty metric has no mean.
    pub fn mean(&self, name: &str) -> Result<f64, MetricsError> {
        self.summary(name).map(|s| s.mean)
    }

    pub fn summary(&self, name: &str) -> Result<Summary, MetricsError> {
        self.samples(name)
            .and_then(Summary::from_samples)
            .ok_or_else(|| MetricsError::InsufficientData {
                stage: name.to_string(),
            })
    }

    /// Metric names in declaration order.
    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.metrics.iter().map(|(n, _)| n.as_str())
    }
}

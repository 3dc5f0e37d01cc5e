//! Patient records and the per-run patient table.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use patientflow_core::SimTime;
use patientflow_metrics::{escape_csv, MetricsError};
use serde::{Deserialize, Serialize};

/// Where a patient is in its pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatientState {
    Arrived,
    Queued { stage: String },
    InService { stage: String },
    Departed,
}

/// One visit to a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub queue_entry: SimTime,
    pub queue_exit: Option<SimTime>,
    /// Sampled service duration (or amount, for container draws).
    pub service: Option<f64>,
    pub release: Option<SimTime>,
}

impl StageRecord {
    /// Time spent waiting, once service has started.
    pub fn queue_time(&self) -> Option<f64> {
        self.queue_exit.map(|exit| exit.duration_since(self.queue_entry))
    }
}

/// A single entity flowing through the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Sequential within its stream, starting at 1.
    pub id: u64,
    pub stream: String,
    pub arrived: SimTime,
    pub state: PatientState,
    pub priority: Option<i64>,
    pub stages: Vec<StageRecord>,
    /// Branch decisions as `(branch, taken)`.
    pub branches: Vec<(String, bool)>,
    pub departed: Option<SimTime>,
}

impl Patient {
    pub fn new(id: u64, stream: impl Into<String>, arrived: SimTime) -> Self {
        Self {
            id,
            stream: stream.into(),
            arrived,
            state: PatientState::Arrived,
            priority: None,
            stages: Vec::new(),
            branches: Vec::new(),
            departed: None,
        }
    }

    pub(crate) fn enter_queue(&mut self, stage: &str, now: SimTime) {
        self.state = PatientState::Queued {
            stage: stage.to_string(),
        };
        self.stages.push(StageRecord {
            stage: stage.to_string(),
            queue_entry: now,
            queue_exit: None,
            service: None,
            release: None,
        });
    }

    pub(crate) fn start_service(&mut self, now: SimTime, service: f64) {
        if let Some(record) = self.stages.last_mut() {
            record.queue_exit = Some(now);
            record.service = Some(service);
            self.state = PatientState::InService {
                stage: record.stage.clone(),
            };
        }
    }

    pub(crate) fn finish_stage(&mut self, now: SimTime) {
        if let Some(record) = self.stages.last_mut() {
            record.release = Some(now);
        }
    }

    pub(crate) fn record_branch(&mut self, branch: &str, taken: bool) {
        self.branches.push((branch.to_string(), taken));
    }

    pub(crate) fn depart(&mut self, now: SimTime) {
        self.state = PatientState::Departed;
        self.departed = Some(now);
    }

    pub fn time_in_system(&self) -> Option<f64> {
        self.departed.map(|d| d.duration_since(self.arrived))
    }

    /// Total queue time at `stage`, summed over visits.
    pub fn queue_time(&self, stage: &str) -> Option<f64> {
        self.stages
            .iter()
            .filter(|r| r.stage == stage)
            .filter_map(StageRecord::queue_time)
            .fold(None, |acc, q| Some(acc.unwrap_or(0.0) + q))
    }

    /// Whether `branch` was taken, if it was reached.
    pub fn branch(&self, branch: &str) -> Option<bool> {
        self.branches
            .iter()
            .find(|(b, _)| b == branch)
            .map(|(_, taken)| *taken)
    }
}

/// Departed patients of one run whose records were accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientTable {
    stages: Vec<String>,
    patients: Vec<Patient>,
}

impl PatientTable {
    pub fn new(stages: Vec<String>) -> Self {
        Self {
            stages,
            patients: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, patient: Patient) {
        self.patients.push(patient);
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    /// Writes one row per patient: `P_ID,Stream,Arrived,Departed,Priority`,
    /// then the queue time at each stage (blank if not visited), then the time
    /// in system.
    pub fn write_csv<W: Write>(&self, writer: &mut W) -> Result<(), MetricsError> {
        let mut header = vec![
            "P_ID".to_string(),
            "Stream".to_string(),
            "Arrived".to_string(),
            "Departed".to_string(),
            "Priority".to_string(),
        ];
        header.extend(self.stages.iter().map(|s| escape_csv(&format!("Q_Time_{s}"))));
        header.push("Time_In_System".to_string());
        writeln!(writer, "{}", header.join(","))?;

        for p in &self.patients {
            write!(
                writer,
                "{},{},{},{},{}",
                p.id,
                escape_csv(&p.stream),
                p.arrived.as_f64(),
                p.departed.map(|d| d.as_f64().to_string()).unwrap_or_default(),
                p.priority.map(|v| v.to_string()).unwrap_or_default(),
            )?;
            for stage in &self.stages {
                let cell = p.queue_time(stage).map(|q| q.to_string()).unwrap_or_default();
                write!(writer, ",{cell}")?;
            }
            let total = p.time_in_system().map(|t| t.to_string()).unwrap_or_default();
            writeln!(writer, ",{total}")?;
        }
        Ok(())
    }

    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<(), MetricsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_csv(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(v: f64) -> SimTime {
        SimTime::new(v).unwrap()
    }

    fn treated_patient() -> Patient {
        let mut p = Patient::new(1, "walk_in", t(2.0));
        p.enter_queue("Registration", t(2.0));
        p.start_service(t(3.5), 1.0);
        p.finish_stage(t(4.5));
        p.record_branch("acu", false);
        p.enter_queue("Doctor", t(4.5));
        p.start_service(t(10.0), 5.0);
        p.finish_stage(t(15.0));
        p.depart(t(15.0));
        p
    }

    #[test]
    fn test_state_transitions() {
        let mut p = Patient::new(3, "calls", t(0.0));
        assert_eq!(p.state, PatientState::Arrived);
        p.enter_queue("Call", t(0.0));
        assert!(matches!(p.state, PatientState::Queued { ref stage } if stage == "Call"));
        p.start_service(t(1.0), 2.0);
        assert!(matches!(p.state, PatientState::InService { ref stage } if stage == "Call"));
        p.finish_stage(t(3.0));
        p.depart(t(3.0));
        assert_eq!(p.state, PatientState::Departed);
        assert_eq!(p.time_in_system(), Some(3.0));
    }

    #[test]
    fn test_queue_times() {
        let p = treated_patient();
        assert_eq!(p.queue_time("Registration"), Some(1.5));
        assert_eq!(p.queue_time("Doctor"), Some(5.5));
        assert_eq!(p.queue_time("ACU"), None);
        assert_eq!(p.branch("acu"), Some(false));
        assert_eq!(p.time_in_system(), Some(13.0));
    }

    #[test]
    fn test_patient_csv() {
        let mut table = PatientTable::new(vec!["Registration".into(), "ACU".into()]);
        table.push(treated_patient());
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "P_ID,Stream,Arrived,Departed,Priority,Q_Time_Registration,Q_Time_ACU,Time_In_System"
        );
        assert_eq!(lines[1], "1,walk_in,2,15,,1.5,,13");
    }
}

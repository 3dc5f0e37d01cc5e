use patientflow_metrics::{
    import_csv, MetricsError, RunResult, StatisticsCollector, TrialResultTable,
};
use proptest::prelude::*;

const STAGES: [&str; 2] = ["Q_Time_Triage", "Time_In_System"];

fn run_from_samples(run: usize, triage: &[f64], system: &[f64]) -> Result<RunResult, MetricsError> {
    let mut collector = StatisticsCollector::with_metrics(STAGES);
    for v in triage {
        collector.record("Q_Time_Triage", *v)?;
    }
    for v in system {
        collector.record("Time_In_System", *v)?;
        collector.record_entity();
    }
    RunResult::from_collector(run, &collector)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn aggregate_mean_lies_within_run_extremes(
        runs in proptest::collection::vec(
            (proptest::collection::vec(0.0f64..500.0, 1..30), proptest::collection::vec(0.0f64..900.0, 1..30)),
            1..100,
        )
    ) {
        let mut table = TrialResultTable::new(["Mean_Q_Time_Triage", "Mean_Time_In_System"]);
        for (i, (triage, system)) in runs.iter().enumerate() {
            table.push(run_from_samples(i, triage, system).unwrap()).unwrap();
        }
        table.finalize();

        for (_, summary) in table.aggregates().unwrap() {
            prop_assert!(summary.min <= summary.mean && summary.mean <= summary.max);
            prop_assert_eq!(summary.count, runs.len());
        }
    }
}

#[test]
fn exported_trial_reloads_for_summarising() {
    let mut table = TrialResultTable::new(["Mean_Q_Time_Triage", "Mean_Time_In_System"]);
    for run in 0..100 {
        let base = run as f64;
        let row = run_from_samples(run, &[base, base + 1.0], &[base * 3.0 + 7.25]).unwrap();
        table.push(row).unwrap();
    }
    table.finalize();

    let path = std::env::temp_dir().join("patientflow_metrics_reload.csv");
    table.export_csv(&path).unwrap();
    let loaded = import_csv(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.len(), 100);
    let original = table.aggregate("Mean_Time_In_System").unwrap();
    let reloaded = loaded.aggregate("Mean_Time_In_System").unwrap();
    assert_eq!(original.mean.to_bits(), reloaded.mean.to_bits());
    assert_eq!(reloaded.min, 7.25);
    assert_eq!(reloaded.max, 99.0 * 3.0 + 7.25);
}

#[test]
fn stage_without_samples_fails_the_run() {
    let err = run_from_samples(0, &[], &[4.0]).unwrap_err();
    assert!(matches!(err, MetricsError::InsufficientData { stage } if stage == "Q_Time_Triage"));
}

#[test]
fn missing_trial_file_is_an_io_error() {
    let path = std::env::temp_dir().join("patientflow_missing_trial.csv");
    std::fs::remove_file(&path).ok();
    assert!(matches!(TrialResultTable::import_csv(&path), Err(MetricsError::Io(_))));
}

//! Warm-up exclusion.
//!
//! A warm-up changes what is recorded, never what happens: the same seed with
//! and without a warm-up yields the same patient histories, and the warm-up
//! run keeps exactly those departing after the threshold.

use patientflow_components::{scenarios, single_run_detailed, ScenarioConfig};

fn clinic(warm_up: f64, collection_period: f64) -> ScenarioConfig {
    ScenarioConfig {
        warm_up,
        collection_period,
        ..scenarios::weight_loss_clinic()
    }
}

#[test]
fn warm_up_only_filters_records() {
    let with_warm_up = single_run_detailed(&clinic(60.0, 60.0), 0).unwrap();
    let without = single_run_detailed(&clinic(0.0, 120.0), 0).unwrap();

    let expected: Vec<_> = without
        .patients
        .patients()
        .iter()
        .filter(|p| p.departed.is_some_and(|d| d.as_f64() > 60.0))
        .cloned()
        .collect();

    assert!(!expected.is_empty());
    assert_eq!(with_warm_up.patients.patients(), expected.as_slice());
    assert_eq!(with_warm_up.result.entities, Some(expected.len()));
    assert_eq!(with_warm_up.events_processed, without.events_processed);
}

#[test]
fn early_departures_still_delay_others() {
    let report = single_run_detailed(&clinic(60.0, 60.0), 0).unwrap();
    for patient in report.patients.patients() {
        assert!(patient.departed.is_some_and(|d| d.as_f64() > 60.0));
        for stage in &patient.stages {
            assert!(stage.queue_time().is_some_and(|q| q >= 0.0));
        }
    }
    let mean = report.result.value("Mean_Time_In_System").unwrap();
    assert!(mean > 0.0);
}

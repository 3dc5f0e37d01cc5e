//! Bundled scenarios.
//!
//! Times are in minutes.

use patientflow_core::ServiceTime;

use crate::config::{
    ArrivalStreamConfig, ResourceConfig, ScenarioConfig, StepConfig, UnavailabilityConfig,
};
use crate::error::ConfigError;

/// Names accepted by [`preset`].
pub const PRESET_NAMES: [&str; 4] = ["weight_loss_clinic", "ed_triage", "gp_surgery", "district_nurse"];

/// Looks up a bundled scenario by name.
pub fn preset(name: &str) -> Result<ScenarioConfig, ConfigError> {
    match name {
        "weight_loss_clinic" => Ok(weight_loss_clinic()),
        "ed_triage" => Ok(ed_triage()),
        "gp_surgery" => Ok(gp_surgery()),
        "district_nurse" => Ok(district_nurse()),
        other => Err(ConfigError::UnknownPreset(other.to_string())),
    }
}

fn fifo(name: &str, capacity: usize) -> ResourceConfig {
    ResourceConfig::Fifo {
        name: name.to_string(),
        capacity,
    }
}

fn priority(name: &str, capacity: usize) -> ResourceConfig {
    ResourceConfig::Priority {
        name: name.to_string(),
        capacity,
    }
}

fn service(stage: &str, resource: &str, mean: f64) -> StepConfig {
    StepConfig::Service {
        stage: stage.to_string(),
        resource: resource.to_string(),
        service_time: ServiceTime::exponential(mean),
        use_priority: false,
    }
}

fn prioritised_service(stage: &str, resource: &str, mean: f64) -> StepConfig {
    StepConfig::Service {
        stage: stage.to_string(),
        resource: resource.to_string(),
        service_time: ServiceTime::exponential(mean),
        use_priority: true,
    }
}

fn stream(name: &str, mean_interarrival: f64, pathway: Vec<StepConfig>) -> ArrivalStreamConfig {
    ArrivalStreamConfig {
        name: name.to_string(),
        mean_interarrival,
        record_statistics: true,
        pathway,
    }
}

/// One nurse, patients every 5 minutes on average, 6 minute consultations.
pub fn weight_loss_clinic() -> ScenarioConfig {
    ScenarioConfig {
        name: "weight_loss_clinic".to_string(),
        seed: 42,
        warm_up: 0.0,
        collection_period: 120.0,
        replications: 100,
        resources: vec![fifo("nurse", 1)],
        arrivals: vec![stream(
            "patients",
            5.0,
            vec![service("Nurse_Consultation", "nurse", 6.0)],
        )],
        unavailability: vec![],
    }
}

/// Emergency department with triage priorities, an acute care unit branch
/// and ED doctors who are periodically called away.
pub fn ed_triage() -> ScenarioConfig {
    ScenarioConfig {
        name: "ed_triage".to_string(),
        seed: 42,
        warm_up: 1440.0,
        collection_period: 2880.0,
        replications: 100,
        resources: vec![
            fifo("receptionist", 1),
            fifo("nurse", 2),
            priority("ed_doctor", 2),
            priority("acu_doctor", 1),
        ],
        arrivals: vec![stream(
            "ed_arrivals",
            8.0,
            vec![
                service("Registration", "receptionist", 2.0),
                service("Triage", "nurse", 5.0),
                StepConfig::AssignPriority { min: 1, max: 5 },
                StepConfig::Branch {
                    name: "acu".to_string(),
                    probability: 0.2,
                    taken: vec![prioritised_service("ACU_Assessment", "acu_doctor", 60.0)],
                    not_taken: vec![prioritised_service("ED_Assessment", "ed_doctor", 30.0)],
                },
            ],
        )],
        unavailability: vec![UnavailabilityConfig {
            resource: "ed_doctor".to_string(),
            every: 480.0,
            duration: 240.0,
            priority: -1,
        }],
    }
}

/// GP surgery: registration, consultation, sometimes a test booking, with
/// unrecorded telephone calls competing for the receptionist.
pub fn gp_surgery() -> ScenarioConfig {
    ScenarioConfig {
        name: "gp_surgery".to_string(),
        seed: 42,
        warm_up: 180.0,
        collection_period: 480.0,
        replications: 100,
        resources: vec![fifo("receptionist", 1), fifo("gp", 2)],
        arrivals: vec![
            stream(
                "patients",
                3.0,
                vec![
                    service("Registration", "receptionist", 2.0),
                    service("GP_Consultation", "gp", 8.0),
                    StepConfig::Branch {
                        name: "book_test".to_string(),
                        probability: 0.25,
                        taken: vec![service("Book_Test", "receptionist", 4.0)],
                        not_taken: vec![],
                    },
                ],
            ),
            ArrivalStreamConfig {
                record_statistics: false,
                ..stream("calls", 10.0, vec![service("Call", "receptionist", 4.0)])
            },
        ],
        unavailability: vec![],
    }
}

/// District nursing minutes drawn from a shared pool for each home visit.
pub fn district_nurse() -> ScenarioConfig {
    ScenarioConfig {
        name: "district_nurse".to_string(),
        seed: 42,
        warm_up: 2880.0,
        collection_period: 1440.0,
        replications: 100,
        resources: vec![ResourceConfig::Container {
            name: "district_nurse".to_string(),
            capacity: 1000.0,
            init: 1000.0,
        }],
        arrivals: vec![stream(
            "visits",
            10.0,
            vec![StepConfig::Draw {
                stage: "District_Nurse".to_string(),
                container: "district_nurse".to_string(),
                amount: ServiceTime::exponential(60.0),
            }],
        )],
        unavailability: vec![],
    }
}

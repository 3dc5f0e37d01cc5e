//! Scenario configuration
//!
//! A [`ScenarioConfig`] describes one queueing network: its resources, the
//! arrival streams feeding it, the pathway each stream's patients follow, and
//! the run horizon. Scenarios are plain serde structs and are usually written
//! as TOML:
//!
//! ```toml
//! name = "weight_loss_clinic"
//! seed = 42
//! collection_period = 120.0
//!
//! [[resources]]
//! kind = "fifo"
//! name = "nurse"
//! capacity = 1
//!
//! [[arrivals]]
//! name = "patients"
//! mean_interarrival = 5.0
//!
//! [[arrivals.pathway]]
//! step = "service"
//! stage = "Nurse"
//! resource = "nurse"
//! service_time = { type = "exponential", mean = 6.0 }
//! ```

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use patientflow_core::{dists::validate_probability, ServiceTime, SimError};
use patientflow_metrics::mean_column;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::validate::{
    validate_finite, validate_non_empty, validate_non_negative, validate_positive, validate_range,
    Validate, ValidationResult,
};

/// Metric recording the overall time from arrival to departure.
pub const TIME_IN_SYSTEM: &str = "Time_In_System";

/// Metric recording the queue time at `stage`.
pub fn stage_metric(stage: &str) -> String {
    format!("Q_Time_{stage}")
}

fn default_seed() -> u64 {
    42
}

fn default_replications() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_unavailable_priority() -> i64 {
    -1
}

/// Complete description of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    /// Base seed. Replication `i` runs with a seed derived from this and `i`.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Time before statistics are collected.
    #[serde(default)]
    pub warm_up: f64,
    /// Time over which statistics are collected, after the warm-up.
    pub collection_period: f64,
    #[serde(default = "default_replications")]
    pub replications: usize,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
    #[serde(default)]
    pub arrivals: Vec<ArrivalStreamConfig>,
    #[serde(default)]
    pub unavailability: Vec<UnavailabilityConfig>,
}

/// A shared resource, keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceConfig {
    /// Servers granted in arrival order.
    Fifo { name: String, capacity: usize },
    /// Servers granted by priority (lower first), then arrival order.
    Priority { name: String, capacity: usize },
    /// A continuous level drawn from and returned to.
    Container { name: String, capacity: f64, init: f64 },
}

impl ResourceConfig {
    pub fn name(&self) -> &str {
        match self {
            ResourceConfig::Fifo { name, .. }
            | ResourceConfig::Priority { name, .. }
            | ResourceConfig::Container { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResourceConfig::Fifo { .. } => "fifo",
            ResourceConfig::Priority { .. } => "priority",
            ResourceConfig::Container { .. } => "container",
        }
    }

    fn is_server(&self) -> bool {
        !matches!(self, ResourceConfig::Container { .. })
    }
}

/// One stream of arriving patients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalStreamConfig {
    pub name: String,
    /// Mean of the exponential interarrival gap.
    pub mean_interarrival: f64,
    /// Whether this stream's patients contribute to the run statistics.
    #[serde(default = "default_true")]
    pub record_statistics: bool,
    pub pathway: Vec<StepConfig>,
}

/// One step of a patient pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepConfig {
    /// Queue for one unit of `resource`, hold it for a sampled duration.
    Service {
        stage: String,
        resource: String,
        service_time: ServiceTime,
        /// Request at the patient's assigned priority.
        #[serde(default)]
        use_priority: bool,
    },
    /// Take a sampled amount from a container, hold it for that many time
    /// units, then put it back.
    Draw {
        stage: String,
        container: String,
        amount: ServiceTime,
    },
    /// Assign a priority drawn uniformly from `min..=max`.
    AssignPriority { min: i64, max: i64 },
    /// Follow `taken` with the given probability, `not_taken` otherwise.
    Branch {
        name: String,
        probability: f64,
        #[serde(default)]
        taken: Vec<StepConfig>,
        #[serde(default)]
        not_taken: Vec<StepConfig>,
    },
}

/// Periodic seizure of one server unit, modelling breaks and other duties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnavailabilityConfig {
    pub resource: String,
    /// Time between the end of one absence and the start of the next request.
    pub every: f64,
    pub duration: f64,
    /// Request priority. Below every patient priority by default.
    #[serde(default = "default_unavailable_priority")]
    pub priority: i64,
}

impl ScenarioConfig {
    /// Parses and validates a TOML scenario.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ScenarioConfig = toml::from_str(text)?;
        config.validate()?;
        debug!(scenario = %config.name, "Scenario loaded");
        Ok(config)
    }

    /// Reads, parses and validates a TOML scenario file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Simulated time at which a run stops.
    pub fn end_time(&self) -> f64 {
        self.warm_up + self.collection_period
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.name() == name)
    }

    /// Stage names visited by recorded streams, in order of first appearance.
    pub fn stage_names(&self) -> Vec<String> {
        let mut stages = Vec::new();
        for stream in self.arrivals.iter().filter(|a| a.record_statistics) {
            collect_stages(&stream.pathway, &mut stages);
        }
        stages
    }

    /// Metrics collected by each run: one queue time per stage, then time in
    /// system.
    pub fn metric_names(&self) -> Vec<String> {
        self.stage_names()
            .iter()
            .map(|s| stage_metric(s))
            .chain(std::iter::once(TIME_IN_SYSTEM.to_string()))
            .collect()
    }

    /// Columns of this scenario's trial table.
    pub fn columns(&self) -> Vec<String> {
        self.metric_names().iter().map(|m| mean_column(m)).collect()
    }

    /// One-line rendering of the parameters, used in error reports.
    pub fn describe(&self) -> String {
        let mut out = format!(
            "scenario={} seed={} warm_up={} collection_period={}",
            self.name, self.seed, self.warm_up, self.collection_period
        );
        for resource in &self.resources {
            match resource {
                ResourceConfig::Fifo { name, capacity }
                | ResourceConfig::Priority { name, capacity } => {
                    let _ = write!(out, " {name}[{}]={capacity}", resource.kind());
                }
                ResourceConfig::Container {
                    name,
                    capacity,
                    init,
                } => {
                    let _ = write!(out, " {name}[container]={init}/{capacity}");
                }
            }
        }
        for stream in &self.arrivals {
            let _ = write!(out, " {}.mean_interarrival={}", stream.name, stream.mean_interarrival);
        }
        out
    }

    fn validate_pathway(&self, field: &str, steps: &[StepConfig]) -> ValidationResult<()> {
        for (i, step) in steps.iter().enumerate() {
            let field = format!("{field}[{i}]");
            match step {
                StepConfig::Service {
                    stage,
                    resource,
                    service_time,
                    use_priority,
                } => {
                    validate_non_empty(&format!("{field}.stage"), stage)?;
                    validate_distribution(&format!("{field}.service_time"), service_time)?;
                    match self.resource(resource) {
                        None => {
                            return Err(ConfigError::UnknownResource {
                                resource: resource.clone(),
                                referenced_by: field,
                            })
                        }
                        Some(ResourceConfig::Priority { .. }) => {}
                        Some(ResourceConfig::Fifo { .. }) if !use_priority => {}
                        Some(_) => {
                            let expected = if *use_priority {
                                "priority resource"
                            } else {
                                "server resource"
                            };
                            return Err(ConfigError::ResourceKind {
                                resource: resource.clone(),
                                expected: expected.to_string(),
                                referenced_by: field,
                            });
                        }
                    }
                }
                StepConfig::Draw {
                    stage,
                    container,
                    amount,
                } => {
                    validate_non_empty(&format!("{field}.stage"), stage)?;
                    validate_distribution(&format!("{field}.amount"), amount)?;
                    // Containers only accept positive amounts.
                    let lowest = match *amount {
                        ServiceTime::Constant { value } => Some(value),
                        ServiceTime::Uniform { min, .. } => Some(min),
                        ServiceTime::Exponential { .. } => None,
                    };
                    if lowest.is_some_and(|v| v <= 0.0) {
                        return Err(ConfigError::ConstraintViolation {
                            field: format!("{field}.amount"),
                            constraint: "strictly positive for every draw".to_string(),
                        });
                    }
                    match self.resource(container) {
                        None => {
                            return Err(ConfigError::UnknownResource {
                                resource: container.clone(),
                                referenced_by: field,
                            })
                        }
                        Some(ResourceConfig::Container { capacity, .. }) => {
                            if amount.mean() > *capacity {
                                return Err(ConfigError::ConstraintViolation {
                                    field: format!("{field}.amount"),
                                    constraint: format!(
                                        "on average within the container capacity {capacity}"
                                    ),
                                });
                            }
                        }
                        Some(_) => {
                            return Err(ConfigError::ResourceKind {
                                resource: container.clone(),
                                expected: "container".to_string(),
                                referenced_by: field,
                            })
                        }
                    }
                }
                StepConfig::AssignPriority { min, max } => {
                    if min > max {
                        return Err(ConfigError::ConstraintViolation {
                            field: format!("{field}.min"),
                            constraint: format!("at most max ({max})"),
                        });
                    }
                }
                StepConfig::Branch {
                    name,
                    probability,
                    taken,
                    not_taken,
                } => {
                    validate_non_empty(&format!("{field}.name"), name)?;
                    validate_probability(*probability).map_err(|e| ConfigError::InvalidValue {
                        field: format!("{field}.probability"),
                        reason: e.to_string(),
                    })?;
                    self.validate_pathway(&format!("{field}.taken"), taken)?;
                    self.validate_pathway(&format!("{field}.not_taken"), not_taken)?;
                }
            }
        }
        Ok(())
    }
}

fn collect_stages(steps: &[StepConfig], stages: &mut Vec<String>) {
    for step in steps {
        match step {
            StepConfig::Service { stage, .. } | StepConfig::Draw { stage, .. } => {
                if !stages.contains(stage) {
                    stages.push(stage.clone());
                }
            }
            StepConfig::AssignPriority { .. } => {}
            StepConfig::Branch {
                taken, not_taken, ..
            } => {
                collect_stages(taken, stages);
                collect_stages(not_taken, stages);
            }
        }
    }
}

fn validate_distribution(field: &str, dist: &ServiceTime) -> ValidationResult<()> {
    dist.validate().map_err(|e: SimError| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

impl Validate for ScenarioConfig {
    fn validate(&self) -> ValidationResult<()> {
        validate_non_empty("name", &self.name)?;
        validate_finite("warm_up", self.warm_up)?;
        validate_non_negative("warm_up", self.warm_up)?;
        validate_finite("collection_period", self.collection_period)?;
        validate_positive("collection_period", self.collection_period)?;
        validate_positive("replications", self.replications)?;

        let mut names = HashSet::new();
        for (i, resource) in self.resources.iter().enumerate() {
            validate_non_empty(&format!("resources[{i}].name"), resource.name())?;
            if !names.insert(resource.name()) {
                return Err(ConfigError::DuplicateName(resource.name().to_string()));
            }
            resource.validate_at(i)?;
        }

        if !self.arrivals.iter().any(|a| a.record_statistics) {
            return Err(ConfigError::InvalidValue {
                field: "arrivals".to_string(),
                reason: "at least one stream must record statistics".to_string(),
            });
        }
        let mut streams = HashSet::new();
        for (i, stream) in self.arrivals.iter().enumerate() {
            let field = format!("arrivals[{i}]");
            validate_non_empty(&format!("{field}.name"), &stream.name)?;
            if !streams.insert(stream.name.as_str()) {
                return Err(ConfigError::DuplicateName(stream.name.clone()));
            }
            validate_finite(&format!("{field}.mean_interarrival"), stream.mean_interarrival)?;
            validate_positive(&format!("{field}.mean_interarrival"), stream.mean_interarrival)?;
            self.validate_pathway(&format!("{field}.pathway"), &stream.pathway)?;
        }

        for (i, rule) in self.unavailability.iter().enumerate() {
            let field = format!("unavailability[{i}]");
            match self.resource(&rule.resource) {
                None => {
                    return Err(ConfigError::UnknownResource {
                        resource: rule.resource.clone(),
                        referenced_by: field,
                    })
                }
                Some(r) if !r.is_server() => {
                    return Err(ConfigError::ResourceKind {
                        resource: rule.resource.clone(),
                        expected: "server resource".to_string(),
                        referenced_by: field,
                    })
                }
                Some(_) => {}
            }
            validate_finite(&format!("{field}.every"), rule.every)?;
            validate_positive(&format!("{field}.every"), rule.every)?;
            validate_finite(&format!("{field}.duration"), rule.duration)?;
            validate_positive(&format!("{field}.duration"), rule.duration)?;
        }
        Ok(())
    }
}

impl ResourceConfig {
    fn validate_at(&self, index: usize) -> ValidationResult<()> {
        let field = format!("resources[{index}]");
        match self {
            ResourceConfig::Fifo { capacity, .. } | ResourceConfig::Priority { capacity, .. } => {
                validate_positive(&format!("{field}.capacity"), *capacity)
            }
            ResourceConfig::Container { capacity, init, .. } => {
                validate_finite(&format!("{field}.capacity"), *capacity)?;
                validate_positive(&format!("{field}.capacity"), *capacity)?;
                validate_range(&format!("{field}.init"), *init, 0.0, *capacity)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLINIC: &str = r#"
        name = "clinic"
        warm_up = 10.0
        collection_period = 100.0

        [[resources]]
        kind = "fifo"
        name = "receptionist"
        capacity = 1

        [[resources]]
        kind = "priority"
        name = "doctor"
        capacity = 2

        [[arrivals]]
        name = "walk_in"
        mean_interarrival = 4.0

        [[arrivals.pathway]]
        step = "service"
        stage = "Registration"
        resource = "receptionist"
        service_time = { type = "exponential", mean = 2.0 }

        [[arrivals.pathway]]
        step = "assign_priority"
        min = 1
        max = 5

        [[arrivals.pathway]]
        step = "branch"
        name = "needs_doctor"
        probability = 0.5

        [[arrivals.pathway.taken]]
        step = "service"
        stage = "Doctor"
        resource = "doctor"
        use_priority = true
        service_time = { type = "constant", value = 12.0 }

        [[arrivals]]
        name = "calls"
        mean_interarrival = 9.0
        record_statistics = false

        [[arrivals.pathway]]
        step = "service"
        stage = "Call"
        resource = "receptionist"
        service_time = { type = "uniform", min = 1.0, max = 3.0 }
    "#;

    #[test]
    fn test_parse_with_defaults() {
        let config = ScenarioConfig::from_toml_str(CLINIC).unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.replications, 100);
        assert_eq!(config.end_time(), 110.0);
        assert!(config.arrivals[0].record_statistics);
        assert!(!config.arrivals[1].record_statistics);
        assert_eq!(config.resource("doctor").map(ResourceConfig::kind), Some("priority"));
    }

    #[test]
    fn test_stage_names_and_columns() {
        let config = ScenarioConfig::from_toml_str(CLINIC).unwrap();
        // The unrecorded call stream contributes no stage.
        assert_eq!(config.stage_names(), vec!["Registration", "Doctor"]);
        assert_eq!(
            config.columns(),
            vec![
                "Mean_Q_Time_Registration",
                "Mean_Q_Time_Doctor",
                "Mean_Time_In_System"
            ]
        );
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ScenarioConfig::from_toml_str(CLINIC).unwrap();
        let text = config.to_toml_string().unwrap();
        let reparsed = ScenarioConfig::from_toml_str(&text).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_unknown_resource_rejected() {
        let text = CLINIC.replace("resource = \"doctor\"", "resource = \"surgeon\"");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&text),
            Err(ConfigError::UnknownResource { ref resource, .. }) if resource == "surgeon"
        ));
    }

    #[test]
    fn test_priority_on_fifo_rejected() {
        let text = CLINIC.replace("kind = \"priority\"", "kind = \"fifo\"");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&text),
            Err(ConfigError::ResourceKind { .. })
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = ScenarioConfig::from_toml_str(CLINIC).unwrap();
        config.collection_period = 0.0;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::from_toml_str(CLINIC).unwrap();
        config.arrivals[0].mean_interarrival = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::from_toml_str(CLINIC).unwrap();
        config.resources.push(ResourceConfig::Fifo {
            name: "doctor".to_string(),
            capacity: 1,
        });
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateName(ref n)) if n == "doctor"));

        let mut config = ScenarioConfig::from_toml_str(CLINIC).unwrap();
        if let StepConfig::Branch { probability, .. } = &mut config.arrivals[0].pathway[2] {
            *probability = 1.5;
        }
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { ref field, .. }) if field.ends_with("probability")));
    }

    #[test]
    fn test_non_positive_draw_rejected() {
        let with_draw = |amount: ServiceTime| {
            let mut config = ScenarioConfig::from_toml_str(CLINIC).unwrap();
            config.resources.push(ResourceConfig::Container {
                name: "dressings".to_string(),
                capacity: 20.0,
                init: 20.0,
            });
            config.arrivals[0].pathway.push(StepConfig::Draw {
                stage: "Dressing".to_string(),
                container: "dressings".to_string(),
                amount,
            });
            config.validate()
        };

        for amount in [
            ServiceTime::Constant { value: 0.0 },
            ServiceTime::Uniform { min: 0.0, max: 4.0 },
        ] {
            assert!(matches!(
                with_draw(amount),
                Err(ConfigError::ConstraintViolation { ref field, .. }) if field == "arrivals[0].pathway[3].amount"
            ));
        }
        assert!(with_draw(ServiceTime::Uniform { min: 1.0, max: 4.0 }).is_ok());
        assert!(with_draw(ServiceTime::exponential(3.0)).is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let text = CLINIC.replace("capacity = 2", "capacity = 0");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&text),
            Err(ConfigError::ConstraintViolation { ref field, .. }) if field == "resources[1].capacity"
        ));
    }

    #[test]
    fn test_parse_error_reported() {
        assert!(matches!(
            ScenarioConfig::from_toml_str("name = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_describe_names_parameters() {
        let config = ScenarioConfig::from_toml_str(CLINIC).unwrap();
        let text = config.describe();
        assert!(text.starts_with("scenario=clinic seed=42"));
        assert!(text.contains("doctor[priority]=2"));
        assert!(text.contains("calls.mean_interarrival=9"));
    }
}

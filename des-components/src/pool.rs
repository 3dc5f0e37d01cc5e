//! Resources of one run, built from the scenario's resource list.

use patientflow_core::resource::DEFAULT_PRIORITY;
use patientflow_core::{
    ClockRef, Container, PriorityResource, Request, Resource, ResourceStats, SimError,
};

use crate::config::ResourceConfig;

/// A server resource of either admission discipline.
#[derive(Debug, Clone)]
pub enum Server {
    Fifo(Resource),
    Priority(PriorityResource),
}

impl Server {
    /// Requests one unit. `priority` is ignored by FIFO servers.
    pub fn request(&self, priority: i64) -> Request {
        match self {
            Server::Fifo(r) => r.request(),
            Server::Priority(r) => r.request(priority),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Server::Fifo(r) => r.name(),
            Server::Priority(r) => r.name(),
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            Server::Fifo(r) => r.capacity(),
            Server::Priority(r) => r.capacity(),
        }
    }

    pub fn in_use(&self) -> usize {
        match self {
            Server::Fifo(r) => r.in_use(),
            Server::Priority(r) => r.in_use(),
        }
    }

    pub fn queue_len(&self) -> usize {
        match self {
            Server::Fifo(r) => r.queue_len(),
            Server::Priority(r) => r.queue_len(),
        }
    }

    pub fn stats(&self) -> ResourceStats {
        match self {
            Server::Fifo(r) => r.stats(),
            Server::Priority(r) => r.stats(),
        }
    }
}

/// All named resources of one run.
#[derive(Debug, Default)]
pub struct ResourcePool {
    servers: Vec<(String, Server)>,
    containers: Vec<(String, Container)>,
}

impl ResourcePool {
    /// Builds every resource, tracking busy time against `clock`.
    pub fn build(configs: &[ResourceConfig], clock: &ClockRef) -> Result<Self, SimError> {
        let mut pool = Self::default();
        for config in configs {
            match config {
                ResourceConfig::Fifo { name, capacity } => {
                    let resource = Resource::new(name.as_str(), *capacity)?.with_clock(clock.clone());
                    pool.servers.push((name.clone(), Server::Fifo(resource)));
                }
                ResourceConfig::Priority { name, capacity } => {
                    let resource =
                        PriorityResource::new(name.as_str(), *capacity)?.with_clock(clock.clone());
                    pool.servers.push((name.clone(), Server::Priority(resource)));
                }
                ResourceConfig::Container {
                    name,
                    capacity,
                    init,
                } => {
                    let container = Container::new(name.as_str(), *capacity, *init)?;
                    pool.containers.push((name.clone(), container));
                }
            }
        }
        Ok(pool)
    }

    pub fn server(&self, name: &str) -> Option<&Server> {
        self.servers.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn servers(&self) -> impl Iterator<Item = &Server> {
        self.servers.iter().map(|(_, s)| s)
    }

    /// Utilization of each server over `elapsed` time units, in declaration
    /// order.
    pub fn utilization(&self, elapsed: f64) -> Vec<(String, f64)> {
        self.servers()
            .filter_map(|s| {
                s.stats()
                    .utilization(s.capacity(), elapsed)
                    .map(|u| (s.name(), u))
            })
            .collect()
    }
}

/// Priority used when a step does not request at the patient's priority.
pub(crate) const UNPRIORITISED: i64 = DEFAULT_PRIORITY;

#[cfg(test)]
mod tests {
    use super::*;
    use patientflow_core::Simulation;

    #[test]
    fn test_build_pool() {
        let sim = Simulation::default();
        let configs = vec![
            ResourceConfig::Fifo {
                name: "nurse".to_string(),
                capacity: 2,
            },
            ResourceConfig::Priority {
                name: "doctor".to_string(),
                capacity: 1,
            },
            ResourceConfig::Container {
                name: "minutes".to_string(),
                capacity: 100.0,
                init: 50.0,
            },
        ];
        let pool = ResourcePool::build(&configs, &sim.clock()).unwrap();
        assert_eq!(pool.server("nurse").map(Server::capacity), Some(2));
        assert!(matches!(pool.server("doctor"), Some(Server::Priority(_))));
        assert_eq!(pool.container("minutes").map(Container::level), Some(50.0));
        assert!(pool.server("minutes").is_none());
        assert_eq!(pool.servers().count(), 2);
    }

    #[test]
    fn test_zero_capacity_fails() {
        let sim = Simulation::default();
        let configs = vec![ResourceConfig::Fifo {
            name: "nurse".to_string(),
            capacity: 0,
        }];
        assert!(matches!(
            ResourcePool::build(&configs, &sim.clock()),
            Err(SimError::ResourceConfiguration { .. })
        ));
    }
}

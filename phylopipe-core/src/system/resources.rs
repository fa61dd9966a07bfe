/// Resource preflight: compare requested threads and memory ceiling with the host
use crate::config::PipelineConfig;
use crate::error::{PhyloError, PhyloResult};
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Source of host resource observations
pub trait ResourceProbe: Send + Sync {
    fn available_cpus(&self) -> usize;

    /// Memory currently available to new processes, in bytes
    fn available_memory_bytes(&self) -> u64;
}

/// Observes the real machine
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ResourceProbe for SystemProbe {
    fn available_cpus(&self) -> usize {
        num_cpus::get()
    }

    fn available_memory_bytes(&self) -> u64 {
        let mut system = System::new();
        system.refresh_memory();
        system.available_memory()
    }
}

/// What the host offered when the check ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub available_cpus: usize,
    pub available_memory_bytes: u64,
    pub requested_threads: usize,
    pub requested_memory_bytes: u64,
}

/// Runs once per pipeline run before any tool is launched
pub struct ResourceChecker<'a> {
    probe: &'a dyn ResourceProbe,
}

impl<'a> ResourceChecker<'a> {
    pub fn new(probe: &'a dyn ResourceProbe) -> Self {
        Self { probe }
    }

    pub fn check(&self, config: &PipelineConfig) -> PhyloResult<ResourceSnapshot> {
        let snapshot = ResourceSnapshot {
            available_cpus: self.probe.available_cpus(),
            available_memory_bytes: self.probe.available_memory_bytes(),
            requested_threads: config.peak_threads(),
            requested_memory_bytes: config.resource_limits.max_memory_bytes,
        };

        tracing::debug!(
            cpus = snapshot.available_cpus,
            memory = snapshot.available_memory_bytes,
            threads = snapshot.requested_threads,
            ceiling = snapshot.requested_memory_bytes,
            "resource preflight"
        );

        if snapshot.requested_threads > snapshot.available_cpus {
            return Err(PhyloError::Resource(format!(
                "{} threads requested but only {} processing units are available",
                snapshot.requested_threads, snapshot.available_cpus
            )));
        }

        if snapshot.requested_memory_bytes > snapshot.available_memory_bytes {
            return Err(PhyloError::Resource(format!(
                "insufficient memory: {} requested, {} available",
                format_bytes(snapshot.requested_memory_bytes),
                format_bytes(snapshot.available_memory_bytes)
            )));
        }

        Ok(snapshot)
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct FixedProbe {
        cpus: usize,
        memory: u64,
    }

    impl ResourceProbe for FixedProbe {
        fn available_cpus(&self) -> usize {
            self.cpus
        }

        fn available_memory_bytes(&self) -> u64 {
            self.memory
        }
    }

    #[test]
    fn test_passes_within_budget() {
        let probe = FixedProbe {
            cpus: 8,
            memory: 16 << 30,
        };
        let snapshot = ResourceChecker::new(&probe)
            .check(&PipelineConfig::default())
            .unwrap();
        assert_eq!(snapshot.available_cpus, 8);
        assert_eq!(snapshot.requested_threads, 1);
    }

    #[test]
    fn test_too_many_threads() {
        let probe = FixedProbe {
            cpus: 2,
            memory: 16 << 30,
        };
        let config = PipelineConfig {
            alignment_threads: 4,
            ..Default::default()
        };
        let err = ResourceChecker::new(&probe).check(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("4 threads requested"));
    }

    #[test]
    fn test_insufficient_memory() {
        let probe = FixedProbe {
            cpus: 8,
            memory: 512 << 20,
        };
        let err = ResourceChecker::new(&probe)
            .check(&PipelineConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(err.to_string().contains("2.0 GiB requested"));
    }

    #[test]
    fn test_system_probe_reports_something() {
        let probe = SystemProbe;
        assert!(probe.available_cpus() >= 1);
    }
}

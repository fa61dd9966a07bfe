//! Host observations under test control

use phylopipe_core::ResourceProbe;
use phylopipe_tools::AvailabilityProbe;
use std::collections::HashSet;
use std::path::PathBuf;

/// Availability probe over a fixed set of installed binaries
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    installed: HashSet<String>,
    everything: bool,
}

impl StaticProbe {
    /// Every binary is installed
    pub fn all() -> Self {
        Self {
            installed: HashSet::new(),
            everything: true,
        }
    }

    /// Nothing is installed
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(binaries: &[&str]) -> Self {
        Self {
            installed: binaries.iter().map(|b| b.to_string()).collect(),
            everything: false,
        }
    }

    /// Everything except `binaries`
    pub fn all_except(binaries: &[&str]) -> Self {
        Self {
            installed: binaries.iter().map(|b| b.to_string()).collect(),
            everything: true,
        }
    }
}

impl AvailabilityProbe for StaticProbe {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        // with `everything`, the set lists the exceptions
        let installed = self.everything != self.installed.contains(binary);
        installed.then(|| PathBuf::from("/opt/bio/bin").join(binary))
    }
}

/// Resource probe reporting fixed numbers
#[derive(Debug, Clone, Copy)]
pub struct FixedResources {
    pub cpus: usize,
    pub memory_bytes: u64,
}

impl FixedResources {
    pub fn new(cpus: usize, memory_bytes: u64) -> Self {
        Self { cpus, memory_bytes }
    }
}

impl Default for FixedResources {
    fn default() -> Self {
        Self::new(16, 64 * 1024 * 1024 * 1024)
    }
}

impl ResourceProbe for FixedResources {
    fn available_cpus(&self) -> usize {
        self.cpus
    }

    fn available_memory_bytes(&self) -> u64 {
        self.memory_bytes
    }
}

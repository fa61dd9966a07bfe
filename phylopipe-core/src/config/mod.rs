//! Pipeline configuration, presets and application settings

pub mod preset;
pub mod resolver;
pub mod settings;

pub use preset::PresetDocument;
pub use resolver::{
    load_overrides, parse_assignment, resolve, validate_methods, MethodCatalog, OverrideMap,
    TreeCapabilities, OVERRIDE_KEYS,
};
pub use settings::{load_settings, save_settings, Settings};

use crate::error::{PhyloError, PhyloResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fully resolved parameters of one pipeline run.
///
/// Produced by [`resolve`] and never mutated afterwards; every stage gets
/// it passed in explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub search_method: String,
    pub search_database: String,
    pub search_evalue: f64,
    pub search_max_hits: usize,
    pub search_threads: usize,
    /// Fall back to the remote service when local search is impossible
    pub allow_remote: bool,
    /// Treat a search without hits as a fatal failure
    pub zero_hits_fatal: bool,
    pub alignment_method: String,
    pub alignment_threads: usize,
    pub tree_method: String,
    pub tree_model: String,
    pub tree_threads: usize,
    pub bootstrap_replicates: u32,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,
    pub resource_limits: ResourceLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_memory_bytes: u64,
    pub max_threads: usize,
}

const GIB: u64 = 1024 * 1024 * 1024;

// Default value functions
fn default_search_method() -> String { "blastp".to_string() }
fn default_search_database() -> String { "swissprot".to_string() }
fn default_search_evalue() -> f64 { 1e-5 }
fn default_search_max_hits() -> usize { 100 }
fn default_threads() -> usize { 1 }
fn default_alignment_method() -> String { "mafft".to_string() }
fn default_tree_method() -> String { "fasttree".to_string() }
fn default_tree_model() -> String { "JTT".to_string() }
fn default_max_retries() -> u32 { 3 }
fn default_retry_base_delay_ms() -> u64 { 2_000 }
fn default_retry_max_delay_ms() -> u64 { 60_000 }

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 2 * GIB,
            max_threads: 8,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_method: default_search_method(),
            search_database: default_search_database(),
            search_evalue: default_search_evalue(),
            search_max_hits: default_search_max_hits(),
            search_threads: default_threads(),
            allow_remote: true,
            zero_hits_fatal: false,
            alignment_method: default_alignment_method(),
            alignment_threads: default_threads(),
            tree_method: default_tree_method(),
            tree_model: default_tree_model(),
            tree_threads: default_threads(),
            bootstrap_replicates: 0,
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            tool_timeout_secs: None,
            resource_limits: ResourceLimits::default(),
        }
    }
}

impl PipelineConfig {
    /// Largest thread count any stage will hand to its tool
    pub fn peak_threads(&self) -> usize {
        self.search_threads
            .max(self.alignment_threads)
            .max(self.tree_threads)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }

    /// Check numeric bounds that do not depend on any registry
    pub fn validate_bounds(&self) -> PhyloResult<()> {
        fn invalid(key: &str, message: String) -> PhyloError {
            PhyloError::config(format!("invalid value for '{}': {}", key, message))
        }

        if !(self.search_evalue.is_finite() && self.search_evalue > 0.0) {
            return Err(invalid(
                "search_evalue",
                format!("must be a positive number, got {}", self.search_evalue),
            ));
        }
        if self.search_max_hits == 0 {
            return Err(invalid("search_max_hits", "must be at least 1".to_string()));
        }
        if self.search_database.trim().is_empty() {
            return Err(invalid("search_database", "must not be empty".to_string()));
        }

        for (key, threads) in [
            ("search_threads", self.search_threads),
            ("alignment_threads", self.alignment_threads),
            ("tree_threads", self.tree_threads),
        ] {
            if threads == 0 {
                return Err(invalid(key, "must be at least 1".to_string()));
            }
            if threads > self.resource_limits.max_threads {
                return Err(invalid(
                    key,
                    format!(
                        "{} exceeds max_threads ({})",
                        threads, self.resource_limits.max_threads
                    ),
                ));
            }
        }

        if self.resource_limits.max_threads == 0 {
            return Err(invalid("max_threads", "must be at least 1".to_string()));
        }
        if self.resource_limits.max_memory_bytes == 0 {
            return Err(invalid("max_memory_bytes", "must be positive".to_string()));
        }
        if self.retry_base_delay_ms == 0 {
            return Err(invalid("retry_base_delay_ms", "must be positive".to_string()));
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            return Err(invalid(
                "retry_max_delay_ms",
                format!(
                    "{} is below retry_base_delay_ms ({})",
                    self.retry_max_delay_ms, self.retry_base_delay_ms
                ),
            ));
        }
        if self.tool_timeout_secs == Some(0) {
            return Err(invalid("tool_timeout_secs", "must be positive".to_string()));
        }

        Ok(())
    }
}

//! Named presets
//!
//! A preset document is a TOML file with one flat table per preset:
//!
//! ```toml
//! [presets.quick]
//! description = "Fast exploratory run"
//! search_evalue = 1e-3
//! alignment_method = "muscle"
//! ```
//!
//! Keys are the same as override keys; fields not given keep the
//! [`PipelineConfig`] defaults.

use super::resolver::{apply_overrides, OverrideMap};
use super::PipelineConfig;
use crate::error::{PhyloError, PhyloResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use toml::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct PresetEntry {
    pub description: String,
    pub values: OverrideMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresetDocument {
    presets: BTreeMap<String, PresetEntry>,
}

#[derive(Serialize, Deserialize)]
struct RawDocument {
    presets: BTreeMap<String, toml::Table>,
}

impl PresetDocument {
    /// The presets shipped with phylopipe: quick, standard, publication
    pub fn builtin() -> Self {
        let mut presets = BTreeMap::new();

        presets.insert(
            "quick".to_string(),
            entry(
                "Fast exploratory run: relaxed e-value, few hits, no bootstrap",
                &[
                    ("search_evalue", Value::Float(1e-3)),
                    ("search_max_hits", Value::Integer(50)),
                    ("alignment_method", Value::String("muscle".into())),
                    ("tree_method", Value::String("fasttree".into())),
                    ("tree_model", Value::String("JTT".into())),
                    ("max_retries", Value::Integer(2)),
                    ("max_memory_bytes", Value::Integer(1 << 30)),
                ],
            ),
        );

        presets.insert(
            "standard".to_string(),
            entry(
                "Standard protein phylogeny",
                &[
                    ("search_evalue", Value::Float(1e-5)),
                    ("search_max_hits", Value::Integer(100)),
                    ("search_threads", Value::Integer(2)),
                    ("alignment_method", Value::String("mafft".into())),
                    ("alignment_threads", Value::Integer(2)),
                    ("tree_method", Value::String("fasttree".into())),
                    ("tree_model", Value::String("JTT".into())),
                    ("max_retries", Value::Integer(3)),
                ],
            ),
        );

        presets.insert(
            "publication".to_string(),
            entry(
                "Strict search, accurate alignment, ML tree with 1000 bootstrap replicates",
                &[
                    ("search_evalue", Value::Float(1e-10)),
                    ("search_max_hits", Value::Integer(200)),
                    ("search_threads", Value::Integer(4)),
                    ("alignment_method", Value::String("mafft".into())),
                    ("alignment_threads", Value::Integer(4)),
                    ("tree_method", Value::String("raxml".into())),
                    ("tree_model", Value::String("PROTGAMMAJTT".into())),
                    ("tree_threads", Value::Integer(4)),
                    ("bootstrap_replicates", Value::Integer(1000)),
                    ("max_retries", Value::Integer(3)),
                    ("max_memory_bytes", Value::Integer(4 << 30)),
                ],
            ),
        );

        Self { presets }
    }

    pub fn from_toml_str(text: &str) -> PhyloResult<Self> {
        let raw: RawDocument = toml::from_str(text)
            .map_err(|e| PhyloError::config(format!("failed to parse preset document: {}", e)))?;

        let presets = raw
            .presets
            .into_iter()
            .map(|(name, mut table)| {
                let description = match table.remove("description") {
                    Some(Value::String(s)) => s,
                    Some(other) => {
                        return Err(PhyloError::config(format!(
                            "preset '{}': description must be a string, got {}",
                            name, other
                        )))
                    }
                    None => String::new(),
                };
                let values = table.into_iter().collect();
                Ok((name, PresetEntry { description, values }))
            })
            .collect::<PhyloResult<BTreeMap<_, _>>>()?;

        if presets.is_empty() {
            return Err(PhyloError::config("preset document defines no presets"));
        }

        Ok(Self { presets })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> PhyloResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PhyloError::config(format!("cannot read preset document {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> PhyloResult<String> {
        let raw = RawDocument {
            presets: self
                .presets
                .iter()
                .map(|(name, entry)| {
                    let mut table: toml::Table = entry
                        .values
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    if !entry.description.is_empty() {
                        table.insert(
                            "description".to_string(),
                            Value::String(entry.description.clone()),
                        );
                    }
                    (name.clone(), table)
                })
                .collect(),
        };
        toml::to_string_pretty(&raw)
            .map_err(|e| PhyloError::config(format!("failed to serialize presets: {}", e)))
    }

    /// Preset names, sorted
    pub fn names(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }

    pub fn entry(&self, name: &str) -> Option<&PresetEntry> {
        self.presets.get(name)
    }

    /// Defaults with the preset's values applied; no registry validation
    pub fn preset_config(&self, name: &str) -> PhyloResult<PipelineConfig> {
        let entry = self.presets.get(name).ok_or_else(|| {
            PhyloError::config(format!(
                "unknown preset '{}' (available: {})",
                name,
                self.names().join(", ")
            ))
        })?;

        let mut config = PipelineConfig::default();
        apply_overrides(&mut config, &entry.values)
            .map_err(|e| PhyloError::config(format!("preset '{}': {}", name, e)))?;
        Ok(config)
    }
}

fn entry(description: &str, values: &[(&str, Value)]) -> PresetEntry {
    PresetEntry {
        description: description.to_string(),
        values: values
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    }
}

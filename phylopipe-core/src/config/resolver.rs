//! Preset + override resolution into a validated [`PipelineConfig`]

use super::{PipelineConfig, PresetDocument};
use crate::error::{PhyloError, PhyloResult};
use crate::types::StageKind;
use std::collections::BTreeMap;
use std::path::Path;
use toml::Value;

/// Field name to value; keys are the flat `PipelineConfig` field names
pub type OverrideMap = BTreeMap<String, Value>;

/// Every key accepted in a preset entry or an override document
pub const OVERRIDE_KEYS: &[&str] = &[
    "search_method",
    "search_database",
    "search_evalue",
    "search_max_hits",
    "search_threads",
    "allow_remote",
    "zero_hits_fatal",
    "alignment_method",
    "alignment_threads",
    "tree_method",
    "tree_model",
    "tree_threads",
    "bootstrap_replicates",
    "max_retries",
    "retry_base_delay_ms",
    "retry_max_delay_ms",
    "tool_timeout_secs",
    "max_memory_bytes",
    "max_threads",
];

/// What a tree method can do, as declared by its backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeCapabilities {
    pub models: Vec<String>,
    pub bootstrap: bool,
}

/// Read-only view of the registered backends used for validation
pub trait MethodCatalog {
    /// Registered method names for a stage, sorted
    fn methods(&self, stage: StageKind) -> Vec<String>;

    fn tree_capabilities(&self, method: &str) -> Option<TreeCapabilities>;
}

/// Resolve `preset` from `document`, apply `overrides`, and validate the
/// result against the registered backends.
pub fn resolve(
    document: &PresetDocument,
    preset: &str,
    overrides: &OverrideMap,
    catalog: &dyn MethodCatalog,
) -> PhyloResult<PipelineConfig> {
    let mut config = document.preset_config(preset)?;
    apply_overrides(&mut config, overrides)?;
    config.validate_bounds()?;
    validate_methods(&config, catalog)?;
    Ok(config)
}

/// Apply a set of overrides on top of `config`
pub fn apply_overrides(config: &mut PipelineConfig, overrides: &OverrideMap) -> PhyloResult<()> {
    for (key, value) in overrides {
        apply_override(config, key, value)?;
    }
    Ok(())
}

fn apply_override(config: &mut PipelineConfig, key: &str, value: &Value) -> PhyloResult<()> {
    match key {
        "search_method" => config.search_method = string(key, value)?,
        "search_database" => config.search_database = string(key, value)?,
        "search_evalue" => config.search_evalue = float(key, value)?,
        "search_max_hits" => config.search_max_hits = unsigned(key, value)? as usize,
        "search_threads" => config.search_threads = unsigned(key, value)? as usize,
        "allow_remote" => config.allow_remote = boolean(key, value)?,
        "zero_hits_fatal" => config.zero_hits_fatal = boolean(key, value)?,
        "alignment_method" => config.alignment_method = string(key, value)?,
        "alignment_threads" => config.alignment_threads = unsigned(key, value)? as usize,
        "tree_method" => config.tree_method = string(key, value)?,
        "tree_model" => config.tree_model = string(key, value)?,
        "tree_threads" => config.tree_threads = unsigned(key, value)? as usize,
        "bootstrap_replicates" => {
            config.bootstrap_replicates = u32::try_from(unsigned(key, value)?)
                .map_err(|_| type_error(key, "an integer below 2^32", value))?
        }
        "max_retries" => {
            config.max_retries = u32::try_from(unsigned(key, value)?)
                .map_err(|_| type_error(key, "an integer below 2^32", value))?
        }
        "retry_base_delay_ms" => config.retry_base_delay_ms = unsigned(key, value)?,
        "retry_max_delay_ms" => config.retry_max_delay_ms = unsigned(key, value)?,
        "tool_timeout_secs" => config.tool_timeout_secs = Some(unsigned(key, value)?),
        "max_memory_bytes" => config.resource_limits.max_memory_bytes = unsigned(key, value)?,
        "max_threads" => config.resource_limits.max_threads = unsigned(key, value)? as usize,
        unknown => {
            return Err(PhyloError::config(format!(
                "unknown configuration key '{}' (valid keys: {})",
                unknown,
                OVERRIDE_KEYS.join(", ")
            )))
        }
    }
    Ok(())
}

fn type_error(key: &str, expected: &str, value: &Value) -> PhyloError {
    PhyloError::config(format!(
        "invalid value for '{}': expected {}, got {}",
        key, expected, value
    ))
}

fn string(key: &str, value: &Value) -> PhyloResult<String> {
    value
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| type_error(key, "a string", value))
}

fn float(key: &str, value: &Value) -> PhyloResult<f64> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Integer(i) => Ok(*i as f64),
        // "1e-5" given on the command line without TOML float syntax
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| type_error(key, "a number", value)),
        _ => Err(type_error(key, "a number", value)),
    }
}

fn unsigned(key: &str, value: &Value) -> PhyloResult<u64> {
    match value {
        Value::Integer(i) if *i >= 0 => Ok(*i as u64),
        Value::Integer(_) => Err(type_error(key, "a non-negative integer", value)),
        _ => Err(type_error(key, "an integer", value)),
    }
}

fn boolean(key: &str, value: &Value) -> PhyloResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| type_error(key, "true or false", value))
}

/// Check method names, tree model and bootstrap support against the catalog
pub fn validate_methods(config: &PipelineConfig, catalog: &dyn MethodCatalog) -> PhyloResult<()> {
    for (stage, method) in [
        (StageKind::Search, &config.search_method),
        (StageKind::Alignment, &config.alignment_method),
        (StageKind::Tree, &config.tree_method),
    ] {
        let known = catalog.methods(stage);
        if !known.iter().any(|m| m == method) {
            return Err(PhyloError::config(format!(
                "unknown {} method '{}' (valid: {})",
                stage,
                method,
                known.join(", ")
            )));
        }
    }

    let caps = catalog
        .tree_capabilities(&config.tree_method)
        .ok_or_else(|| {
            PhyloError::config(format!(
                "tree method '{}' declares no capabilities",
                config.tree_method
            ))
        })?;

    if !caps.models.iter().any(|m| m.eq_ignore_ascii_case(&config.tree_model)) {
        return Err(PhyloError::config(format!(
            "tree method '{}' does not support model '{}' (supported: {})",
            config.tree_method,
            config.tree_model,
            caps.models.join(", ")
        )));
    }

    if config.bootstrap_replicates > 0 && !caps.bootstrap {
        return Err(PhyloError::config(format!(
            "tree method '{}' does not support bootstrap replicates (requested {})",
            config.tree_method, config.bootstrap_replicates
        )));
    }

    Ok(())
}

/// Parse `KEY=VALUE` as given on the command line; the value is read as a
/// TOML literal and falls back to a plain string.
pub fn parse_assignment(assignment: &str) -> PhyloResult<(String, Value)> {
    let (key, raw) = assignment.split_once('=').ok_or_else(|| {
        PhyloError::config(format!("expected KEY=VALUE, got '{}'", assignment))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(PhyloError::config(format!(
            "missing key in '{}'",
            assignment
        )));
    }

    let raw = raw.trim();
    let value = toml::from_str::<toml::Table>(&format!("v = {}", raw))
        .ok()
        .and_then(|mut table| table.remove("v"))
        .unwrap_or_else(|| Value::String(raw.to_string()));

    Ok((key.to_string(), value))
}

/// Load an override document; `.json` files are read as JSON, anything
/// else as TOML. Both must be a flat table of configuration keys.
pub fn load_overrides<P: AsRef<Path>>(path: P) -> PhyloResult<OverrideMap> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        PhyloError::config(format!("cannot read override document {:?}: {}", path, e))
    })?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let table: toml::Table = if is_json {
        serde_json::from_str(&contents).map_err(|e| {
            PhyloError::config(format!("invalid JSON override document {:?}: {}", path, e))
        })?
    } else {
        toml::from_str(&contents).map_err(|e| {
            PhyloError::config(format!("invalid TOML override document {:?}: {}", path, e))
        })?
    };

    Ok(table.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Catalog;

    impl MethodCatalog for Catalog {
        fn methods(&self, stage: StageKind) -> Vec<String> {
            let names: &[&str] = match stage {
                StageKind::Search => &["blastn", "blastp"],
                StageKind::Alignment => &["mafft", "muscle"],
                StageKind::Tree => &["fasttree", "raxml"],
            };
            names.iter().map(|s| s.to_string()).collect()
        }

        fn tree_capabilities(&self, method: &str) -> Option<TreeCapabilities> {
            match method {
                "fasttree" => Some(TreeCapabilities {
                    models: vec!["JTT".into(), "WAG".into(), "LG".into()],
                    bootstrap: false,
                }),
                "raxml" => Some(TreeCapabilities {
                    models: vec!["PROTGAMMAJTT".into(), "PROTGAMMAWAG".into()],
                    bootstrap: true,
                }),
                _ => None,
            }
        }
    }

    fn overrides(pairs: &[(&str, Value)]) -> OverrideMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let doc = PresetDocument::builtin();
        for name in doc.names() {
            let a = resolve(&doc, &name, &OverrideMap::new(), &Catalog).unwrap();
            let b = resolve(&doc, &name, &OverrideMap::new(), &Catalog).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_override_applies() {
        let doc = PresetDocument::builtin();
        let config = resolve(
            &doc,
            "quick",
            &overrides(&[
                ("search_evalue", Value::Float(1e-7)),
                ("alignment_method", Value::String("mafft".into())),
            ]),
            &Catalog,
        )
        .unwrap();
        assert_eq!(config.search_evalue, 1e-7);
        assert_eq!(config.alignment_method, "mafft");
    }

    #[test]
    fn test_unknown_key_named_in_error() {
        let doc = PresetDocument::builtin();
        let err = resolve(
            &doc,
            "quick",
            &overrides(&[("evalue", Value::Float(1e-3))]),
            &Catalog,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown configuration key 'evalue'"));
    }

    #[test]
    fn test_unknown_method_lists_alternatives() {
        let doc = PresetDocument::builtin();
        let err = resolve(
            &doc,
            "quick",
            &overrides(&[("alignment_method", Value::String("prank".into()))]),
            &Catalog,
        )
        .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("'prank'"));
        assert!(text.contains("mafft, muscle"));
    }

    #[test]
    fn test_bootstrap_without_support_rejected() {
        let doc = PresetDocument::builtin();
        let err = resolve(
            &doc,
            "publication",
            &overrides(&[
                ("tree_method", Value::String("fasttree".into())),
                ("tree_model", Value::String("JTT".into())),
            ]),
            &Catalog,
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not support bootstrap"));
    }

    #[test]
    fn test_unsupported_model_rejected() {
        let doc = PresetDocument::builtin();
        let err = resolve(
            &doc,
            "quick",
            &overrides(&[("tree_model", Value::String("GTR".into()))]),
            &Catalog,
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not support model 'GTR'"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let doc = PresetDocument::builtin();
        let err = resolve(
            &doc,
            "quick",
            &overrides(&[("search_max_hits", Value::String("many".into()))]),
            &Catalog,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'search_max_hits'"));

        let err = resolve(
            &doc,
            "quick",
            &overrides(&[("max_retries", Value::Integer(-1))]),
            &Catalog,
        )
        .unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("search_evalue=1e-5").unwrap(),
            ("search_evalue".to_string(), Value::Float(1e-5))
        );
        assert_eq!(
            parse_assignment("tree_method = raxml").unwrap(),
            ("tree_method".to_string(), Value::String("raxml".into()))
        );
        assert_eq!(
            parse_assignment("allow_remote=false").unwrap(),
            ("allow_remote".to_string(), Value::Boolean(false))
        );
        assert!(parse_assignment("no_equals").is_err());
    }
}

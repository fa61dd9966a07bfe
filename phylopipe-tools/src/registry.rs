//! Read-only backend registries
//!
//! A registry is assembled once through [`RegistryBuilder`] and then frozen
//! behind an `Arc`; clones share the same entries.

use crate::aligners::{ClustalOmega, Mafft, Muscle, TCoffee};
use crate::search::{BlastSearch, DiamondSearch};
use crate::traits::{AlignmentBackend, AvailabilityProbe, Backend, PathProbe, SearchBackend, TreeBackend};
use crate::trees::{FastTree, IqTree, Raxml};
use phylopipe_core::{MethodCatalog, PhyloError, PhyloResult, StageKind, TreeCapabilities};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

pub struct Registry<B: Backend + ?Sized> {
    stage: StageKind,
    entries: Arc<BTreeMap<&'static str, Arc<B>>>,
    probe: Arc<dyn AvailabilityProbe>,
}

impl<B: Backend + ?Sized> Clone for Registry<B> {
    fn clone(&self) -> Self {
        Self {
            stage: self.stage,
            entries: Arc::clone(&self.entries),
            probe: Arc::clone(&self.probe),
        }
    }
}

pub struct RegistryBuilder<B: Backend + ?Sized> {
    stage: StageKind,
    entries: BTreeMap<&'static str, Arc<B>>,
    probe: Arc<dyn AvailabilityProbe>,
}

impl<B: Backend + ?Sized> RegistryBuilder<B> {
    pub fn new(stage: StageKind) -> Self {
        Self {
            stage,
            entries: BTreeMap::new(),
            probe: Arc::new(PathProbe),
        }
    }

    pub fn register(mut self, backend: Arc<B>) -> Self {
        let name = backend.name();
        if self.entries.insert(name, backend).is_some() {
            tracing::warn!(stage = %self.stage, method = name, "backend registered twice, keeping the last one");
        }
        self
    }

    pub fn probe(mut self, probe: Arc<dyn AvailabilityProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn build(self) -> Registry<B> {
        Registry {
            stage: self.stage,
            entries: Arc::new(self.entries),
            probe: self.probe,
        }
    }
}

impl<B: Backend + ?Sized> Registry<B> {
    pub fn builder(stage: StageKind) -> RegistryBuilder<B> {
        RegistryBuilder::new(stage)
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    pub fn resolve(&self, name: &str) -> PhyloResult<Arc<B>> {
        self.entries.get(name).cloned().ok_or_else(|| {
            PhyloError::config(format!(
                "{} method '{}' not found (registered: {})",
                self.stage,
                name,
                self.names().join(", ")
            ))
        })
    }

    /// Presence check; unknown names are simply unavailable
    pub fn is_available(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map(|backend| self.probe.is_installed(backend.binary()))
            .unwrap_or(false)
    }

    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        self.entries
            .get(name)
            .and_then(|backend| self.probe.locate(backend.binary()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().map(|k| k.to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<B>> {
        self.entries.values()
    }

    /// Error for a registered backend whose binary is missing
    pub fn unavailable(&self, backend: &B) -> PhyloError {
        PhyloError::ToolUnavailable {
            tool: backend.binary().to_string(),
            hint: backend.install_hint().to_string(),
        }
    }
}

/// The three registries a pipeline run consults
#[derive(Clone)]
pub struct Registries {
    pub search: Registry<dyn SearchBackend>,
    pub alignment: Registry<dyn AlignmentBackend>,
    pub tree: Registry<dyn TreeBackend>,
}

impl Registries {
    /// All built-in backends, checked against `PATH`
    pub fn standard() -> Self {
        Self::with_probe(Arc::new(PathProbe))
    }

    pub fn with_probe(probe: Arc<dyn AvailabilityProbe>) -> Self {
        let search = Registry::<dyn SearchBackend>::builder(StageKind::Search)
            .register(Arc::new(BlastSearch::blastp()))
            .register(Arc::new(BlastSearch::blastn()))
            .register(Arc::new(DiamondSearch))
            .probe(Arc::clone(&probe))
            .build();

        let alignment = Registry::<dyn AlignmentBackend>::builder(StageKind::Alignment)
            .register(Arc::new(Mafft))
            .register(Arc::new(Muscle))
            .register(Arc::new(ClustalOmega))
            .register(Arc::new(TCoffee))
            .probe(Arc::clone(&probe))
            .build();

        let tree = Registry::<dyn TreeBackend>::builder(StageKind::Tree)
            .register(Arc::new(FastTree))
            .register(Arc::new(Raxml))
            .register(Arc::new(IqTree))
            .probe(probe)
            .build();

        Self {
            search,
            alignment,
            tree,
        }
    }
}

impl MethodCatalog for Registries {
    fn methods(&self, stage: StageKind) -> Vec<String> {
        match stage {
            StageKind::Search => self.search.names(),
            StageKind::Alignment => self.alignment.names(),
            StageKind::Tree => self.tree.names(),
        }
    }

    fn tree_capabilities(&self, method: &str) -> Option<TreeCapabilities> {
        let backend = self.tree.resolve(method).ok()?;
        Some(TreeCapabilities {
            models: backend
                .supported_models()
                .iter()
                .map(|m| m.to_string())
                .collect(),
            bootstrap: backend.supports_bootstrap(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylopipe_core::ErrorKind;
    use std::collections::HashSet;

    struct Installed(HashSet<&'static str>);

    impl AvailabilityProbe for Installed {
        fn locate(&self, binary: &str) -> Option<PathBuf> {
            self.0
                .contains(binary)
                .then(|| PathBuf::from("/usr/bin").join(binary))
        }
    }

    fn registries(installed: &[&'static str]) -> Registries {
        Registries::with_probe(Arc::new(Installed(installed.iter().copied().collect())))
    }

    #[test]
    fn test_registered_methods() {
        let reg = registries(&[]);
        assert_eq!(reg.methods(StageKind::Search), vec!["blastn", "blastp", "diamond"]);
        assert_eq!(
            reg.methods(StageKind::Alignment),
            vec!["clustalo", "mafft", "muscle", "t_coffee"]
        );
        assert_eq!(reg.methods(StageKind::Tree), vec!["fasttree", "iqtree", "raxml"]);
    }

    #[test]
    fn test_resolve_unknown_lists_registered() {
        let reg = registries(&[]);
        let err = reg.alignment.resolve("prank").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("clustalo, mafft, muscle, t_coffee"));
    }

    #[test]
    fn test_availability_uses_binary_name() {
        let reg = registries(&["mafft", "FastTree"]);
        assert!(reg.alignment.is_available("mafft"));
        assert!(!reg.alignment.is_available("muscle"));
        assert!(reg.tree.is_available("fasttree"));
        assert!(!reg.tree.is_available("raxml"));
        assert!(!reg.tree.is_available("no-such-method"));
    }

    #[test]
    fn test_tree_capabilities() {
        let reg = registries(&[]);
        let fasttree = reg.tree_capabilities("fasttree").unwrap();
        assert!(!fasttree.bootstrap);
        assert!(fasttree.models.contains(&"JTT".to_string()));

        let raxml = reg.tree_capabilities("raxml").unwrap();
        assert!(raxml.bootstrap);
        assert!(reg.tree_capabilities("phyml").is_none());
    }

    #[test]
    fn test_clones_share_entries() {
        let reg = registries(&[]);
        let copy = reg.clone();
        assert!(Arc::ptr_eq(&reg.search.entries, &copy.search.entries));
    }
}

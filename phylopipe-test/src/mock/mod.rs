//! Mock collaborators for pipeline tests

pub mod probes;
pub mod remote;
pub mod reporter;
pub mod runner;

pub use probes::{FixedResources, StaticProbe};
pub use remote::{MockRemoteSearch, MockSequenceSource};
pub use reporter::RecordingReporter;
pub use runner::{Handler, ScriptedRunner};

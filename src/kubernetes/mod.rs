//! Kubernetes integration module
//!
//! Provides connection configuration, target resolution, and the exec-based
//! exit-code probe.

pub mod config;
pub mod probe;
pub mod resolver;

pub use config::{ClusterConfig, ClusterConfigError, KubeconfigSummary};
pub use probe::{probe, CommandSpec, ExecutionResult, OutputSink, ProbeError};
pub use resolver::{resolve, ExecTarget, ResolveError};

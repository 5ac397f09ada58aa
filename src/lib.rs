pub mod cli;
pub mod kubernetes;

pub use cli::Cli;
pub use kubernetes::{ClusterConfig, CommandSpec, ExecTarget, ExecutionResult};

use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use execprobe::cli::{report, Cli};
use execprobe::kubernetes::{
    probe, resolve, ClusterConfig, ClusterConfigError, CommandSpec, ExecutionResult, ProbeError,
    ResolveError,
};

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ClusterConfigError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

async fn run(cli: Cli) -> Result<ExecutionResult, RunError> {
    let kubeconfig = cli
        .kubeconfig
        .or_else(ClusterConfig::default_kubeconfig_path);
    let cluster = ClusterConfig::new(cli.master, kubeconfig);
    let client = cluster.client().await?;

    let target = resolve(&client, &cli.namespace, &cli.pod, cli.container.as_deref()).await?;
    let command = CommandSpec::new(cli.cmd, cli.argv);

    Ok(probe(&client, &target, &command).await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only the report tuple.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(result) => {
            println!("{}", report(&result.exit_code.to_string(), &result.summary));
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}", report("UNKNOWN", &e.to_string()));
            ExitCode::FAILURE
        }
    }
}

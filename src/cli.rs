//! Command-line surface and result reporting.

use clap::Parser;
use std::path::PathBuf;

/// Check the exit code of a command executed inside a Kubernetes container.
///
/// Prints one tuple to stdout: `("<code>", "<summary>")`, where the code is
/// `0` for a clean remote exit, `2` for any non-zero remote exit, and
/// `UNKNOWN` when no exit status could be determined. The process itself
/// exits 0 whenever a result was produced, 1 on any top-level error.
#[derive(Parser, Debug)]
#[command(name = "execprobe", version, about, long_about = None)]
pub struct Cli {
    /// The address of the Kubernetes API server (overrides any value in kubeconfig)
    #[arg(long)]
    pub master: Option<String>,

    /// Path to kubeconfig file with authorization information
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace of the target pod
    #[arg(short = 'n', long, default_value = "default")]
    pub namespace: String,

    /// Name of the target pod
    #[arg(short = 'p', long, default_value = "shell")]
    pub pod: String,

    /// Container name in specified pod (remote default when omitted)
    #[arg(short = 'C', long)]
    pub container: Option<String>,

    /// Exec command
    #[arg(short = 'c', long, default_value = "/bin/sh")]
    pub cmd: String,

    /// Arguments for exec command [format: 'arg; arg; arg']
    #[arg(short = 'a', long, default_value = "")]
    pub argv: String,
}

/// Render the stdout report tuple.
pub fn report(status: &str, detail: &str) -> String {
    format!("(\"{status}\", \"{detail}\")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fixture() {
        let cli = Cli::parse_from(["execprobe"]);
        assert_eq!(cli.namespace, "default");
        assert_eq!(cli.pod, "shell");
        assert_eq!(cli.cmd, "/bin/sh");
        assert_eq!(cli.argv, "");
        assert!(cli.master.is_none());
        assert!(cli.kubeconfig.is_none());
        assert!(cli.container.is_none());
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from([
            "execprobe", "-n", "kube-system", "-p", "worker", "-C", "main", "-c", "/bin/bash",
            "-a", "exit 7",
        ]);
        assert_eq!(cli.namespace, "kube-system");
        assert_eq!(cli.pod, "worker");
        assert_eq!(cli.container.as_deref(), Some("main"));
        assert_eq!(cli.cmd, "/bin/bash");
        assert_eq!(cli.argv, "exit 7");
    }

    #[test]
    fn test_connection_flags() {
        let cli = Cli::parse_from([
            "execprobe",
            "--master",
            "https://10.0.0.1:6443",
            "--kubeconfig",
            "/tmp/kubeconfig",
        ]);
        assert_eq!(cli.master.as_deref(), Some("https://10.0.0.1:6443"));
        assert_eq!(cli.kubeconfig, Some(PathBuf::from("/tmp/kubeconfig")));
    }

    #[test]
    fn test_report_shape() {
        assert_eq!(report("0", "Exit Code: 0"), "(\"0\", \"Exit Code: 0\")");
        assert_eq!(report("2", "Exit Code: 7"), "(\"2\", \"Exit Code: 7\")");
    }
}

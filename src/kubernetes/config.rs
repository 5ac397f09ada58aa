//! Cluster connection configuration
//!
//! Holds the explicit connection settings (`--master`, `--kubeconfig`) and
//! turns them into a ready `kube::Client`. Ambient lookups (KUBECONFIG,
//! home directory) happen only in [`ClusterConfig::default_kubeconfig_path`],
//! which is called from the CLI boundary, never from resolver or probe code.

use std::path::{Path, PathBuf};

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterConfigError {
    #[error("Failed to read kubeconfig: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse kubeconfig: {0}")]
    ParseError(String),

    #[error("Failed to load kubeconfig: {0}")]
    KubeconfigError(#[from] kube::config::KubeconfigError),

    #[error("Failed to infer config: {0}")]
    InferError(#[from] kube::config::InferConfigError),

    #[error("Failed to create client: {0}")]
    ClientError(#[from] kube::Error),

    #[error("Invalid API server address {0:?}: {1}")]
    InvalidMasterUrl(String, String),
}

/// Explicit cluster connection settings, built from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ClusterConfig {
    pub master_url: Option<String>,
    pub kubeconfig_path: Option<PathBuf>,
}

impl ClusterConfig {
    pub fn new(master_url: Option<String>, kubeconfig_path: Option<PathBuf>) -> Self {
        Self {
            master_url,
            kubeconfig_path,
        }
    }

    /// Default kubeconfig location: first KUBECONFIG entry, else ~/.kube/config.
    ///
    /// Reads the ambient environment; call this from the CLI layer only.
    pub fn default_kubeconfig_path() -> Option<PathBuf> {
        if let Ok(kubeconfig) = std::env::var("KUBECONFIG") {
            let path = PathBuf::from(kubeconfig.split(':').next().unwrap_or(&kubeconfig));
            if path.exists() {
                return Some(path);
            }
        }

        let path = dirs::home_dir()?.join(".kube").join("config");
        path.exists().then_some(path)
    }

    /// Build a `kube::Client` from these settings.
    ///
    /// With an explicit kubeconfig path the file is parsed up front so config
    /// problems surface before any network call. Without one, `Config::infer`
    /// handles the default chain (kubeconfig or in-cluster environment).
    pub async fn client(&self) -> Result<Client, ClusterConfigError> {
        let mut config = match &self.kubeconfig_path {
            Some(path) => {
                let summary = KubeconfigSummary::load_from(path)?;
                tracing::info!(
                    "Using kubeconfig {} (context: {}, server: {})",
                    path.display(),
                    summary.current_context.as_deref().unwrap_or("<none>"),
                    summary.current_server().unwrap_or("<unknown>"),
                );
                let kubeconfig = Kubeconfig::read_from(path)?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
            }
            None => Config::infer().await?,
        };

        if let Some(master) = &self.master_url {
            config.cluster_url = master
                .parse()
                .map_err(|e| ClusterConfigError::InvalidMasterUrl(master.clone(), format!("{e}")))?;
            tracing::info!("API server overridden to {}", master);
        }

        Ok(Client::try_from(config)?)
    }
}

/// Light typed view of a kubeconfig file.
///
/// The kube crate does the real loading; this parse exists so a broken file
/// fails fast and the active context can be logged before connecting.
#[derive(Debug, Clone)]
pub struct KubeconfigSummary {
    pub current_context: Option<String>,
    pub contexts: Vec<ContextSummary>,
    pub clusters: Vec<ClusterSummary>,
}

#[derive(Debug, Clone)]
pub struct ContextSummary {
    pub name: String,
    pub cluster: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClusterSummary {
    pub name: String,
    pub server: String,
}

#[derive(Debug, Deserialize)]
struct RawKubeconfig {
    #[serde(rename = "current-context")]
    current_context: Option<String>,
    #[serde(default)]
    contexts: Vec<RawNamedContext>,
    #[serde(default)]
    clusters: Vec<RawNamedCluster>,
}

#[derive(Debug, Deserialize)]
struct RawNamedContext {
    name: String,
    context: Option<RawContext>,
}

#[derive(Debug, Default, Deserialize)]
struct RawContext {
    cluster: Option<String>,
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNamedCluster {
    name: String,
    cluster: Option<RawCluster>,
}

#[derive(Debug, Deserialize)]
struct RawCluster {
    server: Option<String>,
}

impl KubeconfigSummary {
    /// Load and parse a kubeconfig summary from a file.
    pub fn load_from(path: &Path) -> Result<Self, ClusterConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse kubeconfig YAML content.
    pub fn parse(content: &str) -> Result<Self, ClusterConfigError> {
        let raw: RawKubeconfig = serde_yaml_ng::from_str(content)
            .map_err(|e| ClusterConfigError::ParseError(e.to_string()))?;

        let contexts = raw
            .contexts
            .into_iter()
            .map(|c| {
                let body = c.context.unwrap_or_default();
                ContextSummary {
                    name: c.name,
                    cluster: body.cluster.unwrap_or_default(),
                    namespace: body.namespace,
                }
            })
            .collect();

        let clusters = raw
            .clusters
            .into_iter()
            .map(|c| ClusterSummary {
                name: c.name,
                server: c.cluster.and_then(|b| b.server).unwrap_or_default(),
            })
            .collect();

        Ok(Self {
            current_context: raw.current_context,
            contexts,
            clusters,
        })
    }

    /// Get the current context, if the file names one that exists.
    pub fn current_context(&self) -> Option<&ContextSummary> {
        self.current_context
            .as_ref()
            .and_then(|name| self.contexts.iter().find(|c| &c.name == name))
    }

    /// Server address of the current context's cluster.
    pub fn current_server(&self) -> Option<&str> {
        let context = self.current_context()?;
        self.clusters
            .iter()
            .find(|c| c.name == context.cluster)
            .map(|c| c.server.as_str())
    }
}

//! Target resolution
//!
//! Fetches the target pod's metadata and validates the requested container
//! name against the pod spec before any exec stream is opened.

use k8s_openapi::api::core::v1::Pod;
use kube::{api::Api, Client};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Pod not found: {namespace}/{pod}: {source}")]
    PodNotFound {
        namespace: String,
        pod: String,
        #[source]
        source: kube::Error,
    },

    #[error("Container {0:?} not found")]
    ContainerNotFound(String),
}

/// A validated exec target. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTarget {
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
}

/// Resolve `(namespace, pod, container)` into a validated [`ExecTarget`].
///
/// One metadata fetch, no retry: any API failure maps to `PodNotFound`. An
/// empty or absent container name skips validation and defers container
/// selection to the remote side.
pub async fn resolve(
    client: &Client,
    namespace: &str,
    pod_name: &str,
    container: Option<&str>,
) -> Result<ExecTarget, ResolveError> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);

    let pod = pods
        .get(pod_name)
        .await
        .map_err(|source| ResolveError::PodNotFound {
            namespace: namespace.to_string(),
            pod: pod_name.to_string(),
            source,
        })?;

    let container = match container {
        Some(name) if !name.is_empty() => {
            validate_container(&pod, name)?;
            tracing::info!("Container {:?} found in pod {}/{}", name, namespace, pod_name);
            Some(name.to_string())
        }
        _ => None,
    };

    Ok(ExecTarget {
        namespace: namespace.to_string(),
        pod: pod_name.to_string(),
        container,
    })
}

/// Check that `name` matches exactly one container declared in the pod spec.
pub fn validate_container(pod: &Pod, name: &str) -> Result<(), ResolveError> {
    let declared = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default();

    if declared.iter().any(|c| c.name == name) {
        Ok(())
    } else {
        Err(ResolveError::ContainerNotFound(name.to_string()))
    }
}

use std::{fmt, path::PathBuf, str::FromStr};

use anyhow::{bail, Context as _};
use kubeconf::ConfigDir;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::credentials::Credential;
use crate::linode::LinodeClient;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Provider {
    Linode,
    #[serde(rename = "AWS")]
    Aws,
    Azure,
    #[serde(rename = "GCP")]
    Gcp,
}

impl Provider {
    pub const ALL: [Provider; 4] = [Provider::Aws, Provider::Azure, Provider::Gcp, Provider::Linode];

    pub fn name(self) -> &'static str {
        match self {
            Provider::Linode => "Linode",
            Provider::Aws => "AWS",
            Provider::Azure => "Azure",
            Provider::Gcp => "GCP",
        }
    }

    /// The API client for this provider, or `None` if kubeconfig download
    /// isn't implemented for it.
    pub fn source(self, cred: &Credential) -> anyhow::Result<Option<Box<dyn ClusterSource>>> {
        match self {
            Provider::Linode => Ok(Some(Box::new(LinodeClient::from_credential(cred)?))),
            Provider::Aws | Provider::Azure | Provider::Gcp => Ok(None),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Provider::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
        {
            Some(provider) => Ok(provider),
            None => bail!("unknown provider {s:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCluster {
    pub id: String,
    /// Human-readable name; becomes the context name.
    pub label: String,
}

/// What a provider must offer for its clusters to be merged.
pub trait ClusterSource {
    fn list_clusters(&self) -> anyhow::Result<Vec<RemoteCluster>>;

    /// The cluster's kubeconfig as YAML.
    fn fetch_kubeconfig(&self, cluster: &RemoteCluster) -> anyhow::Result<String>;
}

/// Saves every cluster's kubeconfig as a pending file in `dir`.
pub fn download_all(source: &dyn ClusterSource, dir: &ConfigDir) -> anyhow::Result<Vec<PathBuf>> {
    let clusters = source.list_clusters().context("Listing clusters")?;
    let mut saved = Vec::with_capacity(clusters.len());
    for cluster in &clusters {
        info!("Downloading kubeconfig for cluster: {}", cluster.label);
        let kubeconfig = source
            .fetch_kubeconfig(cluster)
            .with_context(|| format!("Retrieving kubeconfig for cluster {}", cluster.label))?;
        let path = dir
            .write_pending(&cluster.label, &kubeconfig)
            .with_context(|| format!("Saving kubeconfig for cluster {}", cluster.label))?;
        saved.push(path);
    }
    Ok(saved)
}

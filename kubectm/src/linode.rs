//! Linode Kubernetes Engine API.

use anyhow::{bail, Context as _};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{blocking::Client, header::CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use crate::credentials::{Credential, LINODE_TOKEN};
use crate::provider::{ClusterSource, RemoteCluster};

pub const API_BASE_URL: &str = "https://api.linode.com/v4";
/// Overrides [`API_BASE_URL`].
pub const API_URL_ENV: &str = "LINODE_API_URL";

#[derive(Deserialize, Debug)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default = "one")]
    page: u32,
    #[serde(default = "one")]
    pages: u32,
}

fn one() -> u32 {
    1
}

#[derive(Deserialize, Debug)]
struct LinodeCluster {
    id: u64,
    label: String,
}

#[derive(Deserialize, Debug)]
struct KubeconfigResponse {
    kubeconfig: String,
}

pub struct LinodeClient {
    http: Client,
    base_url: String,
    token: String,
}

impl LinodeClient {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("kubectm/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Building HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.into(),
        })
    }

    pub fn from_credential(cred: &Credential) -> anyhow::Result<Self> {
        let token = cred
            .detail(LINODE_TOKEN)
            .filter(|token| !token.is_empty())
            .context("Linode access token is missing")?;
        let base_url = std::env::var(API_URL_ENV).unwrap_or_else(|_| API_BASE_URL.to_owned());
        Self::new(token, base_url)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {url}");
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .with_context(|| format!("Requesting {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            bail!("{url} returned status {}, body: {body}", status.as_u16());
        }
        resp.json().with_context(|| format!("Decoding response from {url}"))
    }
}

impl ClusterSource for LinodeClient {
    fn list_clusters(&self) -> anyhow::Result<Vec<RemoteCluster>> {
        let mut clusters = Vec::new();
        let mut page = 1;
        loop {
            let resp: Page<LinodeCluster> = self.get(&format!("/lke/clusters?page={page}"))?;
            clusters.extend(resp.data.into_iter().map(RemoteCluster::from));
            if resp.page >= resp.pages {
                return Ok(clusters);
            }
            page = resp.page + 1;
        }
    }

    fn fetch_kubeconfig(&self, cluster: &RemoteCluster) -> anyhow::Result<String> {
        let resp: KubeconfigResponse = self.get(&format!("/lke/clusters/{}/kubeconfig", cluster.id))?;
        decode_kubeconfig(&resp.kubeconfig)
            .with_context(|| format!("Decoding kubeconfig for cluster {}", cluster.id))
    }
}

impl From<LinodeCluster> for RemoteCluster {
    fn from(cluster: LinodeCluster) -> Self {
        RemoteCluster {
            id: cluster.id.to_string(),
            label: cluster.label,
        }
    }
}

/// The API returns the kubeconfig YAML base64-encoded.
fn decode_kubeconfig(encoded: &str) -> anyhow::Result<String> {
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::provider::Provider;

    #[test]
    fn decodes_cluster_pages() {
        let page: Page<LinodeCluster> = serde_json::from_str(
            r#"{"data": [{"id": 42, "label": "production-cluster", "region": "eu-west"}],
                "page": 1, "pages": 3, "results": 1}"#,
        )
        .unwrap();

        assert_eq!((page.page, page.pages), (1, 3));
        let cluster = RemoteCluster::from(page.data.into_iter().next().unwrap());
        assert_eq!(
            cluster,
            RemoteCluster {
                id: "42".into(),
                label: "production-cluster".into()
            }
        );
    }

    #[test]
    fn missing_paging_means_single_page() {
        let page: Page<LinodeCluster> = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert_eq!((page.page, page.pages), (1, 1));
    }

    #[test]
    fn kubeconfig_payload_is_base64() {
        let encoded = STANDARD.encode("apiVersion: v1\nkind: Config\n");
        assert_eq!(
            decode_kubeconfig(&format!("{encoded}\n")).unwrap(),
            "apiVersion: v1\nkind: Config\n"
        );
        assert!(decode_kubeconfig("%%%").is_err());
    }

    #[test]
    fn token_is_required() {
        let cred = Credential {
            provider: Provider::Linode,
            details: BTreeMap::from([(LINODE_TOKEN.to_owned(), String::new())]),
        };
        assert!(LinodeClient::from_credential(&cred).is_err());
    }

    #[test]
    fn base_url_is_normalised() {
        let client = LinodeClient::new("t", "http://localhost:8080/v4/").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v4");
    }
}

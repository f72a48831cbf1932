use std::collections::BTreeMap;

use crate::direct::{self, Named, Passthrough};
pub use crate::direct::{
    ApiVersion, Cluster, ClusterSpec, Context, ContextExtension, ContextSpec, Kind, NamedExtension,
    User, UserSpec,
};

/// A kubeconfig keyed by name. This is the form the merge engine mutates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KubeConfig {
    pub contexts: BTreeMap<String, ContextSpec>,
    pub current_context: String,
    pub clusters: BTreeMap<String, ClusterSpec>,
    pub preferences: Passthrough,
    pub users: BTreeMap<String, UserSpec>,
    /// Top-level keys outside the sections above, written back unchanged.
    pub other: Passthrough,
}

impl KubeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        direct::KubeConfig::from_yaml(contents).map(Self::from)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        direct::KubeConfig::from(self.clone()).to_yaml()
    }

    /// The cluster a context points at, if it exists in this document.
    pub fn cluster_of(&self, context: &ContextSpec) -> Option<&ClusterSpec> {
        self.clusters.get(&context.cluster)
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty() && self.clusters.is_empty() && self.users.is_empty()
    }
}

/// Keys a named list. Like kubectl, the first entry of a repeated name wins.
fn keyed<N: Named>(entries: Vec<N>) -> BTreeMap<String, N::Body> {
    let mut map = BTreeMap::new();
    for (name, body) in entries.into_iter().map(N::into_entry) {
        map.entry(name).or_insert(body);
    }
    map
}

fn listed<N: Named>(map: BTreeMap<String, N::Body>) -> Vec<N> {
    map.into_iter()
        .map(|(name, body)| N::from_entry(name, body))
        .collect()
}

impl From<direct::KubeConfig> for KubeConfig {
    fn from(wire: direct::KubeConfig) -> Self {
        let direct::KubeConfig {
            clusters,
            contexts,
            current_context,
            preferences,
            users,
            other,
            ..
        } = wire;
        Self {
            clusters: keyed(clusters),
            contexts: keyed(contexts),
            users: keyed(users),
            current_context,
            preferences,
            other,
        }
    }
}

impl From<KubeConfig> for direct::KubeConfig {
    fn from(kc: KubeConfig) -> Self {
        Self {
            api_version: ApiVersion::V1,
            kind: Kind::Config,
            clusters: listed::<Cluster>(kc.clusters),
            contexts: listed::<Context>(kc.contexts),
            users: listed::<User>(kc.users),
            current_context: kc.current_context,
            preferences: kc.preferences,
            other: kc.other,
        }
    }
}

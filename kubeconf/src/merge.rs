//! Folding one kubeconfig into another.

use std::fmt;

use tracing::{debug, info};

use crate::clean::{ClusterSpec, ContextExtension, KubeConfig};
use crate::identity::same_cluster;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Inserted under the desired name.
    Inserted { name: String },
    /// The desired name was taken by a different cluster.
    Renamed { name: String, desired: String },
    /// The destination already has this cluster under `name`.
    SkippedDuplicate { name: String },
}

impl MergeOutcome {
    pub fn name(&self) -> &str {
        match self {
            MergeOutcome::Inserted { name }
            | MergeOutcome::Renamed { name, .. }
            | MergeOutcome::SkippedDuplicate { name } => name,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, MergeOutcome::SkippedDuplicate { .. })
    }
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeOutcome::Inserted { name } => write!(f, "added {name}"),
            MergeOutcome::Renamed { name, desired } => write!(f, "added {name} ({desired} was taken)"),
            MergeOutcome::SkippedDuplicate { name } => write!(f, "skip: duplicate of {name}"),
        }
    }
}

/// First name not taken among `base`, `base-1`, `base-2`, ...
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_owned();
    }
    let mut n: u64 = 1;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// `name` is `base` itself or one of the names [`unique_name`] derives from it.
fn is_variant_of(name: &str, base: &str) -> bool {
    match name.strip_prefix(base) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('-')
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())),
        None => false,
    }
}

fn existing_variant(dest: &KubeConfig, base: &str, cluster: Option<&ClusterSpec>) -> Option<String> {
    dest.contexts
        .iter()
        .filter(|(name, _)| is_variant_of(name, base))
        .find(|(_, ctx)| same_cluster(dest.cluster_of(ctx), cluster))
        .map(|(name, _)| name.clone())
}

/// Merges `src` into `dest`, inserting its contexts as `desired`.
///
/// Clusters and users are copied only under names `dest` doesn't have yet. A
/// context whose cluster is already present under the desired name is skipped.
/// If the desired name belongs to a different cluster, the source's cluster and
/// user entries overwrite those of the same name and the context is inserted
/// under the next free `desired-N`. Every inserted context gets `extension`.
///
/// References are kept as they are; a context naming a cluster that doesn't
/// exist is copied, not repaired.
pub fn merge(
    dest: &mut KubeConfig,
    src: &KubeConfig,
    desired: &str,
    extension: Option<&ContextExtension>,
) -> Vec<MergeOutcome> {
    for (name, cluster) in &src.clusters {
        dest.clusters
            .entry(name.clone())
            .or_insert_with(|| cluster.clone());
    }
    for (name, user) in &src.users {
        dest.users.entry(name.clone()).or_insert_with(|| user.clone());
    }

    let mut outcomes = Vec::with_capacity(src.contexts.len());
    for (key, context) in &src.contexts {
        let incoming = src.cluster_of(context);
        let collision = dest
            .contexts
            .get(desired)
            .map(|existing| same_cluster(dest.cluster_of(existing), incoming));

        let outcome = match collision {
            None => {
                debug!("Adding context {desired}");
                MergeOutcome::Inserted {
                    name: desired.to_owned(),
                }
            }
            Some(true) => MergeOutcome::SkippedDuplicate {
                name: desired.to_owned(),
            },
            Some(false) => match existing_variant(dest, desired, incoming) {
                Some(name) => MergeOutcome::SkippedDuplicate { name },
                None => {
                    if let Some(cluster) = incoming {
                        dest.clusters.insert(context.cluster.clone(), cluster.clone());
                    }
                    if let Some(user) = src.users.get(&context.user) {
                        dest.users.insert(context.user.clone(), user.clone());
                    }
                    let name = unique_name(desired, |n| dest.contexts.contains_key(n));
                    info!("Context {desired} belongs to a different cluster, adding as {name}");
                    MergeOutcome::Renamed {
                        name,
                        desired: desired.to_owned(),
                    }
                }
            },
        };

        if outcome.is_skip() {
            info!("Context {} already points at this cluster, skipping", outcome.name());
            outcomes.push(outcome);
            continue;
        }

        let name = outcome.name().to_owned();
        let mut new_context = context.clone();
        if let Some(extension) = extension {
            new_context.set_extension(extension.clone());
        }
        dest.contexts.insert(name.clone(), new_context);

        if src.current_context == *key {
            dest.current_context = name;
        }
        outcomes.push(outcome);
    }
    outcomes
}

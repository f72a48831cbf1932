use crate::clean::ClusterSpec;

/// Whether two cluster entries point at the same API endpoint, whatever they
/// are named. A missing entry is never the same as anything. Absent and empty
/// CA data are equivalent; non-empty CA data must match byte for byte.
pub fn same_cluster(a: Option<&ClusterSpec>, b: Option<&ClusterSpec>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.server == b.server && a.ca_data() == b.ca_data(),
        _ => false,
    }
}

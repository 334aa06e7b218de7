//! Member cluster zone and region discovery
//!
//! Zones come from every node; the region is read from the first node only,
//! since a cluster is expected to live in a single region.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use tracing::{debug, warn};

use lattice_common::crd::ClusterTopology;
use lattice_common::Error;

use crate::client::MemberClusterApi;

/// Well-known zone label
pub const LABEL_TOPOLOGY_ZONE: &str = "topology.kubernetes.io/zone";
/// Well-known region label
pub const LABEL_TOPOLOGY_REGION: &str = "topology.kubernetes.io/region";
/// Deprecated zone label, still set by older cloud providers
pub const LABEL_FAILURE_DOMAIN_ZONE: &str = "failure-domain.beta.kubernetes.io/zone";
/// Deprecated region label, still set by older cloud providers
pub const LABEL_FAILURE_DOMAIN_REGION: &str = "failure-domain.beta.kubernetes.io/region";

/// List the cluster's nodes and derive its topology
pub async fn discover_topology(api: &dyn MemberClusterApi) -> Result<ClusterTopology, Error> {
    let nodes = api.list_nodes().await.map_err(|e| {
        warn!(error = %e, "failed to list nodes while discovering topology");
        e
    })?;
    let topology = topology_from_nodes(&nodes)?;
    debug!(
        nodes = nodes.len(),
        zones = ?topology.zones,
        region = %topology.region,
        "discovered cluster topology"
    );
    Ok(topology)
}

/// Derive sorted, deduplicated zones and the region from a node list
///
/// Every node must carry a zone label; only the first node must carry a
/// region label. An empty list yields no zones and an empty region.
pub fn topology_from_nodes(nodes: &[Node]) -> Result<ClusterTopology, Error> {
    let mut zones = BTreeSet::new();
    let mut region = String::new();
    for (i, node) in nodes.iter().enumerate() {
        zones.insert(zone_for_node(node)?.to_string());
        if i == 0 {
            region = region_for_node(node)?.to_string();
        }
    }

    Ok(ClusterTopology {
        zones: zones.into_iter().collect(),
        region,
    })
}

/// The node's zone, preferring the well-known label over the deprecated one
pub fn zone_for_node(node: &Node) -> Result<&str, Error> {
    label_value(node, LABEL_TOPOLOGY_ZONE, LABEL_FAILURE_DOMAIN_ZONE)
}

/// The node's region, preferring the well-known label over the deprecated one
pub fn region_for_node(node: &Node) -> Result<&str, Error> {
    label_value(node, LABEL_TOPOLOGY_REGION, LABEL_FAILURE_DOMAIN_REGION)
}

fn label_value<'a>(node: &'a Node, label: &str, legacy: &str) -> Result<&'a str, Error> {
    let labels = node.labels();
    labels
        .get(label)
        .or_else(|| labels.get(legacy))
        .map(String::as_str)
        .ok_or_else(|| Error::topology(node.name_any(), label))
}

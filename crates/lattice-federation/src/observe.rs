//! One observation pass over a member cluster

use tracing::warn;

use lattice_common::crd::MemberClusterStatus;

use crate::client::MemberClusterApi;
use crate::health::check_health;
use crate::topology::discover_topology;

/// Check health and, for ready clusters, discover topology
///
/// Topology is only attempted when the cluster reported Ready. A discovery
/// failure is logged and leaves zones and region empty; the health
/// conditions are still returned.
pub async fn observe_cluster(api: &dyn MemberClusterApi) -> MemberClusterStatus {
    let health = check_health(api).await;
    let ready = health.is_ready();
    let status = MemberClusterStatus::from_health(health);
    if !ready {
        return status;
    }

    match discover_topology(api).await {
        Ok(topology) => status.with_topology(topology),
        Err(e) => {
            warn!(error = %e, "failed to get zones and region for cluster");
            status
        }
    }
}

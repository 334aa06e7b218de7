//! Member cluster health probing

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use lattice_common::crd::{ClusterCondition, ClusterConditionType, ClusterStatus, ConditionStatus};
use lattice_common::Error;

use crate::client::MemberClusterApi;

/// Reason set when `/healthz` answers "ok"
pub const REASON_CLUSTER_READY: &str = "ClusterReady";
/// Reason set when `/healthz` answers something other than "ok"
pub const REASON_CLUSTER_NOT_READY: &str = "ClusterNotReady";
/// Reason set when `/healthz` could not be reached
pub const REASON_CLUSTER_NOT_REACHABLE: &str = "ClusterNotReachable";
/// Reason set alongside a not-ready condition: the API server did answer
pub const REASON_CLUSTER_REACHABLE: &str = "ClusterReachable";

const MSG_HEALTHZ_OK: &str = "/healthz responded with ok";
const MSG_HEALTHZ_NOT_OK: &str = "/healthz responded without ok";
const MSG_NOT_REACHABLE: &str = "cluster is not reachable";
const MSG_REACHABLE: &str = "cluster is reachable";

/// Check the cluster's liveness endpoint and express the result as conditions
///
/// Never fails: an unreachable cluster is a status, not an error.
pub async fn check_health(api: &dyn MemberClusterApi) -> ClusterStatus {
    let result = api.healthz().await;
    let checked_at = Utc::now();
    if let Err(e) = &result {
        warn!(error = %e, "failed to do cluster health check");
    }
    let status = status_from_healthz(result.as_deref(), checked_at);
    debug!(
        ready = status.is_ready(),
        offline = status.is_offline(),
        "cluster health checked"
    );
    status
}

/// Map a `/healthz` result to conditions, all stamped with `checked_at`
///
/// - transport error: `[Offline=True]`
/// - body "ok" (any case): `[Ready=True]`
/// - any other body: `[Ready=False, Offline=False]`
pub fn status_from_healthz(result: Result<&str, &Error>, checked_at: DateTime<Utc>) -> ClusterStatus {
    let observed = |type_, status: bool, reason: &str, message: &str| {
        ClusterCondition::observed(
            type_,
            ConditionStatus::from(status),
            reason,
            message,
            checked_at,
        )
    };

    match result {
        Err(_) => ClusterStatus::default().condition(observed(
            ClusterConditionType::Offline,
            true,
            REASON_CLUSTER_NOT_REACHABLE,
            MSG_NOT_REACHABLE,
        )),
        Ok(body) if body.eq_ignore_ascii_case("ok") => ClusterStatus::default().condition(
            observed(ClusterConditionType::Ready, true, REASON_CLUSTER_READY, MSG_HEALTHZ_OK),
        ),
        Ok(_) => ClusterStatus::default()
            .condition(observed(
                ClusterConditionType::Ready,
                false,
                REASON_CLUSTER_NOT_READY,
                MSG_HEALTHZ_NOT_OK,
            ))
            .condition(observed(
                ClusterConditionType::Offline,
                false,
                REASON_CLUSTER_REACHABLE,
                MSG_REACHABLE,
            )),
    }
}

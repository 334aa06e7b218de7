//! Custom Resource Definitions for Lattice federation
//!
//! This module contains the MemberCluster CRD and the status types shared by
//! the federation client.

mod member_cluster;
mod types;

pub use member_cluster::{
    MemberCluster, MemberClusterSpec, MemberClusterStatus, SecretReference,
    ServerAddressByClientCidr,
};
pub use types::{
    ClusterCondition, ClusterConditionType, ClusterStatus, ClusterTopology, ConditionStatus,
};

//! MemberCluster Custom Resource Definition
//!
//! A MemberCluster registers a remote Kubernetes cluster with the federation
//! control point. Its `spec` says how to reach it; its `status` records the
//! latest health snapshot and discovered topology.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ClusterCondition, ClusterStatus, ClusterTopology};

/// Specification for a MemberCluster
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "federation.lattice.dev",
    version = "v1alpha1",
    kind = "MemberCluster",
    plural = "memberclusters",
    shortname = "mc",
    status = "MemberClusterStatus",
    namespaced = false,
    printcolumn = r#"{"name":"Region","type":"string","jsonPath":".status.region"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MemberClusterSpec {
    /// Server addresses the cluster advertises, keyed by client network
    ///
    /// Evaluated in order; the first CIDR containing this host's address
    /// decides which server address is used.
    #[serde(rename = "serverAddressByClientCIDRs", default)]
    pub server_address_by_client_cidrs: Vec<ServerAddressByClientCidr>,

    /// Secret holding the kubeconfig used to talk to the cluster
    pub secret_ref: SecretReference,
}

/// One advertised (client network, server address) pair
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerAddressByClientCidr {
    /// Network of clients that should use `server_address` (e.g. "10.0.0.0/8")
    #[serde(rename = "clientCIDR")]
    pub client_cidr: String,

    /// Address (host:port or URL) of the cluster's API server for those clients
    pub server_address: String,
}

impl ServerAddressByClientCidr {
    /// Convenience constructor
    pub fn new(client_cidr: impl Into<String>, server_address: impl Into<String>) -> Self {
        Self {
            client_cidr: client_cidr.into(),
            server_address: server_address.into(),
        }
    }
}

/// Reference to a secret in the federation control plane's namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SecretReference {
    /// Name of the secret
    pub name: String,
}

impl MemberClusterSpec {
    /// Validate the member cluster specification
    ///
    /// CIDR syntax is checked lazily by endpoint selection, which fails fast on
    /// the first malformed entry it reaches.
    pub fn validate(&self, cluster: &str) -> Result<(), crate::Error> {
        self.validate_secret_ref(cluster)?;

        for (i, pair) in self.server_address_by_client_cidrs.iter().enumerate() {
            if pair.server_address.trim().is_empty() {
                return Err(crate::Error::validation_for_field(
                    cluster,
                    format!("spec.serverAddressByClientCIDRs[{}].serverAddress", i),
                    "server address cannot be empty",
                ));
            }
        }

        Ok(())
    }

    /// Check only the credentials reference
    pub fn validate_secret_ref(&self, cluster: &str) -> Result<(), crate::Error> {
        if self.secret_ref.name.is_empty() {
            return Err(crate::Error::validation_for_field(
                cluster,
                "spec.secretRef.name",
                "secret reference name cannot be empty",
            ));
        }
        Ok(())
    }
}

/// Status for a MemberCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberClusterStatus {
    /// Health conditions from the latest health check
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ClusterCondition>,

    /// Failure zones the cluster's nodes are spread across
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,

    /// Region the cluster runs in
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
}

impl MemberClusterStatus {
    /// Build a status from a health snapshot, without topology
    pub fn from_health(health: ClusterStatus) -> Self {
        Self {
            conditions: health.conditions,
            ..Default::default()
        }
    }

    /// Attach discovered topology
    pub fn with_topology(mut self, topology: ClusterTopology) -> Self {
        self.zones = topology.zones;
        self.region = topology.region;
        self
    }
}

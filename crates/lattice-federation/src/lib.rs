//! Lattice Federation - member cluster clients
//!
//! Everything a federation control plane needs to talk to one member cluster:
//!
//! - **Endpoint selection**: pick the server address advertised for the
//!   network this host lives in
//! - **Credentials**: resolve a kubeconfig for the cluster, by default from a
//!   secret in the controller's namespace
//! - **Client factory**: build rate-limited discovery and data-plane handles
//! - **Health**: turn `/healthz` into Ready/Offline conditions
//! - **Topology**: derive zones and region from node labels
//!
//! # Example
//!
//! ```text
//! let factory = ClusterClientFactory::new(
//!     Arc::new(DefaultRouteAddress),
//!     Arc::new(SecretCredentialResolver::in_cluster()),
//! );
//! if let Some(client) = factory.build(&member).await? {
//!     let status = observe_cluster(&client).await;
//! }
//! ```

pub mod client;
pub mod credentials;
pub mod endpoint;
pub mod health;
pub mod host;
pub mod observe;
pub mod topology;

#[cfg(test)]
mod testing;

pub use client::{
    build_cluster_client, ClientSettings, ClusterClient, ClusterClientFactory, DiscoveryClient,
    MemberClusterApi,
};
pub use credentials::{
    ClientCredentials, CredentialResolver, SecretCredentialResolver, StaticCredentialResolver,
};
pub use endpoint::select_server_address;
pub use health::check_health;
pub use host::{DefaultRouteAddress, FixedHostAddress, HostAddressSource};
pub use observe::observe_cluster;
pub use topology::discover_topology;

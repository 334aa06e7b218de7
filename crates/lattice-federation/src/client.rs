//! Member cluster client construction
//!
//! A [`ClusterClientFactory`] turns a `MemberCluster` into a [`ClusterClient`]:
//! pick the endpoint advertised for this host's network, resolve credentials,
//! and build two handles from the same connection profile. A discovery handle
//! for liveness/version queries and a data-plane handle for resource calls.
//! Nothing here touches the network; the handles connect lazily.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::USER_AGENT;
use http::{HeaderValue, Uri};
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use kube::client::ClientBuilder;
use kube::config::KubeConfigOptions;
use kube::{Config, ResourceExt};
use tower::limit::RateLimitLayer;
use tower_http::set_header::SetRequestHeaderLayer;
use tracing::{debug, info, instrument};

#[cfg(test)]
use mockall::automock;

use lattice_common::crd::{ClusterStatus, ClusterTopology, MemberCluster};
use lattice_common::kube_utils::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
use lattice_common::Error;

use crate::credentials::{ClientCredentials, CredentialResolver};
use crate::endpoint::select_server_address_for;
use crate::health::check_health;
use crate::host::HostAddressSource;
use crate::topology::discover_topology;

/// User agent sent on every request to a member cluster
pub const USER_AGENT_NAME: &str = "lattice-cluster-controller";
/// Sustained request rate per member cluster client
pub const KUBE_API_QPS: f64 = 20.0;
/// Requests allowed in a single burst per member cluster client
pub const KUBE_API_BURST: u64 = 30;
/// Liveness endpoint of the Kubernetes API server
pub const HEALTHZ_PATH: &str = "/healthz";

/// Knobs applied to every member cluster connection profile
#[derive(Clone, Debug, PartialEq)]
pub struct ClientSettings {
    /// Value of the User-Agent header
    pub user_agent: String,
    /// Sustained requests per second
    pub qps: f64,
    /// Maximum burst of requests
    pub burst: u64,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Response read timeout
    pub read_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT_NAME.to_string(),
            qps: KUBE_API_QPS,
            burst: KUBE_API_BURST,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl ClientSettings {
    /// Validate rate limits and the user agent
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.qps.is_finite() && self.qps > 0.0) {
            return Err(Error::validation(format!(
                "qps must be a positive number, got {}",
                self.qps
            )));
        }
        if self.burst == 0 {
            return Err(Error::validation("burst must be at least 1"));
        }
        self.user_agent_header()?;
        Ok(())
    }

    /// Window in which `burst` requests are admitted, averaging `qps`
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs_f64(self.burst as f64 / self.qps)
    }

    fn user_agent_header(&self) -> Result<HeaderValue, Error> {
        HeaderValue::from_str(&self.user_agent).map_err(|e| {
            Error::validation(format!("invalid user agent '{}': {}", self.user_agent, e))
        })
    }
}

/// Operations the health checker and topology discoverer need from a member cluster
///
/// Implemented by [`ClusterClient`]; mocked in tests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MemberClusterApi: Send + Sync {
    /// Raw body of the liveness endpoint
    async fn healthz(&self) -> Result<String, Error>;

    /// All nodes of the cluster, in listing order
    async fn list_nodes(&self) -> Result<Vec<Node>, Error>;

    /// The API server's git version
    async fn server_version(&self) -> Result<String, Error>;
}

/// Handle for capability, version and liveness queries
#[derive(Clone)]
pub struct DiscoveryClient {
    client: kube::Client,
}

impl DiscoveryClient {
    /// Wrap a kube client
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// GET the liveness endpoint and return its body
    ///
    /// Non-2xx responses are errors, like any other transport failure.
    pub async fn healthz(&self) -> Result<String, kube::Error> {
        let request = http::Request::get(HEALTHZ_PATH)
            .body(Vec::new())
            .map_err(kube::Error::HttpError)?;
        self.client.request_text(request).await
    }

    /// The API server's git version (e.g. "v1.32.0")
    pub async fn server_version(&self) -> Result<String, kube::Error> {
        Ok(self.client.apiserver_version().await?.git_version)
    }
}

/// Authenticated access to one member cluster
///
/// Both handles are bound to the endpoint and credentials the client was
/// built with. Rebuild the client when either changes.
#[derive(Clone)]
pub struct ClusterClient {
    name: String,
    endpoint: String,
    discovery: DiscoveryClient,
    kube: kube::Client,
}

impl ClusterClient {
    /// Name of the member cluster
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server address the client was built for
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Discovery handle
    pub fn discovery(&self) -> &DiscoveryClient {
        &self.discovery
    }

    /// Data-plane handle
    pub fn kube_client(&self) -> &kube::Client {
        &self.kube
    }

    /// Check the cluster's health
    pub async fn health_status(&self) -> ClusterStatus {
        check_health(self).await
    }

    /// Discover the cluster's zones and region
    pub async fn topology(&self) -> Result<ClusterTopology, Error> {
        discover_topology(self).await
    }
}

#[async_trait]
impl MemberClusterApi for ClusterClient {
    async fn healthz(&self) -> Result<String, Error> {
        Ok(self.discovery.healthz().await?)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, Error> {
        let nodes: Api<Node> = Api::all(self.kube.clone());
        Ok(nodes.list(&ListParams::default()).await?.items)
    }

    async fn server_version(&self) -> Result<String, Error> {
        Ok(self.discovery.server_version().await?)
    }
}

/// Builds [`ClusterClient`]s for member clusters
pub struct ClusterClientFactory {
    host: Arc<dyn HostAddressSource>,
    resolver: Arc<dyn CredentialResolver>,
    settings: ClientSettings,
}

impl ClusterClientFactory {
    /// Create a factory with default settings
    pub fn new(host: Arc<dyn HostAddressSource>, resolver: Arc<dyn CredentialResolver>) -> Self {
        Self {
            host,
            resolver,
            settings: ClientSettings::default(),
        }
    }

    /// Override the connection settings
    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The endpoint this host would use for `cluster`, if any
    pub fn select_endpoint(&self, cluster: &MemberCluster) -> Result<Option<String>, Error> {
        select_endpoint(cluster, self.host.as_ref())
    }

    /// Build a client for `cluster`, see [`build_cluster_client`]
    pub async fn build(&self, cluster: &MemberCluster) -> Result<Option<ClusterClient>, Error> {
        build_cluster_client(
            cluster,
            self.host.as_ref(),
            self.resolver.as_ref(),
            &self.settings,
        )
        .await
    }
}

/// The endpoint `host` would use for `cluster`, if any
pub fn select_endpoint(
    cluster: &MemberCluster,
    host: &dyn HostAddressSource,
) -> Result<Option<String>, Error> {
    let name = cluster.name_any();
    let host_ip = host.host_ip().map_err(|e| match e {
        Error::Network { message, .. } => Error::network_for(&name, message),
        other => other,
    })?;
    select_server_address_for(&name, host_ip, &cluster.spec.server_address_by_client_cidrs)
}

/// Build a client for `cluster`
///
/// Returns `Ok(None)` when none of the advertised networks contains this
/// host, or the matching entry has a blank address. That is not an error:
/// the cluster is simply not reachable from here yet. Nothing else in the
/// spec is checked until an endpoint is found; after that, credential,
/// settings or construction failures are errors.
#[instrument(skip_all, fields(cluster = %cluster.name_any()))]
pub async fn build_cluster_client(
    cluster: &MemberCluster,
    host: &dyn HostAddressSource,
    resolver: &dyn CredentialResolver,
    settings: &ClientSettings,
) -> Result<Option<ClusterClient>, Error> {
    let name = cluster.name_any();
    let endpoint = match select_endpoint(cluster, host)? {
        Some(endpoint) if !endpoint.trim().is_empty() => endpoint,
        Some(_) => {
            debug!("matching CIDR advertises a blank server address, cluster client unavailable");
            return Ok(None);
        }
        None => {
            debug!("no advertised CIDR contains this host, cluster client unavailable");
            return Ok(None);
        }
    };

    settings.validate()?;
    cluster.spec.validate_secret_ref(&name)?;

    let credentials = resolver.resolve(cluster).await?;
    let config = connection_profile(&name, &endpoint, credentials, settings).await?;

    let discovery = build_handle(config.clone(), settings).map_err(|e| {
        Error::credentials_for(&name, format!("failed to create discovery client: {e}"))
    })?;
    let kube = build_handle(config, settings).map_err(|e| {
        Error::credentials_for(&name, format!("failed to create cluster client: {e}"))
    })?;

    info!(endpoint = %endpoint, "built member cluster client");
    Ok(Some(ClusterClient {
        name,
        endpoint,
        discovery: DiscoveryClient::new(discovery),
        kube,
    }))
}

/// Parse a server address into a cluster URL, assuming https without a scheme
pub fn endpoint_uri(endpoint: &str) -> Result<Uri, Error> {
    let endpoint = endpoint.trim();
    let url = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    };
    url.parse::<Uri>()
        .map_err(|e| Error::validation(format!("invalid server address '{}': {}", endpoint, e)))
}

/// Base connection config: kubeconfig credentials pointed at `endpoint`
async fn connection_profile(
    cluster: &str,
    endpoint: &str,
    credentials: ClientCredentials,
    settings: &ClientSettings,
) -> Result<Config, Error> {
    let mut config =
        Config::from_custom_kubeconfig(credentials.into_kubeconfig(), &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                Error::credentials_for(cluster, format!("failed to build client config: {e}"))
            })?;
    config.cluster_url = endpoint_uri(endpoint).map_err(|e| match e {
        Error::Validation { message, .. } => Error::validation_for(cluster, message),
        other => other,
    })?;
    config.connect_timeout = Some(settings.connect_timeout);
    config.read_timeout = Some(settings.read_timeout);
    Ok(config)
}

/// Build one rate-limited, user-agent-tagged client from a connection profile
fn build_handle(config: Config, settings: &ClientSettings) -> Result<kube::Client, Error> {
    let user_agent = settings.user_agent_header()?;
    let builder = ClientBuilder::try_from(config)?;
    Ok(builder
        .with_layer(&SetRequestHeaderLayer::overriding(USER_AGENT, user_agent))
        .with_layer(&RateLimitLayer::new(settings.burst, settings.rate_window()))
        .build())
}

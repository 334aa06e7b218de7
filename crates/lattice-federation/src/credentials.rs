//! Member cluster credential resolution
//!
//! The client factory asks a [`CredentialResolver`] for the credentials of a
//! member cluster. The default resolver reads a kubeconfig embedded in a
//! secret in the controller's own namespace; tests and embedders can hand in
//! a [`StaticCredentialResolver`] instead.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::config::Kubeconfig;
use kube::{Api, ResourceExt};
use tracing::{debug, instrument};

#[cfg(test)]
use mockall::automock;

use lattice_common::crd::MemberCluster;
use lattice_common::kube_utils::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
use lattice_common::{Error, POD_NAMESPACE_ENV};

/// Secret data key holding the member cluster's kubeconfig
pub const KUBECONFIG_SECRET_DATA_KEY: &str = "kubeconfig";

/// Structured client credentials for one member cluster
#[derive(Clone, Debug)]
pub struct ClientCredentials {
    kubeconfig: Kubeconfig,
}

impl ClientCredentials {
    /// Wrap an already parsed kubeconfig
    pub fn new(kubeconfig: Kubeconfig) -> Self {
        Self { kubeconfig }
    }

    /// Parse a kubeconfig document
    pub fn from_yaml(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data).map_err(|e| {
            Error::serialization_for_kind("Kubeconfig", format!("invalid kubeconfig UTF-8: {e}"))
        })?;
        let kubeconfig = Kubeconfig::from_yaml(text).map_err(|e| {
            Error::serialization_for_kind("Kubeconfig", format!("invalid kubeconfig: {e}"))
        })?;
        Ok(Self { kubeconfig })
    }

    /// The parsed kubeconfig
    pub fn kubeconfig(&self) -> &Kubeconfig {
        &self.kubeconfig
    }

    pub(crate) fn into_kubeconfig(self) -> Kubeconfig {
        self.kubeconfig
    }
}

/// Resolves the credentials used to talk to a member cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Return credentials for `cluster`
    async fn resolve(&self, cluster: &MemberCluster) -> Result<ClientCredentials, Error>;
}

/// Resolver returning the same credentials for every cluster
#[derive(Clone, Debug)]
pub struct StaticCredentialResolver {
    credentials: ClientCredentials,
}

impl StaticCredentialResolver {
    /// Create a resolver that always returns `credentials`
    pub fn new(credentials: ClientCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, _cluster: &MemberCluster) -> Result<ClientCredentials, Error> {
        Ok(self.credentials.clone())
    }
}

/// Source of the namespace this controller runs in
#[cfg_attr(test, automock)]
pub trait NamespaceSource: Send + Sync {
    /// The namespace, if configured
    fn namespace(&self) -> Option<String>;
}

/// Reads the namespace from `POD_NAMESPACE` (set via the downward API)
#[derive(Clone, Copy, Debug, Default)]
pub struct PodNamespaceEnv;

impl NamespaceSource for PodNamespaceEnv {
    fn namespace(&self) -> Option<String> {
        std::env::var(POD_NAMESPACE_ENV).ok()
    }
}

/// A namespace given explicitly (e.g. on the command line)
#[derive(Clone, Debug)]
pub struct FixedNamespace(pub String);

impl NamespaceSource for FixedNamespace {
    fn namespace(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Trait for creating the administrative client of the local control plane
///
/// This abstracts kube::Client creation, enabling proper unit testing
/// without requiring a real Kubernetes cluster.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClientProvider: Send + Sync {
    /// Create a new Kubernetes client
    async fn create(&self) -> Result<kube::Client, kube::Error>;
}

/// Default implementation that creates clients from the inferred config
///
/// Inside a pod this is the service account; elsewhere the local kubeconfig.
#[derive(Clone, Copy, Debug, Default)]
pub struct InClusterClientProvider;

#[async_trait]
impl KubeClientProvider for InClusterClientProvider {
    async fn create(&self) -> Result<kube::Client, kube::Error> {
        let mut config = kube::Config::infer()
            .await
            .map_err(kube::Error::InferConfig)?;
        config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
        config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
        kube::Client::try_from(config)
    }
}

/// Hands out clones of an existing client
#[derive(Clone)]
pub struct ExistingClientProvider(pub kube::Client);

#[async_trait]
impl KubeClientProvider for ExistingClientProvider {
    async fn create(&self) -> Result<kube::Client, kube::Error> {
        Ok(self.0.clone())
    }
}

/// Default resolver: kubeconfig stored in a secret next to the controller
///
/// Looks up `<spec.secretRef.name>` in the namespace reported by the
/// [`NamespaceSource`] and parses its `kubeconfig` data key. Every failure is
/// reported as a distinct, non-retryable error.
pub struct SecretCredentialResolver {
    clients: Arc<dyn KubeClientProvider>,
    namespace: Arc<dyn NamespaceSource>,
}

impl SecretCredentialResolver {
    /// Create a resolver with explicit collaborators
    pub fn new(clients: Arc<dyn KubeClientProvider>, namespace: Arc<dyn NamespaceSource>) -> Self {
        Self { clients, namespace }
    }

    /// Resolver using the inferred client config and `POD_NAMESPACE`
    pub fn in_cluster() -> Self {
        Self::new(Arc::new(InClusterClientProvider), Arc::new(PodNamespaceEnv))
    }

    fn local_namespace(&self) -> Result<String, Error> {
        match self.namespace.namespace() {
            Some(ns) if !ns.is_empty() => Ok(ns),
            _ => Err(Error::config_for_key(
                POD_NAMESPACE_ENV,
                format!("unexpected: {} env var returned empty string", POD_NAMESPACE_ENV),
            )),
        }
    }
}

#[async_trait]
impl CredentialResolver for SecretCredentialResolver {
    #[instrument(skip(self, cluster), fields(cluster = %cluster.name_any()))]
    async fn resolve(&self, cluster: &MemberCluster) -> Result<ClientCredentials, Error> {
        let name = cluster.name_any();
        let namespace = self.local_namespace()?;

        let client = self.clients.create().await.map_err(|e| {
            Error::credentials_for(&name, format!("error in creating in-cluster client: {e}"))
        })?;

        let secret_name = &cluster.spec.secret_ref.name;
        let secrets: Api<Secret> = Api::namespaced(client, &namespace);
        let secret = secrets
            .get_opt(secret_name)
            .await
            .map_err(|e| {
                Error::credentials_for(
                    &name,
                    format!("error in fetching secret {}/{}: {}", namespace, secret_name, e),
                )
            })?
            .ok_or_else(|| {
                Error::credentials_for(
                    &name,
                    format!("secret {}/{} not found", namespace, secret_name),
                )
            })?;

        let data = secret
            .data
            .as_ref()
            .and_then(|d| d.get(KUBECONFIG_SECRET_DATA_KEY))
            .ok_or_else(|| {
                Error::missing_secret_key(
                    &name,
                    format!("{}/{}", namespace, secret_name),
                    KUBECONFIG_SECRET_DATA_KEY,
                )
            })?;

        debug!(secret = %secret_name, namespace = %namespace, "loaded member cluster kubeconfig");
        ClientCredentials::from_yaml(&data.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        member_cluster, mock_client, secret_response, status_response, KUBECONFIG_YAML,
    };
    use http::StatusCode;

    fn namespace(ns: Option<&'static str>) -> Arc<dyn NamespaceSource> {
        let mut mock = MockNamespaceSource::new();
        mock.expect_namespace()
            .returning(move || ns.map(str::to_string));
        Arc::new(mock)
    }

    fn provider_for(client: kube::Client) -> Arc<dyn KubeClientProvider> {
        let mut mock = MockKubeClientProvider::new();
        mock.expect_create().returning(move || Ok(client.clone()));
        Arc::new(mock)
    }

    #[test]
    fn test_parse_kubeconfig() {
        let creds = ClientCredentials::from_yaml(KUBECONFIG_YAML.as_bytes()).unwrap();
        assert_eq!(creds.kubeconfig().current_context.as_deref(), Some("member"));
        assert_eq!(creds.kubeconfig().clusters.len(), 1);
    }

    #[test]
    fn test_malformed_kubeconfig_is_serialization_error() {
        let err = ClientCredentials::from_yaml(b"clusters: [unterminated").unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[test]
    fn test_non_utf8_kubeconfig() {
        let err = ClientCredentials::from_yaml(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[tokio::test]
    async fn test_static_resolver_ignores_cluster() {
        let creds = ClientCredentials::from_yaml(KUBECONFIG_YAML.as_bytes()).unwrap();
        let resolver = StaticCredentialResolver::new(creds);
        let resolved = resolver
            .resolve(&member_cluster("any", vec![]))
            .await
            .unwrap();
        assert_eq!(resolved.kubeconfig().current_context.as_deref(), Some("member"));
    }

    /// Story: the controller was deployed without the downward API namespace
    #[tokio::test]
    async fn story_missing_namespace_is_config_error() {
        // No client provider expectations: the resolver must bail before creating one.
        let resolver = SecretCredentialResolver::new(
            Arc::new(MockKubeClientProvider::new()),
            namespace(None),
        );
        let err = resolver
            .resolve(&member_cluster("us-east", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("POD_NAMESPACE"));

        let resolver = SecretCredentialResolver::new(
            Arc::new(MockKubeClientProvider::new()),
            namespace(Some("")),
        );
        let err = resolver
            .resolve(&member_cluster("us-east", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_client_creation_failure_is_credentials_error() {
        let mut provider = MockKubeClientProvider::new();
        provider
            .expect_create()
            .returning(|| Err(kube::Error::Service("no service account token".into())));
        let resolver = SecretCredentialResolver::new(Arc::new(provider), namespace(Some("fed")));
        let err = resolver
            .resolve(&member_cluster("us-east", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Credentials { .. }));
        assert!(err.to_string().contains("in-cluster client"));
    }

    /// Story: a well-formed secret yields the embedded kubeconfig
    #[tokio::test]
    async fn story_secret_with_kubeconfig_resolves() {
        let client = mock_client(|req| {
            assert_eq!(req.uri().path(), "/api/v1/namespaces/fed/secrets/us-east-creds");
            secret_response(
                "us-east-creds",
                "fed",
                Some((KUBECONFIG_SECRET_DATA_KEY, KUBECONFIG_YAML)),
            )
        });
        let resolver = SecretCredentialResolver::new(provider_for(client), namespace(Some("fed")));
        let creds = resolver
            .resolve(&member_cluster("us-east", vec![]))
            .await
            .unwrap();
        assert_eq!(creds.kubeconfig().current_context.as_deref(), Some("member"));
    }

    /// Story: the secret exists but was created with the wrong key
    #[tokio::test]
    async fn story_secret_without_key_is_distinct_error() {
        let client = mock_client(|_| {
            secret_response("us-east-creds", "fed", Some(("config", KUBECONFIG_YAML)))
        });
        let resolver = SecretCredentialResolver::new(provider_for(client), namespace(Some("fed")));
        let err = resolver
            .resolve(&member_cluster("us-east", vec![]))
            .await
            .unwrap_err();
        match err {
            Error::MissingSecretKey {
                cluster,
                secret,
                key,
            } => {
                assert_eq!(cluster, "us-east");
                assert_eq!(secret, "fed/us-east-creds");
                assert_eq!(key, "kubeconfig");
            }
            other => panic!("Expected MissingSecretKey, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_secret_not_found() {
        let client = mock_client(|_| status_response(StatusCode::NOT_FOUND, "NotFound"));
        let resolver = SecretCredentialResolver::new(provider_for(client), namespace(Some("fed")));
        let err = resolver
            .resolve(&member_cluster("us-east", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Credentials { .. }));
        assert!(err.to_string().contains("fed/us-east-creds not found"));
    }

    #[tokio::test]
    async fn test_secret_forbidden_is_credentials_error() {
        let client = mock_client(|_| status_response(StatusCode::FORBIDDEN, "Forbidden"));
        let resolver = SecretCredentialResolver::new(provider_for(client), namespace(Some("fed")));
        let err = resolver
            .resolve(&member_cluster("us-east", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Credentials { .. }));
        assert!(err.to_string().contains("error in fetching secret fed/us-east-creds"));
        assert_eq!(err.cluster(), Some("us-east"));
        assert!(!err.is_retryable());
    }

    /// Story: the host API server is briefly unavailable while fetching the secret
    ///
    /// The failure still belongs to the member cluster and is not retried at
    /// this layer; the next observation cycle resolves again.
    #[tokio::test]
    async fn story_secret_fetch_server_error_is_attributed_and_permanent() {
        let client = mock_client(|_| {
            status_response(StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable")
        });
        let resolver = SecretCredentialResolver::new(provider_for(client), namespace(Some("fed")));
        let err = resolver
            .resolve(&member_cluster("us-east", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Credentials { .. }));
        assert_eq!(err.cluster(), Some("us-east"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_document_in_secret() {
        let client = mock_client(|_| {
            secret_response(
                "us-east-creds",
                "fed",
                Some((KUBECONFIG_SECRET_DATA_KEY, "clusters: [unterminated")),
            )
        });
        let resolver = SecretCredentialResolver::new(provider_for(client), namespace(Some("fed")));
        let err = resolver
            .resolve(&member_cluster("us-east", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }
}

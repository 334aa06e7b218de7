//! Error types for Lattice federation
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries the context needed to tell a configuration bug
//! (missing namespace, missing secret key, malformed CIDR) apart from a
//! transient network problem.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Lattice federation operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for a member cluster spec
    #[error("validation error for {cluster}: {message}")]
    Validation {
        /// Name of the member cluster with invalid configuration
        cluster: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.serverAddressByClientCIDRs")
        field: Option<String>,
    },

    /// Runtime environment misconfiguration
    #[error("configuration error: {message}")]
    Config {
        /// Description of what is missing or wrong
        message: String,
        /// Environment variable or setting involved, if any
        key: Option<String>,
    },

    /// Credentials could not be obtained or turned into a client
    #[error("credentials error for {cluster}: {message}")]
    Credentials {
        /// Name of the member cluster
        cluster: String,
        /// Description of what failed
        message: String,
    },

    /// The credentials secret exists but lacks the expected data key
    #[error("secret {secret} for {cluster} does not have data with key: {key}")]
    MissingSecretKey {
        /// Name of the member cluster
        cluster: String,
        /// Namespaced name of the secret
        secret: String,
        /// The data key that was expected
        key: String,
    },

    /// Local network stack could not answer a question (e.g. host address)
    #[error("network error for {cluster}: {message}")]
    Network {
        /// Name of the member cluster
        cluster: String,
        /// Description of what failed
        message: String,
    },

    /// A node is missing a topology label
    #[error("topology label {label} not found on node {node}")]
    Topology {
        /// Name of the offending node
        node: String,
        /// Label key that was looked up
        label: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The document kind being parsed (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "cli", "telemetry")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    ///
    /// For simple validation errors without cluster context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with cluster context
    pub fn validation_for(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with cluster context and field path
    pub fn validation_for_field(
        cluster: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a configuration error naming the missing setting
    pub fn config_for_key(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            key: Some(key.into()),
        }
    }

    /// Create a credentials error with cluster context
    pub fn credentials_for(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Credentials {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create a missing secret key error
    pub fn missing_secret_key(
        cluster: impl Into<String>,
        secret: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self::MissingSecretKey {
            cluster: cluster.into(),
            secret: secret.into(),
            key: key.into(),
        }
    }

    /// Create a network error with the given message
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network {
            cluster: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a network error with cluster context
    pub fn network_for(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Network {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create a topology error for a node missing a label
    pub fn topology(node: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Topology {
            node: node.into(),
            label: label.into(),
        }
    }

    /// Create a serialization error with document kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Nothing in the federation client retries on its own; this tells the
    /// outer reconcile loop whether trying again next cycle can help.
    /// Configuration, credential and data errors need a human to fix them.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Don't retry on 4xx errors (forbidden, not found, etc.)
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::Validation { .. } => false,
            Error::Config { .. } => false,
            Error::Credentials { .. } => false,
            Error::MissingSecretKey { .. } => false,
            Error::Network { .. } => true,
            Error::Topology { .. } => false,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the cluster name if this error is associated with a specific cluster
    pub fn cluster(&self) -> Option<&str> {
        match self {
            Error::Validation { cluster, .. } => Some(cluster),
            Error::Credentials { cluster, .. } => Some(cluster),
            Error::MissingSecretKey { cluster, .. } => Some(cluster),
            Error::Network { cluster, .. } => Some(cluster),
            Error::Kube { .. }
            | Error::Config { .. }
            | Error::Topology { .. }
            | Error::Serialization { .. }
            | Error::Internal { .. } => None,
        }
    }
}

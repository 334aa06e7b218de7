//! Common types for Lattice federation: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Environment variable holding the namespace the controller runs in
pub const POD_NAMESPACE_ENV: &str = "POD_NAMESPACE";

//! Shared types for member cluster status reporting

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status following Kubernetes conventions
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kinds of health facts reported for a member cluster
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ClusterConditionType {
    /// The cluster answered its liveness endpoint with "ok"
    Ready,
    /// The cluster could not be reached at all
    Offline,
}

impl std::fmt::Display for ClusterConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Offline => write!(f, "Offline"),
        }
    }
}

/// Kubernetes-style condition describing one health fact of a member cluster
///
/// Conditions are produced as a fresh snapshot on every health check, so
/// `last_heartbeat_time` and `last_transition_time` start out identical.
/// Tracking real transitions against a previous snapshot is up to whoever
/// persists the status.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: ClusterConditionType,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// When the health check producing this condition ran
    pub last_heartbeat_time: DateTime<Utc>,

    /// Last time the condition transitioned
    pub last_transition_time: DateTime<Utc>,
}

impl ClusterCondition {
    /// Create a condition observed at `checked_at`
    pub fn observed(
        type_: ClusterConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            type_,
            status,
            reason: reason.into(),
            message: message.into(),
            last_heartbeat_time: checked_at,
            last_transition_time: checked_at,
        }
    }
}

/// Health snapshot of a member cluster: an ordered list of conditions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Conditions in the order they were produced
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
}

impl ClusterStatus {
    /// Builder helper to append a condition
    pub fn condition(mut self, condition: ClusterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Find the first condition of the given type
    pub fn get(&self, type_: ClusterConditionType) -> Option<&ClusterCondition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// True when a Ready=True condition is present
    pub fn is_ready(&self) -> bool {
        self.has(ClusterConditionType::Ready, ConditionStatus::True)
    }

    /// True when an Offline=True condition is present
    pub fn is_offline(&self) -> bool {
        self.has(ClusterConditionType::Offline, ConditionStatus::True)
    }

    fn has(&self, type_: ClusterConditionType, status: ConditionStatus) -> bool {
        self.get(type_).is_some_and(|c| c.status == status)
    }
}

/// Failure zones and region a member cluster's nodes live in
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTopology {
    /// Unique zone names, sorted
    #[serde(default)]
    pub zones: Vec<String>,

    /// Region name, empty when the cluster has no nodes
    #[serde(default)]
    pub region: String,
}

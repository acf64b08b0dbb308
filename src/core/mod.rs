//! Core vocabulary shared across the crate.
//!
//! This module defines the small closed sets every other module speaks in:
//! cloud [`Provider`]s, service [`ServiceType`]s, operation [`Scope`]s, and
//! the [`ServiceConfig`] attribute bag that concrete service configurations
//! travel in. It also hosts the crate-wide error type in [`error`].

pub mod config;
pub mod error;

pub use config::ServiceConfig;
pub use error::{StackplanError, Violation};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provider used when neither a service config nor the project names one.
pub const DEFAULT_PROVIDER: Provider = Provider::Aws;

/// Region used when a definition needs a default and the project has none.
pub const DEFAULT_REGION: &str = "eu-central-1";

/// Regions the standard AWS definitions accept.
pub const AWS_REGIONS: &[&str] = &["eu-central-1", "eu-west-1", "us-east-1", "us-west-2"];

/// Fixed name for the implied state service derived from the project's
/// `state` block.
pub const STATE_SERVICE_NAME: &str = "project-state";

/// Profile values recognized on any service configuration.
pub const SERVICE_PROFILES: &[&str] = &["default", "staging", "production"];

/// Cloud provider a service definition is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Amazon Web Services.
    Aws,
    /// Local workstation resources (file-backed state and the like).
    Local,
}

impl Provider {
    /// Lowercase identifier as it appears in project documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = StackplanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(Self::Aws),
            "local" => Ok(Self::Local),
            other => Err(StackplanError::UnknownProvider {
                name: other.to_string(),
            }),
        }
    }
}

/// Kind of service a configuration describes.
///
/// Together with [`Provider`] this keys the service definition registry:
/// every `(provider, type)` pair maps to exactly one
/// [`crate::registry::ServiceDefinition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Mysql,
    Postgresql,
    Monitoring,
    State,
    Dns,
    Ssl,
    Cluster,
}

impl ServiceType {
    /// Lowercase identifier as it appears in the `type` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgresql",
            Self::Monitoring => "monitoring",
            Self::State => "state",
            Self::Dns => "dns",
            Self::Ssl => "ssl",
            Self::Cluster => "cluster",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = StackplanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(Self::Mysql),
            "postgresql" => Ok(Self::Postgresql),
            "monitoring" => Ok(Self::Monitoring),
            "state" => Ok(Self::State),
            "dns" => Ok(Self::Dns),
            "ssl" => Ok(Self::Ssl),
            "cluster" => Ok(Self::Cluster),
            other => Err(StackplanError::UnknownService {
                name: other.to_string(),
            }),
        }
    }
}

/// Operation scope selecting which handlers and associations are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Create or update resources.
    Deployable,
    /// The minimal set of resources needed to safely tear a stack down.
    Destroyable,
    /// Bootstrap-only resources, e.g. the state backend.
    Preparable,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployable => "deployable",
            Self::Destroyable => "destroyable",
            Self::Preparable => "preparable",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Error handling for stackplan.
//!
//! The crate exposes one strongly-typed error enum, [`StackplanError`], with
//! a variant per failure mode the engine can hit. Composite code paths carry
//! errors through `anyhow::Result` and attach context at the boundaries;
//! tests and callers that need to branch on a failure downcast to the typed
//! variant.
//!
//! All engine errors are fail-fast: any of them aborts the whole operation.
//! There is no partial-success mode and no retry inside this crate.

use std::fmt;
use thiserror::Error;

use super::{Provider, Scope, ServiceType};

/// One schema or cross-field problem found in a service configuration.
///
/// Validation collects every violation in a configuration before raising,
/// so a single [`StackplanError::SchemaViolation`] can carry several of
/// these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Attribute path the problem was found at, e.g. `storage` or
    /// `links[2]`.
    pub path: String,
    /// Human-readable description of what is wrong with the value.
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn bullet_list(items: &[Violation]) -> String {
    items.iter().map(|v| format!("  - {v}")).collect::<Vec<_>>().join("\n")
}

/// The main error type for stackplan operations.
#[derive(Error, Debug)]
pub enum StackplanError {
    /// A service configuration failed structural or cross-field validation.
    ///
    /// Carries one [`Violation`] per offending attribute, aggregated over
    /// the whole configuration rather than stopping at the first problem.
    #[error("Configuration for {service} is invalid:\n{}", bullet_list(.violations))]
    SchemaViolation {
        /// Label of the offending service, e.g. `mysql 'db1'`.
        service: String,
        /// Every problem found in the configuration.
        violations: Vec<Violation>,
    },

    /// A requirement association produced no output for a node.
    ///
    /// Raised after requirement edges are resolved and before the node's
    /// own handler runs, so the node is never provisioned on top of a
    /// missing dependency.
    #[error("Requirement '{association}' of {service} matched no service in this operation")]
    MissingRequirement {
        /// Label of the service whose requirement went unmet.
        service: String,
        /// Name of the requirement association that produced no output.
        association: String,
    },

    /// No service definition is registered for a (provider, type) pair.
    #[error("No service definition registered for provider '{provider}' and type '{kind}'")]
    UnknownServiceType {
        /// Provider the lookup was performed for.
        provider: Provider,
        /// Service type the lookup was performed for.
        kind: ServiceType,
    },

    /// A definition attempted to register two handlers for one scope.
    ///
    /// This is a construction-time programming error; definitions fail fast
    /// instead of silently overwriting the earlier handler.
    #[error("Service type '{kind}' already has a handler for the '{scope}' scope")]
    DuplicateHandler {
        /// Scope the second registration was attempted for.
        scope: Scope,
        /// Service type whose definition was being built.
        kind: ServiceType,
    },

    /// Required environment variables are absent from the execution
    /// environment.
    ///
    /// Reported as the full list of missing names in one error, checked
    /// once before any node registration starts.
    #[error("Required environment variables are not set: {}", .variables.join(", "))]
    MissingEnvironment {
        /// Names of every missing required variable.
        variables: Vec<String>,
    },

    /// A requirement cycle was detected during registration.
    ///
    /// Raised the moment an in-progress node is re-entered through a
    /// requirement edge.
    #[error("Circular requirement detected while registering '{resource}'")]
    CycleDetected {
        /// Resource id of the node that was re-entered.
        resource: String,
    },

    /// The project document does not define the requested environment.
    #[error("Environment '{name}' is not defined in the project")]
    EnvironmentNotFound {
        /// Name of the environment that was requested.
        name: String,
    },

    /// The project document failed cross-field validation.
    #[error("Project validation failed:\n{}", bullet_list(.violations))]
    ProjectValidation {
        /// Every problem found in the project document.
        violations: Vec<Violation>,
    },

    /// A provider name was not recognized.
    #[error("Unknown provider '{name}'")]
    UnknownProvider {
        /// The unrecognized provider name.
        name: String,
    },

    /// A service type name was not recognized.
    #[error("Unknown service type '{name}'")]
    UnknownService {
        /// The unrecognized service type name.
        name: String,
    },
}

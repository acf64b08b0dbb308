//! Project configuration documents.
//!
//! A project document carries a `state` block, provider/region defaults,
//! and named environments of named service declarations. This module
//! loads the document from YAML, runs the cross-field rules the
//! structural validator cannot express, and expands one environment into
//! the concrete service configurations an operation is built from:
//! explicit services plus the implied ones derived by
//! [`crate::generate`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use crate::core::{
    Provider, SERVICE_PROFILES, ServiceConfig, ServiceType, StackplanError, Violation,
};
use crate::generate;
use crate::registry::ServiceRegistry;

/// Named service declarations of one environment, keyed by service name.
pub type Environment = BTreeMap<String, Map<String, Value>>;

/// A full project document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    /// Project name; cluster naming falls back to the working directory's
    /// base name when unset.
    #[serde(default)]
    pub name: Option<String>,
    /// Default provider for services that do not name one.
    #[serde(default)]
    pub provider: Option<Provider>,
    /// Default region for services that do not name one.
    #[serde(default)]
    pub region: Option<String>,
    /// State backend attributes, inherited verbatim by the implied state
    /// service.
    #[serde(default)]
    pub state: Map<String, Value>,
    /// Environments, each a set of named service declarations.
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,
}

impl Project {
    /// Parse a project document from YAML text.
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).context("Failed to parse project document")
    }

    /// Load and parse a project document from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read project file: {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid project file: {}", path.display()))
    }

    /// Cross-field validation of the whole document.
    ///
    /// Checks what the structural validator cannot: every service must
    /// name a type registered for its resolved provider, `links` entries
    /// must reference sibling services of the same environment, and
    /// `profile` values must be recognized. Problems are aggregated over
    /// the whole document before reporting.
    pub fn validate(&self, registry: &ServiceRegistry) -> Result<(), StackplanError> {
        let mut violations = Vec::new();

        for (environment, services) in &self.environments {
            for (service, attributes) in services {
                let path = format!("environments.{environment}.{service}");
                self.validate_service(registry, &path, services, attributes, &mut violations);
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(StackplanError::ProjectValidation { violations })
        }
    }

    fn validate_service(
        &self,
        registry: &ServiceRegistry,
        path: &str,
        siblings: &Environment,
        attributes: &Map<String, Value>,
        violations: &mut Vec<Violation>,
    ) {
        let kind = match attributes.get("type").and_then(Value::as_str) {
            Some(value) => match ServiceType::from_str(value) {
                Ok(kind) => Some(kind),
                Err(_) => {
                    violations.push(Violation::new(
                        format!("{path}.type"),
                        format!("unknown service type '{value}'"),
                    ));
                    None
                }
            },
            None => {
                violations
                    .push(Violation::new(format!("{path}.type"), "required attribute is missing"));
                None
            }
        };

        let provider = match attributes.get("provider").and_then(Value::as_str) {
            Some(value) => match Provider::from_str(value) {
                Ok(provider) => Some(provider),
                Err(_) => {
                    violations.push(Violation::new(
                        format!("{path}.provider"),
                        format!("unknown provider '{value}'"),
                    ));
                    None
                }
            },
            None => Some(self.provider.unwrap_or(crate::core::DEFAULT_PROVIDER)),
        };

        if let (Some(kind), Some(provider)) = (kind, provider)
            && !registry.contains(provider, kind)
        {
            violations.push(Violation::new(
                path,
                format!("no service definition registered for provider '{provider}' and type '{kind}'"),
            ));
        }

        if let Some(profile) = attributes.get("profile").and_then(Value::as_str)
            && !SERVICE_PROFILES.contains(&profile)
        {
            violations.push(Violation::new(
                format!("{path}.profile"),
                format!("unrecognized profile '{profile}'"),
            ));
        }

        if let Some(links) = attributes.get("links").and_then(Value::as_array) {
            for (index, link) in links.iter().enumerate() {
                match link.as_str() {
                    Some(name) if siblings.contains_key(name) => {}
                    Some(name) => violations.push(Violation::new(
                        format!("{path}.links[{index}]"),
                        format!("references unknown service '{name}'"),
                    )),
                    None => violations.push(Violation::new(
                        format!("{path}.links[{index}]"),
                        "must be a service name",
                    )),
                }
            }
        }
    }

    /// Expand one environment into concrete service configurations.
    ///
    /// Explicit declarations come first, in name order, with the service
    /// name and project provider/region defaults filled in. Implied
    /// services follow: the state service (when the project has a state
    /// block), DNS and SSL for every non-dns/ssl service carrying a
    /// non-empty `domain`, and one monitoring service per service with
    /// `monitoring: true`, unless the environment already declares a
    /// monitoring service of its own.
    pub fn environment_configs(&self, environment: &str) -> Result<Vec<ServiceConfig>, StackplanError> {
        let services =
            self.environments.get(environment).ok_or_else(|| StackplanError::EnvironmentNotFound {
                name: environment.to_string(),
            })?;

        let mut configs: Vec<ServiceConfig> = Vec::new();
        for (name, attributes) in services {
            let mut config = ServiceConfig::from_map(attributes.clone());
            if config.name().is_none() {
                config.set("name", json!(name));
            }
            if config.get("provider").is_none()
                && let Some(provider) = self.provider
            {
                config.set("provider", json!(provider.as_str()));
            }
            if config.get("region").is_none()
                && let Some(region) = &self.region
            {
                config.set("region", json!(region));
            }
            configs.push(config);
        }

        let explicit = configs.clone();
        let has_explicit_monitoring = explicit
            .iter()
            .any(|config| config.kind().ok() == Some(ServiceType::Monitoring));

        if !self.state.is_empty()
            && let Some(state) = generate::derive_config(ServiceType::State, self, environment, None)
        {
            configs.push(state);
        }

        for owner in &explicit {
            // dns/ssl services never imply further dns/ssl for themselves.
            let owner_kind = owner.kind().ok();
            if matches!(owner_kind, Some(ServiceType::Dns | ServiceType::Ssl)) {
                continue;
            }
            for kind in [ServiceType::Dns, ServiceType::Ssl] {
                if let Some(config) = generate::derive_config(kind, self, environment, Some(owner)) {
                    configs.push(config);
                }
            }
            if owner.get_bool("monitoring").unwrap_or(false)
                && !has_explicit_monitoring
                && let Some(config) =
                    generate::derive_config(ServiceType::Monitoring, self, environment, Some(owner))
            {
                configs.push(config);
            }
        }

        Ok(configs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = r#"
name: demo
provider: aws
region: eu-central-1
state:
  type: state
  bucket: demo-state
environments:
  production:
    db1:
      type: mysql
      monitoring: true
      links: [cache]
    cache:
      type: postgresql
  staging:
    db1:
      type: mysql
"#;

    #[test]
    fn parses_a_yaml_document() {
        let project = Project::from_yaml_str(PROJECT).unwrap();
        assert_eq!(project.name.as_deref(), Some("demo"));
        assert_eq!(project.provider, Some(Provider::Aws));
        assert_eq!(project.environments.len(), 2);
        assert!(project.environments["production"].contains_key("db1"));
    }

    #[test]
    fn cross_field_validation_passes_for_a_sound_document() {
        let project = Project::from_yaml_str(PROJECT).unwrap();
        let registry = ServiceRegistry::standard().unwrap();
        project.validate(&registry).unwrap();
    }

    #[test]
    fn links_must_reference_siblings_in_the_same_environment() {
        let mut project = Project::from_yaml_str(PROJECT).unwrap();
        let staging = project.environments.get_mut("staging").unwrap();
        staging.get_mut("db1").unwrap().insert("links".to_string(), json!(["cache"]));

        let registry = ServiceRegistry::standard().unwrap();
        let err = project.validate(&registry).unwrap_err();
        let StackplanError::ProjectValidation { violations } = err else {
            panic!("expected ProjectValidation");
        };
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "environments.staging.db1.links[0]");
    }

    #[test]
    fn validation_aggregates_every_problem() {
        let yaml = r#"
provider: aws
environments:
  dev:
    a:
      type: flux-capacitor
    b:
      type: mysql
      provider: local
      profile: experimental
"#;
        let project = Project::from_yaml_str(yaml).unwrap();
        let registry = ServiceRegistry::standard().unwrap();
        let err = project.validate(&registry).unwrap_err();
        let StackplanError::ProjectValidation { violations } = err else {
            panic!("expected ProjectValidation");
        };
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert!(paths.contains(&"environments.dev.a.type"));
        assert!(paths.contains(&"environments.dev.b"), "local mysql is unregistered: {paths:?}");
        assert!(paths.contains(&"environments.dev.b.profile"));
    }

    #[test]
    fn expansion_fills_names_and_project_defaults() {
        let project = Project::from_yaml_str(PROJECT).unwrap();
        let configs = project.environment_configs("staging").unwrap();
        let db = configs.iter().find(|c| c.name() == Some("db1")).unwrap();
        assert_eq!(db.provider(), Some(Provider::Aws));
        assert_eq!(db.region(), Some("eu-central-1"));
    }

    #[test]
    fn expansion_adds_implied_state_and_monitoring() {
        let project = Project::from_yaml_str(PROJECT).unwrap();
        let configs = project.environment_configs("production").unwrap();

        let kinds: Vec<ServiceType> = configs.iter().map(|c| c.kind().unwrap()).collect();
        assert!(kinds.contains(&ServiceType::State));
        assert!(kinds.contains(&ServiceType::Monitoring));

        let state = configs.iter().find(|c| c.kind().unwrap() == ServiceType::State).unwrap();
        assert_eq!(state.name(), Some(crate::core::STATE_SERVICE_NAME));
        assert_eq!(state.get_str("bucket"), Some("demo-state"));

        let monitoring =
            configs.iter().find(|c| c.kind().unwrap() == ServiceType::Monitoring).unwrap();
        assert_eq!(monitoring.region(), Some("eu-central-1"));
    }

    #[test]
    fn expansion_adds_dns_and_ssl_for_domain_bearing_services() {
        let yaml = r#"
name: demo
provider: aws
environments:
  production:
    db1:
      type: mysql
      domain: shop.example.com
"#;
        let project = Project::from_yaml_str(yaml).unwrap();
        let configs = project.environment_configs("production").unwrap();

        let dns = configs.iter().find(|c| c.kind().unwrap() == ServiceType::Dns).unwrap();
        assert_eq!(dns.get_str("domain"), Some("example.com"));
        let ssl = configs.iter().find(|c| c.kind().unwrap() == ServiceType::Ssl).unwrap();
        assert_eq!(ssl.get_str("domain"), Some("shop.example.com"));
    }

    #[test]
    fn unknown_environment_is_an_error() {
        let project = Project::from_yaml_str(PROJECT).unwrap();
        let err = project.environment_configs("nope").unwrap_err();
        assert!(matches!(err, StackplanError::EnvironmentNotFound { name } if name == "nope"));
    }
}

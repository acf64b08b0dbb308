//! Automatic attribute derivation for implied services.
//!
//! Some services are never authored by the user: the state backend comes
//! from the project's `state` block, DNS and SSL are implied by a service
//! that carries a `domain`, cluster naming falls out of project context.
//! [`derive_config`] produces their concrete configurations.
//!
//! Specialized generators exist for state, dns, ssl, and cluster; every
//! result is then topped up with the default derivation (provider/region
//! fallback chain, `{provider}-{type}-service` name). The generator's
//! attributes always win on overlap, so the output is the union with
//! defaults filling gaps.

use serde_json::json;

use crate::core::{
    DEFAULT_PROVIDER, DEFAULT_REGION, Provider, STATE_SERVICE_NAME, ServiceConfig, ServiceType,
};
use crate::project::Project;

/// Derive the concrete configuration of an implied service.
///
/// `associated` is the configuration of the service that owns the implied
/// one (e.g. the application a DNS record is created for). Returns `None`
/// when the service is not applicable: a DNS or SSL service is only
/// generated when the associated service carries a non-empty `domain`.
pub fn derive_config(
    kind: ServiceType,
    project: &Project,
    environment: &str,
    associated: Option<&ServiceConfig>,
) -> Option<ServiceConfig> {
    let specialized = match kind {
        ServiceType::State => Some(state_config(project)),
        ServiceType::Dns => Some(dns_config(associated)?),
        ServiceType::Ssl => Some(ssl_config(associated)?),
        ServiceType::Cluster => Some(cluster_config(project, environment)),
        _ => None,
    };

    let mut config = specialized.unwrap_or_default();
    config.fill_defaults(&default_config(kind, project, associated));
    Some(config)
}

/// Default derivation applied underneath every generator.
fn default_config(
    kind: ServiceType,
    project: &Project,
    associated: Option<&ServiceConfig>,
) -> ServiceConfig {
    let provider = resolved_provider(project, associated);
    let mut config = ServiceConfig::new();
    config.set("type", json!(kind.as_str()));
    config.set("provider", json!(provider.as_str()));
    config.set("name", json!(format!("{provider}-{kind}-service")));
    let region = associated
        .and_then(ServiceConfig::region)
        .or(project.region.as_deref());
    if let Some(region) = region {
        config.set("region", json!(region));
    }
    config
}

fn resolved_provider(project: &Project, associated: Option<&ServiceConfig>) -> Provider {
    associated
        .and_then(ServiceConfig::provider)
        .or(project.provider)
        .unwrap_or(DEFAULT_PROVIDER)
}

/// State service: the project's `state` block verbatim, with the fixed
/// service name.
fn state_config(project: &Project) -> ServiceConfig {
    let mut config = ServiceConfig::from_map(project.state.clone());
    config.set("type", json!(ServiceType::State.as_str()));
    config.set("name", json!(STATE_SERVICE_NAME));
    config
}

/// DNS zone for the associated service's top-level domain.
fn dns_config(associated: Option<&ServiceConfig>) -> Option<ServiceConfig> {
    let domain = associated_domain(associated)?;
    let zone = top_level_domain(domain);
    let mut config = ServiceConfig::new();
    config.set("type", json!(ServiceType::Dns.as_str()));
    config.set("name", json!(format!("{}-dns", slug(&zone))));
    config.set("domain", json!(zone));
    Some(config)
}

/// SSL certificate for the associated service's full domain.
fn ssl_config(associated: Option<&ServiceConfig>) -> Option<ServiceConfig> {
    let domain = associated_domain(associated)?;
    let mut config = ServiceConfig::new();
    config.set("type", json!(ServiceType::Ssl.as_str()));
    config.set("name", json!(format!("{}-ssl", slug(domain))));
    config.set("domain", json!(domain));
    Some(config)
}

/// Cluster naming derived from provider, region, and project + environment.
fn cluster_config(project: &Project, environment: &str) -> ServiceConfig {
    let provider = project.provider.unwrap_or(DEFAULT_PROVIDER);
    let region = project.region.clone().unwrap_or_else(|| DEFAULT_REGION.to_string());
    let base = format!("{}-{environment}", project_name(project));

    let mut config = ServiceConfig::new();
    config.set("type", json!(ServiceType::Cluster.as_str()));
    config.set("name", json!(format!("{base}-cluster")));
    config.set("identifier", json!(format!("{base}-{provider}-{region}")));
    config.set("region", json!(region));
    config
}

fn project_name(project: &Project) -> String {
    if let Some(name) = &project.name {
        return slug(name);
    }
    // No project name: fall back to the working directory's base name.
    std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|name| slug(&name.to_string_lossy())))
        .unwrap_or_else(|| "stackplan".to_string())
}

fn associated_domain(associated: Option<&ServiceConfig>) -> Option<&str> {
    associated.and_then(|config| config.get_str("domain")).filter(|domain| !domain.is_empty())
}

/// Extract the top-level domain: `app.example.com` → `example.com`.
pub fn top_level_domain(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() <= 2 {
        domain.to_string()
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

fn slug(input: &str) -> String {
    input.to_lowercase().replace(['.', ' ', '_'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use serial_test::serial;

    fn project(name: Option<&str>, provider: Option<Provider>, region: Option<&str>) -> Project {
        Project {
            name: name.map(ToString::to_string),
            provider,
            region: region.map(ToString::to_string),
            state: Map::new(),
            environments: Default::default(),
        }
    }

    fn owner_with_domain(domain: &str) -> ServiceConfig {
        let mut config = ServiceConfig::new();
        config.set("type", json!("mysql"));
        config.set("name", json!("app"));
        config.set("provider", json!("aws"));
        config.set("region", json!("eu-west-1"));
        config.set("domain", json!(domain));
        config
    }

    #[test]
    fn dns_uses_the_top_level_domain_and_keeps_its_own_name() {
        let project = project(Some("demo"), Some(Provider::Aws), Some("eu-central-1"));
        let owner = owner_with_domain("app.example.com");
        let config =
            derive_config(ServiceType::Dns, &project, "production", Some(&owner)).unwrap();

        assert_eq!(config.get_str("domain"), Some("example.com"));
        // Generator fields win over the generic fallback name.
        assert_eq!(config.name(), Some("example-com-dns"));
        // Default derivation fills what the generator left out.
        assert_eq!(config.provider(), Some(Provider::Aws));
        assert_eq!(config.region(), Some("eu-west-1"), "associated region wins over project's");
    }

    #[test]
    fn ssl_keeps_the_full_domain() {
        let project = project(Some("demo"), Some(Provider::Aws), None);
        let owner = owner_with_domain("app.example.com");
        let config =
            derive_config(ServiceType::Ssl, &project, "production", Some(&owner)).unwrap();
        assert_eq!(config.get_str("domain"), Some("app.example.com"));
        assert_eq!(config.name(), Some("app-example-com-ssl"));
    }

    #[test]
    fn dns_and_ssl_are_not_applicable_without_a_domain() {
        let project = project(Some("demo"), Some(Provider::Aws), None);
        let mut owner = ServiceConfig::new();
        owner.set("type", json!("mysql"));
        assert!(derive_config(ServiceType::Dns, &project, "production", Some(&owner)).is_none());
        owner.set("domain", json!(""));
        assert!(derive_config(ServiceType::Ssl, &project, "production", Some(&owner)).is_none());
        assert!(derive_config(ServiceType::Dns, &project, "production", None).is_none());
    }

    #[test]
    fn state_inherits_the_project_block_verbatim_with_the_fixed_name() {
        let mut project = project(Some("demo"), Some(Provider::Aws), Some("eu-central-1"));
        project.state.insert("type".to_string(), json!("state"));
        project.state.insert("bucket".to_string(), json!("demo-state-bucket"));

        let config = derive_config(ServiceType::State, &project, "production", None).unwrap();
        assert_eq!(config.name(), Some(STATE_SERVICE_NAME));
        assert_eq!(config.get_str("bucket"), Some("demo-state-bucket"));
        assert_eq!(config.provider(), Some(Provider::Aws));
        assert_eq!(config.region(), Some("eu-central-1"));
    }

    #[test]
    fn default_derivation_applies_for_types_without_a_generator() {
        let project = project(Some("demo"), None, Some("eu-central-1"));
        let owner = owner_with_domain("app.example.com");
        let config =
            derive_config(ServiceType::Monitoring, &project, "production", Some(&owner)).unwrap();
        assert_eq!(config.name(), Some("aws-monitoring-service"));
        assert_eq!(config.provider(), Some(Provider::Aws), "inherited from the associated config");
        assert_eq!(config.region(), Some("eu-west-1"));
        assert_eq!(config.kind().unwrap(), ServiceType::Monitoring);
    }

    #[test]
    fn cluster_naming_combines_project_and_environment() {
        let project = project(Some("Demo App"), Some(Provider::Aws), Some("eu-west-1"));
        let config =
            derive_config(ServiceType::Cluster, &project, "staging", None).unwrap();
        assert_eq!(config.name(), Some("demo-app-staging-cluster"));
        assert_eq!(config.get_str("identifier"), Some("demo-app-staging-aws-eu-west-1"));
    }

    #[test]
    #[serial]
    fn cluster_naming_falls_back_to_the_working_directory() {
        let original = std::env::current_dir().unwrap();
        let dir = tempfile::Builder::new().prefix("acme-shop").tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let project = project(None, None, None);
        let config = derive_config(ServiceType::Cluster, &project, "dev", None).unwrap();

        std::env::set_current_dir(original).unwrap();

        let name = config.name().unwrap();
        assert!(name.starts_with("acme-shop"), "got {name}");
        assert!(name.ends_with("-dev-cluster"), "got {name}");
    }

    #[test]
    fn top_level_domain_extraction() {
        assert_eq!(top_level_domain("app.example.com"), "example.com");
        assert_eq!(top_level_domain("example.com"), "example.com");
        assert_eq!(top_level_domain("deep.sub.example.com"), "example.com");
        assert_eq!(top_level_domain("localhost"), "localhost");
    }
}

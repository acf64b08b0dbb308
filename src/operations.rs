//! Operation entry points.
//!
//! Each entry point validates the full project document, expands the
//! named environment to concrete service configurations, builds the node
//! set, runs one [`Operation`](crate::graph::Operation) at the
//! corresponding scope, and returns the backend's serialized
//! configuration document. Any failure aborts the whole pass.

use anyhow::{Context, Result};
use tracing::info;

use crate::core::Scope;
use crate::graph::Operation;
use crate::project::Project;
use crate::registry::ServiceRegistry;
use crate::stack::StackDocument;

/// Run a deployment pass: create or update resources.
pub fn deployment(project: &Project, environment: &str) -> Result<StackDocument> {
    run(project, environment, Scope::Deployable)
}

/// Run a destruction pass: the minimal resources needed to tear down.
pub fn destruction(project: &Project, environment: &str) -> Result<StackDocument> {
    run(project, environment, Scope::Destroyable)
}

/// Run a preparation pass: bootstrap-only resources such as the state
/// backend.
pub fn setup(project: &Project, environment: &str) -> Result<StackDocument> {
    run(project, environment, Scope::Preparable)
}

fn run(project: &Project, environment: &str, scope: Scope) -> Result<StackDocument> {
    let registry = ServiceRegistry::standard()?;
    project.validate(&registry)?;

    let configs = project
        .environment_configs(environment)
        .with_context(|| format!("Cannot expand environment '{environment}'"))?;

    let stack_name = format!(
        "{}-{environment}",
        project.name.as_deref().unwrap_or("stackplan")
    );
    info!(stack = %stack_name, scope = %scope, services = configs.len(), "starting operation");

    Operation::new(scope, configs, &registry, &stack_name)?.process()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_provisions_the_state_backend_only() {
        let project = Project::from_yaml_str(
            r#"
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
"#,
        )
        .unwrap();

        let document = setup(&project, "production").unwrap();
        assert_eq!(document.stack, "demo-production");
        assert_eq!(document.resources.len(), 1);
        assert_eq!(document.resources[0].kind, "state_bucket");
        assert_eq!(document.resources[0].attributes["versioned"], true);
    }

    #[test]
    fn destruction_declares_the_bucket_for_emptying() {
        let project = Project::from_yaml_str(
            r#"
name: demo
provider: aws
state:
  type: state
  bucket: demo-state
environments:
  production:
    db1:
      type: mysql
"#,
        )
        .unwrap();

        let document = destruction(&project, "production").unwrap();
        let buckets = document.resources_of_kind("state_bucket");
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].attributes["force_destroy"], true);
    }
}

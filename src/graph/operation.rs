//! One provisioning pass over the node set.
//!
//! An [`Operation`] owns the nodes, the precomputed edges, the backend
//! handle, and the validator. [`Operation::process`] first checks the
//! aggregated environment-variable requirements, then registers every
//! node. Registration is recursive and memoized: a node's requirement
//! edges are fully realized before its own handler runs, and each node is
//! provisioned at most once no matter how many paths reach it.
//!
//! Everything here is single-threaded and synchronous: the backend handle
//! is not safe for concurrent mutation, and the recursion order is itself
//! the correctness mechanism. Failures abort the whole operation; nothing
//! already declared against the backend is rolled back here.

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

use crate::core::{Scope, ServiceConfig, StackplanError};
use crate::registry::{ProvisionOutput, ServiceRegistry};
use crate::schema::ConfigValidator;
use crate::stack::{StackContext, StackDocument};

use super::edges::{self, ResolvedEdge};
use super::provisionable::{NodeId, Provisionable, RegistrationState};

/// One provisioning pass at a fixed scope.
pub struct Operation {
    scope: Scope,
    nodes: Vec<Provisionable>,
    edges: Vec<Vec<ResolvedEdge>>,
    stack: StackContext,
    validator: ConfigValidator,
    environment: HashMap<String, String>,
}

impl Operation {
    /// Build an operation over the given concrete configurations.
    ///
    /// Configurations with identical content collapse to one node (content
    /// identity); association edges are resolved once, up front.
    pub fn new(
        scope: Scope,
        configs: Vec<ServiceConfig>,
        registry: &ServiceRegistry,
        stack_name: &str,
    ) -> anyhow::Result<Self> {
        let mut nodes: Vec<Provisionable> = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::new();
        for config in configs {
            let node = Provisionable::from_config(config, registry)?;
            if seen.insert(node.id.clone()) {
                nodes.push(node);
            } else {
                debug!(resource = %node.resource_id, "duplicate configuration collapsed");
            }
        }

        let edges = edges::resolve(&nodes, scope);
        info!(
            scope = %scope,
            stack = stack_name,
            nodes = nodes.len(),
            "operation constructed"
        );

        Ok(Self {
            scope,
            nodes,
            edges,
            stack: StackContext::new(stack_name),
            validator: ConfigValidator::new(),
            environment: std::env::vars().collect(),
        })
    }

    /// Replace the environment snapshot used for requirement checks.
    ///
    /// By default the operation snapshots the process environment at
    /// construction time.
    pub fn with_environment(mut self, variables: HashMap<String, String>) -> Self {
        self.environment = variables;
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The node set, in operation order.
    pub fn nodes(&self) -> &[Provisionable] {
        &self.nodes
    }

    /// Run the pass: environment check, then register every node.
    ///
    /// The outer loop's order does not matter; recursion through
    /// requirement edges enforces the real dependency order.
    pub fn process(mut self) -> anyhow::Result<StackDocument> {
        self.check_environment()?;

        for index in 0..self.nodes.len() {
            self.register(index)?;
        }

        info!(
            scope = %self.scope,
            resources = self.stack.resource_count(),
            "operation complete"
        );
        Ok(self.stack.into_document())
    }

    /// Fail before any provisioning when required variables are absent.
    ///
    /// Requirements are aggregated over every participating definition and
    /// de-duplicated by variable name; all missing names are reported in
    /// one error.
    fn check_environment(&self) -> Result<(), StackplanError> {
        let mut required: BTreeMap<&str, bool> = BTreeMap::new();
        for node in &self.nodes {
            for requirement in node.definition.environment() {
                let entry = required.entry(requirement.name.as_str()).or_insert(false);
                *entry = *entry || requirement.required;
            }
        }

        let missing: Vec<String> = required
            .iter()
            .filter(|&(name, &is_required)| is_required && !self.environment.contains_key(*name))
            .map(|(name, _)| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(StackplanError::MissingEnvironment { variables: missing })
        }
    }

    /// Register one node: requirements, own handler, side effects.
    fn register(&mut self, index: usize) -> anyhow::Result<ProvisionOutput> {
        match self.nodes[index].state {
            RegistrationState::Registered => {
                // Memoized: provisioned at most once per operation.
                return Ok(self.nodes[index].provisions.clone());
            }
            RegistrationState::InProgress => {
                return Err(StackplanError::CycleDetected {
                    resource: self.nodes[index].resource_id.clone(),
                }
                .into());
            }
            RegistrationState::Pending => {}
        }
        self.nodes[index].state = RegistrationState::InProgress;
        debug!(resource = %self.nodes[index].resource_id, "registering node");

        let definition = self.nodes[index].definition.clone();
        let label = self.nodes[index].label();

        // Validate against the definition's schema, applying defaults.
        let validated =
            self.validator.validate(&label, definition.schema(), &self.nodes[index].config)?;
        self.nodes[index].config = validated;

        let node_edges = self.edges[index].clone();

        // Phase one: requirements, fully realized before the node's own
        // handler runs.
        for edge in node_edges.iter().filter(|edge| edge.requirement) {
            self.register(edge.target)?;
            let linked = self.nodes[edge.target].clone();
            let owner = self.nodes[index].clone();
            let output = (edge.handler)(&linked, &mut self.stack, &owner)?;
            self.nodes[index].requirements.entry(edge.name.clone()).or_default().push(output);
        }

        // Every declared requirement must have produced output.
        if let Some(associations) = definition.associations(self.scope) {
            for (name, association) in associations {
                if association.requirement
                    && self.nodes[index].requirement(name).is_none_or(<[_]>::is_empty)
                {
                    return Err(StackplanError::MissingRequirement {
                        service: label,
                        association: name.clone(),
                    }
                    .into());
                }
            }
        }

        // A definition without a handler for this scope participates
        // through its associations only; its own provisioning is a no-op.
        let provisions = match definition.handler(self.scope) {
            Some(handler) => {
                let snapshot = self.nodes[index].clone();
                handler(&snapshot, &mut self.stack)?
            }
            None => ProvisionOutput::Null,
        };
        self.nodes[index].provisions = provisions.clone();
        self.nodes[index].state = RegistrationState::Registered;
        debug!(resource = %self.nodes[index].resource_id, "node registered");

        // Phase two: side effects, against the node's own provisions.
        for edge in node_edges.iter().filter(|edge| !edge.requirement) {
            self.register(edge.target)?;
            let linked = self.nodes[edge.target].clone();
            let owner = self.nodes[index].clone();
            let output = (edge.handler)(&linked, &mut self.stack, &owner)?;
            self.nodes[index].side_effects.entry(edge.name.clone()).or_default().push(output);
        }

        Ok(provisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Provider, ServiceType};
    use crate::registry::{Association, ServiceDefinition};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(kind: &str, name: &str) -> ServiceConfig {
        let mut cfg = ServiceConfig::new();
        cfg.set("type", json!(kind));
        cfg.set("name", json!(name));
        cfg.set("provider", json!("aws"));
        cfg
    }

    fn counting_handler(counter: Arc<AtomicUsize>) -> crate::registry::ScopeHandler {
        Arc::new(move |node, stack| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(stack.declare("counted", &node.resource_id, json!({})))
        })
    }

    fn pass_through_link(requirement: bool, target: Option<ServiceType>) -> Association {
        Association {
            target,
            requirement,
            predicate: Arc::new(|_, _| true),
            handler: Arc::new(|linked, _stack, _owner| Ok(linked.provisions.clone())),
        }
    }

    #[test]
    fn a_shared_requirement_is_provisioned_exactly_once() {
        // db and dns both require monitoring; monitoring's handler must run once.
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ServiceRegistry::new();
        registry.register(
            ServiceDefinition::new(Provider::Aws, ServiceType::Monitoring)
                .with_handler(Scope::Deployable, counting_handler(calls.clone()))
                .unwrap(),
        );
        for kind in [ServiceType::Mysql, ServiceType::Dns] {
            registry.register(
                ServiceDefinition::new(Provider::Aws, kind)
                    .with_association(
                        Scope::Deployable,
                        "monitoring",
                        pass_through_link(true, Some(ServiceType::Monitoring)),
                    )
                    .with_handler(
                        Scope::Deployable,
                        Arc::new(|node, stack| {
                            Ok(stack.declare("dependent", &node.resource_id, json!({})))
                        }),
                    )
                    .unwrap(),
            );
        }

        let operation = Operation::new(
            Scope::Deployable,
            vec![config("mysql", "db1"), config("dns", "zone"), config("monitoring", "mon")],
            &registry,
            "test",
        )
        .unwrap()
        .with_environment(HashMap::new());

        let document = operation.process().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(document.resources_of_kind("counted").len(), 1);
        assert_eq!(document.resources_of_kind("dependent").len(), 2);
    }

    #[test]
    fn requirement_outputs_are_visible_to_the_owning_handler() {
        let mut registry = ServiceRegistry::new();
        registry.register(
            ServiceDefinition::new(Provider::Aws, ServiceType::Monitoring)
                .with_handler(
                    Scope::Deployable,
                    Arc::new(|node, stack| {
                        Ok(stack.declare("topic", &node.resource_id, json!({})))
                    }),
                )
                .unwrap(),
        );
        registry.register(
            ServiceDefinition::new(Provider::Aws, ServiceType::Mysql)
                .with_association(
                    Scope::Deployable,
                    "monitoring",
                    pass_through_link(true, Some(ServiceType::Monitoring)),
                )
                .with_handler(
                    Scope::Deployable,
                    Arc::new(|node, stack| {
                        let upstream = node
                            .requirement("monitoring")
                            .and_then(|outputs| outputs.first())
                            .and_then(|output| output.get("ref"))
                            .cloned()
                            .unwrap_or(Value::Null);
                        Ok(stack.declare("db", &node.resource_id, json!({ "topic": upstream })))
                    }),
                )
                .unwrap(),
        );

        let document = Operation::new(
            Scope::Deployable,
            vec![config("mysql", "db1"), config("monitoring", "mon")],
            &registry,
            "test",
        )
        .unwrap()
        .with_environment(HashMap::new())
        .process()
        .unwrap();

        let db = &document.resources_of_kind("db")[0];
        assert_eq!(db.attributes["topic"], "topic.mon-aws-default");
    }

    #[test]
    fn unmatched_requirement_aborts_before_any_handler_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ServiceRegistry::new();
        registry.register(
            ServiceDefinition::new(Provider::Aws, ServiceType::Mysql)
                .with_association(
                    Scope::Deployable,
                    "monitoring",
                    pass_through_link(true, Some(ServiceType::Monitoring)),
                )
                .with_handler(Scope::Deployable, counting_handler(calls.clone()))
                .unwrap(),
        );

        let err = Operation::new(Scope::Deployable, vec![config("mysql", "db1")], &registry, "test")
            .unwrap()
            .with_environment(HashMap::new())
            .process()
            .unwrap_err();

        let err = err.downcast::<StackplanError>().unwrap();
        assert!(matches!(
            err,
            StackplanError::MissingRequirement { ref association, .. } if association == "monitoring"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "owner handler must never run");
    }

    #[test]
    fn node_without_a_scope_handler_yields_empty_provisions() {
        let mut registry = ServiceRegistry::new();
        registry.register(ServiceDefinition::new(Provider::Aws, ServiceType::State));

        let operation =
            Operation::new(Scope::Deployable, vec![config("state", "st")], &registry, "test")
                .unwrap()
                .with_environment(HashMap::new());
        let document = operation.process().unwrap();
        assert!(document.resources.is_empty());
    }

    #[test]
    fn requirement_cycle_is_detected_instead_of_recursing() {
        // mysql requires dns, dns requires mysql.
        let mut registry = ServiceRegistry::new();
        registry.register(
            ServiceDefinition::new(Provider::Aws, ServiceType::Mysql).with_association(
                Scope::Deployable,
                "zone",
                pass_through_link(true, Some(ServiceType::Dns)),
            ),
        );
        registry.register(
            ServiceDefinition::new(Provider::Aws, ServiceType::Dns).with_association(
                Scope::Deployable,
                "database",
                pass_through_link(true, Some(ServiceType::Mysql)),
            ),
        );

        let err = Operation::new(
            Scope::Deployable,
            vec![config("mysql", "db1"), config("dns", "zone")],
            &registry,
            "test",
        )
        .unwrap()
        .with_environment(HashMap::new())
        .process()
        .unwrap_err();

        let err = err.downcast::<StackplanError>().unwrap();
        assert!(matches!(err, StackplanError::CycleDetected { .. }));
    }

    #[test]
    fn missing_required_variables_abort_before_provisioning() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ServiceRegistry::new();
        registry.register(
            ServiceDefinition::new(Provider::Aws, ServiceType::Mysql)
                .with_environment_requirement("DB_ROOT_PASSWORD", "root password", true)
                .with_environment_requirement("DB_AUDIT_LOG", "audit toggle", false)
                .with_handler(Scope::Deployable, counting_handler(calls.clone()))
                .unwrap(),
        );
        registry.register(
            ServiceDefinition::new(Provider::Aws, ServiceType::Monitoring)
                .with_environment_requirement("ALERT_WEBHOOK", "webhook url", true),
        );

        let err = Operation::new(
            Scope::Deployable,
            vec![config("mysql", "db1"), config("monitoring", "mon")],
            &registry,
            "test",
        )
        .unwrap()
        .with_environment(HashMap::new())
        .process()
        .unwrap_err();

        let err = err.downcast::<StackplanError>().unwrap();
        let StackplanError::MissingEnvironment { variables } = err else {
            panic!("expected MissingEnvironment");
        };
        // Full list, sorted, optional variables excluded.
        assert_eq!(variables, vec!["ALERT_WEBHOOK", "DB_ROOT_PASSWORD"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn present_required_variables_pass_the_check() {
        let mut registry = ServiceRegistry::new();
        registry.register(
            ServiceDefinition::new(Provider::Aws, ServiceType::Mysql)
                .with_environment_requirement("DB_ROOT_PASSWORD", "root password", true),
        );

        let environment =
            HashMap::from([("DB_ROOT_PASSWORD".to_string(), "hunter2".to_string())]);
        let document =
            Operation::new(Scope::Deployable, vec![config("mysql", "db1")], &registry, "test")
                .unwrap()
                .with_environment(environment)
                .process()
                .unwrap();
        assert!(document.resources.is_empty());
    }

    #[test]
    fn identical_configurations_collapse_to_one_node() {
        let mut registry = ServiceRegistry::new();
        registry.register(ServiceDefinition::new(Provider::Aws, ServiceType::Monitoring));

        let operation = Operation::new(
            Scope::Deployable,
            vec![config("monitoring", "mon"), config("monitoring", "mon")],
            &registry,
            "test",
        )
        .unwrap();
        assert_eq!(operation.nodes().len(), 1);
    }

    #[test]
    fn invalid_configuration_aborts_with_aggregated_violations() {
        let mut registry = ServiceRegistry::new();
        registry.register(ServiceDefinition::new(Provider::Aws, ServiceType::Mysql));

        let mut bad = config("mysql", "db1");
        bad.set("unknown_knob", json!(true));
        bad.set("links", json!([1, 2]));

        let err = Operation::new(Scope::Deployable, vec![bad], &registry, "test")
            .unwrap()
            .with_environment(HashMap::new())
            .process()
            .unwrap_err();

        let err = err.downcast::<StackplanError>().unwrap();
        let StackplanError::SchemaViolation { violations, .. } = err else {
            panic!("expected SchemaViolation");
        };
        assert!(violations.len() >= 3, "unknown knob plus two bad links: {violations:?}");
    }
}

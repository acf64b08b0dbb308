//! The standard service catalog.
//!
//! One builder function per service kind, all registered by
//! [`register_standard`]. Handlers declare resources into the backend
//! handle and return the resulting output handles; association handlers
//! wire already-provisioned neighbors together (alert bindings onto
//! monitoring topics, certificates onto DNS zones).

use anyhow::Result;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::core::{AWS_REGIONS, DEFAULT_REGION, Provider, Scope, ServiceType};
use crate::generate::top_level_domain;
use crate::graph::Provisionable;
use crate::stack::StackContext;

use super::definition::{Association, ProvisionOutput, ServiceDefinition};
use super::ServiceRegistry;

/// Machine sizes the standard database definitions accept.
pub const DATABASE_SIZES: &[&str] =
    &["db.t3.micro", "db.t3.small", "db.t3.medium", "db.m5.large"];

const MYSQL_VERSIONS: &[&str] = &["5.7", "8.0"];
const POSTGRESQL_VERSIONS: &[&str] = &["14", "15", "16"];

/// Register the full standard catalog into `registry`.
pub fn register_standard(registry: &mut ServiceRegistry) -> Result<()> {
    registry.register(database(ServiceType::Mysql, MYSQL_VERSIONS, "8.0")?);
    registry.register(database(ServiceType::Postgresql, POSTGRESQL_VERSIONS, "16")?);
    registry.register(monitoring()?);
    registry.register(aws_state()?);
    registry.register(local_state()?);
    registry.register(dns()?);
    registry.register(ssl()?);
    registry.register(cluster()?);
    Ok(())
}

fn database(engine: ServiceType, versions: &[&str], default_version: &str) -> Result<ServiceDefinition> {
    let definition = ServiceDefinition::new(Provider::Aws, engine)
        .with_regions(AWS_REGIONS, DEFAULT_REGION)
        .with_sizing(DATABASE_SIZES, "db.t3.micro")
        .with_storage(10, 1024, 20)
        .with_node_count(1, 5, 1)
        .with_versioning(versions, default_version)
        .with_schema(json!({
            "properties": {
                "database": { "type": "string" },
                "monitoring": { "type": "boolean", "default": false },
            }
        }))
        .with_handler(Scope::Deployable, Arc::new(deploy_database))?
        .with_association(
            Scope::Deployable,
            "monitoring",
            Association {
                target: Some(ServiceType::Monitoring),
                requirement: false,
                predicate: Arc::new(|owner, candidate| {
                    owner.get_bool("monitoring").unwrap_or(false)
                        && owner.provider() == candidate.provider()
                        && owner.region() == candidate.region()
                }),
                handler: Arc::new(bind_alerts),
            },
        );
    Ok(definition)
}

fn deploy_database(node: &Provisionable, stack: &mut StackContext) -> Result<ProvisionOutput> {
    let config = &node.config;
    let attributes = json!({
        "engine": config.get_str("type"),
        "version": config.get_str("version"),
        "size": config.get_str("size"),
        "storage": config.get_u64("storage"),
        "nodes": config.get_u64("nodes"),
        "region": config.region(),
        "database": config.get_str("database"),
    });
    Ok(stack.declare("db_instance", &node.resource_id, attributes))
}

fn bind_alerts(
    linked: &Provisionable,
    stack: &mut StackContext,
    owner: &Provisionable,
) -> Result<ProvisionOutput> {
    let topic = linked.provisions.get("ref").cloned().unwrap_or(Value::Null);
    let id = format!("{}-alerts", owner.resource_id);
    let attributes = json!({
        "topic": topic,
        "source": owner.resource_id,
        "metric": "cpu_utilization",
    });
    Ok(stack.declare("alert_binding", &id, attributes))
}

fn monitoring() -> Result<ServiceDefinition> {
    let definition = ServiceDefinition::new(Provider::Aws, ServiceType::Monitoring)
        .with_regions(AWS_REGIONS, DEFAULT_REGION)
        .with_schema(json!({
            "properties": {
                "emails": { "type": "array", "items": { "type": "string" } },
            }
        }))
        .with_environment_requirement(
            "STACKPLAN_ALERT_EMAIL",
            "Fallback address subscribed to every notification topic",
            false,
        )
        .with_handler(Scope::Deployable, Arc::new(deploy_monitoring))?;
    Ok(definition)
}

fn deploy_monitoring(node: &Provisionable, stack: &mut StackContext) -> Result<ProvisionOutput> {
    let attributes = json!({
        "region": node.config.region(),
        "emails": node.config.get("emails").cloned().unwrap_or_else(|| json!([])),
    });
    Ok(stack.declare("notification_topic", &node.resource_id, attributes))
}

fn aws_state() -> Result<ServiceDefinition> {
    let definition = ServiceDefinition::new(Provider::Aws, ServiceType::State)
        .with_regions(AWS_REGIONS, DEFAULT_REGION)
        .with_schema(json!({
            "properties": { "bucket": { "type": "string", "minLength": 3 } },
            "required": ["bucket"],
        }))
        .with_handler(Scope::Preparable, Arc::new(prepare_state_bucket))?
        .with_handler(Scope::Destroyable, Arc::new(destroy_state_bucket))?;
    Ok(definition)
}

fn prepare_state_bucket(node: &Provisionable, stack: &mut StackContext) -> Result<ProvisionOutput> {
    let attributes = json!({
        "bucket": node.config.get_str("bucket"),
        "region": node.config.region(),
        "versioned": true,
    });
    Ok(stack.declare("state_bucket", &node.resource_id, attributes))
}

// Destruction still needs the bucket declared so it can be emptied before
// the stack is deleted.
fn destroy_state_bucket(node: &Provisionable, stack: &mut StackContext) -> Result<ProvisionOutput> {
    let attributes = json!({
        "bucket": node.config.get_str("bucket"),
        "region": node.config.region(),
        "force_destroy": true,
    });
    Ok(stack.declare("state_bucket", &node.resource_id, attributes))
}

fn local_state() -> Result<ServiceDefinition> {
    let definition = ServiceDefinition::new(Provider::Local, ServiceType::State)
        .with_schema(json!({
            "properties": {
                "path": { "type": "string", "default": ".stackplan/state" },
            }
        }))
        .with_handler(Scope::Preparable, Arc::new(prepare_state_directory))?;
    Ok(definition)
}

fn prepare_state_directory(node: &Provisionable, stack: &mut StackContext) -> Result<ProvisionOutput> {
    let attributes = json!({ "path": node.config.get_str("path") });
    Ok(stack.declare("state_directory", &node.resource_id, attributes))
}

fn dns() -> Result<ServiceDefinition> {
    let definition = ServiceDefinition::new(Provider::Aws, ServiceType::Dns)
        .with_schema(json!({
            "properties": { "domain": { "type": "string", "minLength": 1 } },
            "required": ["domain"],
        }))
        .with_handler(Scope::Deployable, Arc::new(deploy_dns_zone))?;
    Ok(definition)
}

fn deploy_dns_zone(node: &Provisionable, stack: &mut StackContext) -> Result<ProvisionOutput> {
    let attributes = json!({ "domain": node.config.get_str("domain") });
    Ok(stack.declare("dns_zone", &node.resource_id, attributes))
}

fn ssl() -> Result<ServiceDefinition> {
    let definition = ServiceDefinition::new(Provider::Aws, ServiceType::Ssl)
        .with_schema(json!({
            "properties": { "domain": { "type": "string", "minLength": 1 } },
            "required": ["domain"],
        }))
        .with_association(
            Scope::Deployable,
            "dns",
            Association {
                target: Some(ServiceType::Dns),
                requirement: true,
                predicate: Arc::new(|owner, candidate| {
                    match (owner.get_str("domain"), candidate.get_str("domain")) {
                        (Some(domain), Some(zone)) => top_level_domain(domain) == zone,
                        _ => false,
                    }
                }),
                handler: Arc::new(link_dns_zone),
            },
        )
        .with_handler(Scope::Deployable, Arc::new(deploy_certificate))?;
    Ok(definition)
}

// The zone is already provisioned when this runs; its handle is the output
// the certificate validates against.
fn link_dns_zone(
    linked: &Provisionable,
    _stack: &mut StackContext,
    _owner: &Provisionable,
) -> Result<ProvisionOutput> {
    Ok(linked.provisions.clone())
}

fn deploy_certificate(node: &Provisionable, stack: &mut StackContext) -> Result<ProvisionOutput> {
    let zone = node
        .requirement("dns")
        .and_then(|outputs| outputs.first())
        .and_then(|output| output.get("ref"))
        .cloned()
        .unwrap_or(Value::Null);
    let attributes = json!({
        "domain": node.config.get_str("domain"),
        "validation_zone": zone,
    });
    Ok(stack.declare("certificate", &node.resource_id, attributes))
}

fn cluster() -> Result<ServiceDefinition> {
    let definition = ServiceDefinition::new(Provider::Aws, ServiceType::Cluster)
        .with_regions(AWS_REGIONS, DEFAULT_REGION)
        .with_schema(json!({
            "properties": { "identifier": { "type": "string", "minLength": 1 } },
            "required": ["identifier"],
        }))
        .with_handler(Scope::Deployable, Arc::new(deploy_cluster))?;
    Ok(definition)
}

fn deploy_cluster(node: &Provisionable, stack: &mut StackContext) -> Result<ProvisionOutput> {
    let attributes = json!({
        "identifier": node.config.get_str("identifier"),
        "region": node.config.region(),
    });
    Ok(stack.declare("container_cluster", &node.resource_id, attributes))
}

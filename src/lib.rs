//! stackplan - declarative service descriptions turned into provisioning plans
//!
//! stackplan takes a provider-agnostic description of cloud services
//! (databases, monitoring, state backends, DNS/SSL, clusters) and computes
//! an ordered, validated set of provisioning actions against an
//! infrastructure-as-code backend.
//!
//! # Architecture Overview
//!
//! A project document yields concrete service configurations (explicit
//! declarations plus auto-derived implied services) → each becomes a
//! [`graph::Provisionable`] bound to its immutable
//! [`registry::ServiceDefinition`] → an [`graph::Operation`] is built over
//! the full node set for one scope → association edges are resolved once →
//! the registration engine walks the graph, invoking handlers to realize
//! each node, and emits the backend's configuration document.
//!
//! ## Key Properties
//!
//! - **Memoized registration**: each node is provisioned at most once per
//!   operation, however many association paths reach it
//! - **Content identity**: structurally identical configurations collapse
//!   to one node
//! - **Fail fast**: schema violations, unmet requirements, missing
//!   environment variables, and requirement cycles abort the whole pass
//!   before further provisioning
//! - **Single-threaded by design**: the backend handle is an append-only
//!   construction context; recursion order is the correctness mechanism
//!
//! # Core Modules
//!
//! - [`core`] - shared vocabulary (providers, service types, scopes) and
//!   error types
//! - [`schema`] - structural schema composition and the config validator
//! - [`registry`] - immutable service definitions and the standard catalog
//! - [`generate`] - auto-derivation of implied service configurations
//! - [`graph`] - provisionable nodes, association edges, and the
//!   registration engine
//! - [`stack`] - the provisioning backend handle and its serialized output
//! - [`project`] - project document loading, validation, and expansion
//! - [`operations`] - `deployment` / `destruction` / `setup` entry points
//!
//! # Project Format (stackplan.yml)
//!
//! ```yaml
//! name: demo
//! provider: aws
//! region: eu-central-1
//! state:
//!   type: state
//!   bucket: demo-state
//! environments:
//!   production:
//!     db1:
//!       type: mysql
//!       size: db.t3.micro
//!       monitoring: true
//! ```
//!
//! # Usage
//!
//! ```bash
//! # Emit the deployment plan for one environment
//! stackplan deploy --environment production
//!
//! # Bootstrap the state backend
//! stackplan setup --environment production
//!
//! # Compute the teardown plan
//! stackplan destroy --environment production
//!
//! # Validate the project document only
//! stackplan validate
//! ```

pub mod cli;
pub mod core;
pub mod generate;
pub mod graph;
pub mod operations;
pub mod project;
pub mod registry;
pub mod schema;
pub mod stack;

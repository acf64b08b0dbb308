//! Association resolution over the node set.
//!
//! Before registration starts, every declared association of every node is
//! evaluated against every other node exactly once. Each applying pair
//! becomes one [`ResolvedEdge`], recorded under the association's name. A
//! single association may resolve to zero, one, or many edges; edge order
//! follows node-set order within an association name so output composition
//! stays deterministic.

use tracing::debug;

use crate::core::Scope;
use crate::registry::LinkHandler;

use super::provisionable::Provisionable;

/// One resolved edge from an owning node to a target node.
#[derive(Clone)]
pub struct ResolvedEdge {
    /// Association name the edge was resolved under.
    pub name: String,
    /// Index of the target node in the operation's node set.
    pub target: usize,
    /// Whether the edge must resolve before the owner's own provisioning.
    pub requirement: bool,
    /// The association's handler.
    pub handler: LinkHandler,
}

impl std::fmt::Debug for ResolvedEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedEdge")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("requirement", &self.requirement)
            .finish_non_exhaustive()
    }
}

/// Resolve every association of every node for the given scope.
///
/// Returns one edge list per node, parallel to `nodes`. Associations are
/// visited in name order; candidates in node-set order. A node never
/// matches itself.
pub fn resolve(nodes: &[Provisionable], scope: Scope) -> Vec<Vec<ResolvedEdge>> {
    nodes
        .iter()
        .map(|node| {
            let Some(associations) = node.definition.associations(scope) else {
                return Vec::new();
            };

            let mut edges = Vec::new();
            for (name, association) in associations {
                for (index, candidate) in nodes.iter().enumerate() {
                    if candidate.id == node.id {
                        continue;
                    }
                    if association.applies_to(&node.config, &candidate.config) {
                        debug!(
                            owner = %node.resource_id,
                            target = %candidate.resource_id,
                            association = %name,
                            requirement = association.requirement,
                            "resolved association edge"
                        );
                        edges.push(ResolvedEdge {
                            name: name.clone(),
                            target: index,
                            requirement: association.requirement,
                            handler: association.handler.clone(),
                        });
                    }
                }
            }
            edges
        })
        .collect()
}

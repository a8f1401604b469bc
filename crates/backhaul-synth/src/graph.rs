//! Resource dependency graph using `petgraph`.
//!
//! Ordering and parallelism of resource creation are the provisioning
//! engine's job; this graph exists only to reject cyclic wiring at
//! synthesis time and to present resources in deploy order.

use std::collections::HashMap;

use backhaul_common::error::{BackhaulError, Result};

use crate::template::Resource;

/// A dependency graph over resource logical ids.
#[derive(Debug, Default)]
pub struct ResourceGraph {
    graph: petgraph::Graph<String, ()>,
    nodes: HashMap<String, petgraph::graph::NodeIndex>,
}

impl ResourceGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph of a resource set from intrinsic references and
    /// explicit `DependsOn` edges. References to ids outside the set
    /// (parameters, pseudo parameters) are ignored.
    pub fn from_resources<'a, I>(resources: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Resource)> + Clone,
    {
        let mut graph = Self::new();
        for (id, _) in resources.clone() {
            graph.add_resource(id);
        }
        for (id, resource) in resources {
            for referenced in resource.referenced_ids() {
                if graph.nodes.contains_key(&referenced) {
                    graph.add_dependency(id, &referenced);
                }
            }
        }
        graph
    }

    /// Adds a resource node, if not already present.
    pub fn add_resource(&mut self, logical_id: impl Into<String>) {
        let logical_id = logical_id.into();
        if !self.nodes.contains_key(&logical_id) {
            let idx = self.graph.add_node(logical_id.clone());
            let _ = self.nodes.insert(logical_id, idx);
        }
    }

    /// Records that `dependent` depends on `dependency`.
    ///
    /// The edge points from `dependency` to `dependent` so that
    /// topological sort yields dependencies first. Unknown ids are
    /// ignored.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        if let (Some(&to), Some(&from)) = (self.nodes.get(dependent), self.nodes.get(dependency)) {
            let _ = self.graph.add_edge(from, to, ());
        }
    }

    /// Returns logical ids in deploy order: dependencies before the
    /// resources that reference them.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains a cycle.
    pub fn deploy_order(&self) -> Result<Vec<String>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => {
                let at = self
                    .graph
                    .node_weight(cycle.node_id())
                    .cloned()
                    .unwrap_or_default();
                Err(BackhaulError::CyclicDependency {
                    message: format!("cycle through {at}"),
                })
            }
        }
    }
}

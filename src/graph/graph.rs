// src/graph/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::errors::{Result, TaskmeshError};
use crate::graph::node::GraphNode;
use crate::types::NodeId;

/// Immutable, validated DAG of task nodes with a designated root.
///
/// Construction enforces the closure property (every referenced dependency is
/// present) and acyclicity; a graph that exists is safe to execute. Besides
/// the node mapping, adjacency in both directions is precomputed for
/// scheduling: dependencies for readiness checks, dependents for promotion
/// and failure propagation.
pub struct ExecutionGraph {
    nodes: HashMap<NodeId, GraphNode>,
    root: NodeId,
    /// Direct dependencies per node, deduplicated, in slot order.
    deps: HashMap<NodeId, Vec<NodeId>>,
    /// Direct dependents per node.
    dependents: HashMap<NodeId, Vec<NodeId>>,
}

impl ExecutionGraph {
    /// Assemble a graph from flattened nodes and a root id, validating the
    /// closure property and acyclicity.
    ///
    /// This is the single entry point for graph construction: the builder
    /// funnels through here, and so can a transport layer reconstructing a
    /// graph received from another process.
    pub fn from_parts(node_list: Vec<GraphNode>, root: NodeId) -> Result<Self> {
        let mut nodes: HashMap<NodeId, GraphNode> = HashMap::new();
        for node in node_list {
            nodes.insert(node.id, node);
        }

        if !nodes.contains_key(&root) {
            return Err(TaskmeshError::MalformedGraph {
                node: root,
                missing: root,
            });
        }

        // Closure property: every dependency id must itself be a node.
        let mut deps: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in nodes.values() {
            let node_deps = node.dependency_ids();
            for dep in &node_deps {
                if !nodes.contains_key(dep) {
                    return Err(TaskmeshError::MalformedGraph {
                        node: node.id,
                        missing: *dep,
                    });
                }
                dependents.entry(*dep).or_default().push(node.id);
            }
            deps.insert(node.id, node_deps);
        }

        validate_acyclic(&nodes, &deps)?;

        debug!(nodes = nodes.len(), root = %root, "execution graph assembled");

        Ok(Self {
            nodes,
            root,
            deps,
            dependents,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Direct dependencies of a node.
    pub fn dependencies_of(&self, id: NodeId) -> &[NodeId] {
        self.deps.get(&id).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Direct dependents of a node (nodes with a slot referencing it).
    pub fn dependents_of(&self, id: NodeId) -> &[NodeId] {
        self.dependents
            .get(&id)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }
}

impl std::fmt::Debug for ExecutionGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGraph")
            .field("nodes", &self.nodes.len())
            .field("root", &self.root)
            .finish()
    }
}

/// Reject graphs with cycles.
///
/// Edge direction: dep -> node. A topological sort fails iff there is a
/// cycle; the offending node is reported in the error.
fn validate_acyclic(
    nodes: &HashMap<NodeId, GraphNode>,
    deps: &HashMap<NodeId, Vec<NodeId>>,
) -> Result<()> {
    let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();

    for id in nodes.keys() {
        graph.add_node(*id);
    }
    for (id, node_deps) in deps.iter() {
        for dep in node_deps {
            graph.add_edge(*dep, *id, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TaskmeshError::CyclicGraph(cycle.node_id())),
    }
}

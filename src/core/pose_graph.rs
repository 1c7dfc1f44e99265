use nalgebra::{Matrix4, Matrix6};

use super::error::InvalidGraphError;

/// Rigid pose of a node in the global frame.
/// Nodes are identified by their position in [`PoseGraph::nodes`].
#[derive(Debug, Clone, PartialEq)]
pub struct PoseNode {
    pub pose: Matrix4<f64>,
}
impl PoseNode {
    pub fn new(pose: Matrix4<f64>) -> Self {
        PoseNode { pose }
    }
}
impl Default for PoseNode {
    fn default() -> Self {
        PoseNode {
            pose: Matrix4::identity(),
        }
    }
}

/// Relative-transform measurement between two nodes.
///
/// The measurement satisfies $X \approx T_j^{-1} T_i$ where $i$ is the source
/// and $j$ the target node.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseEdge {
    pub source_node_id: usize,
    pub target_node_id: usize,
    /// measured relative transform
    pub transformation: Matrix4<f64>,
    /// inverse covariance of the measurement, tangent layout `[rotation, translation]`
    pub information: Matrix6<f64>,
    pub uncertain: bool,
}
impl PoseEdge {
    pub fn new(
        source_node_id: usize,
        target_node_id: usize,
        transformation: Matrix4<f64>,
        information: Matrix6<f64>,
        uncertain: bool,
    ) -> Self {
        PoseEdge {
            source_node_id,
            target_node_id,
            transformation,
            information,
            uncertain,
        }
    }
    /// Returns true for loop-closure edges, i.e. edges whose endpoints are not
    /// consecutive in the node sequence.
    pub fn is_loop(&self) -> bool {
        self.source_node_id.abs_diff(self.target_node_id) != 1
    }
}

/// Ordered nodes plus unordered edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseGraph {
    pub nodes: Vec<PoseNode>,
    pub edges: Vec<PoseEdge>,
}
impl PoseGraph {
    pub fn new() -> Self {
        Self::default()
    }
    /// Add node, returns its index.
    pub fn add_node(&mut self, pose: Matrix4<f64>) -> usize {
        self.nodes.push(PoseNode::new(pose));
        self.nodes.len() - 1
    }
    /// Add edge, returns its index.
    pub fn add_edge(&mut self, edge: PoseEdge) -> usize {
        self.edges.push(edge);
        self.edges.len() - 1
    }
    /// Checks that the graph has nodes and every edge refers to existing ones.
    pub fn validate(&self) -> Result<(), InvalidGraphError> {
        if self.nodes.is_empty() {
            return Err(InvalidGraphError::EmptyNodes);
        }
        let node_count = self.nodes.len();
        for (edge, e) in self.edges.iter().enumerate() {
            if e.source_node_id >= node_count || e.target_node_id >= node_count {
                return Err(InvalidGraphError::EdgeOutOfBounds {
                    edge,
                    source_node_id: e.source_node_id,
                    target_node_id: e.target_node_id,
                    node_count,
                });
            }
        }
        Ok(())
    }
    /// Returns copy of node poses in node order.
    pub fn poses(&self) -> Vec<Matrix4<f64>> {
        self.nodes.iter().map(|n| n.pose).collect()
    }
    /// Number of loop-closure edges.
    pub fn loop_edges_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_loop()).count()
    }
}

use thiserror::Error;

use crate::linear::linear_solver::LinearSolverStatus;

/// Structural problems of an input pose graph, detected before iterating.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidGraphError {
    /// node sequence is empty
    #[error("pose graph has no nodes")]
    EmptyNodes,
    /// edge endpoint is not an index into the node sequence
    #[error(
        "edge {edge} ({source_node_id} -> {target_node_id}) references a node outside 0..{node_count}"
    )]
    EdgeOutOfBounds {
        edge: usize,
        source_node_id: usize,
        target_node_id: usize,
        node_count: usize,
    },
}

/// Errors surfaced by the pose graph optimizer.
/// Convergence and reaching the iteration budget are not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NonlinearOptimizationError {
    /// input graph is malformed, nothing was optimized
    #[error("invalid pose graph: {0}")]
    InvalidGraph(#[from] InvalidGraphError),
    /// normal equations could not be solved reliably
    #[error("degenerate linear system at iteration {iteration}: {status:?}")]
    DegenerateSystem {
        iteration: usize,
        status: LinearSolverStatus,
    },
}

use log::trace;
use nalgebra::{Matrix4, Matrix6, Vector6};

use crate::core::pose_graph::PoseEdge;

use super::se3;

/// Residuals below this value have no usable gradient direction.
pub const MIN_RESIDUAL: f64 = 1e-12;

/// Relative pose constraint prepared for optimization.
/// The measurement is inverted once when the factor is built.
#[derive(Debug, Clone)]
pub struct BetweenFactor {
    pub source_node_id: usize,
    pub target_node_id: usize,
    pub measurement_inv: Matrix4<f64>,
    pub information: Matrix6<f64>,
    pub is_loop: bool,
}

/// Weighted scalar residual of one factor and its gradient row.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorLinearization {
    pub residual: f64,
    pub gradient: Vector6<f64>,
    /// residual was numerically zero and the gradient was replaced by zeros
    pub degenerate: bool,
}

impl BetweenFactor {
    pub fn new(edge: &PoseEdge) -> Self {
        BetweenFactor {
            source_node_id: edge.source_node_id,
            target_node_id: edge.target_node_id,
            measurement_inv: se3::inverse(&edge.transformation),
            information: edge.information,
            is_loop: edge.is_loop(),
        }
    }
    /// Setup phase: one factor per edge, same order as `edges`.
    pub fn from_edges(edges: &[PoseEdge]) -> Vec<Self> {
        edges.iter().map(BetweenFactor::new).collect()
    }
    /// Error transform $E = X^{-1} T_j^{-1} T_i$.
    pub fn error_transform(&self, poses: &[Matrix4<f64>]) -> Matrix4<f64> {
        self.measurement_inv
            * se3::inverse(&poses[self.target_node_id])
            * poses[self.source_node_id]
    }
    /// Tangent of the error transform.
    pub fn error(&self, poses: &[Matrix4<f64>]) -> Vector6<f64> {
        se3::to_tangent(&self.error_transform(poses))
    }
    /// Squared Mahalanobis norm $d^T \Omega d$.
    pub fn squared_mahalanobis(&self, d: &Vector6<f64>) -> f64 {
        d.dot(&(self.information * d))
    }
    /// Residual $r = \sqrt{w \, d^T \Omega d}$ and gradient row
    /// $g = \sqrt{w} \, d^T \Omega / \sqrt{d^T \Omega d}$.
    pub fn linearize(&self, poses: &[Matrix4<f64>], weight: f64) -> FactorLinearization {
        let d = self.error(poses);
        let residual = self.squared_mahalanobis(&d).sqrt();
        let weight_sqrt = weight.sqrt();
        if residual < MIN_RESIDUAL {
            trace!(
                "zero gradient for factor {} -> {}, residual {:e}",
                self.source_node_id,
                self.target_node_id,
                residual
            );
            return FactorLinearization {
                residual: weight_sqrt * residual,
                gradient: Vector6::zeros(),
                degenerate: true,
            };
        }
        let gradient = self.information.tr_mul(&d) / residual;
        FactorLinearization {
            residual: weight_sqrt * residual,
            gradient: gradient * weight_sqrt,
            degenerate: false,
        }
    }
}

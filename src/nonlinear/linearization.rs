use nalgebra::{DMatrix, DVector, Matrix4};
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::slam::{between_factor::BetweenFactor, line_process::LineProcess};

/// Tangent dimension of one pose.
pub const POSE_DIM: usize = 6;

/// Dense linearization: one row per factor.
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct JacobianLinearization {
    /// `factors × 6·poses` Jacobian
    pub A: DMatrix<f64>,
    /// residual vector
    pub b: DVector<f64>,
    /// $\sum_e w_e r_e^2$
    pub cost: f64,
    /// rows whose gradient was replaced by zeros
    pub degenerate_rows: usize,
}
impl JacobianLinearization {
    /// Normal equations $(J^T J + \lambda I, J^T r)$.
    pub fn normal_equations(&self, damping: f64) -> (DMatrix<f64>, DVector<f64>) {
        let mut hessian = self.A.tr_mul(&self.A);
        if damping > 0.0 {
            for i in 0..hessian.nrows() {
                hessian[(i, i)] += damping;
            }
        }
        (hessian, self.A.tr_mul(&self.b))
    }
}

/// Sparse linearization: upper triangle of $J^T J + \lambda I$ and $J^T r$.
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct HessianLinearization {
    pub A: CscMatrix<f64>,
    pub b: DVector<f64>,
    pub cost: f64,
    pub degenerate_rows: usize,
}

#[allow(non_snake_case)]
pub fn linearization_jacobian(
    factors: &[BetweenFactor],
    poses: &[Matrix4<f64>],
    line_process: &LineProcess,
) -> JacobianLinearization {
    let mut A = DMatrix::<f64>::zeros(factors.len(), POSE_DIM * poses.len());
    let mut b = DVector::<f64>::zeros(factors.len());
    let mut cost = 0.0;
    let mut degenerate_rows = 0_usize;
    for (row, f) in factors.iter().enumerate() {
        let lin = f.linearize(poses, line_process.weight(row));
        let source_col = POSE_DIM * f.source_node_id;
        let target_col = POSE_DIM * f.target_node_id;
        // accumulate, a factor on a single pose cancels out
        for k in 0..POSE_DIM {
            A[(row, source_col + k)] += lin.gradient[k];
            A[(row, target_col + k)] -= lin.gradient[k];
        }
        b[row] = lin.residual;
        cost += lin.residual * lin.residual;
        if lin.degenerate {
            degenerate_rows += 1;
        }
    }
    JacobianLinearization {
        A,
        b,
        cost,
        degenerate_rows,
    }
}

/// Builds normal equations block by block without forming $J$.
/// Every factor contributes the same entries regardless of their values, so
/// the sparsity pattern stays fixed between iterations.
#[allow(non_snake_case)]
pub fn linearization_hessian(
    factors: &[BetweenFactor],
    poses: &[Matrix4<f64>],
    line_process: &LineProcess,
    damping: f64,
) -> HessianLinearization {
    let dim = POSE_DIM * poses.len();
    let mut coo = CooMatrix::<f64>::new(dim, dim);
    let mut b = DVector::<f64>::zeros(dim);
    let mut cost = 0.0;
    let mut degenerate_rows = 0_usize;
    for i in 0..dim {
        coo.push(i, i, damping);
    }
    for (row, f) in factors.iter().enumerate() {
        let lin = f.linearize(poses, line_process.weight(row));
        cost += lin.residual * lin.residual;
        if lin.degenerate {
            degenerate_rows += 1;
        }
        if f.source_node_id == f.target_node_id {
            continue;
        }
        let g = &lin.gradient;
        let source_col = POSE_DIM * f.source_node_id;
        let target_col = POSE_DIM * f.target_node_id;
        for p in 0..POSE_DIM {
            b[source_col + p] += g[p] * lin.residual;
            b[target_col + p] -= g[p] * lin.residual;
        }
        // diagonal blocks, upper part only
        for col in [source_col, target_col] {
            for p in 0..POSE_DIM {
                for q in p..POSE_DIM {
                    coo.push(col + p, col + q, g[p] * g[q]);
                }
            }
        }
        // off-diagonal block lies fully above the diagonal
        let (upper_row, upper_col) = if source_col < target_col {
            (source_col, target_col)
        } else {
            (target_col, source_col)
        };
        for p in 0..POSE_DIM {
            for q in 0..POSE_DIM {
                coo.push(upper_row + p, upper_col + q, -g[p] * g[q]);
            }
        }
    }
    HessianLinearization {
        A: CscMatrix::from(&coo),
        b,
        cost,
        degenerate_rows,
    }
}

/// Total weighted cost $\sum_e w_e \, d_e^T \Omega_e d_e$.
pub fn error_squared_norm(
    factors: &[BetweenFactor],
    poses: &[Matrix4<f64>],
    line_process: &LineProcess,
) -> f64 {
    factors
        .iter()
        .enumerate()
        .map(|(i, f)| line_process.weight(i) * f.squared_mahalanobis(&f.error(poses)))
        .sum()
}

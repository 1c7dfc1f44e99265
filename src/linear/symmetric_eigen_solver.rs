use log::trace;
use nalgebra::{DMatrix, DVector, SymmetricEigen};

use super::linear_solver::{check_dense_system, DenseLinearSolver, LinearSolverStatus};

/// Relative size of a negative eigenvalue still accepted as round-off.
const NEGATIVE_EIGENVALUE_TOLERANCE: f64 = 1e-8;
/// Eigen iterations allowed per matrix row.
const ITERATIONS_PER_ROW: usize = 64;

/// Solves symmetric positive semi-definite systems through the eigen-decomposition
/// $A = Q \Lambda Q^T$, returning the minimum-norm solution
/// $x = Q \Lambda^{+} Q^T b$.
///
/// Pose graph normal equations are rank deficient by construction (gauge
/// freedom, one residual row per edge), so null directions are dropped
/// instead of reported.
#[derive(Debug, Clone)]
pub struct SymmetricEigenSolver {
    /// eigenvalues below `rank_tolerance * max_eigenvalue` are treated as zero
    pub rank_tolerance: f64,
}
impl Default for SymmetricEigenSolver {
    fn default() -> Self {
        SymmetricEigenSolver {
            rank_tolerance: 1e-10,
        }
    }
}
impl SymmetricEigenSolver {
    pub fn new(rank_tolerance: f64) -> Self {
        SymmetricEigenSolver { rank_tolerance }
    }
}
impl DenseLinearSolver for SymmetricEigenSolver {
    #[allow(non_snake_case)]
    fn solve(&self, A: &DMatrix<f64>, b: &DVector<f64>, x: &mut DVector<f64>) -> LinearSolverStatus {
        let status = check_dense_system(A, b, x);
        if status != LinearSolverStatus::Success {
            return status;
        }
        let n = A.nrows();
        if n == 0 {
            return LinearSolverStatus::Success;
        }
        let eigen = match SymmetricEigen::try_new(A.clone(), f64::EPSILON, ITERATIONS_PER_ROW * n) {
            Some(eigen) => eigen,
            None => return LinearSolverStatus::Invalid,
        };
        let lambda_max = eigen
            .eigenvalues
            .iter()
            .fold(0.0_f64, |m, l| m.max(l.abs()));
        if eigen
            .eigenvalues
            .iter()
            .any(|l| *l < -NEGATIVE_EIGENVALUE_TOLERANCE * lambda_max)
        {
            return LinearSolverStatus::Indefinite;
        }
        let threshold = self.rank_tolerance * lambda_max;
        let mut rank = 0_usize;
        let mut projected = eigen.eigenvectors.tr_mul(b);
        for (p, l) in projected.iter_mut().zip(eigen.eigenvalues.iter()) {
            if *l > threshold {
                *p /= *l;
                rank += 1;
            } else {
                *p = 0.0;
            }
        }
        trace!("eigen solve: dim {}, rank {}, max eigenvalue {:e}", n, rank, lambda_max);
        x.copy_from(&(&eigen.eigenvectors * projected));
        if x.iter().any(|v| !v.is_finite()) {
            return LinearSolverStatus::Invalid;
        }
        LinearSolverStatus::Success
    }
}
#[cfg(test)]
mod tests {
    use matrixcompare::assert_matrix_eq;
    use nalgebra::{dmatrix, dvector, DVector};

    use crate::linear::linear_solver::{DenseLinearSolver, LinearSolverStatus};

    use super::SymmetricEigenSolver;

    #[test]
    #[allow(non_snake_case)]
    fn lin_solve() {
        let A = dmatrix![11.0, 5.0, 0.0; 5.0, 5.0, 4.0; 0.0, 4.0, 6.0];
        let b = dvector![21.0, 27.0, 26.0];
        let solver = SymmetricEigenSolver::default();
        let mut x = DVector::zeros(3);
        let status = solver.solve(&A, &b, &mut x);
        assert_eq!(status, LinearSolverStatus::Success);
        assert_matrix_eq!(x, dvector![1.0, 2.0, 3.0], comp = abs, tol = 1e-9);
    }
    #[test]
    #[allow(non_snake_case)]
    fn minimum_norm_on_rank_deficiency() {
        let A = dmatrix![1.0, 1.0; 1.0, 1.0];
        let b = dvector![2.0, 2.0];
        let solver = SymmetricEigenSolver::default();
        let mut x = DVector::zeros(2);
        assert_eq!(solver.solve(&A, &b, &mut x), LinearSolverStatus::Success);
        assert_matrix_eq!(x, dvector![1.0, 1.0], comp = abs, tol = 1e-12);
    }
    #[test]
    #[allow(non_snake_case)]
    fn zero_system() {
        let A = dmatrix![0.0, 0.0; 0.0, 0.0];
        let b = dvector![0.0, 0.0];
        let solver = SymmetricEigenSolver::default();
        let mut x = dvector![5.0, 5.0];
        assert_eq!(solver.solve(&A, &b, &mut x), LinearSolverStatus::Success);
        assert_eq!(x, dvector![0.0, 0.0]);
    }
    #[test]
    #[allow(non_snake_case)]
    fn indefinite() {
        let A = dmatrix![1.0, 0.0; 0.0, -1.0];
        let b = dvector![1.0, 1.0];
        let mut x = DVector::zeros(2);
        let status = SymmetricEigenSolver::default().solve(&A, &b, &mut x);
        assert_eq!(status, LinearSolverStatus::Indefinite);
    }
    #[test]
    #[allow(non_snake_case)]
    fn invalid() {
        let A = dmatrix![1.0, f64::NAN; f64::NAN, 1.0];
        let b = dvector![1.0, 1.0];
        let mut x = DVector::zeros(2);
        let solver = SymmetricEigenSolver::default();
        assert_eq!(solver.solve(&A, &b, &mut x), LinearSolverStatus::Invalid);
        let A = dmatrix![1.0, 0.0; 0.0, 1.0];
        let b = dvector![1.0, 1.0, 1.0];
        assert_eq!(solver.solve(&A, &b, &mut x), LinearSolverStatus::Invalid);
    }
}

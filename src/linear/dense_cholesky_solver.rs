use nalgebra::{DMatrix, DVector};

use super::linear_solver::{check_dense_system, DenseLinearSolver, LinearSolverStatus};

/// Dense $LL^T$ solver. Fails on singular systems, so pose graphs need damping.
#[derive(Debug, Clone)]
pub struct DenseCholeskySolver {
    /// minimal squared pivot ratio $\min l_{ii}^2 / \max l_{ii}^2$
    pub pivot_tolerance: f64,
}
impl Default for DenseCholeskySolver {
    fn default() -> Self {
        DenseCholeskySolver {
            pivot_tolerance: 1e-12,
        }
    }
}
impl DenseLinearSolver for DenseCholeskySolver {
    #[allow(non_snake_case)]
    fn solve(&self, A: &DMatrix<f64>, b: &DVector<f64>, x: &mut DVector<f64>) -> LinearSolverStatus {
        let status = check_dense_system(A, b, x);
        if status != LinearSolverStatus::Success {
            return status;
        }
        if A.nrows() == 0 {
            return LinearSolverStatus::Success;
        }
        match A.clone().cholesky() {
            Some(llt) => {
                let pivots = llt.l_dirty().diagonal().map(|l| l * l);
                let max_pivot = pivots.iter().copied().fold(0.0, f64::max);
                if pivots
                    .iter()
                    .any(|p| !p.is_finite() || *p <= self.pivot_tolerance * max_pivot)
                {
                    return LinearSolverStatus::RankDeficiency;
                }
                let solution = llt.solve(b);
                if solution.iter().any(|v| !v.is_finite()) {
                    return LinearSolverStatus::RankDeficiency;
                }
                x.copy_from(&solution);
                LinearSolverStatus::Success
            }
            None => LinearSolverStatus::RankDeficiency,
        }
    }
}
#[cfg(test)]
mod tests {
    use matrixcompare::assert_matrix_eq;
    use nalgebra::{dmatrix, dvector, DVector};

    use crate::linear::linear_solver::{DenseLinearSolver, LinearSolverStatus};

    use super::DenseCholeskySolver;

    #[test]
    #[allow(non_snake_case)]
    fn lin_solve() {
        let A = dmatrix![11.0, 5.0, 0.0; 5.0, 5.0, 4.0; 0.0, 4.0, 6.0];
        let b = dvector![21.0, 27.0, 26.0];
        let solver = DenseCholeskySolver::default();
        let mut x = DVector::zeros(3);
        let status = solver.solve(&A, &b, &mut x);
        assert_eq!(status, LinearSolverStatus::Success);
        assert_matrix_eq!(x, dvector![1.0, 2.0, 3.0], comp = abs, tol = 1e-9);
    }
    #[test]
    #[allow(non_snake_case)]
    fn rank_deficiency() {
        let A = dmatrix![1.0, 1.0; 1.0, 1.0];
        let b = dvector![2.0, 2.0];
        let mut x = DVector::zeros(2);
        let status = DenseCholeskySolver::default().solve(&A, &b, &mut x);
        assert_eq!(status, LinearSolverStatus::RankDeficiency);
    }
}

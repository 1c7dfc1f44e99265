use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

/// Represents status of solving linear system
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum LinearSolverStatus {
    /// problem solve successfully
    Success,
    /// linear system has rank deficiency the solver cannot handle
    RankDeficiency,
    /// matrix is not positive semi-definite
    Indefinite,
    /// something wrong with the system, e.g. matrix size incompatible or non-finite values
    Invalid,
}
/// enum of linear solver types
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LinearSolverType {
    /// dense symmetric eigen-decomposition, minimum-norm solution
    #[default]
    SymmetricEigen,
    /// dense Cholesky factorization, requires positive definite system (use damping)
    DenseCholesky,
    /// sparse LDLt (QDLDL) of the upper triangle, requires positive definite system (use damping)
    SparseCholesky,
}
/// Provides solving of dense normal equations:
/// $$A\textbf{x}=\textbf{b}$$
/// with symmetric positive semi-definite $A$.
pub trait DenseLinearSolver {
    /// solve Ax = b, return solving status
    #[allow(non_snake_case)]
    fn solve(&self, A: &DMatrix<f64>, b: &DVector<f64>, x: &mut DVector<f64>)
        -> LinearSolverStatus;
}
/// Provides solving of sparse normal equations:
/// $$A\textbf{x}=\textbf{b}$$
/// only the upper triangle of symmetric $A$ is stored.
pub trait SparseLinearSolver {
    /// initialize the solver with sparsity pattern of system Ax = b
    /// call once before solving Ax = b share the same sparsity structure
    #[allow(non_snake_case)]
    fn initialize(&self, _A: &CscMatrix<f64>) -> LinearSolverStatus {
        LinearSolverStatus::Success
    }
    /// solve Ax = b, return solving status
    #[allow(non_snake_case)]
    fn solve(&self, A: &CscMatrix<f64>, b: &DVector<f64>, x: &mut DVector<f64>)
        -> LinearSolverStatus;
}

/// Checks dimensions and finiteness of a dense system.
#[allow(non_snake_case)]
pub(crate) fn check_dense_system(
    A: &DMatrix<f64>,
    b: &DVector<f64>,
    x: &DVector<f64>,
) -> LinearSolverStatus {
    if A.nrows() != A.ncols() || A.nrows() != b.nrows() || x.nrows() != b.nrows() {
        return LinearSolverStatus::Invalid;
    }
    if A.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return LinearSolverStatus::Invalid;
    }
    LinearSolverStatus::Success
}

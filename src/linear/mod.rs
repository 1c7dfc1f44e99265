pub mod dense_cholesky_solver;
pub mod linear_solver;
pub mod sparse_cholesky_solver;
pub mod symmetric_eigen_solver;

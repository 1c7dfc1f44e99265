use std::cell::RefCell;

use clarabel::{
    algebra,
    qdldl::{QDLDLFactorisation, QDLDLSettingsBuilder},
};
use log::trace;
use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;

use super::linear_solver::{LinearSolverStatus, SparseLinearSolver};

/// Relative residual accepted after the triangular solves.
const SOLVE_RESIDUAL_TOLERANCE: f64 = 1e-8;

/// Sparse $LDL^T$ (QDLDL) solver for the upper triangle of a symmetric matrix.
/// The symbolic factorization is kept while the sparsity pattern is unchanged.
#[derive(Default)]
pub struct SparseCholeskySolver {
    factors: RefCell<Option<QDLDLFactorisation>>,
    pattern: RefCell<Option<(Vec<usize>, Vec<usize>)>>,
}

#[allow(non_snake_case)]
fn same_pattern(pattern: &Option<(Vec<usize>, Vec<usize>)>, A: &CscMatrix<f64>) -> bool {
    match pattern {
        Some((offsets, indices)) => {
            offsets.as_slice() == A.pattern().major_offsets()
                && indices.as_slice() == A.pattern().minor_indices()
        }
        None => false,
    }
}

#[allow(non_snake_case)]
fn to_clarabel(A: &CscMatrix<f64>) -> algebra::CscMatrix {
    algebra::CscMatrix::new(
        A.nrows(),
        A.ncols(),
        A.pattern().major_offsets().to_vec(),
        A.pattern().minor_indices().to_vec(),
        A.values().to_vec(),
    )
}

/// $y = A x$ for symmetric `A` given by its upper triangle.
#[allow(non_snake_case)]
fn upper_symmetric_mul(A: &CscMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let mut y = DVector::<f64>::zeros(A.nrows());
    for (i, j, v) in A.triplet_iter() {
        y[i] += v * x[j];
        if i != j {
            y[j] += v * x[i];
        }
    }
    y
}

impl SparseLinearSolver for SparseCholeskySolver {
    #[allow(non_snake_case)]
    fn initialize(&self, A: &CscMatrix<f64>) -> LinearSolverStatus {
        let opts = match QDLDLSettingsBuilder::default()
            .logical(true)
            .regularize_enable(false)
            .build()
        {
            Ok(opts) => opts,
            Err(_) => return LinearSolverStatus::Invalid,
        };
        match QDLDLFactorisation::new(&to_clarabel(A), Some(opts)) {
            Ok(factors) => {
                *self.factors.borrow_mut() = Some(factors);
                *self.pattern.borrow_mut() = Some((
                    A.pattern().major_offsets().to_vec(),
                    A.pattern().minor_indices().to_vec(),
                ));
                LinearSolverStatus::Success
            }
            Err(_) => {
                *self.factors.borrow_mut() = None;
                *self.pattern.borrow_mut() = None;
                LinearSolverStatus::RankDeficiency
            }
        }
    }

    #[allow(non_snake_case)]
    fn solve(&self, A: &CscMatrix<f64>, b: &DVector<f64>, x: &mut DVector<f64>) -> LinearSolverStatus {
        if A.nrows() != A.ncols() || A.nrows() != b.nrows() || x.nrows() != b.nrows() {
            return LinearSolverStatus::Invalid;
        }
        if A.values().iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return LinearSolverStatus::Invalid;
        }
        if A.nrows() == 0 {
            return LinearSolverStatus::Success;
        }
        // (re)build symbolic factorization when the pattern changed
        if !same_pattern(&self.pattern.borrow(), A) {
            let status = self.initialize(A);
            if status != LinearSolverStatus::Success {
                return status;
            }
        }
        let mut bv: Vec<f64> = b.iter().copied().collect();
        {
            let mut factors = self.factors.borrow_mut();
            let factors = match factors.as_mut() {
                Some(factors) => factors,
                None => return LinearSolverStatus::Invalid,
            };
            let indices: Vec<usize> = (0..A.nnz()).collect();
            factors.update_values(indices.as_slice(), A.values());
            if factors.refactor().is_err() {
                return LinearSolverStatus::RankDeficiency;
            }
            factors.solve(&mut bv);
        }
        if bv.iter().any(|v| !v.is_finite()) {
            return LinearSolverStatus::RankDeficiency;
        }
        let solution = DVector::from_vec(bv);
        let residual = (upper_symmetric_mul(A, &solution) - b).norm();
        trace!("qdldl solve residual {:e}", residual);
        if residual > SOLVE_RESIDUAL_TOLERANCE * b.norm().max(1.0) {
            return LinearSolverStatus::RankDeficiency;
        }
        x.copy_from(&solution);
        LinearSolverStatus::Success
    }
}

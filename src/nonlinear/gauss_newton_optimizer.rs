use nalgebra::{DVector, Matrix4, Vector6};

use crate::{
    linear::{
        dense_cholesky_solver::DenseCholeskySolver,
        linear_solver::{DenseLinearSolver, LinearSolverStatus, LinearSolverType, SparseLinearSolver},
        sparse_cholesky_solver::SparseCholeskySolver,
        symmetric_eigen_solver::SymmetricEigenSolver,
    },
    slam::{between_factor::BetweenFactor, line_process::LineProcess, se3},
};

use super::{
    linearization::{linearization_hessian, linearization_jacobian, POSE_DIM},
    nonlinear_optimizer::{IterationData, NonlinearOptimizerParams, OptIterate, OptimizerBaseParams},
};

#[derive(Debug, Clone)]
pub struct GaussNewtonOptimizerParams {
    /// linear solver for the normal equations
    pub linear_solver_type: LinearSolverType,
    /// Levenberg damping added to the normal matrix diagonal
    pub damping: f64,
    /// relative eigenvalue cut-off of the eigen solver
    pub rank_tolerance: f64,
    //base params
    pub base: NonlinearOptimizerParams,
}
impl Default for GaussNewtonOptimizerParams {
    fn default() -> Self {
        GaussNewtonOptimizerParams {
            linear_solver_type: LinearSolverType::SymmetricEigen,
            damping: 0.0,
            rank_tolerance: 1e-10,
            base: NonlinearOptimizerParams::default(),
        }
    }
}
impl OptimizerBaseParams for GaussNewtonOptimizerParams {
    fn base(&self) -> &NonlinearOptimizerParams {
        &self.base
    }
}

#[derive(Default)]
pub struct GaussNewtonOptimizer {
    pub params: GaussNewtonOptimizerParams,
    sparse_solver: SparseCholeskySolver,
}
impl GaussNewtonOptimizer {
    pub fn with_params(params: GaussNewtonOptimizerParams) -> Self {
        GaussNewtonOptimizer {
            params,
            sparse_solver: SparseCholeskySolver::default(),
        }
    }
    /// Solves $H \Delta = -b$ at `poses`, returns $\Delta$ and the cost at the
    /// linearization point.
    fn solve_step(
        &self,
        factors: &[BetweenFactor],
        poses: &[Matrix4<f64>],
        line_process: &LineProcess,
    ) -> Result<(DVector<f64>, f64, usize), LinearSolverStatus> {
        let mut dx = DVector::<f64>::zeros(POSE_DIM * poses.len());
        let (status, cost, degenerate_rows) = match self.params.linear_solver_type {
            LinearSolverType::SymmetricEigen | LinearSolverType::DenseCholesky => {
                let lin = linearization_jacobian(factors, poses, line_process);
                let (hessian, gradient) = lin.normal_equations(self.params.damping);
                let status = if self.params.linear_solver_type == LinearSolverType::SymmetricEigen {
                    SymmetricEigenSolver::new(self.params.rank_tolerance)
                        .solve(&hessian, &gradient, &mut dx)
                } else {
                    DenseCholeskySolver::default().solve(&hessian, &gradient, &mut dx)
                };
                (status, lin.cost, lin.degenerate_rows)
            }
            LinearSolverType::SparseCholesky => {
                let lin = linearization_hessian(factors, poses, line_process, self.params.damping);
                let status = self.sparse_solver.solve(&lin.A, &lin.b, &mut dx);
                (status, lin.cost, lin.degenerate_rows)
            }
        };
        if status != LinearSolverStatus::Success {
            return Err(status);
        }
        // since Hx=-b
        dx.neg_mut();
        if dx.iter().any(|v| !v.is_finite()) {
            return Err(LinearSolverStatus::Invalid);
        }
        Ok((dx, cost, degenerate_rows))
    }
}

/// Left-multiplicative update $T_k \leftarrow \exp(\Delta_k) T_k$.
/// All corrections are formed before any pose is written.
pub fn retract(poses: &mut [Matrix4<f64>], dx: &DVector<f64>) {
    let corrections: Vec<Matrix4<f64>> = (0..poses.len())
        .map(|k| {
            let delta: Vector6<f64> = dx.fixed_rows::<POSE_DIM>(POSE_DIM * k).into_owned();
            se3::from_tangent(&delta)
        })
        .collect();
    for (pose, correction) in poses.iter_mut().zip(corrections.iter()) {
        *pose = correction * *pose;
    }
}

impl OptIterate for GaussNewtonOptimizer {
    fn iterate(
        &mut self,
        factors: &[BetweenFactor],
        poses: &mut [Matrix4<f64>],
        line_process: &LineProcess,
    ) -> Result<IterationData, LinearSolverStatus> {
        let (dx, cost, degenerate_rows) = self.solve_step(factors, poses, line_process)?;
        retract(poses, &dx);
        Ok(IterationData {
            cost,
            step_norm: dx.norm(),
            degenerate_rows,
        })
    }

    fn base_params(&self) -> &NonlinearOptimizerParams {
        self.params.base()
    }
}

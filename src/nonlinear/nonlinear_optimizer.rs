use log::{debug, info, warn};
use nalgebra::{Matrix4, Matrix6};

use crate::{
    core::{
        error::NonlinearOptimizationError,
        pose_graph::{PoseEdge, PoseGraph, PoseNode},
    },
    linear::linear_solver::LinearSolverStatus,
    slam::{between_factor::BetweenFactor, line_process::LineProcess},
};

use super::{
    gauss_newton_optimizer::{GaussNewtonOptimizer, GaussNewtonOptimizerParams},
    linearization::error_squared_norm,
    stopping_criterion::{IterationState, StoppingCriterion, StoppingCriterionType},
};

/// return status of a finished nonlinear optimization
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NonlinearOptimizationStatus {
    /// stopping criterion fired
    Converged,
    /// iteration budget exhausted before the stopping criterion fired
    MaxIterations,
    /// a step increased the cost, poses before that step are returned
    ErrorIncrease,
}

/// Relative cost increase still accepted as round-off.
const ERROR_INCREASE_TOLERANCE: f64 = 1e-12;

// enum of nonlinear optimization verbosity level
#[derive(PartialOrd, Ord, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum NonlinearOptimizerVerbosityLevel {
    /// only log warnings when optimization terminates abnormally. Default verbosity level
    #[default]
    Warning,
    /// log per-iteration cost, initial cost and termination
    Iteration,
    /// log more per-iteration detail, e.g. step norm and switch weights
    Subiteration,
}
/// base class for nonlinear optimization settings
#[derive(Debug, Clone)]
pub struct NonlinearOptimizerParams {
    /// max number of iterations
    pub max_iterations: usize,
    /// threshold of the stopping criterion, `None` runs all iterations
    pub stopping_threshold: Option<f64>,
    /// which built-in criterion `stopping_threshold` applies to
    pub stopping_criterion: StoppingCriterionType,
    /// down-weight loop closures by the line process
    pub enable_robust_weighting: bool,
    /// warning verbosity
    pub verbosity_level: NonlinearOptimizerVerbosityLevel,
}
impl Default for NonlinearOptimizerParams {
    fn default() -> Self {
        NonlinearOptimizerParams {
            max_iterations: 100,
            stopping_threshold: None,
            stopping_criterion: StoppingCriterionType::ErrorDecrease,
            enable_robust_weighting: true,
            verbosity_level: NonlinearOptimizerVerbosityLevel::Warning,
        }
    }
}
pub trait OptimizerBaseParams {
    fn base(&self) -> &NonlinearOptimizerParams;
}

/// Outcome of one successful iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationData {
    /// weighted cost at the linearization point
    pub cost: f64,
    /// norm of the applied tangent correction
    pub step_norm: f64,
    /// factors whose gradient was zeroed
    pub degenerate_rows: usize,
}

pub trait OptIterate {
    /// method to run a single iteration to update poses
    /// use to implement your own optimization iterate procedure
    /// - on success the poses are updated
    /// - on failure the poses are left untouched
    fn iterate(
        &mut self,
        factors: &[BetweenFactor],
        poses: &mut [Matrix4<f64>],
        line_process: &LineProcess,
    ) -> Result<IterationData, LinearSolverStatus>;
    fn base_params(&self) -> &NonlinearOptimizerParams;
}

/// Statistics of a finished optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationSummary {
    pub status: NonlinearOptimizationStatus,
    /// number of completed iterations
    pub iterations: usize,
    /// cost of the input poses with unit weights
    pub initial_cost: f64,
    /// cost of the output poses with the final weights
    pub final_cost: f64,
    /// final weight of every edge in input order, 1.0 for sequential edges
    pub line_process_weights: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub graph: PoseGraph,
    pub summary: OptimizationSummary,
}

pub struct NonlinearOptimizer<O = GaussNewtonOptimizer>
where
    O: OptIterate,
{
    /// optimizer that implement iteration function
    pub opt: O,
}

pub type PoseGraphOptimizer = NonlinearOptimizer<GaussNewtonOptimizer>;

impl<O> Default for NonlinearOptimizer<O>
where
    O: OptIterate + Default,
{
    fn default() -> Self {
        NonlinearOptimizer { opt: O::default() }
    }
}

impl PoseGraphOptimizer {
    pub fn with_params(params: GaussNewtonOptimizerParams) -> Self {
        NonlinearOptimizer {
            opt: GaussNewtonOptimizer::with_params(params),
        }
    }
}

impl<O> NonlinearOptimizer<O>
where
    O: OptIterate,
{
    pub fn new(opt: O) -> Self {
        NonlinearOptimizer { opt }
    }
    /// Optimizes with the stopping criterion configured in params.
    /// The input graph is never modified.
    pub fn optimize(
        &mut self,
        graph: &PoseGraph,
    ) -> Result<OptimizationResult, NonlinearOptimizationError> {
        self.optimize_with_callback(graph, |_, _| {})
    }
    /// Like [`Self::optimize`], `callback` receives `(iteration, cost)` once per iteration.
    pub fn optimize_with_callback<C>(
        &mut self,
        graph: &PoseGraph,
        mut callback: C,
    ) -> Result<OptimizationResult, NonlinearOptimizationError>
    where
        C: FnMut(usize, f64),
    {
        let base = self.opt.base_params();
        let mut criterion = base.stopping_criterion.build(base.stopping_threshold);
        self.run(graph, criterion.as_mut(), &mut callback)
    }
    /// Optimizes with a caller-provided stopping criterion, params' criterion is ignored.
    pub fn optimize_with_criterion<S, C>(
        &mut self,
        graph: &PoseGraph,
        mut criterion: S,
        mut callback: C,
    ) -> Result<OptimizationResult, NonlinearOptimizationError>
    where
        S: StoppingCriterion,
        C: FnMut(usize, f64),
    {
        self.run(graph, &mut criterion, &mut callback)
    }

    fn run(
        &mut self,
        graph: &PoseGraph,
        criterion: &mut dyn StoppingCriterion,
        callback: &mut dyn FnMut(usize, f64),
    ) -> Result<OptimizationResult, NonlinearOptimizationError> {
        graph.validate()?;
        let params = self.opt.base_params().clone();
        let factors = BetweenFactor::from_edges(&graph.edges);
        let mut poses = graph.poses();
        let mut line_process = LineProcess::new(&factors);

        let initial_cost = error_squared_norm(&factors, &poses, &line_process);
        if params.verbosity_level >= NonlinearOptimizerVerbosityLevel::Iteration {
            info!(
                "nodes: {}, edges: {}, loop edges: {}, initial error: {:e}",
                poses.len(),
                factors.len(),
                graph.loop_edges_count(),
                initial_cost
            );
        }

        let mut status = NonlinearOptimizationStatus::MaxIterations;
        let mut iterations = 0_usize;
        while iterations < params.max_iterations {
            let iteration = iterations;
            let previous_poses = poses.clone();
            let data = match self.opt.iterate(&factors, &mut poses, &line_process) {
                Ok(data) => data,
                Err(status) => {
                    warn!(
                        "linear solver failed at iteration {}: {:?}, optimization aborted",
                        iteration, status
                    );
                    return Err(NonlinearOptimizationError::DegenerateSystem { iteration, status });
                }
            };
            iterations += 1;
            let cost_before = data.cost;
            callback(iteration, cost_before);
            if params.verbosity_level >= NonlinearOptimizerVerbosityLevel::Iteration {
                info!("iteration: {}, error: {:e}", iteration, cost_before);
            }

            // same weights as the linearization
            let cost_after = error_squared_norm(&factors, &poses, &line_process);
            if cost_after - cost_before > 1e-20 + ERROR_INCREASE_TOLERANCE * cost_before {
                warn!(
                    "optimizer cannot decrease error at iteration {}: {:e} -> {:e}",
                    iteration, cost_before, cost_after
                );
                poses = previous_poses;
                status = NonlinearOptimizationStatus::ErrorIncrease;
                break;
            }
            if params.enable_robust_weighting {
                line_process.refresh(&factors, &poses);
            }
            if params.verbosity_level >= NonlinearOptimizerVerbosityLevel::Subiteration {
                debug!(
                    "iteration: {}, error after update: {:e}, step norm: {:e}, degenerate rows: {}, loop weights: {:?}",
                    iteration,
                    cost_after,
                    data.step_norm,
                    data.degenerate_rows,
                    line_process.weights()
                );
            }

            let state = IterationState {
                iteration,
                cost_before,
                cost_after,
                step_norm: data.step_norm,
            };
            if criterion.should_stop(&state) {
                status = NonlinearOptimizationStatus::Converged;
                break;
            }
        }

        let final_cost = error_squared_norm(&factors, &poses, &line_process);
        if params.verbosity_level >= NonlinearOptimizerVerbosityLevel::Iteration {
            match status {
                NonlinearOptimizationStatus::Converged => info!(
                    "reach stop condition after {} iterations, final error: {:e}",
                    iterations, final_cost
                ),
                NonlinearOptimizationStatus::MaxIterations => info!(
                    "reach max iterations {}, final error: {:e}",
                    iterations, final_cost
                ),
                NonlinearOptimizationStatus::ErrorIncrease => info!(
                    "stopped on error increase after {} iterations, final error: {:e}",
                    iterations, final_cost
                ),
            }
        }

        let edges = factors
            .iter()
            .map(|f| {
                PoseEdge::new(
                    f.source_node_id,
                    f.target_node_id,
                    f.error_transform(&poses),
                    Matrix6::identity(),
                    false,
                )
            })
            .collect();
        let line_process_weights = (0..factors.len()).map(|i| line_process.weight(i)).collect();
        Ok(OptimizationResult {
            graph: PoseGraph {
                nodes: poses.into_iter().map(PoseNode::new).collect(),
                edges,
            },
            summary: OptimizationSummary {
                status,
                iterations,
                initial_cost,
                final_cost,
                line_process_weights,
            },
        })
    }
}

/// Optimizes `graph` with `params` and returns the optimized copy.
pub fn global_optimization(
    graph: &PoseGraph,
    params: &GaussNewtonOptimizerParams,
) -> Result<PoseGraph, NonlinearOptimizationError> {
    PoseGraphOptimizer::with_params(params.clone())
        .optimize(graph)
        .map(|result| result.graph)
}
#[cfg(test)]
mod tests {
    use matrixcompare::assert_matrix_eq;
    use nalgebra::{Matrix4, Matrix6, Vector3};

    use crate::{
        core::{
            error::{InvalidGraphError, NonlinearOptimizationError},
            pose_graph::{PoseEdge, PoseGraph},
        },
        linear::linear_solver::LinearSolverStatus,
        nonlinear::{
            gauss_newton_optimizer::GaussNewtonOptimizerParams,
            stopping_criterion::{IterationState, NeverStop},
        },
        slam::se3,
    };

    use super::*;

    fn translation(x: f64) -> Matrix4<f64> {
        se3::from_rotation_translation(&Vector3::zeros(), &Vector3::new(x, 0.0, 0.0))
    }

    fn chain_with_loop() -> PoseGraph {
        let mut graph = PoseGraph::new();
        graph.add_node(Matrix4::identity());
        graph.add_node(translation(1.03));
        graph.add_node(translation(2.02));
        graph.add_edge(PoseEdge::new(0, 1, translation(-1.0), Matrix6::identity(), false));
        graph.add_edge(PoseEdge::new(1, 2, translation(-1.0), Matrix6::identity(), false));
        graph.add_edge(PoseEdge::new(2, 0, translation(2.1), Matrix6::identity(), true));
        graph
    }

    #[test]
    fn callback_and_criterion_order() {
        let graph = chain_with_loop();
        let mut costs = Vec::new();
        let mut states = Vec::<IterationState>::new();
        let mut optimizer = PoseGraphOptimizer::default();
        let result = optimizer
            .optimize_with_criterion(
                &graph,
                |s: &IterationState| {
                    states.push(*s);
                    s.iteration == 2
                },
                |i, c| costs.push((i, c)),
            )
            .unwrap();
        assert_eq!(result.summary.status, NonlinearOptimizationStatus::Converged);
        assert_eq!(result.summary.iterations, 3);
        assert_eq!(costs.len(), 3);
        assert_eq!(states.len(), 3);
        for (k, ((i, c), s)) in costs.iter().zip(states.iter()).enumerate() {
            assert_eq!(*i, k);
            assert_eq!(s.iteration, k);
            assert_eq!(*c, s.cost_before);
        }
        assert!((costs[0].1 - result.summary.initial_cost).abs() < 1e-15);
    }
    #[test]
    fn never_stop_runs_budget() {
        let graph = chain_with_loop();
        let mut params = GaussNewtonOptimizerParams::default();
        params.base.max_iterations = 7;
        let mut optimizer = PoseGraphOptimizer::with_params(params);
        let result = optimizer
            .optimize_with_criterion(&graph, NeverStop, |_, _| {})
            .unwrap();
        assert_eq!(result.summary.status, NonlinearOptimizationStatus::MaxIterations);
        assert_eq!(result.summary.iterations, 7);
    }
    #[test]
    fn zero_iterations() {
        let graph = chain_with_loop();
        let mut params = GaussNewtonOptimizerParams::default();
        params.base.max_iterations = 0;
        let result = PoseGraphOptimizer::with_params(params).optimize(&graph).unwrap();
        assert_eq!(result.summary.iterations, 0);
        assert_eq!(result.summary.status, NonlinearOptimizationStatus::MaxIterations);
        assert_eq!(result.graph.poses(), graph.poses());
        assert_eq!(result.summary.final_cost, result.summary.initial_cost);
        assert_eq!(result.summary.line_process_weights, vec![1.0; 3]);
    }
    #[test]
    fn weights_reported_per_edge() {
        let graph = chain_with_loop();
        let result = PoseGraphOptimizer::default().optimize(&graph).unwrap();
        let w = &result.summary.line_process_weights;
        assert_eq!(w.len(), 3);
        assert_eq!(w[0], 1.0);
        assert_eq!(w[1], 1.0);
        assert!(w[2] > 0.0 && w[2] <= 1.0);
    }
    #[test]
    fn output_edges() {
        let graph = chain_with_loop();
        let result = PoseGraphOptimizer::default().optimize(&graph).unwrap();
        assert_eq!(result.graph.nodes.len(), graph.nodes.len());
        assert_eq!(result.graph.edges.len(), graph.edges.len());
        for (out, inp) in result.graph.edges.iter().zip(graph.edges.iter()) {
            assert_eq!(out.source_node_id, inp.source_node_id);
            assert_eq!(out.target_node_id, inp.target_node_id);
            assert_eq!(out.information, Matrix6::identity());
            assert!(!out.uncertain);
            let ti = result.graph.nodes[out.source_node_id].pose;
            let tj = result.graph.nodes[out.target_node_id].pose;
            let expected = se3::inverse(&inp.transformation) * se3::inverse(&tj) * ti;
            assert_matrix_eq!(out.transformation, expected, comp = abs, tol = 1e-12);
        }
    }
    /// Moves pose 1 along x on every call.
    struct Pushing {
        params: NonlinearOptimizerParams,
    }
    impl OptIterate for Pushing {
        fn iterate(
            &mut self,
            factors: &[BetweenFactor],
            poses: &mut [Matrix4<f64>],
            line_process: &LineProcess,
        ) -> Result<IterationData, LinearSolverStatus> {
            let cost = error_squared_norm(factors, poses, line_process);
            poses[1] *= translation(0.5);
            Ok(IterationData {
                cost,
                step_norm: 0.5,
                degenerate_rows: 0,
            })
        }
        fn base_params(&self) -> &NonlinearOptimizerParams {
            &self.params
        }
    }
    #[test]
    fn rising_cost_restores_poses() {
        let graph = chain_with_loop();
        let mut calls = 0;
        let mut optimizer = NonlinearOptimizer::new(Pushing {
            params: NonlinearOptimizerParams::default(),
        });
        let result = optimizer
            .optimize_with_criterion(&graph, NeverStop, |_, _| calls += 1)
            .unwrap();
        assert_eq!(result.summary.status, NonlinearOptimizationStatus::ErrorIncrease);
        assert_eq!(result.summary.iterations, 1);
        assert_eq!(calls, 1);
        assert_eq!(result.graph.poses(), graph.poses());
        assert_eq!(result.summary.final_cost, result.summary.initial_cost);
        assert_eq!(result.summary.line_process_weights, vec![1.0; 3]);
    }
    #[test]
    fn errors() {
        let empty = PoseGraph::new();
        assert_eq!(
            PoseGraphOptimizer::default().optimize(&empty).unwrap_err(),
            NonlinearOptimizationError::InvalidGraph(InvalidGraphError::EmptyNodes)
        );
        let mut graph = chain_with_loop();
        graph.edges[1].information[(2, 2)] = f64::NAN;
        let mut calls = 0;
        let err = PoseGraphOptimizer::default()
            .optimize_with_callback(&graph, |_, _| calls += 1)
            .unwrap_err();
        assert_eq!(
            err,
            NonlinearOptimizationError::DegenerateSystem {
                iteration: 0,
                status: LinearSolverStatus::Invalid
            }
        );
        assert_eq!(calls, 0);
    }
}

pub use crate::{
    core::{
        error::{InvalidGraphError, NonlinearOptimizationError},
        pose_graph::{PoseEdge, PoseGraph, PoseNode},
    },
    linear::linear_solver::{LinearSolverStatus, LinearSolverType},
    nonlinear::{
        gauss_newton_optimizer::{GaussNewtonOptimizer, GaussNewtonOptimizerParams},
        nonlinear_optimizer::{
            global_optimization, NonlinearOptimizationStatus, NonlinearOptimizer,
            NonlinearOptimizerParams, NonlinearOptimizerVerbosityLevel, OptIterate,
            OptimizationResult, OptimizationSummary, PoseGraphOptimizer,
        },
        stopping_criterion::{
            ErrorDecrease, IterationState, NeverStop, StepNorm, StoppingCriterion,
            StoppingCriterionType,
        },
    },
    slam::{line_process::LineProcess, se3},
};

use std::error::Error;
use std::time::Instant;

use nalgebra::{Matrix4, Matrix6, Vector6};
use switchgraph::prelude::{
    se3, GaussNewtonOptimizerParams, LinearSolverType, NonlinearOptimizerVerbosityLevel,
    PoseEdge, PoseGraph, PoseGraphOptimizer,
};

/// Ring trajectory with drifting odometry, correct loop closures and one
/// wrong loop closure that the line process should switch off.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let vcnt = 40;
    let yaw = std::f64::consts::TAU / vcnt as f64;
    let step = se3::from_tangent(&Vector6::new(0.0, 0.0, yaw, -1.0, 0.0, 0.0));
    let drift = se3::from_tangent(&Vector6::new(0.002, -0.001, 0.01, 0.02, 0.01, 0.0));

    let mut graph = PoseGraph::new();
    let mut pose = Matrix4::identity();
    for _ in 0..vcnt {
        graph.add_node(pose);
        pose = drift * pose * se3::inverse(&step);
    }
    for i in 0..vcnt - 1 {
        graph.add_edge(PoseEdge::new(i, i + 1, step, Matrix6::identity(), false));
    }
    // loop closures around the ring
    let mut closing = Matrix4::identity();
    for _ in 0..vcnt - 1 {
        closing *= step;
    }
    graph.add_edge(PoseEdge::new(0, vcnt - 1, closing, Matrix6::identity(), true));
    let mut half = Matrix4::identity();
    for _ in 0..vcnt / 2 {
        half *= step;
    }
    graph.add_edge(PoseEdge::new(0, vcnt / 2, half, Matrix6::identity(), true));
    // outlier
    let wrong = se3::from_tangent(&Vector6::new(0.3, 0.0, 0.5, 4.0, -2.0, 1.0));
    graph.add_edge(PoseEdge::new(5, 30, wrong, Matrix6::identity(), true));

    let mut params = GaussNewtonOptimizerParams::default();
    params.linear_solver_type = LinearSolverType::SparseCholesky;
    params.damping = 10.0;
    params.base.stopping_threshold = Some(1e-9);
    params.base.verbosity_level = NonlinearOptimizerVerbosityLevel::Iteration;
    let mut optimizer = PoseGraphOptimizer::with_params(params);

    let start = Instant::now();
    let result = optimizer.optimize_with_callback(&graph, |iteration, cost| {
        println!("iteration: {:>3}, cost: {:.6e}", iteration, cost);
    })?;
    let duration = start.elapsed();

    let summary = &result.summary;
    println!(
        "status: {:?}, iterations: {}, initial cost: {:.6e}, final cost: {:.6e}",
        summary.status, summary.iterations, summary.initial_cost, summary.final_cost
    );
    for (edge, weight) in graph.edges.iter().zip(summary.line_process_weights.iter()) {
        if edge.is_loop() {
            println!(
                "loop {:>2} -> {:>2} weight {:.4}",
                edge.source_node_id, edge.target_node_id, weight
            );
        }
    }
    println!("optimization time: {:?}", duration);
    Ok(())
}

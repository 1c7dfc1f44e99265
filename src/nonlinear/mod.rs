pub mod gauss_newton_optimizer;
pub mod linearization;
pub mod nonlinear_optimizer;
pub mod stopping_criterion;

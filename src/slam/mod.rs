pub mod between_factor;
pub mod line_process;
pub mod se3;

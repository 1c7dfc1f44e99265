pub mod core;
pub mod linear;
pub mod nonlinear;
pub mod prelude;
pub mod slam;

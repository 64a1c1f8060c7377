pub mod evaluation;
pub mod models;
pub mod resolver;
pub mod solar_adjustment;
pub(crate) mod solvers;

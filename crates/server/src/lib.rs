pub mod errors;
pub mod rate_limit;
pub mod routes;
pub mod startup;

pub use startup::{run, run_with_config};

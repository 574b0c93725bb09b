//! The `utils` module collects what every other module leans on: error types,
//! logging setup, and the environment (clock + randomness) abstraction.

pub mod env;
pub mod error;
pub mod logging;

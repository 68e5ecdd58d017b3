//! Shared wire model for the studyroom relay and its clients.

pub mod model;
pub mod utils;

pub use model::*;

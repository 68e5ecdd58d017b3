mod link;
mod manager;
mod pending;

pub use link::*;
pub use manager::*;
pub use pending::*;

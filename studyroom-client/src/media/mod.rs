mod controller;
mod devices;
mod track;

pub use controller::*;
pub use devices::*;
pub use track::*;

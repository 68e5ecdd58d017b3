mod event;
mod handle;
mod session;

pub use event::*;
pub use handle::*;
pub use session::*;

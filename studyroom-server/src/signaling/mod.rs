mod connections;
mod outbound;
mod ws_handler;

pub use connections::*;
pub use outbound::*;
pub use ws_handler::*;

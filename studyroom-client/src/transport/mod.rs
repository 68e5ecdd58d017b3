mod peer_transport;
mod rtc;

pub use peer_transport::*;
pub use rtc::*;

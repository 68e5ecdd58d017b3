pub mod peer_harness;
pub mod session_helpers;

pub use fake_devices::*;
pub use fake_transport::*;
pub use peer_harness::*;
pub use session_helpers::*;

//! Participant side of a studyroom session.
//!
//! A [`Session`] connects to the relay, acquires local media and keeps one
//! peer link per remote member of the room. The application drives it
//! through a [`SessionHandle`] and follows it through [`SessionEvent`]s.

mod board;
mod config;
mod error;
mod media;
mod peer;
mod session;
mod signaling;
mod transport;

pub use board::*;
pub use config::*;
pub use error::*;
pub use media::*;
pub use peer::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;

pub use studyroom_core::model::{ParticipantId, RoomId};

pub mod model {
    pub use studyroom_core::model::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use studyroom_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use studyroom_client::*;
}

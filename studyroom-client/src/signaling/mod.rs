mod relay_connection;

pub use relay_connection::*;

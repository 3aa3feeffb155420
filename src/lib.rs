pub mod common;
pub mod configs;
pub mod protocol;
pub mod recording;
pub mod rooms;
pub mod server;
pub mod transport;
pub mod ws;

pub mod handler;
pub mod ops;
pub mod signaling;

pub use handler::websocket_handler;

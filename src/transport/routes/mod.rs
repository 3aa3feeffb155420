pub mod recordings;
pub mod rooms;

pub mod events;
pub mod messages;
pub mod models;

pub use events::*;
pub use messages::*;
pub use models::*;

pub mod base;
pub mod recording;
pub mod server;

pub use base::*;
pub use recording::*;
pub use server::*;

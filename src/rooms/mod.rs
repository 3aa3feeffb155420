pub mod directory;
pub mod room;

pub use directory::*;
pub use room::*;

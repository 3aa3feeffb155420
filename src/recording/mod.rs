pub mod recorder;
pub mod session;
pub mod store;

pub use recorder::*;
pub use session::*;
pub use store::*;

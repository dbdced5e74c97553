pub mod filter;
pub mod partition;
pub mod repository;

pub use filter::*;
pub use partition::*;
pub use repository::*;

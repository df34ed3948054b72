pub mod attacks;
pub mod loader;
pub mod precompute;
pub mod rays;
pub mod search;
pub mod structs;

pub use rays::{between, line};
pub use structs::MagicTables;

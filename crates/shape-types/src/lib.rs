pub mod color;
pub mod filter;
pub mod selection;
pub mod shape;

pub use color::*;
pub use filter::*;
pub use selection::*;
pub use shape::*;

//! Safe SQL builder: identifiers are fixed in code, values are parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;

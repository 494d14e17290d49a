//! Domain records and their wire shapes.

pub mod asset;
pub mod exam;
pub mod imaging;
pub mod user;

pub use asset::*;
pub use exam::*;
pub use imaging::*;
pub use user::*;

//! Token authentication, password hashing and permission checks.

pub mod extractor;
pub mod password;
pub mod permissions;
pub mod token;

pub use extractor::{AuthUser, MaybeAuthUser};
pub use permissions::{require_staff, staff_or_owner};

//! Per-resource services: validation, permission rules and sub-record merging on top of the store.

pub mod assets;
pub mod auth;
pub mod doctors;
pub mod exams;
pub mod imaging;
pub mod merge;
pub mod users;
pub mod validation;

pub use assets::AssetService;
pub use auth::{AuthService, LoginResponse};
pub use doctors::DoctorService;
pub use exams::ExamService;
pub use imaging::{ImagingService, Scope};
pub use users::UserService;
pub use validation::{FieldRule, Format, Mode, RequestValidator};

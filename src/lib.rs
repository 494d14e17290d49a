//! clinic-admin: REST backend for hospital administration. IT assets, staff users with
//! profile and doctor records, the imaging exam catalog, imaging requests with audit
//! history and a printable request form.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod models;
pub mod openapi;
pub mod report;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::Settings;
pub use error::{AppError, ConfigError, FieldErrors};
pub use migration::{apply_migrations, ensure_database_exists};
pub use response::{success_many, success_one, success_one_ok};
pub use routes::{api_routes, app, common_routes, service};
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Store};

//! CLI command implementations.

pub mod admin;
pub mod serve;
pub mod status;

pub use admin::run_admin;
pub use serve::run_serve;
pub use status::run_status;

//! # API Layer
//!
//! Error taxonomy and response shaping at the outer boundary.
//!
//! Every failure, whatever its origin (engine, driver, permission check,
//! request parsing), is converted to [`ApiError`] exactly once before it
//! leaves the crate.

mod errors;
mod response;
pub mod translate;

pub use errors::{ApiError, ApiResult, ErrorShape};
pub use response::{
    fmt_content_range, parse_range_header, ApiResponse, ContentRange, DbResponseRow,
};
pub use translate::{
    status_for_db_error, status_from_mysql_code, status_from_pg_code, status_from_sqlite_code,
};

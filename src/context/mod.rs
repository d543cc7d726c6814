//! Request context propagation into SQL-visible state.

mod env;
mod formatter;
mod store;

pub use env::Env;
pub use formatter::{
    fmt_env, fmt_mysql_env, fmt_postgresql_env, DUMMY_ENV_KEY, DUMMY_ENV_VALUE,
    MYSQL_IDS_VAR, MYSQL_IGNORED_IDS_VAR,
};
pub use store::{ContextScope, ContextStore, JWT_CLAIMS_KEY};

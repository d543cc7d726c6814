//! Request authentication
//!
//! Bearer tokens are optional; requests without one run as the anonymous
//! role.

mod errors;
mod jwt;

pub use errors::{AuthError, AuthResult};
pub use jwt::{AuthContext, JwtAuthenticator};

//! Request normalization across host request shapes.

mod errors;
mod normalizer;

pub use errors::{RequestError, RequestResult};
pub use normalizer::{BoxError, BufferedBody, HostRequest, NormalizedRequest, RequestBody};

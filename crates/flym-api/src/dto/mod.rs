//! Data transfer objects.

pub mod request;
pub mod response;

//! Library surface for the transport adaptor binary, split out so
//! integration tests can drive the router directly (`tower::ServiceExt::oneshot`)
//! without binding a socket.

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;

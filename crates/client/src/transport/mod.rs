//! Concrete transports for the injected external calls.

pub mod http;

pub use http::{HttpAuthenticator, HttpTransport};

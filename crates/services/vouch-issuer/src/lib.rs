//! HTTP issuer for achievement credentials.
//!
//! Serves a configurable set of offerings, each issuing a signed VC-JWT to the
//! subject DID posted to it, plus a `/verify` endpoint backed by the same
//! resolver the holder uses.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;

pub use app::create_app;
pub use config::{IssuerConfig, Offering};
pub use handlers::AppState;

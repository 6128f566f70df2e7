//! A configuration and credential façade for a TURN relay service
//!
//! This crate provides time-limited TURN credential issuance following the
//! REST-style long-term credential mechanism, together with the
//! configuration resolution and lifecycle management that front a relay
//! engine. The relay engine itself is consumed through the `RelayEngine`
//! trait; `UdpRelayEngine` is the default backend.

mod auth;
mod config;
mod engine;
mod error;
mod service;
mod types;

// Re-export primary types
pub use error::{Error, Result};
pub use service::TurnService;

// Re-export the value types
pub use types::*;

// Re-export configuration types users need to construct a service
pub use config::{
    ServiceConfig, ServiceOptions, DEFAULT_LISTENING_ADDRESS, DEFAULT_LISTEN_PORT,
    DEFAULT_MAX_PORT, DEFAULT_MIN_PORT,
};

// Re-export the credential derivation for engine-independent issuance
pub use auth::{create_turn_credential, CredentialIssuer, DEFAULT_TTL_SEC, MIN_TTL_SEC};

// Re-export the engine boundary for alternative relay backends
pub use engine::{RelayEngine, UdpRelayEngine};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the logger for the TURN service
pub fn init_logger() {
    env_logger::init();
}

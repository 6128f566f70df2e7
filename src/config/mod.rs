//! Configuration module for the TURN service layer
//!
//! This module provides configuration structures and functionality for:
//! - Caller-supplied partial service options
//! - Resolution into a complete, validated service configuration
//! - Defaults for ports, addresses and credential expiry policy
//! - Loading options from a JSON file
//!
//! Resolution happens once at service construction; the resolved
//! configuration is immutable for the lifetime of the instance.

use crate::auth::{DEFAULT_TTL_SEC, MIN_TTL_SEC};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default STUN/TURN listen port
pub const DEFAULT_LISTEN_PORT: u16 = 3478;

/// Default lower bound of the relay port range
pub const DEFAULT_MIN_PORT: u16 = 49152;

/// Default upper bound of the relay port range
pub const DEFAULT_MAX_PORT: u16 = 65535;

/// Default listening address (all interfaces)
pub const DEFAULT_LISTENING_ADDRESS: &str = "0.0.0.0";

/// Caller-supplied service options, all optional.
///
/// Numeric ports are carried as `u32` and the TTL as `i64` so out-of-range
/// inputs stay representable and can be rejected with a descriptive error
/// instead of being silently truncated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    /// Authentication realm; required
    pub realm: Option<String>,

    /// Shared secret for time-limited credentials
    pub auth_secret: Option<String>,

    /// Pre-assigned literal password (long-term credential mode)
    pub password: Option<String>,

    /// Static username, also used as the default issuance username
    pub username: Option<String>,

    /// Default user identifier prefixed to generated usernames
    pub user_id: Option<String>,

    /// STUN/TURN listen port
    pub listen_port: Option<u32>,

    /// Lower bound of the relay port range
    pub min_port: Option<u32>,

    /// Upper bound of the relay port range
    pub max_port: Option<u32>,

    /// Publicly reachable address advertised in ICE URLs
    pub public_address: Option<String>,

    /// Local address to bind
    pub listening_address: Option<String>,

    /// Default credential validity window in seconds
    pub ttl_sec: Option<i64>,

    /// Issue credentials without an expiry timestamp
    pub disable_credential_expiry: Option<bool>,

    /// Upper bound, in seconds from now, accepted for externally minted
    /// username expiries; unset accepts any not-yet-expired username
    pub max_external_expiry_sec: Option<u32>,
}

/// Complete, validated service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Authentication realm
    pub realm: String,

    /// Shared secret for time-limited credentials; empty in static mode
    pub auth_secret: String,

    /// STUN/TURN listen port
    pub listen_port: u16,

    /// Lower bound of the relay port range
    pub min_port: u16,

    /// Upper bound of the relay port range
    pub max_port: u16,

    /// Publicly reachable address advertised in ICE URLs
    pub public_address: String,

    /// Local address to bind
    pub listening_address: String,

    /// Static username for long-term credential mode
    pub static_username: Option<String>,

    /// Static password for long-term credential mode
    pub static_password: Option<String>,

    /// Default user identifier prefixed to generated usernames
    pub default_user_id: Option<String>,

    /// Default credential validity window in seconds
    pub default_ttl_sec: u32,

    /// Issue credentials without an expiry timestamp
    pub disable_credential_expiry: bool,

    /// Accepted expiry window for externally minted usernames
    pub max_external_expiry_sec: Option<u32>,
}

impl ServiceOptions {
    /// Resolves the partial options into a complete configuration.
    ///
    /// Applies the documented defaults and validates every supplied value.
    ///
    /// # Errors
    /// Returns `Error::Config` if a required field is absent or a supplied
    /// value is out of range.
    pub fn resolve(self) -> Result<ServiceConfig> {
        let realm = match self.realm.filter(|r| !r.is_empty()) {
            Some(realm) => realm,
            None => return Err(Error::Config("realm is required".into())),
        };

        let auth_secret = self.auth_secret.unwrap_or_default();
        let static_password = self.password.filter(|p| !p.is_empty());
        if auth_secret.is_empty() && static_password.is_none() {
            return Err(Error::Config("auth_secret or password is required".into()));
        }

        let listen_port =
            validate_port("listen_port", self.listen_port, DEFAULT_LISTEN_PORT)?;
        let min_port = validate_port("min_port", self.min_port, DEFAULT_MIN_PORT)?;
        let max_port = validate_port("max_port", self.max_port, DEFAULT_MAX_PORT)?;
        if min_port > max_port {
            return Err(Error::Config(format!(
                "min_port ({}) must not exceed max_port ({})",
                min_port, max_port
            )));
        }

        let default_ttl_sec = match self.ttl_sec {
            None => DEFAULT_TTL_SEC,
            Some(ttl) if ttl <= 0 => {
                return Err(Error::Config(format!(
                    "ttl_sec must be a positive integer, got {}",
                    ttl
                )))
            }
            Some(ttl) if ttl > u32::MAX as i64 => {
                return Err(Error::Config(format!("ttl_sec is out of range: {}", ttl)))
            }
            Some(ttl) => (ttl as u32).max(MIN_TTL_SEC),
        };

        // A literal password has no derivation timestamp to rotate, so expiry
        // defaults to disabled whenever one is configured.
        let disable_credential_expiry = self
            .disable_credential_expiry
            .unwrap_or(static_password.is_some());

        Ok(ServiceConfig {
            public_address: self
                .public_address
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| realm.clone()),
            listening_address: self
                .listening_address
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| DEFAULT_LISTENING_ADDRESS.to_string()),
            realm,
            auth_secret,
            listen_port,
            min_port,
            max_port,
            static_username: self.username.filter(|u| !u.is_empty()),
            static_password,
            default_user_id: self.user_id.filter(|u| !u.is_empty()),
            default_ttl_sec,
            disable_credential_expiry,
            max_external_expiry_sec: self.max_external_expiry_sec,
        })
    }

    /// Loads partial options from a JSON file.
    ///
    /// The result still has to be resolved before use.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
    }
}

impl ServiceConfig {
    /// Get the local bind address in `host:port` form
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listening_address, self.listen_port)
    }

    /// Check whether the service runs in long-term (static password) mode
    pub fn has_static_password(&self) -> bool {
        self.static_password.is_some()
    }
}

fn validate_port(name: &str, value: Option<u32>, default: u16) -> Result<u16> {
    match value {
        None => Ok(default),
        Some(port) if (1..=u16::MAX as u32).contains(&port) => Ok(port as u16),
        Some(port) => Err(Error::Config(format!(
            "{} must be in [1, 65535], got {}",
            name, port
        ))),
    }
}

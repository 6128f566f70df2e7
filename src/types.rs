//! Core type definitions for the TURN service layer
//!
//! This module provides the value types exchanged between the configuration,
//! credential and lifecycle components:
//! - Time-limited TURN credentials
//! - ICE server descriptors (the WebRTC-facing projection of a credential)
//! - Engine health reports
//! - Per-call credential issuance options

use serde::{Deserialize, Serialize};

/// A time-limited TURN credential derived from the shared secret.
///
/// The password is always derived from the final username string, never set
/// independently. A credential is a pure computed value; the service keeps no
/// record of issued credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnCredential {
    /// Username, usually `{user}:{expiry-epoch-seconds}`
    pub username: String,
    /// Base64 HMAC-SHA1 of the username, or the configured static password
    pub password: String,
    /// Validity window in seconds (0 when expiry is disabled)
    pub ttl_sec: u32,
    /// Absolute expiry as Unix epoch seconds (0 when expiry is disabled)
    pub expires_at: u64,
}

/// An ICE server entry combining a credential with the advertised URL set.
///
/// Matches the `RTCIceServer` JSON shape so the output can be pasted into a
/// WebRTC configuration directly. Recomputed per request, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

/// Health report for a relay engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub running: bool,
}

/// Per-call options for credential issuance.
///
/// Unset fields fall back to the service-level defaults; set fields win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueOptions {
    /// Validity window override in seconds (floored at 60)
    pub ttl_sec: Option<u32>,
    /// User identifier to prefix the generated username with
    pub user_id: Option<String>,
    /// Externally supplied username; reused verbatim when still fresh
    pub username: Option<String>,
}

impl IceServer {
    /// Projects a credential onto an advertised URL set
    pub fn new(urls: Vec<String>, credential: TurnCredential) -> Self {
        Self {
            urls,
            username: credential.username,
            credential: credential.password,
        }
    }
}

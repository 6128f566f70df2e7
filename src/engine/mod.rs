//! Relay engine boundary for the TURN service
//!
//! This module provides:
//! - The `RelayEngine` trait the service façade is written against
//! - `UdpRelayEngine`, the default backend owning the UDP listen socket
//!
//! The façade never talks to a relay implementation directly; a backend that
//! runs a full relay stack plugs in by implementing `RelayEngine`, and tests
//! inject doubles the same way.

use crate::auth::CredentialIssuer;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::types::{Health, IssueOptions, TurnCredential};
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::runtime::Runtime;

/// Operations the service façade requires from a relay backend.
///
/// `start` and `stop` are potentially blocking; they must be callable once
/// per lifecycle and are idempotent within it. Credential issuance and the
/// probes are read-only with respect to the relay state.
pub trait RelayEngine: Send {
    /// Begin accepting relay traffic
    fn start(&mut self, detached: bool) -> Result<()>;

    /// Release bound sockets and ports; returns only once they are freed
    fn stop(&mut self) -> Result<()>;

    /// Issue one credential with fully merged options
    fn issue_credential(&self, options: &IssueOptions) -> Result<TurnCredential>;

    /// Currently advertised ICE URL set
    fn ice_urls(&self) -> Vec<String>;

    /// Read-only probe; never fails
    fn health(&self) -> Health;
}

/// Default relay backend.
///
/// Owns the UDP listen socket for the configured address and delegates
/// credential issuance to the local derivation. Packet forwarding is the
/// concern of whichever relay stack is layered on the socket; this backend
/// covers the resource lifecycle the façade depends on.
pub struct UdpRelayEngine {
    config: ServiceConfig,
    issuer: CredentialIssuer,
    // Declared before the runtime so the socket deregisters first on drop
    socket: Option<Arc<UdpSocket>>,
    runtime: Runtime,
}

impl UdpRelayEngine {
    /// Constructs an engine for a resolved configuration.
    ///
    /// # Errors
    /// Returns `Error::EngineConstruction` if the configuration is rejected:
    /// missing realm or auth material, an inverted relay port range, an
    /// unparseable listening address, or a runtime that fails to come up.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        if config.realm.is_empty() {
            return Err(Error::EngineConstruction("realm is required".into()));
        }
        if config.auth_secret.is_empty() && config.static_password.is_none() {
            return Err(Error::EngineConstruction(
                "auth_secret or static password is required".into(),
            ));
        }
        if config.min_port > config.max_port {
            return Err(Error::EngineConstruction(format!(
                "invalid relay port range {}-{}",
                config.min_port, config.max_port
            )));
        }
        if IpAddr::from_str(&config.listening_address).is_err() {
            return Err(Error::EngineConstruction(format!(
                "invalid listening address: {}",
                config.listening_address
            )));
        }

        let runtime = Runtime::new()
            .map_err(|e| Error::EngineConstruction(format!("failed to create runtime: {}", e)))?;

        Ok(Self {
            issuer: CredentialIssuer::from_config(&config),
            config,
            socket: None,
            runtime,
        })
    }
}

impl RelayEngine for UdpRelayEngine {
    fn start(&mut self, _detached: bool) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }

        let bind_addr = self.config.bind_address();
        let socket = self
            .runtime
            .block_on(UdpSocket::bind(&bind_addr))
            .map_err(|e| Error::EngineRuntime(format!("failed to bind {}: {}", bind_addr, e)))?;

        log::info!("relay engine listening on {}", bind_addr);
        self.socket = Some(Arc::new(socket));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.socket.take().is_some() {
            log::info!("relay engine released {}", self.config.bind_address());
        }
        Ok(())
    }

    fn issue_credential(&self, options: &IssueOptions) -> Result<TurnCredential> {
        Ok(self.issuer.issue(options))
    }

    fn ice_urls(&self) -> Vec<String> {
        build_ice_urls(&self.config.public_address, self.config.listen_port)
    }

    fn health(&self) -> Health {
        Health {
            running: self.socket.is_some(),
        }
    }
}

fn build_ice_urls(public_address: &str, listen_port: u16) -> Vec<String> {
    vec![format!(
        "turn:{}:{}?transport=udp",
        public_address, listen_port
    )]
}

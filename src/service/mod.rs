//! TURN service façade
//!
//! This module provides `TurnService`, which owns one relay engine instance
//! and drives its lifecycle:
//! - `Stopped -> Starting -> Running -> Stopping -> Stopped`, re-enterable
//! - Credential issuance merging per-call options over configured defaults
//! - Health probing
//!
//! Lifecycle transitions are mutually exclusive; a transition already in
//! progress rejects concurrent transition requests instead of interleaving
//! them.

use crate::config::{ServiceConfig, ServiceOptions};
use crate::engine::{RelayEngine, UdpRelayEngine};
use crate::error::{Error, Result};
use crate::types::{Health, IceServer, IssueOptions};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Façade over a single relay engine instance.
///
/// The engine is exclusively owned by the façade for its entire lifetime.
/// All methods take `&self`; the façade serializes lifecycle transitions
/// internally.
pub struct TurnService<E: RelayEngine = UdpRelayEngine> {
    config: ServiceConfig,
    state: Mutex<LifecycleState>,
    engine: Mutex<E>,
}

impl TurnService<UdpRelayEngine> {
    /// Resolves the options and constructs the default relay backend.
    ///
    /// The service starts out `Stopped`: the engine is constructed but not
    /// accepting traffic until `start` is called.
    ///
    /// # Errors
    /// `Error::Config` if the options do not resolve;
    /// `Error::EngineConstruction` if the engine rejects the configuration.
    pub fn new(options: ServiceOptions) -> Result<Self> {
        let config = options.resolve()?;
        let engine = UdpRelayEngine::new(config.clone())?;
        Ok(Self::with_engine(config, engine))
    }
}

impl<E: RelayEngine> TurnService<E> {
    /// Wraps an already-constructed engine.
    ///
    /// This is the injection seam for alternative relay backends and for
    /// test doubles.
    pub fn with_engine(config: ServiceConfig, engine: E) -> Self {
        Self {
            config,
            state: Mutex::new(LifecycleState::Stopped),
            engine: Mutex::new(engine),
        }
    }

    /// The resolved configuration this service was built with
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Starts the relay engine and returns the initial ICE descriptor.
    ///
    /// Calling `start` on a `Running` service does not restart the engine;
    /// it only issues a fresh credential. Calling it while a transition is
    /// in progress fails with `Error::InvalidState`.
    pub fn start(&self, detached: bool) -> Result<IceServer> {
        {
            let mut state = self.lock_state();
            match *state {
                LifecycleState::Stopped => *state = LifecycleState::Starting,
                LifecycleState::Running => {
                    drop(state);
                    return self.issue_credential(IssueOptions::default());
                }
                LifecycleState::Starting => {
                    return Err(Error::InvalidState(
                        "start requested while a start is in progress".into(),
                    ))
                }
                LifecycleState::Stopping => {
                    return Err(Error::InvalidState(
                        "start requested while the service is stopping".into(),
                    ))
                }
            }
        }

        let started = self.lock_engine().start(detached);
        match started {
            Ok(()) => {
                *self.lock_state() = LifecycleState::Running;
                log::info!("TURN service running on {}", self.config.bind_address());
                self.issue_credential(IssueOptions::default())
            }
            Err(e) => {
                *self.lock_state() = LifecycleState::Stopped;
                Err(e)
            }
        }
    }

    /// Stops the relay engine.
    ///
    /// Does not return until the engine has released its bound resources.
    /// Idempotent: stopping a `Stopped` service succeeds without side
    /// effects.
    pub fn stop(&self) -> Result<()> {
        {
            let mut state = self.lock_state();
            match *state {
                LifecycleState::Stopped => return Ok(()),
                LifecycleState::Running => *state = LifecycleState::Stopping,
                LifecycleState::Starting => {
                    return Err(Error::InvalidState(
                        "stop requested while a start is in progress".into(),
                    ))
                }
                LifecycleState::Stopping => {
                    return Err(Error::InvalidState(
                        "stop requested while a stop is in progress".into(),
                    ))
                }
            }
        }

        let stopped = self.lock_engine().stop();
        // The engine has relinquished its resources either way; only the
        // reported error is propagated.
        *self.lock_state() = LifecycleState::Stopped;
        log::info!("TURN service stopped");
        stopped
    }

    /// Issues one credential and returns it as an ICE server descriptor.
    ///
    /// Per-call options win over the configured defaults. Issuance is
    /// allowed on a `Stopped` service (credential-only usage) and on a
    /// `Running` one; it is rejected while a stop is tearing the engine
    /// down.
    pub fn issue_credential(&self, options: IssueOptions) -> Result<IceServer> {
        if *self.lock_state() == LifecycleState::Stopping {
            return Err(Error::InvalidState(
                "credential issuance while the service is stopping".into(),
            ));
        }

        let merged = self.merged_options(options);
        let engine = self.lock_engine();
        let credential = engine.issue_credential(&merged)?;
        Ok(IceServer::new(engine.ice_urls(), credential))
    }

    /// Read-only health probe; available regardless of lifecycle state
    pub fn health(&self) -> Health {
        self.lock_engine().health()
    }

    fn merged_options(&self, options: IssueOptions) -> IssueOptions {
        IssueOptions {
            ttl_sec: options.ttl_sec.or(Some(self.config.default_ttl_sec)),
            user_id: options
                .user_id
                .or_else(|| self.config.default_user_id.clone()),
            username: options
                .username
                .or_else(|| self.config.static_username.clone()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_engine(&self) -> MutexGuard<'_, E> {
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_turn_credential;
    use crate::types::TurnCredential;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;

    fn test_config() -> ServiceConfig {
        ServiceOptions {
            realm: Some("example.com".to_string()),
            auth_secret: Some("s3cr3t".to_string()),
            user_id: Some("u1".to_string()),
            ttl_sec: Some(600),
            ..Default::default()
        }
        .resolve()
        .unwrap()
    }

    #[derive(Default)]
    struct MockEngine {
        start_calls: AtomicUsize,
        stop_calls: AtomicUsize,
        running: AtomicBool,
    }

    impl RelayEngine for MockEngine {
        fn start(&mut self, _detached: bool) -> Result<()> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn issue_credential(&self, options: &IssueOptions) -> Result<TurnCredential> {
            Ok(create_turn_credential("s3cr3t", options))
        }

        fn ice_urls(&self) -> Vec<String> {
            vec!["turn:example.com:3478?transport=udp".to_string()]
        }

        fn health(&self) -> Health {
            Health {
                running: self.running.load(Ordering::SeqCst),
            }
        }
    }

    // Engine whose transitions block until released, to exercise the
    // in-flight transition states from another thread.
    struct GatedEngine {
        entered_tx: mpsc::Sender<()>,
        release_rx: mpsc::Receiver<()>,
        running: AtomicBool,
    }

    impl RelayEngine for GatedEngine {
        fn start(&mut self, _detached: bool) -> Result<()> {
            self.entered_tx.send(()).unwrap();
            self.release_rx.recv().unwrap();
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.entered_tx.send(()).unwrap();
            self.release_rx.recv().unwrap();
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn issue_credential(&self, options: &IssueOptions) -> Result<TurnCredential> {
            Ok(create_turn_credential("s3cr3t", options))
        }

        fn ice_urls(&self) -> Vec<String> {
            vec!["turn:example.com:3478?transport=udp".to_string()]
        }

        fn health(&self) -> Health {
            Health {
                running: self.running.load(Ordering::SeqCst),
            }
        }
    }

    fn gated_service() -> (
        Arc<TurnService<GatedEngine>>,
        mpsc::Receiver<()>,
        mpsc::Sender<()>,
    ) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let engine = GatedEngine {
            entered_tx,
            release_rx,
            running: AtomicBool::new(false),
        };
        (
            Arc::new(TurnService::with_engine(test_config(), engine)),
            entered_rx,
            release_tx,
        )
    }

    #[test]
    fn test_start_returns_initial_descriptor() {
        let service = TurnService::with_engine(test_config(), MockEngine::default());
        let ice = service.start(false).unwrap();

        assert_eq!(ice.urls, vec!["turn:example.com:3478?transport=udp"]);
        assert!(ice.username.starts_with("u1:"));
        assert!(!ice.credential.is_empty());
        assert!(service.health().running);
    }

    #[test]
    fn test_restart_does_not_restart_engine() {
        let service = TurnService::with_engine(test_config(), MockEngine::default());
        service.start(false).unwrap();
        let second = service.start(false).unwrap();

        assert!(second.username.starts_with("u1:"));
        assert_eq!(
            service.lock_engine().start_calls.load(Ordering::SeqCst),
            1
        );
    }

    #[test]
    fn test_stop_is_idempotent() {
        let service = TurnService::with_engine(test_config(), MockEngine::default());

        // Stopping a never-started service is a no-op
        service.stop().unwrap();
        assert_eq!(service.lock_engine().stop_calls.load(Ordering::SeqCst), 0);

        service.start(false).unwrap();
        service.stop().unwrap();
        service.stop().unwrap();
        assert_eq!(service.lock_engine().stop_calls.load(Ordering::SeqCst), 1);
        assert!(!service.health().running);
    }

    #[test]
    fn test_service_is_restartable_after_stop() {
        let service = TurnService::with_engine(test_config(), MockEngine::default());
        service.start(false).unwrap();
        service.stop().unwrap();
        service.start(false).unwrap();

        assert!(service.health().running);
        assert_eq!(
            service.lock_engine().start_calls.load(Ordering::SeqCst),
            2
        );
    }

    #[test]
    fn test_issuance_without_starting() {
        let service = TurnService::with_engine(test_config(), MockEngine::default());
        let ice = service.issue_credential(IssueOptions::default()).unwrap();

        assert!(ice.username.starts_with("u1:"));
        assert!(!service.health().running);
    }

    #[test]
    fn test_per_call_options_win_over_defaults() {
        let service = TurnService::with_engine(test_config(), MockEngine::default());

        let defaults = service.issue_credential(IssueOptions::default()).unwrap();
        assert!(defaults.username.starts_with("u1:"));

        let overridden = service
            .issue_credential(IssueOptions {
                user_id: Some("u2".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(overridden.username.starts_with("u2:"));
    }

    #[test]
    fn test_repeat_issuance_with_defaults() {
        let service = TurnService::with_engine(test_config(), MockEngine::default());

        // Within the same expiry second the descriptor is identical
        for _ in 0..3 {
            let a = service.issue_credential(IssueOptions::default()).unwrap();
            let b = service.issue_credential(IssueOptions::default()).unwrap();
            if a.username == b.username {
                assert_eq!(a, b);
                break;
            }
        }

        // An expired supplied username forces a rotation while the TTL
        // default stays in effect
        let rotated = service
            .issue_credential(IssueOptions {
                username: Some("u1:1".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(rotated.username.starts_with("u1:"));
        assert_ne!(rotated.username, "u1:1");
    }

    #[test]
    fn test_concurrent_start_is_rejected() {
        let (service, entered_rx, release_tx) = gated_service();

        let worker = {
            let service = Arc::clone(&service);
            thread::spawn(move || service.start(false))
        };
        entered_rx.recv().unwrap();

        // A transition is in flight: both lifecycle operations are rejected
        assert!(matches!(
            service.start(false),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(service.stop(), Err(Error::InvalidState(_))));

        release_tx.send(()).unwrap();
        worker.join().unwrap().unwrap();
        assert!(service.health().running);
    }

    #[test]
    fn test_issuance_rejected_while_stopping() {
        let (service, entered_rx, release_tx) = gated_service();

        // Pre-load the release so the gated start completes synchronously,
        // then drain its gate signal
        release_tx.send(()).unwrap();
        service.start(false).unwrap();
        entered_rx.recv().unwrap();

        let worker = {
            let service = Arc::clone(&service);
            thread::spawn(move || service.stop())
        };
        entered_rx.recv().unwrap();

        assert!(matches!(
            service.issue_credential(IssueOptions::default()),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            service.start(false),
            Err(Error::InvalidState(_))
        ));

        release_tx.send(()).unwrap();
        worker.join().unwrap().unwrap();
        assert!(!service.health().running);
        assert!(service.issue_credential(IssueOptions::default()).is_ok());
    }

    #[test]
    fn test_engine_start_failure_reverts_to_stopped() {
        struct FailingEngine;
        impl RelayEngine for FailingEngine {
            fn start(&mut self, _detached: bool) -> Result<()> {
                Err(Error::EngineRuntime("bind refused".into()))
            }
            fn stop(&mut self) -> Result<()> {
                Ok(())
            }
            fn issue_credential(&self, options: &IssueOptions) -> Result<TurnCredential> {
                Ok(create_turn_credential("s3cr3t", options))
            }
            fn ice_urls(&self) -> Vec<String> {
                vec![]
            }
            fn health(&self) -> Health {
                Health { running: false }
            }
        }

        let service = TurnService::with_engine(test_config(), FailingEngine);
        assert!(matches!(
            service.start(false),
            Err(Error::EngineRuntime(_))
        ));
        // The failed start left the service stopped, not wedged in Starting
        assert!(matches!(
            service.start(false),
            Err(Error::EngineRuntime(_))
        ));
        service.stop().unwrap();
    }
}

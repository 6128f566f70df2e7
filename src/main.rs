//! Command-line entrypoint for the TURN service
//!
//! Two subcommands:
//! - `start`: starts the relay, prints the initial ICE descriptor as JSON
//!   and blocks until SIGINT/SIGTERM, then stops
//! - `credential`: issues one credential without starting the relay and
//!   prints it as JSON
//!
//! All configuration comes from environment variables; malformed numeric
//! values fail before any engine construction.

use std::env;
use std::process;
use turn_service::{Error, IceServer, IssueOptions, Result, ServiceOptions, TurnService};

fn main() {
    turn_service::init_logger();

    if let Err(e) = run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    match env::args().nth(1).as_deref() {
        Some("start") => cmd_start(),
        Some("credential") => cmd_credential(),
        _ => {
            print_usage();
            process::exit(1);
        }
    }
}

fn cmd_start() -> Result<()> {
    let service = TurnService::new(options_from_env()?)?;
    let ice = service.start(false)?;

    println!("turn-service started");
    print_descriptor(&ice)?;

    wait_for_shutdown()?;
    service.stop()?;
    println!("turn-service stopped");
    Ok(())
}

fn cmd_credential() -> Result<()> {
    let service = TurnService::new(options_from_env()?)?;
    let ice = service.issue_credential(IssueOptions::default())?;
    print_descriptor(&ice)
}

fn print_usage() {
    println!("turn-service usage:");
    println!("  turn-service start       # starts the relay service");
    println!("  turn-service credential  # prints one ICE server credential JSON");
    println!();
    println!("required env:");
    println!("  TURN_REALM");
    println!("  TURN_SECRET or TURN_PASSWORD");
    println!("optional env:");
    println!("  TURN_PUBLIC_IP, TURN_LISTENING_IP, TURN_PORT, TURN_MIN_PORT, TURN_MAX_PORT,");
    println!("  TURN_TTL_SEC, TURN_USER_ID, TURN_USERNAME,");
    println!("  TURN_DISABLE_CREDENTIAL_EXPIRY, TURN_MAX_EXTERNAL_EXPIRY_SEC");
}

fn options_from_env() -> Result<ServiceOptions> {
    let realm = must_env("TURN_REALM")?;
    let auth_secret = opt_env("TURN_SECRET");
    let password = opt_env("TURN_PASSWORD");
    if auth_secret.is_none() && password.is_none() {
        return Err(Error::Config(
            "Missing required env: TURN_SECRET or TURN_PASSWORD".into(),
        ));
    }

    Ok(ServiceOptions {
        realm: Some(realm),
        auth_secret,
        password,
        username: opt_env("TURN_USERNAME"),
        user_id: opt_env("TURN_USER_ID"),
        listen_port: parse_u32("TURN_PORT", opt_env("TURN_PORT"))?,
        min_port: parse_u32("TURN_MIN_PORT", opt_env("TURN_MIN_PORT"))?,
        max_port: parse_u32("TURN_MAX_PORT", opt_env("TURN_MAX_PORT"))?,
        public_address: opt_env("TURN_PUBLIC_IP"),
        listening_address: opt_env("TURN_LISTENING_IP"),
        ttl_sec: parse_i64("TURN_TTL_SEC", opt_env("TURN_TTL_SEC"))?,
        disable_credential_expiry: parse_bool(opt_env("TURN_DISABLE_CREDENTIAL_EXPIRY")),
        max_external_expiry_sec: parse_u32(
            "TURN_MAX_EXTERNAL_EXPIRY_SEC",
            opt_env("TURN_MAX_EXTERNAL_EXPIRY_SEC"),
        )?,
    })
}

fn must_env(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("Missing required env: {}", name)))
}

fn opt_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_u32(name: &str, value: Option<String>) -> Result<Option<u32>> {
    match value {
        None => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| {
            Error::Config(format!("{} must be a non-negative integer, got '{}'", name, v))
        }),
    }
}

fn parse_i64(name: &str, value: Option<String>) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} must be an integer, got '{}'", name, v))),
    }
}

fn parse_bool(value: Option<String>) -> Option<bool> {
    value.map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn print_descriptor(ice: &IceServer) -> Result<()> {
    let json = serde_json::to_string_pretty(ice)
        .map_err(|e| Error::EngineRuntime(format!("failed to encode descriptor: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn wait_for_shutdown() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::EngineRuntime(format!("failed to create signal runtime: {}", e)))?;

    runtime.block_on(wait_for_signal())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())
        .map_err(|e| Error::EngineRuntime(format!("failed to install signal handler: {}", e)))?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| Error::EngineRuntime(format!("failed to wait for ctrl-c: {}", e)))
}

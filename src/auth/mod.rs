// Credential issuance for the TURN service, following the REST-style
// long-term credential mechanism: username carries the expiry timestamp,
// password is base64(HMAC-SHA1(secret, username)).
use crate::config::ServiceConfig;
use crate::types::{IssueOptions, TurnCredential};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

/// Default credential validity window in seconds
pub const DEFAULT_TTL_SEC: u32 = 3600;

/// Absolute floor for the validity window
pub const MIN_TTL_SEC: u32 = 60;

// Username used when expiry is disabled and neither a username nor a
// user id was supplied.
const FALLBACK_USERNAME: &str = "turn-user";

/// Derives a time-limited credential from a shared secret.
///
/// The username is fully resolved before the HMAC is computed; two calls in
/// the same second with identical inputs produce identical output.
pub fn create_turn_credential(auth_secret: &str, options: &IssueOptions) -> TurnCredential {
    let ttl_sec = options.ttl_sec.unwrap_or(DEFAULT_TTL_SEC).max(MIN_TTL_SEC);
    let expires_at = now_unix() + ttl_sec as u64;
    let username = resolve_username(
        options.username.as_deref(),
        options.user_id.as_deref(),
        expires_at,
        None,
    );
    let password = hmac_password(auth_secret, &username);

    TurnCredential {
        username,
        password,
        ttl_sec,
        expires_at,
    }
}

/// Issues credentials according to the service configuration.
///
/// Extends the bare derivation with the long-term modes: a configured static
/// password is echoed verbatim instead of being derived, and disabled expiry
/// drops the timestamp suffix entirely.
#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    auth_secret: String,
    static_username: Option<String>,
    static_password: Option<String>,
    disable_expiry: bool,
    max_external_expiry_sec: Option<u32>,
}

impl CredentialIssuer {
    /// Creates an issuer from a resolved service configuration
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            auth_secret: config.auth_secret.clone(),
            static_username: config.static_username.clone(),
            static_password: config.static_password.clone(),
            disable_expiry: config.disable_credential_expiry,
            max_external_expiry_sec: config.max_external_expiry_sec,
        }
    }

    /// Issues one credential.
    ///
    /// With expiry disabled the reported `ttl_sec` and `expires_at` are both
    /// zero and the username carries no timestamp.
    pub fn issue(&self, options: &IssueOptions) -> TurnCredential {
        let ttl = options.ttl_sec.unwrap_or(DEFAULT_TTL_SEC).max(MIN_TTL_SEC);
        let (ttl_sec, expires_at) = if self.disable_expiry {
            (0, 0)
        } else {
            (ttl, now_unix() + ttl as u64)
        };

        let username = match (&self.static_password, &self.static_username) {
            (Some(_), Some(name)) => name.clone(),
            _ if self.disable_expiry => {
                resolve_static_username(options.username.as_deref(), options.user_id.as_deref())
            }
            _ => resolve_username(
                options.username.as_deref(),
                options.user_id.as_deref(),
                expires_at,
                self.max_external_expiry_sec,
            ),
        };

        let password = match &self.static_password {
            Some(password) => password.clone(),
            None => hmac_password(&self.auth_secret, &username),
        };

        TurnCredential {
            username,
            password,
            ttl_sec,
            expires_at,
        }
    }
}

/// Resolves the final username for an expiring credential.
///
/// Priority: a supplied username that is still fresh is reused verbatim; a
/// supplied username with an absent, malformed or expired timestamp is
/// rebuilt with the new expiry; a user id is suffixed with the expiry;
/// otherwise the expiry alone is the username.
fn resolve_username(
    username: Option<&str>,
    user_id: Option<&str>,
    expires_at: u64,
    max_external_expiry_sec: Option<u32>,
) -> String {
    if let Some(raw) = username.filter(|u| !u.is_empty()) {
        if username_is_fresh(raw, max_external_expiry_sec) {
            return raw.to_string();
        }
        return rebuild_username(raw, expires_at);
    }

    match user_id.filter(|u| !u.is_empty()) {
        Some(user) => format!("{}:{}", user, expires_at),
        None => expires_at.to_string(),
    }
}

// Non-expiring usernames carry no timestamp.
fn resolve_static_username(username: Option<&str>, user_id: Option<&str>) -> String {
    if let Some(raw) = username.filter(|u| !u.is_empty()) {
        return raw.to_string();
    }

    match user_id.filter(|u| !u.is_empty()) {
        Some(user) => user.to_string(),
        None => FALLBACK_USERNAME.to_string(),
    }
}

// An expired or out-of-window trailing timestamp is replaced with the new
// expiry; anything else gets the expiry appended as a new segment.
fn rebuild_username(raw: &str, expires_at: u64) -> String {
    if let Some((prefix, trailing)) = raw.rsplit_once(':') {
        if is_all_digits(trailing) && !prefix.is_empty() {
            return format!("{}:{}", prefix, expires_at);
        }
    } else if is_all_digits(raw) {
        return expires_at.to_string();
    }

    format!("{}:{}", raw, expires_at)
}

/// Checks whether a username's trailing segment is an unexpired timestamp.
///
/// With a bound set, timestamps further out than `now + bound` do not count
/// as fresh and the username gets rebuilt instead of echoed.
fn username_is_fresh(username: &str, max_external_expiry_sec: Option<u32>) -> bool {
    let trailing = username.rsplit(':').next().unwrap_or(username);
    if !is_all_digits(trailing) {
        return false;
    }
    let Ok(expiry) = trailing.parse::<u64>() else {
        return false;
    };

    let now = now_unix();
    if expiry <= now {
        return false;
    }
    match max_external_expiry_sec {
        Some(bound) => expiry <= now + bound as u64,
        None => true,
    }
}

fn is_all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn hmac_password(auth_secret: &str, username: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(auth_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(username.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

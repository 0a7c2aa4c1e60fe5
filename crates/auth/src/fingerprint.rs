//! Server-derived client fingerprinting.
//!
//! The composite identifier feeds the rate limiter (multi-identifier
//! AND-semantics, pipe-separated) and the admin session key. It is never
//! exposed to clients.

use sha2::{Digest, Sha256};

/// Cap applied to every raw header before hashing. Oversized or hostile
/// header values must not inflate identifiers or storage keys.
const MAX_HEADER_LEN: usize = 256;

/// Request-derived signals, already extracted by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct ClientSignals<'a> {
    pub ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub accept: Option<&'a str>,
    pub accept_language: Option<&'a str>,
    pub accept_encoding: Option<&'a str>,
}

/// Compose the pipe-separated client identifier:
/// `ip-<addr>|ua-<family>-<h8>|fp-<h12>|full-<h16>`.
pub fn client_identifier(signals: &ClientSignals<'_>) -> String {
    let ip = bound(signals.ip.unwrap_or("unknown"), 45);
    let ua = bound(signals.user_agent.unwrap_or(""), MAX_HEADER_LEN);
    let accept = bound(signals.accept.unwrap_or(""), MAX_HEADER_LEN);
    let lang = bound(signals.accept_language.unwrap_or(""), MAX_HEADER_LEN);
    let enc = bound(signals.accept_encoding.unwrap_or(""), MAX_HEADER_LEN);

    let family = ua_family(&ua);
    let ua_digest = digest_hex(&ua, 8);
    let browser_digest = digest_hex(&format!("{ua}{accept}"), 12);
    let full_digest = digest_hex(&format!("{ip}{ua}{accept}{lang}{enc}"), 16);

    format!("ip-{ip}|ua-{family}-{ua_digest}|fp-{browser_digest}|full-{full_digest}")
}

/// First product token of the user agent, lowercased, alphanumeric only.
fn ua_family(ua: &str) -> String {
    let token: String = ua
        .chars()
        .take_while(|c| *c != '/' && *c != ' ' && *c != '(')
        .filter(|c| c.is_ascii_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .take(16)
        .collect();
    if token.is_empty() {
        "none".into()
    } else {
        token
    }
}

/// Length-bound and strip control characters and the pipe separator.
fn bound(value: &str, max: usize) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() && *c != '|')
        .take(max)
        .collect()
}

fn digest_hex(input: &str, bytes: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..bytes])
}

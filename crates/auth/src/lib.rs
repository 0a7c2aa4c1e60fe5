//! Authentication and authorization core: signed tokens, admin sessions
//! bound to client fingerprints, hierarchical permissions, anti-brute-force
//! rate limiting, and the output sanitizer.

pub mod fingerprint;
pub mod permissions;
pub mod rate_limit;
pub mod sanitize;
pub mod session;
pub mod token;

pub use fingerprint::client_identifier;
pub use permissions::{AccessLevel, Role};
pub use rate_limit::{RateCheck, RateLimiter, RateLimiters};
pub use sanitize::{sanitize_detail, sanitize_str};
pub use session::{SessionEntry, SessionStore};
pub use token::{MintClaims, TokenClaims, TokenService};

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Constant-time string comparison via SHA-256 digests.
/// Hashing normalizes lengths so `ct_eq` always compares 32 bytes.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let ha = Sha256::digest(a.as_bytes());
    let hb = Sha256::digest(b.as_bytes());
    ha.ct_eq(&hb).into()
}

/// Hex SHA-256 digest, the canonical hash for agent keys and PINs.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

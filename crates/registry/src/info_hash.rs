//! Info-hash computation: detects no-op re-registration.
//!
//! The digest covers the canonical JSON form (sorted keys, sorted string
//! sets) of a frozen descriptive field list. The field list is part of the
//! wire contract — extending it invalidates every stored hash.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use arcp_protocol::AgentRegistration;

/// Hex SHA-256 over the canonical form of the descriptive fields.
pub fn info_hash(reg: &AgentRegistration) -> String {
    let canonical = json!({
        "agent_type": reg.agent_type,
        "capabilities": sorted(&reg.capabilities),
        "communication_mode": reg.communication_mode,
        "context_brief": reg.context_brief,
        "endpoint": reg.endpoint,
        "features": sorted(&reg.features),
        "language_support": sorted(&reg.language_support),
        "max_tokens": reg.max_tokens,
        "metadata": canonical_value(&Value::Object(
            reg.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        )),
        "name": reg.name,
        "owner": reg.owner,
        "policy_tags": sorted(&reg.policy_tags),
        "public_key": reg.public_key,
        "rate_limit": reg.rate_limit,
        "requirements": reg.requirements.as_ref().map(canonical_value),
        "version": reg.version,
    });
    hex::encode(Sha256::digest(canonical.to_string().as_bytes()))
}

fn sorted(values: &[String]) -> Vec<String> {
    let mut v = values.to_vec();
    v.sort();
    v
}

/// Recursively rebuild a JSON value with object keys in sorted order, so the
/// serialized form is independent of insertion order.
fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for key in keys {
                out.insert(key.clone(), canonical_value(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}

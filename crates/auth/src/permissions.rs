//! Hierarchical role → permission resolution.

use serde::{Deserialize, Serialize};

/// Access levels form a strict chain: `public ⊂ agent ⊂ admin ⊂ admin_pin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Public,
    Agent,
    Admin,
    AdminPin,
}

/// Caller roles carried in token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Public,
    Agent,
    Admin,
}

impl Role {
    /// The level set a role grants. A role grants access to a required
    /// level iff its set includes that level.
    pub fn levels(&self) -> &'static [AccessLevel] {
        match self {
            Role::Public => &[AccessLevel::Public],
            Role::Agent => &[AccessLevel::Public, AccessLevel::Agent],
            Role::Admin => &[
                AccessLevel::Public,
                AccessLevel::Agent,
                AccessLevel::Admin,
                AccessLevel::AdminPin,
            ],
        }
    }

    pub fn allows(&self, level: AccessLevel) -> bool {
        self.levels().contains(&level)
    }

    /// Case-sensitive string resolution; no coercion.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "public" => Some(Role::Public),
            "agent" => Some(Role::Agent),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Public => "public",
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }
}

/// Endpoints a temp-registration token may reach. Such tokens are scoped to
/// exactly one enrollment and are otherwise inert.
pub fn temp_registration_allowed(path: &str) -> bool {
    path == "/agents/register"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_level_sets() {
        assert!(Role::Public.allows(AccessLevel::Public));
        assert!(!Role::Public.allows(AccessLevel::Agent));

        assert!(Role::Agent.allows(AccessLevel::Public));
        assert!(Role::Agent.allows(AccessLevel::Agent));
        assert!(!Role::Agent.allows(AccessLevel::Admin));
        assert!(!Role::Agent.allows(AccessLevel::AdminPin));

        assert!(Role::Admin.allows(AccessLevel::AdminPin));
    }

    /// Any request accepted at level L is accepted at any lower level; any
    /// request rejected at level L is rejected at any stricter level.
    #[test]
    fn permission_monotonicity() {
        let chain = [
            AccessLevel::Public,
            AccessLevel::Agent,
            AccessLevel::Admin,
            AccessLevel::AdminPin,
        ];
        for role in [Role::Public, Role::Agent, Role::Admin] {
            for (i, level) in chain.iter().enumerate() {
                if role.allows(*level) {
                    for lower in &chain[..i] {
                        assert!(role.allows(*lower), "{role:?} inconsistent at {lower:?}");
                    }
                } else {
                    for stricter in &chain[i..] {
                        assert!(!role.allows(*stricter), "{role:?} inconsistent at {stricter:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("Admin"), None);
        assert_eq!(Role::parse("ADMIN"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn temp_registration_scope() {
        assert!(temp_registration_allowed("/agents/register"));
        assert!(!temp_registration_allowed("/agents"));
        assert!(!temp_registration_allowed("/agents/search"));
        assert!(!temp_registration_allowed("/tokens/mint"));
    }
}

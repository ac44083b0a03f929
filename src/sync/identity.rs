//! Identity supplied by the auth layer.
//!
//! The core treats identities as opaque: a bearer token, a username, an
//! optional profile id and a role. A missing profile id disables sync for
//! the session; it is not an error.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

/// Claim carrying the role in tokens issued by the backend.
pub const ROLE_CLAIM: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

/// Profile identifier in the store.
///
/// The store hands these out as numbers; they are kept as strings since the
/// core never does arithmetic on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl<'de> Deserialize<'de> for ProfileId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

/// Role claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Player,
    Admin,
}

impl Role {
    /// Anything other than `Admin` is a player.
    pub fn from_claim(claim: &str) -> Self {
        match claim {
            "Admin" => Self::Admin,
            _ => Self::Player,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Read the role claim from a JWT payload without verifying it.
fn role_from_token(token: &str) -> Role {
    let Some(payload) = token.split('.').nth(1) else {
        return Role::Player;
    };
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) else {
        return Role::Player;
    };
    serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|claims| claims.get(ROLE_CLAIM).and_then(|r| r.as_str()).map(Role::from_claim))
        .unwrap_or_default()
}

/// Authenticated player as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub token: Option<String>,
    pub username: Option<String>,
    pub profile_id: Option<ProfileId>,
    pub role: Role,
}

impl Identity {
    /// Identity with no credentials at all.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build an identity from a bearer token, reading the role claim.
    pub fn from_bearer_token(token: impl Into<String>, username: impl Into<String>) -> Self {
        let token = token.into();
        let role = role_from_token(&token);
        Self {
            token: Some(token),
            username: Some(username.into()),
            profile_id: None,
            role,
        }
    }

    #[must_use]
    pub fn with_profile_id(mut self, id: impl Into<ProfileId>) -> Self {
        self.profile_id = Some(id.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn test_admin_role_claim() {
        let token = token_with(serde_json::json!({ ROLE_CLAIM: "Admin", "sub": "1" }));
        let identity = Identity::from_bearer_token(token, "chef");
        assert_eq!(identity.role, Role::Admin);
        assert!(identity.role.is_admin());
        assert!(identity.is_authenticated());
        assert_eq!(identity.username.as_deref(), Some("chef"));
        assert_eq!(identity.profile_id, None);
    }

    #[test]
    fn test_missing_or_malformed_claim_is_player() {
        let token = token_with(serde_json::json!({ "sub": "1" }));
        assert_eq!(Identity::from_bearer_token(token, "a").role, Role::Player);
        assert_eq!(Identity::from_bearer_token("not-a-jwt", "a").role, Role::Player);
        assert_eq!(Identity::from_bearer_token("a.!!!.c", "a").role, Role::Player);
    }

    #[test]
    fn test_anonymous() {
        let identity = Identity::anonymous();
        assert!(!identity.is_authenticated());
        assert_eq!(identity.role, Role::Player);
    }

    #[test]
    fn test_profile_id_from_number_or_string() {
        let ids: Vec<ProfileId> = serde_json::from_str(r#"[42, "abc"]"#).unwrap();
        assert_eq!(ids, vec![ProfileId::new("42"), ProfileId::new("abc")]);
        assert_eq!(serde_json::to_string(&ids[0]).unwrap(), r#""42""#);
    }
}

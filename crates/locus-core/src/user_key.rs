//! Compatibility shim for user ids that encode their owning agent as
//! `agent:<slug>:user:<id>`. New callers pass the resource id explicitly.

use crate::types::ResourceId;
use std::fmt;

const AGENT_PREFIX: &str = "agent:";
const USER_MARKER: &str = ":user:";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyUserKey {
    pub resource_id: ResourceId,
    pub user_id: String,
}

impl LegacyUserKey {
    pub fn new(resource_id: impl Into<ResourceId>, user_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Returns `None` for anything that is not an encoded key, including
    /// plain user ids.
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix(AGENT_PREFIX)?;
        let (slug, user) = rest.split_once(USER_MARKER)?;
        if slug.is_empty() || user.is_empty() {
            return None;
        }
        Some(Self::new(slug, user))
    }
}

impl fmt::Display for LegacyUserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}{}", AGENT_PREFIX, self.resource_id, USER_MARKER, self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_encoded_key() {
        let key = LegacyUserKey::parse("agent:writer:user:u1").unwrap();
        assert_eq!(key.resource_id.as_str(), "writer");
        assert_eq!(key.user_id, "u1");
        assert_eq!(key.to_string(), "agent:writer:user:u1");
    }

    #[test]
    fn user_part_may_contain_colons() {
        let key = LegacyUserKey::parse("agent:writer:user:mail:a@b").unwrap();
        assert_eq!(key.user_id, "mail:a@b");
    }

    #[test]
    fn plain_ids_are_not_keys() {
        assert!(LegacyUserKey::parse("u1").is_none());
        assert!(LegacyUserKey::parse("agent::user:u1").is_none());
        assert!(LegacyUserKey::parse("agent:writer:user:").is_none());
    }
}

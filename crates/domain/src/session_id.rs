//! Session addressing: `"<sceneId>:<avatarId>"`.

use std::fmt;
use std::str::FromStr;

use crate::error::AdapterError;

/// Avatar id used when the session id carries no avatar part.
pub const DEFAULT_AVATAR_ID: &str = "0";

const SEPARATOR: char = ':';

/// A parsed session identifier.
///
/// The scene part selects the shared session content, the avatar part selects
/// the avatar content inside it. Ids that are not exactly two non-empty parts
/// keep the whole string as the scene id and fall back to [`DEFAULT_AVATAR_ID`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId {
    full: String,
    scene_id: String,
    avatar_id: String,
}

impl SessionId {
    /// Parse a raw session id as received over the wire.
    pub fn parse(raw: &str) -> Result<Self, AdapterError> {
        if raw.is_empty() {
            return Err(AdapterError::InvalidSessionId);
        }

        let mut parts = raw.split(SEPARATOR);
        let (scene_id, avatar_id) = match (parts.next(), parts.next(), parts.next()) {
            (Some(scene), Some(avatar), None) if !scene.is_empty() && !avatar.is_empty() => {
                (scene.to_string(), avatar.to_string())
            }
            _ => (raw.to_string(), DEFAULT_AVATAR_ID.to_string()),
        };

        Ok(Self {
            full: raw.to_string(),
            scene_id,
            avatar_id,
        })
    }

    /// Compose a session id from its parts.
    pub fn new(scene_id: impl Into<String>, avatar_id: impl Into<String>) -> Self {
        let scene_id = scene_id.into();
        let avatar_id = avatar_id.into();
        Self {
            full: format!("{scene_id}{SEPARATOR}{avatar_id}"),
            scene_id,
            avatar_id,
        }
    }

    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    pub fn avatar_id(&self) -> &str {
        &self.avatar_id
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl FromStr for SessionId {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_and_avatar() {
        let id = SessionId::parse("scene1:avatarA").unwrap();
        assert_eq!(id.scene_id(), "scene1");
        assert_eq!(id.avatar_id(), "avatarA");
        assert_eq!(id.as_str(), "scene1:avatarA");
    }

    #[test]
    fn test_scene_only_defaults_avatar() {
        let id = SessionId::parse("scene1").unwrap();
        assert_eq!(id.scene_id(), "scene1");
        assert_eq!(id.avatar_id(), DEFAULT_AVATAR_ID);
    }

    #[test]
    fn test_multi_colon_keeps_whole_string() {
        let id = SessionId::parse("a:b:c").unwrap();
        assert_eq!(id.scene_id(), "a:b:c");
        assert_eq!(id.avatar_id(), "0");
    }

    #[test]
    fn test_empty_parts_keep_whole_string() {
        for raw in [":avatar", "scene:", ":"] {
            let id = SessionId::parse(raw).unwrap();
            assert_eq!(id.scene_id(), raw);
            assert_eq!(id.avatar_id(), "0");
        }
    }

    #[test]
    fn test_empty_is_invalid() {
        assert_eq!(SessionId::parse(""), Err(AdapterError::InvalidSessionId));
        assert!("".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_new_round_trips_through_parse() {
        let id = SessionId::new("scene7", "7");
        assert_eq!(SessionId::parse(id.as_str()).unwrap(), id);
    }
}

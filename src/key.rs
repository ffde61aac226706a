//! Structured entity keys and their websafe encoding.
//!
//! A conference key is scoped under its organizer's profile, a session key
//! under its conference. The websafe form is URL-safe unpadded base64 of the
//! `|`-separated key path, e.g. `Conference|alice|7`.

use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::types::{EntityId, UserId};

const PATH_SEP: char = '|';

/// Key of a profile record; the owning user's id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileKey(pub UserId);

/// Key of a conference, parented by the organizer's profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConferenceKey {
    /// Organizer (parent profile) user id.
    pub organizer: UserId,
    /// Allocated id, unique under the parent.
    pub id: EntityId,
}

/// Key of a session, parented by its conference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    /// Parent conference.
    pub conference: ConferenceKey,
    /// Allocated id, unique under the parent.
    pub id: EntityId,
}

/// Any key the store understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKey {
    /// Profile key.
    Profile(ProfileKey),
    /// Conference key.
    Conference(ConferenceKey),
    /// Session key.
    Session(SessionKey),
}

/// Websafe string could not be decoded into the expected key kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed websafe key: {0}")]
pub struct KeyDecodeError(pub String);

impl ProfileKey {
    /// Profile key for `user_id`.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self(user_id.into())
    }
}

impl ConferenceKey {
    /// Parent profile key.
    pub fn parent(&self) -> ProfileKey {
        ProfileKey(self.organizer.clone())
    }

    /// URL-safe external identifier.
    pub fn to_websafe(&self) -> String {
        encode_path(&format!("Conference{PATH_SEP}{}{PATH_SEP}{}", self.organizer, self.id))
    }

    /// Decodes a websafe conference key.
    pub fn from_websafe(websafe: &str) -> Result<Self, KeyDecodeError> {
        let path = decode_path(websafe)?;
        let rest = path
            .strip_prefix("Conference|")
            .ok_or_else(|| KeyDecodeError(websafe.to_string()))?;
        split_scoped(rest, websafe).map(|(organizer, id)| Self { organizer, id })
    }
}

impl SessionKey {
    /// Parent conference key.
    pub fn parent(&self) -> &ConferenceKey {
        &self.conference
    }

    /// URL-safe external identifier.
    pub fn to_websafe(&self) -> String {
        encode_path(&format!(
            "Session{PATH_SEP}{}{PATH_SEP}{}{PATH_SEP}{}",
            self.conference.organizer, self.conference.id, self.id
        ))
    }

    /// Decodes a websafe session key.
    pub fn from_websafe(websafe: &str) -> Result<Self, KeyDecodeError> {
        let path = decode_path(websafe)?;
        let rest = path
            .strip_prefix("Session|")
            .ok_or_else(|| KeyDecodeError(websafe.to_string()))?;
        let (conference, id) = rest
            .rsplit_once(PATH_SEP)
            .ok_or_else(|| KeyDecodeError(websafe.to_string()))?;
        let (organizer, conf_id) = split_scoped(conference, websafe)?;
        Ok(Self {
            conference: ConferenceKey {
                organizer,
                id: conf_id,
            },
            id: parse_id(id, websafe)?,
        })
    }
}

impl From<ProfileKey> for EntityKey {
    fn from(value: ProfileKey) -> Self {
        Self::Profile(value)
    }
}

impl From<ConferenceKey> for EntityKey {
    fn from(value: ConferenceKey) -> Self {
        Self::Conference(value)
    }
}

impl From<SessionKey> for EntityKey {
    fn from(value: SessionKey) -> Self {
        Self::Session(value)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile(k) => write!(f, "Profile({})", k.0),
            Self::Conference(k) => write!(f, "Conference({}/{})", k.organizer, k.id),
            Self::Session(k) => write!(
                f,
                "Session({}/{}/{})",
                k.conference.organizer, k.conference.id, k.id
            ),
        }
    }
}

fn encode_path(path: &str) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(path)
}

fn decode_path(websafe: &str) -> Result<String, KeyDecodeError> {
    let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(websafe)
        .map_err(|_| KeyDecodeError(websafe.to_string()))?;
    String::from_utf8(raw).map_err(|_| KeyDecodeError(websafe.to_string()))
}

/// Splits `<organizer>|<id>`; the organizer may itself contain the separator.
fn split_scoped(raw: &str, websafe: &str) -> Result<(UserId, EntityId), KeyDecodeError> {
    match raw.rsplit_once(PATH_SEP) {
        Some((organizer, id)) if !organizer.is_empty() => {
            Ok((organizer.to_string(), parse_id(id, websafe)?))
        }
        _ => Err(KeyDecodeError(websafe.to_string())),
    }
}

fn parse_id(raw: &str, websafe: &str) -> Result<EntityId, KeyDecodeError> {
    raw.parse().map_err(|_| KeyDecodeError(websafe.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websafe_keys_decode_to_the_same_key() {
        let conf = ConferenceKey {
            organizer: "alice@example.com".to_string(),
            id: 42,
        };
        let session = SessionKey {
            conference: conf.clone(),
            id: 43,
        };

        let ws = conf.to_websafe();
        assert!(ws.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(ConferenceKey::from_websafe(&ws).unwrap(), conf);
        assert_eq!(SessionKey::from_websafe(&session.to_websafe()).unwrap(), session);
    }

    #[test]
    fn kind_mismatch_and_garbage_are_rejected() {
        let conf = ConferenceKey {
            organizer: "bob".to_string(),
            id: 1,
        };
        assert!(SessionKey::from_websafe(&conf.to_websafe()).is_err());
        assert!(ConferenceKey::from_websafe("not base64 !!").is_err());
        assert!(ConferenceKey::from_websafe(&encode_path("Conference|bob|x")).is_err());
    }
}

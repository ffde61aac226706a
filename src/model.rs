//! Persistent records: profiles, conferences and sessions.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    core::query::{PropertyName, Query, Queryable, Value},
    key::{ConferenceKey, EntityKey, ProfileKey, SessionKey},
    types::{Identity, TeeShirtSize, UserId},
};

/// User profile, keyed by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile key.
    pub key: ProfileKey,
    /// Display name.
    pub display_name: String,
    /// Primary email.
    pub main_email: String,
    /// T-shirt size preference.
    pub tee_shirt_size: TeeShirtSize,
    /// Websafe keys of conferences the user registered for.
    pub conference_keys_to_attend: Vec<String>,
    /// Websafe keys of wishlisted sessions.
    pub session_wishlist: Vec<String>,
}

impl Profile {
    /// Fresh profile for a first-time caller.
    pub fn for_identity(identity: &Identity) -> Self {
        Self {
            key: ProfileKey::new(identity.user_id.clone()),
            display_name: identity.nickname.clone(),
            main_email: identity.email.clone(),
            tee_shirt_size: TeeShirtSize::NotSpecified,
            conference_keys_to_attend: Vec::new(),
            session_wishlist: Vec::new(),
        }
    }
}

/// Conference record, parented by its organizer's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conference {
    /// Conference key.
    pub key: ConferenceKey,
    /// Required name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Organizer user id; equals the parent key.
    pub organizer_user_id: UserId,
    /// Topic tags.
    pub topics: Vec<String>,
    /// Host city.
    pub city: Option<String>,
    /// First day.
    pub start_date: Option<NaiveDate>,
    /// Month of `start_date`, 0 when unset.
    pub month: i64,
    /// Last day.
    pub end_date: Option<NaiveDate>,
    /// Capacity.
    pub max_attendees: i64,
    /// Remaining seats, `0 <= seats_available <= max_attendees`.
    pub seats_available: i64,
}

/// Session record, parented by its conference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session key.
    pub key: SessionKey,
    /// Required name.
    pub name: String,
    /// Type tags (lecture, keynote, workshop...).
    pub type_of_session: Vec<String>,
    /// Highlight tags.
    pub highlights: Vec<String>,
    /// Speakers.
    pub speaker: Vec<String>,
    /// Duration in minutes.
    pub duration: Option<i64>,
    /// Day of the session.
    pub date: Option<NaiveDate>,
    /// Start time of day.
    pub start_time: Option<NaiveTime>,
}

/// Conference query, optionally scoped to an organizer's profile.
pub type ConferenceQuery = Query<ConferenceProperty, ProfileKey>;
/// Session query, optionally scoped to a conference.
pub type SessionQuery = Query<SessionProperty, ConferenceKey>;

/// Any stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    /// Profile record.
    Profile(Profile),
    /// Conference record.
    Conference(Conference),
    /// Session record.
    Session(Session),
}

impl Entity {
    /// Key of the wrapped record.
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Profile(p) => EntityKey::Profile(p.key.clone()),
            Self::Conference(c) => EntityKey::Conference(c.key.clone()),
            Self::Session(s) => EntityKey::Session(s.key.clone()),
        }
    }

    /// Unwraps a profile.
    pub fn into_profile(self) -> Option<Profile> {
        match self {
            Self::Profile(p) => Some(p),
            _ => None,
        }
    }

    /// Unwraps a conference.
    pub fn into_conference(self) -> Option<Conference> {
        match self {
            Self::Conference(c) => Some(c),
            _ => None,
        }
    }

    /// Unwraps a session.
    pub fn into_session(self) -> Option<Session> {
        match self {
            Self::Session(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Profile> for Entity {
    fn from(value: Profile) -> Self {
        Self::Profile(value)
    }
}

impl From<Conference> for Entity {
    fn from(value: Conference) -> Self {
        Self::Conference(value)
    }
}

impl From<Session> for Entity {
    fn from(value: Session) -> Self {
        Self::Session(value)
    }
}

/// Indexed conference properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConferenceProperty {
    /// `name`
    Name,
    /// `city`
    City,
    /// `topics`
    Topics,
    /// `month`
    Month,
    /// `maxAttendees`
    MaxAttendees,
    /// `seatsAvailable`
    SeatsAvailable,
    /// `startDate`
    StartDate,
    /// `endDate`
    EndDate,
    /// `organizerUserId`
    OrganizerUserId,
}

impl PropertyName for ConferenceProperty {
    fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::City => "city",
            Self::Topics => "topics",
            Self::Month => "month",
            Self::MaxAttendees => "maxAttendees",
            Self::SeatsAvailable => "seatsAvailable",
            Self::StartDate => "startDate",
            Self::EndDate => "endDate",
            Self::OrganizerUserId => "organizerUserId",
        }
    }
}

impl Queryable for Conference {
    type Property = ConferenceProperty;

    fn property(&self, property: ConferenceProperty) -> Value {
        match property {
            ConferenceProperty::Name => Value::Str(self.name.clone()),
            ConferenceProperty::City => opt_str(&self.city),
            ConferenceProperty::Topics => Value::strings(&self.topics),
            ConferenceProperty::Month => Value::Int(self.month),
            ConferenceProperty::MaxAttendees => Value::Int(self.max_attendees),
            ConferenceProperty::SeatsAvailable => Value::Int(self.seats_available),
            ConferenceProperty::StartDate => self.start_date.map_or(Value::Null, Value::Date),
            ConferenceProperty::EndDate => self.end_date.map_or(Value::Null, Value::Date),
            ConferenceProperty::OrganizerUserId => Value::Str(self.organizer_user_id.clone()),
        }
    }
}

/// Indexed session properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionProperty {
    /// `name`
    Name,
    /// `typeOfSession`
    TypeOfSession,
    /// `highlights`
    Highlights,
    /// `speaker`
    Speaker,
    /// `duration`
    Duration,
    /// `date`
    Date,
    /// `startTime`
    StartTime,
}

impl PropertyName for SessionProperty {
    fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::TypeOfSession => "typeOfSession",
            Self::Highlights => "highlights",
            Self::Speaker => "speaker",
            Self::Duration => "duration",
            Self::Date => "date",
            Self::StartTime => "startTime",
        }
    }
}

impl Queryable for Session {
    type Property = SessionProperty;

    fn property(&self, property: SessionProperty) -> Value {
        match property {
            SessionProperty::Name => Value::Str(self.name.clone()),
            SessionProperty::TypeOfSession => Value::strings(&self.type_of_session),
            SessionProperty::Highlights => Value::strings(&self.highlights),
            SessionProperty::Speaker => Value::strings(&self.speaker),
            SessionProperty::Duration => self.duration.map_or(Value::Null, Value::Int),
            SessionProperty::Date => self.date.map_or(Value::Null, Value::Date),
            SessionProperty::StartTime => self.start_time.map_or(Value::Null, Value::Time),
        }
    }
}

fn opt_str(v: &Option<String>) -> Value {
    v.as_ref().map_or(Value::Null, |s| Value::Str(s.clone()))
}

//! Wire messages and the explicit conversions between them and stored records.
//!
//! Field names on the wire are camelCase. Dates travel as `YYYY-MM-DD` and
//! times as `HH:MM`; only that fixed-width prefix of an inbound value is read.

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    config::ConferenceDefaults,
    key::{ConferenceKey, SessionKey},
    model::{Conference, Profile, Session},
    types::{TeeShirtSize, UserId},
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Inbound form could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    /// A required field was empty or absent.
    #[error("{kind} 'name' field required")]
    MissingName {
        /// Record kind being created.
        kind: &'static str,
    },
    /// Date or time did not parse.
    #[error("could not parse {field} from {value:?}")]
    DateParse {
        /// Wire field name.
        field: &'static str,
        /// Offending input.
        value: String,
    },
}

/// Parses the leading `YYYY-MM-DD` of `raw`.
pub fn parse_date_prefix(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10)?;
    NaiveDate::parse_from_str(head, DATE_FORMAT).ok()
}

/// Parses the leading `HH:MM` of `raw`.
pub fn parse_time_prefix(raw: &str) -> Option<NaiveTime> {
    let head = raw.get(..5)?;
    NaiveTime::parse_from_str(head, TIME_FORMAT).ok()
}

fn date_field(field: &'static str, raw: Option<&str>) -> Result<Option<NaiveDate>, FormError> {
    match raw.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_date_prefix(s).map(Some).ok_or_else(|| FormError::DateParse {
            field,
            value: s.to_string(),
        }),
    }
}

fn time_field(field: &'static str, raw: Option<&str>) -> Result<Option<NaiveTime>, FormError> {
    match raw.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_time_prefix(s).map(Some).ok_or_else(|| FormError::DateParse {
            field,
            value: s.to_string(),
        }),
    }
}

fn require_name(kind: &'static str, name: Option<&str>) -> Result<String, FormError> {
    match name {
        Some(n) if !n.is_empty() => Ok(n.to_string()),
        _ => Err(FormError::MissingName { kind }),
    }
}

/// Outbound profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileForm {
    /// Display name.
    pub display_name: String,
    /// Primary email.
    pub main_email: String,
    /// T-shirt size.
    pub tee_shirt_size: TeeShirtSize,
}

impl From<&Profile> for ProfileForm {
    fn from(p: &Profile) -> Self {
        Self {
            display_name: p.display_name.clone(),
            main_email: p.main_email.clone(),
            tee_shirt_size: p.tee_shirt_size,
        }
    }
}

/// User-editable profile fields; unset or empty values are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileMiniForm {
    /// New display name.
    pub display_name: Option<String>,
    /// New t-shirt size.
    pub tee_shirt_size: Option<TeeShirtSize>,
}

impl ProfileMiniForm {
    /// Copies the set fields onto `profile`; returns whether anything changed.
    pub fn apply_to(&self, profile: &mut Profile) -> bool {
        let mut changed = false;
        if let Some(name) = self.display_name.as_ref().filter(|n| !n.is_empty()) {
            changed |= profile.display_name != *name;
            profile.display_name = name.clone();
        }
        if let Some(size) = self.tee_shirt_size {
            changed |= profile.tee_shirt_size != size;
            profile.tee_shirt_size = size;
        }
        changed
    }
}

/// Conference in both directions: the create request and the echoed record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConferenceForm {
    /// Required on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Set by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer_user_id: Option<UserId>,
    /// Topic tags; defaults when empty.
    pub topics: Vec<String>,
    /// Host city; defaults when missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// `YYYY-MM-DD`; longer strings are cut to that width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Month of `startDate`, 0 when unset. Set by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<i64>,
    /// Capacity; 0 means no seats.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attendees: Option<i64>,
    /// Seats left. Ignored on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats_available: Option<i64>,
    /// `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    /// Key of the stored conference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websafe_key: Option<String>,
    /// Organizer's display name, on reads that load it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer_display_name: Option<String>,
}

impl ConferenceForm {
    /// Outbound form for a stored conference.
    pub fn from_conference(conf: &Conference, organizer_display_name: Option<&str>) -> Self {
        Self {
            name: Some(conf.name.clone()),
            description: conf.description.clone(),
            organizer_user_id: Some(conf.organizer_user_id.clone()),
            topics: conf.topics.clone(),
            city: conf.city.clone(),
            start_date: conf.start_date.map(|d| d.format(DATE_FORMAT).to_string()),
            month: Some(conf.month),
            max_attendees: Some(conf.max_attendees),
            seats_available: Some(conf.seats_available),
            end_date: conf.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
            websafe_key: Some(conf.key.to_websafe()),
            organizer_display_name: organizer_display_name
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        }
    }

    /// Fills unset optional fields from `defaults`, so the echoed request
    /// carries the same values as the stored record.
    ///
    /// A caller never chooses `seatsAvailable`: it starts at `maxAttendees`
    /// when that is positive, otherwise at the configured default, and is
    /// kept within `0..=maxAttendees`. A negative `maxAttendees` counts as 0.
    pub fn apply_defaults(&mut self, defaults: &ConferenceDefaults) {
        if self.city.as_deref().is_none_or(str::is_empty) {
            self.city = Some(defaults.city.clone());
        }
        if self.topics.is_empty() {
            self.topics = defaults.topics.clone();
        }
        let max = self.max_attendees.unwrap_or(defaults.max_attendees).max(0);
        self.max_attendees = Some(max);
        self.seats_available = Some(if max > 0 {
            max
        } else {
            defaults.seats_available.clamp(0, max)
        });
    }

    /// Builds the record to store under `key`. Call [`Self::apply_defaults`] first.
    pub fn to_conference(&self, key: ConferenceKey) -> Result<Conference, FormError> {
        let name = require_name("Conference", self.name.as_deref())?;
        let start_date = date_field("startDate", self.start_date.as_deref())?;
        let end_date = date_field("endDate", self.end_date.as_deref())?;
        let month = start_date.map_or(0, |d| i64::from(d.month()));

        Ok(Conference {
            organizer_user_id: key.organizer.clone(),
            key,
            name,
            description: self.description.clone(),
            topics: self.topics.clone(),
            city: self.city.clone(),
            start_date,
            month,
            end_date,
            max_attendees: self.max_attendees.unwrap_or(0),
            seats_available: self.seats_available.unwrap_or(0),
        })
    }
}

/// Several conferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceForms {
    /// Results in query order.
    pub items: Vec<ConferenceForm>,
}

/// One `field operator value` triple as sent by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceQueryForm {
    /// Field name, e.g. `CITY`.
    pub field: String,
    /// Operator name, e.g. `GTEQ`.
    pub operator: String,
    /// Value as a string; numeric fields are coerced.
    pub value: String,
}

/// Conjunction of filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConferenceQueryForms {
    /// Filters in submission order.
    pub filters: Vec<ConferenceQueryForm>,
}

/// Single boolean result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanMessage {
    /// Result flag.
    pub data: bool,
}

/// Single string result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringMessage {
    /// Result text.
    pub data: String,
}

/// Request naming a conference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceGetRequest {
    /// Websafe conference key.
    pub websafe_conference_key: String,
}

/// Session in both directions: the create request and the echoed record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionForm {
    /// Required on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Session types, e.g. `workshop`.
    pub type_of_session: Vec<String>,
    /// Highlight tags.
    pub highlights: Vec<String>,
    /// Speaker names.
    pub speaker: Vec<String>,
    /// Length in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// `HH:MM`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Owning conference; required on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websafe_conference_key: Option<String>,
    /// Key of the stored session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websafe_key: Option<String>,
}

impl SessionForm {
    /// Outbound form for a stored session.
    pub fn from_session(session: &Session) -> Self {
        Self {
            name: Some(session.name.clone()),
            type_of_session: session.type_of_session.clone(),
            highlights: session.highlights.clone(),
            speaker: session.speaker.clone(),
            duration: session.duration,
            date: session.date.map(|d| d.format(DATE_FORMAT).to_string()),
            start_time: session.start_time.map(|t| t.format(TIME_FORMAT).to_string()),
            websafe_conference_key: Some(session.key.conference.to_websafe()),
            websafe_key: Some(session.key.to_websafe()),
        }
    }

    /// Builds the record to store under `key`.
    pub fn to_session(&self, key: SessionKey) -> Result<Session, FormError> {
        let name = require_name("Session", self.name.as_deref())?;
        Ok(Session {
            key,
            name,
            type_of_session: self.type_of_session.clone(),
            highlights: self.highlights.clone(),
            speaker: self.speaker.clone(),
            duration: self.duration,
            date: date_field("date", self.date.as_deref())?,
            start_time: time_field("startTime", self.start_time.as_deref())?,
        })
    }
}

/// Several sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionForms {
    /// Results in query order.
    pub items: Vec<SessionForm>,
}

/// Session selected by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWebsafe {
    /// Websafe session key.
    pub websafe_key: String,
}

/// Sessions of one conference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySessionByKey {
    /// Websafe conference key.
    pub websafe_conference_key: String,
}

/// Sessions of one conference with a given type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySessionByType {
    /// Websafe conference key.
    pub websafe_conference_key: String,
    /// Type to match.
    pub type_of_session: String,
}

/// Sessions of one speaker, across conferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySessionBySpeaker {
    /// Speaker to match.
    pub speaker: String,
}

/// `direction == true` selects sessions longer than `duration`, else shorter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySessionByDuration {
    /// Websafe conference key.
    pub websafe_conference_key: String,
    /// Threshold in minutes.
    pub duration: i64,
    /// Longer when set, shorter otherwise.
    #[serde(default)]
    pub direction: bool,
}

/// `direction == true` selects sessions starting after `start_time`, else before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySessionByStartTime {
    /// Websafe conference key.
    pub websafe_conference_key: String,
    /// Threshold as `HH:MM`.
    pub start_time: String,
    /// Later when set, earlier otherwise.
    #[serde(default)]
    pub direction: bool,
}

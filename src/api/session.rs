use tracing::{debug, info};

use crate::{
    error::ApiError,
    featured::{SpeakerCheck, NO_FEATURED_SPEAKER, FEATURED_SPEAKER_KEY},
    filter::SESSION_FILTERS,
    forms::{
        ConferenceQueryForm, QuerySessionByDuration, QuerySessionByKey, QuerySessionBySpeaker,
        QuerySessionByStartTime, QuerySessionByType, SessionForm, SessionForms, StringMessage,
    },
    key::{ConferenceKey, SessionKey},
    model::{Session, SessionQuery},
    types::Identity,
};

use super::{conference_key, require_identity, ConferenceApi};

impl ConferenceApi {
    /// `createSession`: only the conference organizer may add sessions.
    /// Sessions with speakers trigger a featured-speaker check.
    pub async fn create_session(
        &self,
        identity: Option<&Identity>,
        form: &SessionForm,
    ) -> Result<SessionForm, ApiError> {
        let identity = require_identity(identity)?;
        if form.name.as_deref().is_none_or(str::is_empty) {
            return Err(ApiError::MissingRequiredField(
                "Session 'name' field required".to_string(),
            ));
        }
        let websafe = form.websafe_conference_key.as_deref().unwrap_or_default();
        let conference = conference_key(websafe)?;
        if conference.organizer != identity.user_id {
            return Err(ApiError::Forbidden(
                "must be owner of conference".to_string(),
            ));
        }
        if self.store.get_conference(&conference).await?.is_none() {
            return Err(ApiError::NotFound(format!(
                "no conference found with key: {websafe}"
            )));
        }

        let id = self.store.allocate_id().await?;
        let session = form.to_session(SessionKey {
            conference: conference.clone(),
            id,
        })?;
        self.store.put(session.clone()).await?;
        info!(key = %session.key.to_websafe(), name = %session.name, "session created");

        if !session.speaker.is_empty() {
            self.tasks.enqueue(SpeakerCheck {
                conference,
                speakers: session.speaker.clone(),
            });
        }
        Ok(SessionForm::from_session(&session))
    }

    /// `getConferenceSessions`: every session of a conference, by name.
    pub async fn get_conference_sessions(
        &self,
        request: &QuerySessionByKey,
    ) -> Result<SessionForms, ApiError> {
        let key = conference_key(&request.websafe_conference_key)?;
        self.run_session_query(&[], Some(key)).await
    }

    /// `getConferenceSessionsByType`
    pub async fn get_conference_sessions_by_type(
        &self,
        request: &QuerySessionByType,
    ) -> Result<SessionForms, ApiError> {
        let key = conference_key(&request.websafe_conference_key)?;
        let filters = [descriptor("TYPE_OF_SESSION", "EQ", &request.type_of_session)];
        self.run_session_query(&filters, Some(key)).await
    }

    /// `getSessionsBySpeaker`: across all conferences.
    pub async fn get_sessions_by_speaker(
        &self,
        request: &QuerySessionBySpeaker,
    ) -> Result<SessionForms, ApiError> {
        let filters = [descriptor("SPEAKER", "EQ", &request.speaker)];
        self.run_session_query(&filters, None).await
    }

    /// `getSessionsByDuration`
    pub async fn get_sessions_by_duration(
        &self,
        request: &QuerySessionByDuration,
    ) -> Result<SessionForms, ApiError> {
        let key = conference_key(&request.websafe_conference_key)?;
        let filters = [descriptor(
            "DURATION",
            direction(request.direction),
            &request.duration.to_string(),
        )];
        self.run_session_query(&filters, Some(key)).await
    }

    /// `getSessionsByStartTime`
    pub async fn get_sessions_by_start_time(
        &self,
        request: &QuerySessionByStartTime,
    ) -> Result<SessionForms, ApiError> {
        let key = conference_key(&request.websafe_conference_key)?;
        let filters = [descriptor(
            "START_TIME",
            direction(request.direction),
            &request.start_time,
        )];
        self.run_session_query(&filters, Some(key)).await
    }

    /// `getFeaturedSpeaker`
    pub async fn get_featured_speaker(&self) -> Result<StringMessage, ApiError> {
        let data = self
            .cache
            .get(FEATURED_SPEAKER_KEY)
            .unwrap_or_else(|| NO_FEATURED_SPEAKER.to_string());
        Ok(StringMessage { data })
    }

    async fn run_session_query(
        &self,
        filters: &[ConferenceQueryForm],
        ancestor: Option<ConferenceKey>,
    ) -> Result<SessionForms, ApiError> {
        let query: SessionQuery = SESSION_FILTERS.compile(filters, ancestor)?;
        let sessions = self.store.query_sessions(query).await?;
        debug!(results = sessions.len(), "session query");
        Ok(session_forms(&sessions))
    }
}

pub(super) fn session_forms(sessions: &[Session]) -> SessionForms {
    SessionForms {
        items: sessions.iter().map(SessionForm::from_session).collect(),
    }
}

fn descriptor(field: &str, operator: &str, value: &str) -> ConferenceQueryForm {
    ConferenceQueryForm {
        field: field.to_string(),
        operator: operator.to_string(),
        value: value.to_string(),
    }
}

fn direction(after: bool) -> &'static str {
    if after { "GT" } else { "LT" }
}

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::{
    error::ApiError,
    filter::CONFERENCE_FILTERS,
    forms::{BooleanMessage, ConferenceForm, ConferenceForms, ConferenceGetRequest, ConferenceQueryForms},
    key::{ConferenceKey, EntityKey, ProfileKey},
    model::{Conference, ConferenceQuery},
    registration,
    types::Identity,
};

use super::{commit, conference_key, profile_in, require_identity, ConferenceApi};

impl ConferenceApi {
    /// `createConference`: stores a new conference owned by the caller and
    /// echoes the request with defaults, key and organizer filled in.
    pub async fn create_conference(
        &self,
        identity: Option<&Identity>,
        mut form: ConferenceForm,
    ) -> Result<ConferenceForm, ApiError> {
        let identity = require_identity(identity)?;
        if form.name.as_deref().is_none_or(str::is_empty) {
            return Err(ApiError::MissingRequiredField(
                "Conference 'name' field required".to_string(),
            ));
        }
        form.apply_defaults(&self.defaults);

        let organizer = self.load_or_create_profile(identity).await?;
        let id = self.store.allocate_id().await?;
        let key = ConferenceKey {
            organizer: organizer.key.0.clone(),
            id,
        };
        let conference = form.to_conference(key)?;
        self.store.put(conference.clone()).await?;
        info!(key = %conference.key.to_websafe(), name = %conference.name, "conference created");

        form.organizer_user_id = Some(conference.organizer_user_id.clone());
        form.month = Some(conference.month);
        form.websafe_key = Some(conference.key.to_websafe());
        Ok(form)
    }

    /// `queryConferences`
    pub async fn query_conferences(
        &self,
        request: &ConferenceQueryForms,
    ) -> Result<ConferenceForms, ApiError> {
        let query: ConferenceQuery = CONFERENCE_FILTERS.compile(&request.filters, None)?;
        debug!(filters = request.filters.len(), "querying conferences");
        let conferences = self.store.query_conferences(query).await?;
        Ok(ConferenceForms {
            items: conferences
                .iter()
                .map(|c| ConferenceForm::from_conference(c, None))
                .collect(),
        })
    }

    /// `getConference`
    pub async fn get_conference(
        &self,
        request: &ConferenceGetRequest,
    ) -> Result<ConferenceForm, ApiError> {
        let key = conference_key(&request.websafe_conference_key)?;
        let conference = self.require_conference(&key, &request.websafe_conference_key).await?;
        let organizer = self.store.get_profile(&key.parent()).await?;
        Ok(ConferenceForm::from_conference(
            &conference,
            organizer.as_ref().map(|p| p.display_name.as_str()),
        ))
    }

    /// `getConferencesCreated`: the caller's conferences, with their display name.
    pub async fn get_conferences_created(
        &self,
        identity: Option<&Identity>,
    ) -> Result<ConferenceForms, ApiError> {
        let identity = require_identity(identity)?;
        let profile = self.load_or_create_profile(identity).await?;
        let query = ConferenceQuery::new().ancestor(ProfileKey::new(identity.user_id.clone()));
        let conferences = self.store.query_conferences(query).await?;
        Ok(ConferenceForms {
            items: conferences
                .iter()
                .map(|c| ConferenceForm::from_conference(c, Some(&profile.display_name)))
                .collect(),
        })
    }

    /// `registerForConference`
    pub async fn register_for_conference(
        &self,
        identity: Option<&Identity>,
        request: &ConferenceGetRequest,
    ) -> Result<BooleanMessage, ApiError> {
        let identity = require_identity(identity)?;
        let websafe = request.websafe_conference_key.as_str();
        let key = &conference_key(websafe)?;

        self.retrying("register", move || async move {
            let mut tx = self.store.begin();
            let mut profile = profile_in(&mut tx, identity).await?;
            let mut conference = tx
                .get_conference(key)
                .await?
                .ok_or_else(|| not_found(websafe))?;
            registration::register(&mut profile, &mut conference)?;
            tx.put(profile);
            tx.put(conference);
            commit(tx, ()).await
        })
        .await?;

        info!(user = %identity.user_id, conference = %websafe, "registered");
        Ok(BooleanMessage { data: true })
    }

    /// `unregisterFromConference`: `false` when the caller was not registered.
    pub async fn unregister_from_conference(
        &self,
        identity: Option<&Identity>,
        request: &ConferenceGetRequest,
    ) -> Result<BooleanMessage, ApiError> {
        let identity = require_identity(identity)?;
        let websafe = request.websafe_conference_key.as_str();
        let key = &conference_key(websafe)?;

        let removed = self
            .retrying("unregister", move || async move {
                let mut tx = self.store.begin();
                let mut profile = profile_in(&mut tx, identity).await?;
                let mut conference = tx
                    .get_conference(key)
                    .await?
                    .ok_or_else(|| not_found(websafe))?;
                let removed = registration::unregister(&mut profile, &mut conference);
                tx.put(profile);
                if removed {
                    tx.put(conference);
                }
                commit(tx, removed).await
            })
            .await?;

        debug!(user = %identity.user_id, conference = %websafe, removed, "unregister");
        Ok(BooleanMessage { data: removed })
    }

    /// `getConferencesToAttend`: conferences in the caller's membership list,
    /// in registration order. Memberships whose conference is gone are skipped.
    pub async fn get_conferences_to_attend(
        &self,
        identity: Option<&Identity>,
    ) -> Result<ConferenceForms, ApiError> {
        let identity = require_identity(identity)?;
        let profile = self.load_or_create_profile(identity).await?;
        let keys: Vec<EntityKey> = profile
            .conference_keys_to_attend
            .iter()
            .filter_map(|ws| ConferenceKey::from_websafe(ws).ok())
            .map(EntityKey::from)
            .collect();

        let conferences: Vec<Conference> = self
            .store
            .get_multi(keys)
            .await?
            .into_iter()
            .flatten()
            .filter_map(|v| v.value.into_conference())
            .collect();

        let mut organizers: HashMap<ProfileKey, Option<String>> = HashMap::new();
        for conf in &conferences {
            let parent = conf.key.parent();
            if !organizers.contains_key(&parent) {
                let name = self.store.get_profile(&parent).await?.map(|p| p.display_name);
                organizers.insert(parent, name);
            }
        }

        Ok(ConferenceForms {
            items: conferences
                .iter()
                .map(|c| {
                    let name = organizers.get(&c.key.parent()).and_then(|n| n.as_deref());
                    ConferenceForm::from_conference(c, name)
                })
                .collect(),
        })
    }

    async fn require_conference(
        &self,
        key: &ConferenceKey,
        websafe: &str,
    ) -> Result<Conference, ApiError> {
        self.store
            .get_conference(key)
            .await?
            .ok_or_else(|| not_found(websafe))
    }
}

fn not_found(websafe: &str) -> ApiError {
    ApiError::NotFound(format!("no conference found with key: {websafe}"))
}

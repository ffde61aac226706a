use tracing::info;

use crate::{
    error::ApiError,
    forms::{BooleanMessage, SessionForms, SessionWebsafe},
    key::{EntityKey, SessionKey},
    model::Session,
    registration,
    types::Identity,
};

use super::{commit, profile_in, require_identity, session::session_forms, session_key, ConferenceApi};

impl ConferenceApi {
    /// `addSessionToWishlist`
    pub async fn add_session_to_wishlist(
        &self,
        identity: Option<&Identity>,
        request: &SessionWebsafe,
    ) -> Result<BooleanMessage, ApiError> {
        self.change_wishlist(identity, request, true).await
    }

    /// `removeSessionFromWishlist`
    pub async fn remove_session_from_wishlist(
        &self,
        identity: Option<&Identity>,
        request: &SessionWebsafe,
    ) -> Result<BooleanMessage, ApiError> {
        self.change_wishlist(identity, request, false).await
    }

    /// `getSessionsInWishlist`: wishlisted sessions in the order they were
    /// added; entries whose session is gone are skipped.
    pub async fn get_sessions_in_wishlist(
        &self,
        identity: Option<&Identity>,
    ) -> Result<SessionForms, ApiError> {
        let identity = require_identity(identity)?;
        let profile = self.load_or_create_profile(identity).await?;
        let keys: Vec<EntityKey> = profile
            .session_wishlist
            .iter()
            .filter_map(|ws| SessionKey::from_websafe(ws).ok())
            .map(EntityKey::from)
            .collect();
        let sessions: Vec<Session> = self
            .store
            .get_multi(keys)
            .await?
            .into_iter()
            .flatten()
            .filter_map(|v| v.value.into_session())
            .collect();
        Ok(session_forms(&sessions))
    }

    async fn change_wishlist(
        &self,
        identity: Option<&Identity>,
        request: &SessionWebsafe,
        add: bool,
    ) -> Result<BooleanMessage, ApiError> {
        let identity = require_identity(identity)?;
        let websafe = request.websafe_key.as_str();
        let key = &session_key(websafe)?;
        let canonical = &key.to_websafe();

        self.retrying("wishlist", move || async move {
            let mut tx = self.store.begin();
            if tx.get_session(key).await?.is_none() {
                return Err(ApiError::NotFound(format!(
                    "there is no session with key: {websafe}"
                )));
            }
            let mut profile = profile_in(&mut tx, identity).await?;
            if add {
                registration::add_to_wishlist(&mut profile, canonical)?;
            } else {
                registration::remove_from_wishlist(&mut profile, canonical)?;
            }
            tx.put(profile);
            commit(tx, ()).await
        })
        .await?;

        info!(user = %identity.user_id, session = %websafe, add, "wishlist changed");
        Ok(BooleanMessage { data: true })
    }
}

use tracing::debug;

use crate::{
    error::ApiError,
    forms::{ProfileForm, ProfileMiniForm},
    types::Identity,
};

use super::{commit, profile_in, require_identity, ConferenceApi};

impl ConferenceApi {
    /// `getProfile`
    pub async fn get_profile(&self, identity: Option<&Identity>) -> Result<ProfileForm, ApiError> {
        let identity = require_identity(identity)?;
        let profile = self.load_or_create_profile(identity).await?;
        Ok(ProfileForm::from(&profile))
    }

    /// `saveProfile`: updates display name and t-shirt size when given.
    pub async fn save_profile(
        &self,
        identity: Option<&Identity>,
        form: &ProfileMiniForm,
    ) -> Result<ProfileForm, ApiError> {
        let identity = require_identity(identity)?;
        let profile = self
            .retrying("save profile", move || async move {
                let mut tx = self.store.begin();
                let mut profile = profile_in(&mut tx, identity).await?;
                form.apply_to(&mut profile);
                tx.put(profile.clone());
                commit(tx, profile).await
            })
            .await?;
        debug!(user = %identity.user_id, "profile saved");
        Ok(ProfileForm::from(&profile))
    }
}

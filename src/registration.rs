//! Membership transitions on a profile: conference registration and the
//! session wishlist.
//!
//! These are pure edits of in-memory records. Callers load the records inside
//! a [`crate::runtime::transaction::Transaction`] and write both back on
//! success, so the seat counter and the membership list move together.

use crate::model::{Conference, Profile};

/// Transition refused in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The profile already holds a seat.
    #[error("you have already registered for this conference")]
    AlreadyRegistered,
    /// No seats left.
    #[error("there are no seats available")]
    NoSeatsAvailable,
    /// The session is already on the wishlist.
    #[error("this session is on your wishlist already")]
    AlreadyWishlisted,
    /// The session is not on the wishlist.
    #[error("this session is not on your wishlist")]
    NotWishlisted,
}

/// Whether a profile holds a seat at a conference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// No seat held.
    NotRegistered,
    /// Seat held; the key is in `conferenceKeysToAttend`.
    Registered,
}

/// Whether a session is on a profile's wishlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WishlistState {
    /// Not on the wishlist.
    NotWishlisted,
    /// On the wishlist.
    Wishlisted,
}

/// Membership of `conference_websafe` in the profile's attend list.
pub fn registration_state(profile: &Profile, conference_websafe: &str) -> RegistrationState {
    if profile
        .conference_keys_to_attend
        .iter()
        .any(|k| k == conference_websafe)
    {
        RegistrationState::Registered
    } else {
        RegistrationState::NotRegistered
    }
}

/// Membership of `session_websafe` in the profile's wishlist.
pub fn wishlist_state(profile: &Profile, session_websafe: &str) -> WishlistState {
    if profile.session_wishlist.iter().any(|k| k == session_websafe) {
        WishlistState::Wishlisted
    } else {
        WishlistState::NotWishlisted
    }
}

/// Takes a seat and records the membership.
pub fn register(profile: &mut Profile, conference: &mut Conference) -> Result<(), TransitionError> {
    let websafe = conference.key.to_websafe();
    if registration_state(profile, &websafe) == RegistrationState::Registered {
        return Err(TransitionError::AlreadyRegistered);
    }
    if conference.seats_available <= 0 {
        return Err(TransitionError::NoSeatsAvailable);
    }
    profile.conference_keys_to_attend.push(websafe);
    conference.seats_available -= 1;
    Ok(())
}

/// Gives the seat back. Returns `false`, changing nothing, when the profile
/// was not registered.
pub fn unregister(profile: &mut Profile, conference: &mut Conference) -> bool {
    let websafe = conference.key.to_websafe();
    let before = profile.conference_keys_to_attend.len();
    profile.conference_keys_to_attend.retain(|k| *k != websafe);
    if profile.conference_keys_to_attend.len() == before {
        return false;
    }
    conference.seats_available += 1;
    true
}

/// Adds a session key; refuses duplicates.
pub fn add_to_wishlist(profile: &mut Profile, session_websafe: &str) -> Result<(), TransitionError> {
    if wishlist_state(profile, session_websafe) == WishlistState::Wishlisted {
        return Err(TransitionError::AlreadyWishlisted);
    }
    profile.session_wishlist.push(session_websafe.to_string());
    Ok(())
}

/// Removes a session key; refuses keys that are not there.
pub fn remove_from_wishlist(
    profile: &mut Profile,
    session_websafe: &str,
) -> Result<(), TransitionError> {
    if wishlist_state(profile, session_websafe) == WishlistState::NotWishlisted {
        return Err(TransitionError::NotWishlisted);
    }
    profile.session_wishlist.retain(|k| k != session_websafe);
    Ok(())
}

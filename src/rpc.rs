//! Method-name dispatch and the JSON-lines request/response envelope.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{api::ConferenceApi, error::ApiError, types::Identity};

/// One inbound line.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    /// Echoed back unchanged; null when absent.
    #[serde(default)]
    pub id: Value,
    /// API method name, e.g. `createConference`.
    pub method: String,
    /// Caller identity for authenticated methods.
    #[serde(default)]
    pub identity: Option<Identity>,
    /// Method parameters; null means defaults.
    #[serde(default)]
    pub params: Value,
}

/// Error half of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Stable code from [`ApiError::code`].
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

impl From<&ApiError> for RpcError {
    fn from(err: &ApiError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// One outbound line: exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Id of the request this answers.
    pub id: Value,
    /// Method result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Wraps a method outcome.
    pub fn from_result(id: Value, result: Result<Value, ApiError>) -> Self {
        match result {
            Ok(value) => Self {
                id,
                result: Some(value),
                error: None,
            },
            Err(err) => Self {
                id,
                result: None,
                error: Some(RpcError::from(&err)),
            },
        }
    }
}

/// Handles one decoded request.
pub async fn handle(api: &ConferenceApi, request: RpcRequest) -> RpcResponse {
    let result = dispatch(api, request.identity.as_ref(), &request.method, request.params).await;
    RpcResponse::from_result(request.id, result)
}

/// Handles one raw line; undecodable input is answered with an
/// `INVALID_REQUEST` error and a null id.
pub async fn handle_line(api: &ConferenceApi, line: &str) -> RpcResponse {
    match serde_json::from_str::<RpcRequest>(line) {
        Ok(request) => handle(api, request).await,
        Err(err) => RpcResponse {
            id: Value::Null,
            result: None,
            error: Some(RpcError {
                code: "INVALID_REQUEST".to_string(),
                message: err.to_string(),
            }),
        },
    }
}

/// Routes `method` to its [`ConferenceApi`] call. Unknown methods are
/// `NOT_FOUND`; undecodable params are `MISSING_REQUIRED_FIELD`.
pub async fn dispatch(
    api: &ConferenceApi,
    identity: Option<&Identity>,
    method: &str,
    params: Value,
) -> Result<Value, ApiError> {
    debug!(method, authenticated = identity.is_some(), "rpc");
    match method {
        "getProfile" => reply(api.get_profile(identity).await),
        "saveProfile" => reply(api.save_profile(identity, &params_or_default(params)?).await),
        "createConference" => reply(api.create_conference(identity, params_or_default(params)?).await),
        "queryConferences" => reply(api.query_conferences(&params_or_default(params)?).await),
        "getConference" => reply(api.get_conference(&decode(params)?).await),
        "getConferencesCreated" => reply(api.get_conferences_created(identity).await),
        "registerForConference" => {
            reply(api.register_for_conference(identity, &decode(params)?).await)
        }
        "unregisterFromConference" => {
            reply(api.unregister_from_conference(identity, &decode(params)?).await)
        }
        "getConferencesToAttend" => reply(api.get_conferences_to_attend(identity).await),
        "createSession" => reply(api.create_session(identity, &params_or_default(params)?).await),
        "getConferenceSessions" => reply(api.get_conference_sessions(&decode(params)?).await),
        "getConferenceSessionsByType" => {
            reply(api.get_conference_sessions_by_type(&decode(params)?).await)
        }
        "getSessionsBySpeaker" => reply(api.get_sessions_by_speaker(&decode(params)?).await),
        "getSessionsByDuration" => reply(api.get_sessions_by_duration(&decode(params)?).await),
        "getSessionsByStartTime" => reply(api.get_sessions_by_start_time(&decode(params)?).await),
        "addSessionToWishlist" => {
            reply(api.add_session_to_wishlist(identity, &decode(params)?).await)
        }
        "removeSessionFromWishlist" => {
            reply(api.remove_session_from_wishlist(identity, &decode(params)?).await)
        }
        "getSessionsInWishlist" => reply(api.get_sessions_in_wishlist(identity).await),
        "getFeaturedSpeaker" => reply(api.get_featured_speaker().await),
        other => Err(ApiError::NotFound(format!("unknown method: {other}"))),
    }
}

fn decode<T: DeserializeOwned>(params: Value) -> Result<T, ApiError> {
    serde_json::from_value(params)
        .map_err(|err| ApiError::MissingRequiredField(format!("invalid params: {err}")))
}

/// Like [`decode`], but a missing `params` means an empty message.
fn params_or_default<T: DeserializeOwned + Default>(params: Value) -> Result<T, ApiError> {
    if params.is_null() {
        Ok(T::default())
    } else {
        decode(params)
    }
}

fn reply<T: Serialize>(result: Result<T, ApiError>) -> Result<Value, ApiError> {
    let value = result?;
    serde_json::to_value(value).map_err(|err| ApiError::Internal(err.to_string()))
}

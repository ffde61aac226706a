//! Errors surfaced by the conference API, each with a stable code.

use crate::{
    core::{query::QueryError, store::StoreError},
    filter::FilterError,
    forms::FormError,
    registration::TransitionError,
    runtime::handle::RuntimeError,
};

/// Every way an endpoint call can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The call needs a caller identity and none was given.
    #[error("authorization required")]
    Unauthenticated,
    /// A required form field is missing or empty.
    #[error("{0}")]
    MissingRequiredField(String),
    /// Unknown filter field or operator.
    #[error("{0}")]
    InvalidFilter(String),
    /// Inequality filters on two different fields.
    #[error("inequality filter is allowed on only one field ({first}, {second})")]
    MultipleInequalityFields {
        /// Field of the first inequality filter.
        first: String,
        /// Field of the conflicting one.
        second: String,
    },
    /// Filter value could not be coerced to the field's type.
    #[error("{0}")]
    InvalidFilterValue(String),
    /// Date or time field in the wrong format.
    #[error("{0}")]
    DateParse(String),
    /// No entity under the key, or the key does not decode.
    #[error("{0}")]
    NotFound(String),
    /// The membership change is already in effect.
    #[error("{0}")]
    Conflict(String),
    /// The conference is full.
    #[error("there are no seats available")]
    NoSeatsAvailable,
    /// Caller does not own the conference.
    #[error("{0}")]
    Forbidden(String),
    /// Contention or persistence pressure; retrying may succeed.
    #[error("{0}")]
    Transient(String),
    /// Store runtime unavailable.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::MissingRequiredField(_) => "MISSING_REQUIRED_FIELD",
            Self::InvalidFilter(_) => "INVALID_FILTER",
            Self::MultipleInequalityFields { .. } => "MULTIPLE_INEQUALITY_FIELDS",
            Self::InvalidFilterValue(_) => "INVALID_FILTER_VALUE",
            Self::DateParse(_) => "DATE_PARSE_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::NoSeatsAvailable => "NO_SEATS_AVAILABLE",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Transient(_) => "TRANSIENT",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::InvalidField(_) | FilterError::InvalidOperator(_) => {
                Self::InvalidFilter(err.to_string())
            }
            FilterError::MultipleInequalityFields { first, second } => {
                Self::MultipleInequalityFields {
                    first: first.to_string(),
                    second: second.to_string(),
                }
            }
            FilterError::InvalidValue { .. } => Self::InvalidFilterValue(err.to_string()),
            FilterError::TimeParse { .. } => Self::DateParse(err.to_string()),
        }
    }
}

impl From<FormError> for ApiError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::MissingName { .. } => Self::MissingRequiredField(err.to_string()),
            FormError::DateParse { .. } => Self::DateParse(err.to_string()),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NoSeatsAvailable => Self::NoSeatsAvailable,
            TransitionError::AlreadyRegistered
            | TransitionError::AlreadyWishlisted
            | TransitionError::NotWishlisted => Self::Conflict(err.to_string()),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::MultipleInequality { first, second } => Self::MultipleInequalityFields {
                first: first.to_string(),
                second: second.to_string(),
            },
            QueryError::InequalityNotFirstSort(_) => Self::InvalidFilter(err.to_string()),
        }
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Store(StoreError::InvalidQuery(q)) => q.into(),
            RuntimeError::Store(StoreError::Contention(key)) => {
                Self::Transient(format!("too much contention on {key}, try again"))
            }
            RuntimeError::Store(other) => Self::Internal(other.to_string()),
            RuntimeError::Persist(p) => Self::Transient(p.to_string()),
            RuntimeError::ChannelClosed => Self::Internal("store runtime channel closed".to_string()),
        }
    }
}

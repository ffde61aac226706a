//! Compiles caller-supplied `field operator value` triples into store queries.
//!
//! Field and operator names resolve through closed tables, values are coerced
//! to the property's kind, and at most one field may carry inequality
//! operators. Results are ordered by the inequality field (if any) and then
//! by name.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    core::query::{Operator, PropertyName, Query, Value},
    forms::{parse_time_prefix, ConferenceQueryForm},
    model::{ConferenceProperty, SessionProperty},
};

/// Filter list rejected before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// Field name not in the schema.
    #[error("filter contains invalid field: {0:?}")]
    InvalidField(String),
    /// Operator name not one of `EQ GT GTEQ LT LTEQ NE`.
    #[error("filter contains invalid operator: {0:?}")]
    InvalidOperator(String),
    /// Inequality operators on two different fields.
    #[error("inequality filter is allowed on only one field, got {first} and {second}")]
    MultipleInequalityFields {
        /// Property of the first inequality filter.
        first: &'static str,
        /// Property of the conflicting one.
        second: &'static str,
    },
    /// Integer field given a non-integer value.
    #[error("{field} expects an integer, got {value:?}")]
    InvalidValue {
        /// Wire field name.
        field: &'static str,
        /// Value as sent.
        value: String,
    },
    /// Time field given something other than `HH:MM`.
    #[error("{field} expects HH:MM, got {value:?}")]
    TimeParse {
        /// Wire field name.
        field: &'static str,
        /// Value as sent.
        value: String,
    },
}

/// Wire operator names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    /// `EQ`
    Eq,
    /// `GT`
    Gt,
    /// `GTEQ`
    Gteq,
    /// `LT`
    Lt,
    /// `LTEQ`
    Lteq,
    /// `NE`
    Ne,
}

impl FilterOperator {
    const ALL: [(Self, &'static str, Operator); 6] = [
        (Self::Eq, "EQ", Operator::Eq),
        (Self::Gt, "GT", Operator::Gt),
        (Self::Gteq, "GTEQ", Operator::Ge),
        (Self::Lt, "LT", Operator::Lt),
        (Self::Lteq, "LTEQ", Operator::Le),
        (Self::Ne, "NE", Operator::Ne),
    ];

    /// Store operator this name stands for.
    pub fn operator(self) -> Operator {
        Self::ALL
            .iter()
            .find(|(op, _, _)| *op == self)
            .map_or(Operator::Eq, |(_, _, o)| *o)
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(op, _, _)| *op == self)
            .map_or("EQ", |(_, name, _)| *name)
    }
}

impl FromStr for FilterOperator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|(_, name, _)| *name == s)
            .map(|(op, _, _)| *op)
            .ok_or_else(|| FilterError::InvalidOperator(s.to_string()))
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a filter value is read from its wire string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Used as sent.
    Str,
    /// Parsed as a signed integer.
    Int,
    /// `HH:MM`, extra characters ignored.
    Time,
}

/// One filterable field: wire name, stored property, value kind.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec<P: 'static> {
    /// Name callers use, e.g. `MAX_ATTENDEES`.
    pub name: &'static str,
    /// Property the filter applies to.
    pub property: P,
    /// How the value string is coerced.
    pub kind: ValueKind,
}

/// Closed table of filterable fields for one record kind, plus the property
/// used as the final sort key.
#[derive(Debug, Clone, Copy)]
pub struct FilterSchema<P: 'static> {
    /// Every filterable field.
    pub fields: &'static [FieldSpec<P>],
    /// Tie-breaking sort key.
    pub name_property: P,
}

/// Filterable conference fields.
pub static CONFERENCE_FILTERS: FilterSchema<ConferenceProperty> = FilterSchema {
    fields: &[
        FieldSpec {
            name: "CITY",
            property: ConferenceProperty::City,
            kind: ValueKind::Str,
        },
        FieldSpec {
            name: "TOPIC",
            property: ConferenceProperty::Topics,
            kind: ValueKind::Str,
        },
        FieldSpec {
            name: "MONTH",
            property: ConferenceProperty::Month,
            kind: ValueKind::Int,
        },
        FieldSpec {
            name: "MAX_ATTENDEES",
            property: ConferenceProperty::MaxAttendees,
            kind: ValueKind::Int,
        },
    ],
    name_property: ConferenceProperty::Name,
};

/// Filterable session fields.
pub static SESSION_FILTERS: FilterSchema<SessionProperty> = FilterSchema {
    fields: &[
        FieldSpec {
            name: "NAME",
            property: SessionProperty::Name,
            kind: ValueKind::Str,
        },
        FieldSpec {
            name: "TYPE_OF_SESSION",
            property: SessionProperty::TypeOfSession,
            kind: ValueKind::Str,
        },
        FieldSpec {
            name: "SPEAKER",
            property: SessionProperty::Speaker,
            kind: ValueKind::Str,
        },
        FieldSpec {
            name: "HIGHLIGHTS",
            property: SessionProperty::Highlights,
            kind: ValueKind::Str,
        },
        FieldSpec {
            name: "DURATION",
            property: SessionProperty::Duration,
            kind: ValueKind::Int,
        },
        FieldSpec {
            name: "START_TIME",
            property: SessionProperty::StartTime,
            kind: ValueKind::Time,
        },
    ],
    name_property: SessionProperty::Name,
};

impl<P: Copy + Eq + PropertyName> FilterSchema<P> {
    /// Looks up a field by wire name.
    pub fn field(&self, name: &str) -> Result<&FieldSpec<P>, FilterError> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| FilterError::InvalidField(name.to_string()))
    }

    /// Resolves, coerces and checks `descriptors`, returning a fresh query.
    pub fn compile<A>(
        &self,
        descriptors: &[ConferenceQueryForm],
        ancestor: Option<A>,
    ) -> Result<Query<P, A>, FilterError> {
        let mut query = Query::new();
        let mut inequality: Option<&FieldSpec<P>> = None;

        for d in descriptors {
            let spec = self.field(&d.field)?;
            let op = d.operator.parse::<FilterOperator>()?.operator();

            if op.is_inequality() {
                match inequality {
                    Some(prev) if prev.property != spec.property => {
                        return Err(FilterError::MultipleInequalityFields {
                            first: prev.property.name(),
                            second: spec.property.name(),
                        });
                    }
                    _ => inequality = Some(spec),
                }
            }

            let value = coerce(spec, &d.value)?;
            query = query.filter(spec.property, op, value);
        }

        if let Some(spec) = inequality {
            if spec.property != self.name_property {
                query = query.order(spec.property);
            }
        }
        query = query.order(self.name_property);
        query.ancestor = ancestor;
        Ok(query)
    }
}

fn coerce<P: Copy + PropertyName>(spec: &FieldSpec<P>, raw: &str) -> Result<Value, FilterError> {
    match spec.kind {
        ValueKind::Str => Ok(Value::Str(raw.to_string())),
        ValueKind::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| FilterError::InvalidValue {
                field: spec.property.name(),
                value: raw.to_string(),
            }),
        ValueKind::Time => parse_time_prefix(raw)
            .map(Value::Time)
            .ok_or_else(|| FilterError::TimeParse {
                field: spec.property.name(),
                value: raw.to_string(),
            }),
    }
}

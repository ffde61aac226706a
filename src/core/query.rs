//! Property filters, ordering and query execution over stored records.
//!
//! Semantics follow the document-store rules the API was written against:
//! a repeated property matches when any element matches, an unset property
//! never matches a filter, and at most one property may carry inequality
//! filters, which must then be the first sort key.

use std::{cmp::Ordering, fmt};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Value of a single record property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Unset.
    Null,
    /// Integer property.
    Int(i64),
    /// String property.
    Str(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Repeated property.
    List(Vec<Value>),
}

impl Value {
    /// Builds a list value from strings.
    pub fn strings(items: &[String]) -> Self {
        Self::List(items.iter().cloned().map(Self::Str).collect())
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Int(_) => 1,
            Self::Str(_) => 2,
            Self::Date(_) => 3,
            Self::Time(_) => 4,
            Self::List(_) => 5,
        }
    }

    /// Compares two scalars of the same type; `None` across types.
    fn cmp_scalar(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::Time(a), Self::Time(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting; lists sort by their smallest element.
    fn sort_cmp(&self, other: &Self) -> Ordering {
        let a = self.sort_repr();
        let b = other.sort_repr();
        match (a, b) {
            (Some(a), Some(b)) => a
                .cmp_scalar(b)
                .unwrap_or_else(|| a.rank().cmp(&b.rank())),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    fn sort_repr(&self) -> Option<&Self> {
        match self {
            Self::Null => None,
            Self::List(items) => items.iter().min_by(|a, b| a.sort_cmp(b)),
            other => Some(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::Date(v) => write!(f, "{v}"),
            Self::Time(v) => write!(f, "{}", v.format("%H:%M")),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Comparison operator of a property filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Operator {
    /// Every operator except `=` is an inequality.
    pub fn is_inequality(self) -> bool {
        self != Self::Eq
    }

    /// Symbol as written in a query, e.g. `>=`.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
        }
    }
}

/// Record kind that can be filtered and ordered by named properties.
pub trait Queryable: Clone {
    /// Closed set of indexed properties.
    type Property: Copy + Eq + fmt::Debug + PropertyName;

    /// Reads a property value off the record.
    fn property(&self, property: Self::Property) -> Value;
}

/// Stored property name, used in messages and the journal.
pub trait PropertyName {
    /// Name as stored, e.g. `maxAttendees`.
    fn name(self) -> &'static str;
}

/// Single `property op value` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFilter<P> {
    /// Filtered property.
    pub property: P,
    /// Comparison.
    pub op: Operator,
    /// Right-hand side.
    pub value: Value,
}

impl<P: Copy> PropertyFilter<P> {
    fn matches<E: Queryable<Property = P>>(&self, record: &E) -> bool {
        match record.property(self.property) {
            Value::Null => false,
            Value::List(items) => items.iter().any(|v| self.matches_scalar(v)),
            scalar => self.matches_scalar(&scalar),
        }
    }

    fn matches_scalar(&self, v: &Value) -> bool {
        v.cmp_scalar(&self.value)
            .is_some_and(|ord| self.op.accepts(ord))
    }
}

/// Query rejected before execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Inequality filters on two different properties.
    #[error("inequality filters on more than one property: {first} and {second}")]
    MultipleInequality {
        /// Property first seen with an inequality.
        first: &'static str,
        /// Second, different property.
        second: &'static str,
    },
    /// Inequality property is not the first sort key.
    #[error("inequality property {0} must be the first sort order")]
    InequalityNotFirstSort(&'static str),
}

/// Filtered, ordered query over one record kind, optionally scoped to an ancestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query<P, A> {
    /// Restrict results to descendants of this key.
    pub ancestor: Option<A>,
    /// Conjunction of filters.
    pub filters: Vec<PropertyFilter<P>>,
    /// Ascending sort keys, most significant first.
    pub orders: Vec<P>,
}

impl<P, A> Default for Query<P, A> {
    fn default() -> Self {
        Self {
            ancestor: None,
            filters: Vec::new(),
            orders: Vec::new(),
        }
    }
}

impl<P: Copy + Eq + PropertyName, A> Query<P, A> {
    /// Unfiltered, unordered query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scopes the query under `ancestor`.
    pub fn ancestor(mut self, ancestor: A) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    /// Adds a filter.
    pub fn filter(mut self, property: P, op: Operator, value: Value) -> Self {
        self.filters.push(PropertyFilter { property, op, value });
        self
    }

    /// Appends an ascending sort key.
    pub fn order(mut self, property: P) -> Self {
        self.orders.push(property);
        self
    }

    /// The single inequality property, if any.
    pub fn inequality_property(&self) -> Result<Option<P>, QueryError> {
        let mut found: Option<P> = None;
        for f in self.filters.iter().filter(|f| f.op.is_inequality()) {
            match found {
                Some(p) if p != f.property => {
                    return Err(QueryError::MultipleInequality {
                        first: p.name(),
                        second: f.property.name(),
                    });
                }
                _ => found = Some(f.property),
            }
        }
        Ok(found)
    }

    /// Checks the single-inequality and first-sort-key rules.
    pub fn validate(&self) -> Result<(), QueryError> {
        if let Some(p) = self.inequality_property()? {
            if !self.orders.is_empty() && self.orders.first() != Some(&p) {
                return Err(QueryError::InequalityNotFirstSort(p.name()));
            }
        }
        Ok(())
    }

    /// Runs the query over `candidates`, which must already be in key order
    /// and restricted to the ancestor.
    pub fn execute<'a, E, I>(&self, candidates: I) -> Result<Vec<E>, QueryError>
    where
        E: Queryable<Property = P> + 'a,
        I: IntoIterator<Item = &'a E>,
    {
        self.validate()?;

        let mut out: Vec<E> = candidates
            .into_iter()
            .filter(|rec| self.filters.iter().all(|f| f.matches(*rec)))
            .cloned()
            .collect();

        if !self.orders.is_empty() {
            out.sort_by(|a, b| {
                self.orders
                    .iter()
                    .map(|p| a.property(*p).sort_cmp(&b.property(*p)))
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }
        Ok(out)
    }
}

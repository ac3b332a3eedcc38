use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use url::form_urlencoded;

/// A single request parameter value
///
/// Both the signing serialization and the transport serialization go through
/// the `Display` impl, so the two can never disagree on how a value reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Plain string value
    Str(String),
    /// Integer value, rendered as decimal
    Int(i64),
    /// Point in time, rendered as decimal Unix seconds
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.timestamp()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// The parameter set of one CMQ request
///
/// Parameters are kept sorted by name in byte-wise ascending order, which is
/// the order the service uses when it recomputes the signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    params: BTreeMap<String, ParamValue>,
}

impl RequestParams {
    /// Creates an empty parameter set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, replacing any previous value with the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.insert(name.into(), value.into());
    }

    /// Builder-style variant of [`RequestParams::insert`]
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the value of a parameter
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Number of parameters in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the set has no parameters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates the parameters in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serializes the parameters for signing: sorted, `key=value` joined by
    /// `&`, values NOT escaped
    #[must_use]
    pub fn canonical_string(&self) -> String {
        self.iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Serializes the parameters for transport: same order as
    /// [`RequestParams::canonical_string`], values form-urlencoded, with the
    /// `Signature` parameter appended last
    #[must_use]
    pub fn signed_query_string(&self, signature: &str) -> String {
        self.iter()
            .map(|(name, value)| (name, value.to_string()))
            .chain(std::iter::once((SIGNATURE_PARAM, signature.to_string())))
            .map(|(name, value)| format!("{name}={}", escape(&value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Name of the parameter carrying the request signature
pub const SIGNATURE_PARAM: &str = "Signature";

fn escape(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

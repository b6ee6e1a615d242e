use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::error::ValidationError;

/// Marker key of a payload that records a failed lookup instead of weather data.
pub const BAD_REQUEST: &str = "bad_request";

/// Display name used until the upstream service resolves the location.
pub const UNRESOLVED: &str = "None";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Free-text location as typed by the user. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocationInput(String);

impl LocationInput {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::BlankInput);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Form-URL-encoded form used as the path segment of the upstream URI.
    pub fn encoded(&self) -> String {
        form_urlencoded::byte_serialize(self.0.as_bytes()).collect()
    }
}

impl TryFrom<String> for LocationInput {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LocationInput> for String {
    fn from(value: LocationInput) -> Self {
        value.0
    }
}

impl fmt::Display for LocationInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed upstream document. Untyped on purpose: the upstream shape varies, so
/// every field is read through an optional accessor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeatherPayload(Map<String, Value>);

impl WeatherPayload {
    /// Parse raw bytes; anything but a JSON object is an error.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes).map(Self)
    }

    /// Failure record carrying the raw body or error text.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(BAD_REQUEST.to_string(), Value::String(detail.into()));
        Self(map)
    }

    pub fn is_bad_request(&self) -> bool {
        self.0.contains_key(BAD_REQUEST)
    }

    pub fn bad_request_detail(&self) -> Option<&str> {
        self.0.get(BAD_REQUEST).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn resolved_address(&self) -> Option<&str> {
        self.0.get("resolvedAddress").and_then(Value::as_str)
    }

    pub fn current_conditions(&self) -> Option<&Map<String, Value>> {
        self.0.get("currentConditions").and_then(Value::as_object)
    }

    /// Daily entries; non-object entries are skipped.
    pub fn days(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.0
            .get("days")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
    }

    pub fn first_day(&self) -> Option<&Map<String, Value>> {
        self.days().next()
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for WeatherPayload {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// Identity and version of a record as seen by the freshness cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub id: RecordId,
    pub version: u64,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "locations/{}-{}/current_weather_data", self.id, self.version)
    }
}

/// Stored location with the last upstream response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: RecordId,
    pub input: LocationInput,
    pub generated_at: Option<DateTime<Utc>>,
    pub resolved_as: String,
    pub raw_body: Option<String>,
    pub request_uri: Option<String>,
    /// Advances only when `input` changes; drives the cache key.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl LocationRecord {
    pub fn new(id: RecordId, input: LocationInput) -> Self {
        Self {
            id,
            input,
            generated_at: None,
            resolved_as: UNRESOLVED.to_string(),
            raw_body: None,
            request_uri: None,
            version: 1,
            updated_at: Utc::now(),
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            id: self.id,
            version: self.version,
        }
    }

    /// Stored payload, without triggering a fetch. A missing or unparseable
    /// body reads as an empty payload.
    pub fn payload(&self) -> WeatherPayload {
        let Some(body) = self.raw_body.as_deref() else {
            return WeatherPayload::default();
        };

        match WeatherPayload::from_slice(body.as_bytes()) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(record_id = %self.id, error = %err, "stored body is not a json object");
                WeatherPayload::default()
            }
        }
    }

    /// Problems with the stored body that must be shown to the user.
    pub fn body_errors(&self) -> Vec<ValidationError> {
        let Some(body) = self.raw_body.as_deref() else {
            return Vec::new();
        };

        match WeatherPayload::from_slice(body.as_bytes()) {
            Ok(payload) if payload.is_bad_request() => vec![ValidationError::InvalidAddress],
            Ok(_) => Vec::new(),
            Err(_) => vec![ValidationError::NotJson],
        }
    }

    /// Heading for the detail view, e.g. `Plentywood, MT, USA as of 9:45 am`.
    pub fn title(&self) -> String {
        match self.generated_at {
            Some(at) => format!(
                "{} as of {}",
                self.resolved_as,
                at.with_timezone(&Local).format("%-I:%M %P")
            ),
            None => self.resolved_as.clone(),
        }
    }
}

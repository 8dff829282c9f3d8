//! Row ⇄ domain value helpers shared by the repositories.
//!
//! Enums and structured values are stored as their JSON encodings,
//! timestamps as RFC 3339 text.

use chrono::DateTime;
use serde::Serialize;
use serde::de::DeserializeOwned;

use govhub_domain::time::Timestamp;

/// Encode a value as its JSON text for a TEXT column.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, crate::error::StorageError> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a JSON TEXT column back into a domain value.
pub(crate) fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(raw).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// Decode an RFC 3339 TEXT column into a [`Timestamp`].
pub(crate) fn parse_timestamp(raw: &str) -> Result<Timestamp, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.to_utc())
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// Decode an optional RFC 3339 TEXT column.
pub(crate) fn parse_optional_timestamp(
    raw: Option<String>,
) -> Result<Option<Timestamp>, sqlx::Error> {
    raw.map(|s| parse_timestamp(&s)).transpose()
}

/// Decode a TEXT column holding a UUID-backed id.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

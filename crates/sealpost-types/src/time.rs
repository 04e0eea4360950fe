//! Canonical timestamps.
//!
//! Every instant that gets signed or hashed is rendered through [`to_iso`], so
//! both sides of a signature always agree on the exact string. Precision is
//! fixed at microseconds; [`normalize`] drops anything finer so a parsed
//! timestamp compares equal to the one that was formatted.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current UTC time, already normalized to microsecond precision.
pub fn now() -> DateTime<Utc> {
    normalize(Utc::now())
}

pub fn normalize(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// ISO-8601 / RFC 3339 with exactly six fractional digits and a `Z` suffix,
/// e.g. `2026-10-14T09:30:00.123456Z`.
pub fn to_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse any RFC 3339 timestamp into UTC, normalized to microseconds.
pub fn parse_iso(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(normalize(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc)))
}

/// Serde adapter for `DateTime<Utc>` fields that must use the canonical form.
pub mod iso {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_iso(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_iso(&s).map_err(D::Error::custom)
    }
}

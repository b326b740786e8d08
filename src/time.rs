use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub fn parse_tz(tz: &str) -> Result<Tz> {
    tz.parse().map_err(|_| anyhow!("invalid tz: {tz}"))
}

/// RFC 3339 timestamp of `at` rendered in the configured timezone.
pub fn stamp(tz: &str, at: DateTime<Utc>) -> Result<String> {
    Ok(at.with_timezone(&parse_tz(tz)?).to_rfc3339())
}

pub fn now_stamp(tz: &str) -> Result<String> {
    stamp(tz, Utc::now())
}

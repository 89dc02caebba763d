//! Page payload → station records.

use aqmon_common::{Position, StationRecord, UNKNOWN_REGION};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use super::fetcher::Page;
use super::types::{RawDatastream, RawPage};
use crate::error::FetchError;

/// Prefix of the ids handed to datastreams that carry no identifier at all.
pub const UNIDENTIFIED_STATION_PREFIX: &str = "unidentified";

static UNIDENTIFIED_SEQ: AtomicU64 = AtomicU64::new(1);

/// Parse one feed page.
///
/// Fails with [`FetchError::Format`] only when the body is not a page object;
/// individual datastreams with missing or mistyped fields become records
/// carrying the absent/unknown sentinels. Entries of `value` that are not
/// objects are skipped.
pub fn parse_page(body: &str) -> Result<Page, FetchError> {
    let raw: RawPage = serde_json::from_str(body)?;

    let records = raw
        .value
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<RawDatastream>(entry) {
            Ok(datastream) => Some(to_record(datastream)),
            Err(e) => {
                tracing::debug!("Skipping malformed datastream: {}", e);
                None
            }
        })
        .collect();
    let next = raw.next_link.filter(|link| !link.trim().is_empty());

    Ok(Page { records, next })
}

fn to_record(raw: RawDatastream) -> StationRecord {
    let thing = raw.thing.unwrap_or_default();
    let props = thing.properties.unwrap_or_default();

    let id = string_prop(&props, "stationID")
        .or_else(|| raw.iot_id.as_ref().and_then(value_to_string))
        .or_else(|| thing.name.clone())
        .unwrap_or_else(unidentified_id);

    let name = thing
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| id.clone());

    let region = string_prop(&props, "city")
        .or_else(|| string_prop(&props, "county"))
        .unwrap_or_else(|| UNKNOWN_REGION.to_string());

    let position = thing
        .locations
        .first()
        .and_then(|loc| loc.location.as_ref())
        .and_then(|geo| geo.coordinates.as_ref())
        .and_then(parse_coordinates);

    let latest = raw.observations.into_iter().next();
    let value = latest
        .as_ref()
        .and_then(|obs| obs.result.as_ref())
        .and_then(parse_reading);
    let observed_at = latest
        .and_then(|obs| obs.phenomenon_time)
        .and_then(|t| parse_phenomenon_time(&t));

    StationRecord {
        id,
        name,
        region,
        position,
        value,
        observed_at,
    }
}

fn unidentified_id() -> String {
    format!(
        "{}-{}",
        UNIDENTIFIED_STATION_PREFIX,
        UNIDENTIFIED_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

fn string_prop(props: &Map<String, Value>, key: &str) -> Option<String> {
    props.get(key).and_then(value_to_string)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// GeoJSON point `[lng, lat, ...]`.
fn parse_coordinates(value: &Value) -> Option<Position> {
    let coords = value.as_array()?;
    let lng = coords.first()?.as_f64()?;
    let lat = coords.get(1)?.as_f64()?;
    let position = Position::new(lat, lng);
    position.is_valid().then_some(position)
}

fn parse_reading(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Instant or `start/end` interval; intervals resolve to their end.
fn parse_phenomenon_time(raw: &str) -> Option<DateTime<Utc>> {
    let instant = raw.rsplit('/').next()?.trim();
    DateTime::parse_from_rfc3339(instant)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

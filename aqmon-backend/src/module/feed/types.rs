//! SensorThings wire format, mirrored loosely.
//!
//! `value` is kept as raw JSON and each datastream is decoded on its own, so
//! one sparse or oddly typed station never fails the whole page. Optional
//! fields go through [`lenient`]: `null` or a value of the wrong type decodes
//! to the field's default. Values whose type varies between deployments
//! (`@iot.id`, `result`, `coordinates`) stay as raw JSON and are interpreted
//! by the parser.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// One page of the `Datastreams` collection.
#[derive(Debug, Deserialize)]
pub struct RawPage {
    #[serde(default)]
    pub value: Vec<Value>,
    #[serde(rename = "@iot.nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawDatastream {
    #[serde(rename = "@iot.id", default)]
    pub iot_id: Option<Value>,
    #[serde(rename = "Thing", default, deserialize_with = "lenient")]
    pub thing: Option<RawThing>,
    #[serde(rename = "Observations", default, deserialize_with = "lenient")]
    pub observations: Vec<RawObservation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawThing {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub properties: Option<Map<String, Value>>,
    #[serde(rename = "Locations", default, deserialize_with = "lenient")]
    pub locations: Vec<RawLocation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawLocation {
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<RawGeometry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawGeometry {
    /// GeoJSON order: `[lng, lat]`.
    #[serde(default)]
    pub coordinates: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawObservation {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(rename = "phenomenonTime", default, deserialize_with = "lenient")]
    pub phenomenon_time: Option<String>,
}

/// Decode `T`, falling back to `T::default()` on `null` or a type mismatch.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

//! Best-effort device location and the reverse lookup into a region label.

use async_trait::async_trait;
use aqmon_common::{Position, StationRecord};

use crate::config::GeolocationConfig;
use crate::error::GeolocationError;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Position, GeolocationError>;
}

/// Fixed coordinates from the `[geolocation]` config section.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLocation {
    position: Option<Position>,
}

impl ConfiguredLocation {
    pub fn new(position: Option<Position>) -> Self {
        Self { position }
    }

    pub fn from_config(config: &GeolocationConfig) -> Self {
        let position = match (config.latitude, config.longitude) {
            (Some(lat), Some(lng)) => Some(Position::new(lat, lng)),
            _ => None,
        };
        Self::new(position)
    }
}

#[async_trait]
impl GeolocationProvider for ConfiguredLocation {
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        match self.position {
            Some(p) if p.is_valid() => Ok(p),
            Some(p) => Err(GeolocationError::Denied(format!(
                "configured position ({}, {}) is out of range",
                p.lat, p.lng
            ))),
            None => Err(GeolocationError::Unavailable),
        }
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Position, b: Position) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Region of the closest placed station whose region is known.
pub fn nearest_region(snapshot: &[StationRecord], position: Position) -> Result<String, GeolocationError> {
    snapshot
        .iter()
        .filter(|r| r.has_known_region())
        .filter_map(|r| r.position.map(|p| (haversine_km(position, p), r)))
        .min_by(|(d1, _), (d2, _)| d1.total_cmp(d2))
        .map(|(_, r)| r.region.clone())
        .ok_or(GeolocationError::NoRegion)
}

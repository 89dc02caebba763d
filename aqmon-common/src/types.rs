use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Region label used when the feed does not report an administrative area.
pub const UNKNOWN_REGION: &str = "unknown";

/// Discrete air-quality bucket derived from a PM2.5 reading.
///
/// Variants are declared in ascending severity, with `Invalid` last, so the
/// derived ordering matches the threshold ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityLevel {
    Good,
    Moderate,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
    Invalid,
}

impl QualityLevel {
    /// Every level, in chart order.
    pub const ALL: [QualityLevel; 6] = [
        QualityLevel::Good,
        QualityLevel::Moderate,
        QualityLevel::Unhealthy,
        QualityLevel::VeryUnhealthy,
        QualityLevel::Hazardous,
        QualityLevel::Invalid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Good => "good",
            QualityLevel::Moderate => "moderate",
            QualityLevel::Unhealthy => "unhealthy",
            QualityLevel::VeryUnhealthy => "very-unhealthy",
            QualityLevel::Hazardous => "hazardous",
            QualityLevel::Invalid => "invalid",
        }
    }

    /// Human-facing label used on charts and popups.
    pub fn label(&self) -> &'static str {
        match self {
            QualityLevel::Good => "Good",
            QualityLevel::Moderate => "Moderate",
            QualityLevel::Unhealthy => "Unhealthy",
            QualityLevel::VeryUnhealthy => "Very Unhealthy",
            QualityLevel::Hazardous => "Hazardous",
            QualityLevel::Invalid => "Invalid",
        }
    }

    /// Position of the level in [`QualityLevel::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QualityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "good" => Ok(QualityLevel::Good),
            "moderate" => Ok(QualityLevel::Moderate),
            "unhealthy" => Ok(QualityLevel::Unhealthy),
            "very-unhealthy" | "veryunhealthy" => Ok(QualityLevel::VeryUnhealthy),
            "hazardous" => Ok(QualityLevel::Hazardous),
            "invalid" => Ok(QualityLevel::Invalid),
            _ => Err(format!("Unknown quality level: {}", s)),
        }
    }
}

/// 24-bit RGB color, serialized as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Color::from_hex(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color: {}", raw)))
    }
}

/// WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

impl Position {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both components finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Latest reading of one monitoring station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    pub id: String,
    pub name: String,
    /// Administrative area, [`UNKNOWN_REGION`] when the feed omits it.
    pub region: String,
    /// `None` when the feed carries no usable coordinates; such records are
    /// kept in the snapshot but never rendered.
    pub position: Option<Position>,
    /// `None` when the reading is missing; never coerced to zero.
    pub value: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl StationRecord {
    pub fn has_known_region(&self) -> bool {
        self.region != UNKNOWN_REGION && !self.region.is_empty()
    }
}

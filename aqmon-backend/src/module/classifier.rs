//! Reading → quality level classification.
//!
//! Thresholds are inclusive upper bounds on the PM2.5 reading (µg/m³):
//!
//! | level           | range          |
//! |-----------------|----------------|
//! | good            | 0 ..= 35       |
//! | moderate        | 35 < v ..= 75  |
//! | unhealthy       | 75 < v ..= 150 |
//! | very-unhealthy  | 150 < v ..= 250|
//! | hazardous       | 250 < v ..= 500|
//!
//! Anything absent, negative, non-finite or above [`READING_CEILING`] is
//! `invalid`. A missing reading must never read as clean air.

use aqmon_common::{Color, QualityLevel};

pub const GOOD_MAX: f64 = 35.0;
pub const MODERATE_MAX: f64 = 75.0;
pub const UNHEALTHY_MAX: f64 = 150.0;
pub const VERY_UNHEALTHY_MAX: f64 = 250.0;

/// Readings above this are treated as sensor faults.
pub const READING_CEILING: f64 = 500.0;

pub fn classify(value: Option<f64>) -> QualityLevel {
    let Some(v) = value else {
        return QualityLevel::Invalid;
    };
    if !v.is_finite() || v < 0.0 || v > READING_CEILING {
        return QualityLevel::Invalid;
    }

    if v <= GOOD_MAX {
        QualityLevel::Good
    } else if v <= MODERATE_MAX {
        QualityLevel::Moderate
    } else if v <= UNHEALTHY_MAX {
        QualityLevel::Unhealthy
    } else if v <= VERY_UNHEALTHY_MAX {
        QualityLevel::VeryUnhealthy
    } else {
        QualityLevel::Hazardous
    }
}

pub fn color_for(level: QualityLevel) -> Color {
    match level {
        QualityLevel::Good => Color::rgb(0x28, 0xa7, 0x45),
        QualityLevel::Moderate => Color::rgb(0xff, 0xc1, 0x07),
        QualityLevel::Unhealthy => Color::rgb(0xfd, 0x7e, 0x14),
        QualityLevel::VeryUnhealthy => Color::rgb(0xdc, 0x35, 0x45),
        QualityLevel::Hazardous => Color::rgb(0x6f, 0x42, 0xc1),
        QualityLevel::Invalid => Color::rgb(0x6c, 0x75, 0x7d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_boundaries_land_on_documented_side() {
        let cases = [
            (0.0, QualityLevel::Good),
            (35.0, QualityLevel::Good),
            (35.5, QualityLevel::Moderate),
            (36.0, QualityLevel::Moderate),
            (75.0, QualityLevel::Moderate),
            (76.0, QualityLevel::Unhealthy),
            (150.0, QualityLevel::Unhealthy),
            (151.0, QualityLevel::VeryUnhealthy),
            (250.0, QualityLevel::VeryUnhealthy),
            (251.0, QualityLevel::Hazardous),
            (500.0, QualityLevel::Hazardous),
        ];
        for (value, expected) in cases {
            assert_eq!(classify(Some(value)), expected, "value {}", value);
        }
    }

    #[test]
    fn test_missing_reading_is_invalid_not_good() {
        assert_eq!(classify(None), QualityLevel::Invalid);
        assert_ne!(classify(None), QualityLevel::Good);
    }

    #[test]
    fn test_out_of_domain_readings_are_invalid() {
        for v in [-1.0, -0.001, 500.01, 9999.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(classify(Some(v)), QualityLevel::Invalid, "value {}", v);
        }
    }

    #[test]
    fn test_classify_is_deterministic_over_a_sweep() {
        let mut v = 0.0;
        while v <= READING_CEILING {
            let first = classify(Some(v));
            assert_eq!(first, classify(Some(v)));
            assert_ne!(first, QualityLevel::Invalid, "finite in-range value {} must have a level", v);
            v += 0.25;
        }
    }

    #[test]
    fn test_every_level_has_a_distinct_color() {
        let colors: HashSet<_> = QualityLevel::ALL.iter().map(|l| color_for(*l)).collect();
        assert_eq!(colors.len(), QualityLevel::ALL.len());
    }
}

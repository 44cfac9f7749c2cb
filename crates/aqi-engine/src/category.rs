//! AQI severity bands
//!
//! Six bands with inclusive lower bounds. Each band extends up to the next
//! band's lower bound, so fractional values such as 50.5 resolve to the lower
//! band and no value can fall between two bands.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// Severity band of an AQI value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    /// All bands, least to most severe
    pub const ALL: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Moderate,
        AqiCategory::UnhealthyForSensitiveGroups,
        AqiCategory::Unhealthy,
        AqiCategory::VeryUnhealthy,
        AqiCategory::Hazardous,
    ];

    /// Map an AQI value to its band.
    ///
    /// Values below zero fall in `Good`; anything that does not compare below
    /// a threshold (including NaN) falls in `Hazardous`.
    pub fn categorize(aqi: f64) -> AqiCategory {
        if aqi < 51.0 {
            AqiCategory::Good
        } else if aqi < 101.0 {
            AqiCategory::Moderate
        } else if aqi < 151.0 {
            AqiCategory::UnhealthyForSensitiveGroups
        } else if aqi < 201.0 {
            AqiCategory::Unhealthy
        } else if aqi < 301.0 {
            AqiCategory::VeryUnhealthy
        } else {
            AqiCategory::Hazardous
        }
    }

    /// Inclusive lower bound of the band
    pub fn lower_bound(&self) -> f64 {
        match self {
            AqiCategory::Good => 0.0,
            AqiCategory::Moderate => 51.0,
            AqiCategory::UnhealthyForSensitiveGroups => 101.0,
            AqiCategory::Unhealthy => 151.0,
            AqiCategory::VeryUnhealthy => 201.0,
            AqiCategory::Hazardous => 301.0,
        }
    }

    /// Stable machine identifier
    pub fn id(&self) -> &'static str {
        match self {
            AqiCategory::Good => "good",
            AqiCategory::Moderate => "moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "unhealthy_for_sensitive_groups",
            AqiCategory::Unhealthy => "unhealthy",
            AqiCategory::VeryUnhealthy => "very_unhealthy",
            AqiCategory::Hazardous => "hazardous",
        }
    }

    /// Human-readable band name
    pub fn name(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    /// Severity rank, 1 (Good) through 6 (Hazardous)
    pub fn rank(&self) -> u8 {
        match self {
            AqiCategory::Good => 1,
            AqiCategory::Moderate => 2,
            AqiCategory::UnhealthyForSensitiveGroups => 3,
            AqiCategory::Unhealthy => 4,
            AqiCategory::VeryUnhealthy => 5,
            AqiCategory::Hazardous => 6,
        }
    }

    /// Display color as a hex triplet
    pub fn color(&self) -> &'static str {
        match self {
            AqiCategory::Good => "#00e400",
            AqiCategory::Moderate => "#ffff00",
            AqiCategory::UnhealthyForSensitiveGroups => "#ff7e00",
            AqiCategory::Unhealthy => "#ff0000",
            AqiCategory::VeryUnhealthy => "#8f3f97",
            AqiCategory::Hazardous => "#7e0023",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for AqiCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AqiCategory", 4)?;
        state.serialize_field("id", self.id())?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("rank", &self.rank())?;
        state.serialize_field("color", self.color())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_values() {
        let cases = [
            (0.0, AqiCategory::Good),
            (50.0, AqiCategory::Good),
            (50.99, AqiCategory::Good),
            (51.0, AqiCategory::Moderate),
            (100.0, AqiCategory::Moderate),
            (101.0, AqiCategory::UnhealthyForSensitiveGroups),
            (150.0, AqiCategory::UnhealthyForSensitiveGroups),
            (151.0, AqiCategory::Unhealthy),
            (200.0, AqiCategory::Unhealthy),
            (201.0, AqiCategory::VeryUnhealthy),
            (300.0, AqiCategory::VeryUnhealthy),
            (301.0, AqiCategory::Hazardous),
            (500.0, AqiCategory::Hazardous),
            (10_000.0, AqiCategory::Hazardous),
        ];
        for (aqi, expected) in cases {
            assert_eq!(AqiCategory::categorize(aqi), expected, "aqi = {}", aqi);
        }
    }

    #[test]
    fn test_bands_partition_without_gaps() {
        // Walk the scale in small steps; the band must never decrease and
        // must change exactly at each lower bound.
        let mut previous = AqiCategory::Good;
        let mut aqi = 0.0;
        while aqi <= 500.0 {
            let current = AqiCategory::categorize(aqi);
            assert!(current >= previous, "band regressed at {}", aqi);
            assert!(aqi >= current.lower_bound());
            previous = current;
            aqi += 0.25;
        }
        for band in AqiCategory::ALL {
            assert_eq!(AqiCategory::categorize(band.lower_bound()), band);
        }
    }

    #[test]
    fn test_ranks_are_ordered_and_unique() {
        let ranks: Vec<u8> = AqiCategory::ALL.iter().map(|c| c.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(AqiCategory::VeryUnhealthy).unwrap();
        assert_eq!(json["id"], "very_unhealthy");
        assert_eq!(json["name"], "Very Unhealthy");
        assert_eq!(json["rank"], 5);
        assert_eq!(json["color"], "#8f3f97");
    }
}

//! Length units. Layout coordinates are always meters.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthUnit {
    #[default]
    Meter,
    Centimeter,
    Millimeter,
    Micrometer,
    Nanometer,
    Mil,
    Inch,
}

impl LengthUnit {
    /// Meters per one of this unit.
    pub fn to_meters(self) -> f64 {
        match self {
            LengthUnit::Meter => 1.0,
            LengthUnit::Centimeter => 1e-2,
            LengthUnit::Millimeter => 1e-3,
            LengthUnit::Micrometer => 1e-6,
            LengthUnit::Nanometer => 1e-9,
            LengthUnit::Mil => 2.54e-5,
            LengthUnit::Inch => 2.54e-2,
        }
    }

    pub fn convert_to_meters(self, value: f64) -> f64 {
        value * self.to_meters()
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LengthUnit::Meter => "meter",
            LengthUnit::Centimeter => "cm",
            LengthUnit::Millimeter => "mm",
            LengthUnit::Micrometer => "um",
            LengthUnit::Nanometer => "nm",
            LengthUnit::Mil => "mil",
            LengthUnit::Inch => "in",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown length unit '{0}'")]
pub struct UnknownUnit(pub String);

impl FromStr for LengthUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "m" | "meter" | "meters" => Ok(LengthUnit::Meter),
            "cm" | "centimeter" => Ok(LengthUnit::Centimeter),
            "mm" | "millimeter" => Ok(LengthUnit::Millimeter),
            "um" | "micron" | "micrometer" => Ok(LengthUnit::Micrometer),
            "nm" | "nanometer" => Ok(LengthUnit::Nanometer),
            "mil" | "mils" => Ok(LengthUnit::Mil),
            "in" | "inch" => Ok(LengthUnit::Inch),
            other => Err(UnknownUnit(other.to_string())),
        }
    }
}

impl Serialize for LengthUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LengthUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

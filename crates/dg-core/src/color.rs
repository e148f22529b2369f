//! Soul colors and the CMYK attribute vector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// One of the four categorical soul colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SoulColor {
    /// Cyan.
    C,
    /// Magenta.
    M,
    /// Yellow.
    Y,
    /// Key (black).
    K,
}

impl SoulColor {
    /// All colors in canonical order.
    pub const ALL: [SoulColor; 4] = [SoulColor::C, SoulColor::M, SoulColor::Y, SoulColor::K];

    /// Returns the single-letter code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SoulColor::C => "C",
            SoulColor::M => "M",
            SoulColor::Y => "Y",
            SoulColor::K => "K",
        }
    }
}

impl fmt::Display for SoulColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoulColor {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "C" | "c" => Ok(SoulColor::C),
            "M" | "m" => Ok(SoulColor::M),
            "Y" | "y" => Ok(SoulColor::Y),
            "K" | "k" => Ok(SoulColor::K),
            other => Err(DomainError::Validation(format!(
                "soul color must be one of C, M, Y, K (got {other:?})"
            ))),
        }
    }
}

/// CMYK attribute vector carried by a ghost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cmyk {
    /// Cyan channel.
    #[serde(rename = "C", default)]
    pub c: i32,
    /// Magenta channel.
    #[serde(rename = "M", default)]
    pub m: i32,
    /// Yellow channel.
    #[serde(rename = "Y", default)]
    pub y: i32,
    /// Key channel.
    #[serde(rename = "K", default)]
    pub k: i32,
}

impl Cmyk {
    /// A vector with the channel matching `color` set to 1 and the others 0.
    #[must_use]
    pub fn from_soul_color(color: SoulColor) -> Self {
        let mut cmyk = Self::default();
        cmyk.set(color, 1);
        cmyk
    }

    /// Returns the value of one channel.
    #[must_use]
    pub fn get(&self, color: SoulColor) -> i32 {
        match color {
            SoulColor::C => self.c,
            SoulColor::M => self.m,
            SoulColor::Y => self.y,
            SoulColor::K => self.k,
        }
    }

    /// Sets the value of one channel.
    pub fn set(&mut self, color: SoulColor, value: i32) {
        match color {
            SoulColor::C => self.c = value,
            SoulColor::M => self.m = value,
            SoulColor::Y => self.y = value,
            SoulColor::K => self.k = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_soul_color_sets_only_matching_channel() {
        let cmyk = Cmyk::from_soul_color(SoulColor::C);
        assert_eq!(cmyk, Cmyk { c: 1, m: 0, y: 0, k: 0 });
    }

    #[test]
    fn test_cmyk_serializes_with_uppercase_keys() {
        let json = serde_json::to_value(Cmyk::from_soul_color(SoulColor::Y)).unwrap();
        assert_eq!(json, serde_json::json!({"C": 0, "M": 0, "Y": 1, "K": 0}));
    }

    #[test]
    fn test_parse_soul_color_rejects_unknown_letter() {
        assert_eq!("m".parse::<SoulColor>().unwrap(), SoulColor::M);
        match "R".parse::<SoulColor>() {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("C, M, Y, K")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}

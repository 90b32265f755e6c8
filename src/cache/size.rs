//! Byte Count
//!
//! Capacity value type for the cache tiers. Multiples are decimal
//! (1 KB = 1000 bytes).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

const KILO: u64 = 1_000;
const MEGA: u64 = KILO * 1_000;
const GIGA: u64 = MEGA * 1_000;

/// A capacity expressed in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteCount(u64);

impl ByteCount {
    /// Exact number of bytes
    pub const fn bytes(value: u64) -> Self {
        Self(value)
    }

    /// Kilobytes (x 1000)
    pub const fn kilobytes(value: u64) -> Self {
        Self(value * KILO)
    }

    /// Megabytes (x 1000^2)
    pub const fn megabytes(value: u64) -> Self {
        Self(value * MEGA)
    }

    /// Gigabytes (x 1000^3)
    pub const fn gigabytes(value: u64) -> Self {
        Self(value * GIGA)
    }

    /// Raw byte value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ByteCount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ByteCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            v if v >= GIGA && v % GIGA == 0 => write!(f, "{}GB", v / GIGA),
            v if v >= MEGA && v % MEGA == 0 => write!(f, "{}MB", v / MEGA),
            v if v >= KILO && v % KILO == 0 => write!(f, "{}KB", v / KILO),
            v => write!(f, "{}B", v),
        }
    }
}

impl FromStr for ByteCount {
    type Err = String;

    /// Accepts `"4096"`, `"512B"`, `"64KB"`, `"4 MB"`, `"1gb"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);

        let value: u64 = digits
            .parse()
            .map_err(|_| format!("invalid byte count: {:?}", s))?;

        let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" => KILO,
            "M" | "MB" => MEGA,
            "G" | "GB" => GIGA,
            other => return Err(format!("unknown byte unit {:?} in {:?}", other, s)),
        };

        value
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(|| format!("byte count overflows: {:?}", s))
    }
}

impl<'de> Deserialize<'de> for ByteCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_multiples() {
        assert_eq!(ByteCount::bytes(12).as_u64(), 12);
        assert_eq!(ByteCount::kilobytes(3).as_u64(), 3_000);
        assert_eq!(ByteCount::megabytes(4).as_u64(), 4_000_000);
        assert_eq!(ByteCount::gigabytes(1).as_u64(), 1_000_000_000);
    }

    #[test]
    fn test_parse() {
        assert_eq!("4096".parse::<ByteCount>().unwrap(), ByteCount::bytes(4096));
        assert_eq!("50MB".parse::<ByteCount>().unwrap(), ByteCount::megabytes(50));
        assert_eq!(" 4 mb ".parse::<ByteCount>().unwrap(), ByteCount::megabytes(4));
        assert_eq!("2g".parse::<ByteCount>().unwrap(), ByteCount::gigabytes(2));
        assert!("MB".parse::<ByteCount>().is_err());
        assert!("12TB".parse::<ByteCount>().is_err());
        assert!("99999999999999999999GB".parse::<ByteCount>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ByteCount::megabytes(4).to_string(), "4MB");
        assert_eq!(ByteCount::kilobytes(1500).to_string(), "1500KB");
        assert_eq!(ByteCount::bytes(999).to_string(), "999B");
    }

    #[test]
    fn test_deserialize_number_or_string() {
        #[derive(Deserialize)]
        struct Sizes {
            a: ByteCount,
            b: ByteCount,
        }

        let sizes: Sizes = serde_yaml::from_str("a: 2048\nb: 20MB\n").unwrap();
        assert_eq!(sizes.a, ByteCount::bytes(2048));
        assert_eq!(sizes.b, ByteCount::megabytes(20));
    }
}

//! Component designators
//!
//! A designator such as `R12` or `#PWR03` splits into a letter prefix
//! ("type") and a number. References sort by type, then numerically, so
//! `R2` comes before `R10`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

static DESIGNATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#?[A-Z]+)([0-9]+)$").expect("designator pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("invalid designator '{0}': expected letters followed by digits, e.g. R12")]
    InvalidDesignator(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentReference {
    designator: String,
    kind: String,
    number: u32,
}

impl ComponentReference {
    pub fn new(designator: &str) -> Result<Self, ReferenceError> {
        let invalid = || ReferenceError::InvalidDesignator(designator.to_string());
        let caps = DESIGNATOR_RE.captures(designator).ok_or_else(invalid)?;
        let kind = caps.get(1).ok_or_else(invalid)?.as_str().to_string();
        let number = caps
            .get(2)
            .ok_or_else(invalid)?
            .as_str()
            .parse()
            .map_err(|_| invalid())?;
        Ok(Self {
            designator: designator.to_string(),
            kind,
            number,
        })
    }

    pub fn designator(&self) -> &str {
        &self.designator
    }

    /// Letter prefix, e.g. `R` or `#PWR`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Power and flag symbols (`#PWR01`) never reach the board
    pub fn is_virtual(&self) -> bool {
        self.kind.starts_with('#')
    }
}

impl Ord for ComponentReference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then(self.number.cmp(&other.number))
            .then_with(|| self.designator.cmp(&other.designator))
    }
}

impl PartialOrd for ComponentReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for ComponentReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for ComponentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.designator)
    }
}

impl Serialize for ComponentReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.designator)
    }
}

impl<'de> Deserialize<'de> for ComponentReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Letters for a 1-based unit number: A..Z, then AA, AB, ...
pub fn unit_suffix(unit: u32) -> String {
    let mut letters = Vec::new();
    let mut n = unit;
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// A designator plus the unit it refers to on a multi-unit part
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolReference {
    pub reference: ComponentReference,
    pub unit: u32,
    pub multi_unit: bool,
}

impl SymbolReference {
    pub fn new(designator: &str, unit: u32, multi_unit: bool) -> Result<Self, ReferenceError> {
        Ok(Self {
            reference: ComponentReference::new(designator)?,
            unit,
            multi_unit,
        })
    }

    pub fn designator(&self) -> &str {
        self.reference.designator()
    }
}

impl fmt::Display for SymbolReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.multi_unit {
            write!(f, "{}{}", self.reference, unit_suffix(self.unit))
        } else {
            write!(f, "{}", self.reference)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_designator() {
        let r = ComponentReference::new("R12").unwrap();
        assert_eq!(r.kind(), "R");
        assert_eq!(r.number(), 12);
        assert!(!r.is_virtual());

        let pwr = ComponentReference::new("#PWR03").unwrap();
        assert_eq!(pwr.kind(), "#PWR");
        assert_eq!(pwr.number(), 3);
        assert!(pwr.is_virtual());
    }

    #[test]
    fn test_invalid_designators() {
        for bad in ["R?", "r1", "R", "12", "R1A", "", "#1", "R 1"] {
            assert!(ComponentReference::new(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_natural_ordering() {
        let mut refs: Vec<ComponentReference> = ["R10", "C3", "R2", "R1"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        refs.sort();
        let sorted: Vec<_> = refs.iter().map(|r| r.designator()).collect();
        assert_eq!(sorted, vec!["C3", "R1", "R2", "R10"]);
    }

    #[test]
    fn test_unit_suffix() {
        assert_eq!(unit_suffix(0), "");
        assert_eq!(unit_suffix(1), "A");
        assert_eq!(unit_suffix(2), "B");
        assert_eq!(unit_suffix(26), "Z");
        assert_eq!(unit_suffix(27), "AA");
        assert_eq!(unit_suffix(52), "AZ");
        assert_eq!(unit_suffix(53), "BA");
        assert_eq!(unit_suffix(702), "ZZ");
        assert_eq!(unit_suffix(703), "AAA");
    }

    #[test]
    fn test_multi_unit_rendering() {
        assert_eq!(SymbolReference::new("U1", 1, true).unwrap().to_string(), "U1A");
        assert_eq!(SymbolReference::new("U1", 2, true).unwrap().to_string(), "U1B");
        assert_eq!(SymbolReference::new("U1", 27, true).unwrap().to_string(), "U1AA");
        assert_eq!(SymbolReference::new("U1", 2, false).unwrap().to_string(), "U1");
    }
}

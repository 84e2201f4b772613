//! Stack unit, port, and priority identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stack unit identifier (1-based).
///
/// A stack is a set of physically separate switch units managed as one
/// logical switch; the primary unit owns all decision state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct UnitId(u8);

impl UnitId {
    /// Minimum valid unit id.
    pub const MIN: u8 = 1;

    /// Maximum valid unit id (maximum stack size).
    pub const MAX: u8 = 16;

    /// Creates a new unit id.
    pub const fn new(id: u8) -> Result<Self, ParseError> {
        if id >= Self::MIN && id <= Self::MAX {
            Ok(UnitId(id))
        } else {
            Err(ParseError::InvalidUnitId(id))
        }
    }

    /// Returns the unit id as a u8.
    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    /// Returns the zero-based index of this unit (for array indexing).
    pub const fn index(&self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for UnitId {
    type Error = ParseError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        UnitId::new(id)
    }
}

impl From<UnitId> for u8 {
    fn from(unit: UnitId) -> u8 {
        unit.0
    }
}

/// A zero-based physical port index within one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortNo(pub u16);

impl PortNo {
    /// Returns the port index as a usize (for array indexing).
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stack-wide port address: (owning unit, port within the unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortKey {
    pub unit: UnitId,
    pub port: PortNo,
}

impl PortKey {
    pub const fn new(unit: UnitId, port: PortNo) -> Self {
        PortKey { unit, port }
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.unit, self.port)
    }
}

/// An 802.1p traffic priority class (0-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PriorityClass(u8);

impl PriorityClass {
    /// Maximum valid priority class.
    pub const MAX: u8 = 7;

    /// Creates a new priority class.
    pub const fn new(class: u8) -> Result<Self, ParseError> {
        if class <= Self::MAX {
            Ok(PriorityClass(class))
        } else {
            Err(ParseError::InvalidPriority(class))
        }
    }

    /// Returns the class as a u8.
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for PriorityClass {
    type Error = ParseError;

    fn try_from(class: u8) -> Result<Self, Self::Error> {
        PriorityClass::new(class)
    }
}

impl From<PriorityClass> for u8 {
    fn from(class: PriorityClass) -> u8 {
        class.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_id_range() {
        assert!(UnitId::new(1).is_ok());
        assert!(UnitId::new(16).is_ok());
        assert!(UnitId::new(0).is_err());
        assert!(UnitId::new(17).is_err());
    }

    #[test]
    fn test_unit_index() {
        assert_eq!(UnitId::new(1).unwrap().index(), 0);
        assert_eq!(UnitId::new(16).unwrap().index(), 15);
    }

    #[test]
    fn test_port_key_display() {
        let key = PortKey::new(UnitId::new(2).unwrap(), PortNo(7));
        assert_eq!(key.to_string(), "2:7");
    }

    #[test]
    fn test_priority_range() {
        assert!(PriorityClass::new(0).is_ok());
        assert!(PriorityClass::new(7).is_ok());
        assert!(PriorityClass::new(8).is_err());
    }
}

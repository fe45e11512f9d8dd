//! Dedup keys, one named struct per reference entity.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RiskKey {
    pub risk: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultKey {
    pub result: String,
    pub condition_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViolationKey {
    pub violation: String,
}

/// Establishments are identified by name and coordinates only; the address
/// is derived text and may be formatted differently between pulls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstablishmentKey {
    pub dba_name: String,
    pub aka_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl EstablishmentKey {
    fn coordinate_bits(&self) -> (Option<u64>, Option<u64>) {
        (
            self.latitude.map(f64::to_bits),
            self.longitude.map(f64::to_bits),
        )
    }
}

// Coordinates compare bitwise: they are copied verbatim from the source and
// read back unchanged from the store, so no tolerance is wanted.
impl PartialEq for EstablishmentKey {
    fn eq(&self, other: &Self) -> bool {
        self.dba_name == other.dba_name
            && self.aka_name == other.aka_name
            && self.coordinate_bits() == other.coordinate_bits()
    }
}

impl Eq for EstablishmentKey {}

impl Hash for EstablishmentKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dba_name.hash(state);
        self.aka_name.hash(state);
        self.coordinate_bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn key(name: &str, lat: Option<f64>, lon: Option<f64>) -> EstablishmentKey {
        EstablishmentKey {
            dba_name: name.into(),
            aka_name: String::new(),
            latitude: lat,
            longitude: lon,
        }
    }

    #[test]
    fn test_establishment_key_equality() {
        let mut set = HashSet::new();
        assert!(set.insert(key("SUBWAY", Some(41.9), Some(-87.6))));
        assert!(!set.insert(key("SUBWAY", Some(41.9), Some(-87.6))));
        assert!(set.insert(key("SUBWAY", Some(41.9), None)));
        assert!(!set.insert(key("SUBWAY", Some(41.9), None)));
        assert!(set.insert(key("SUBWAY #2", Some(41.9), Some(-87.6))));
        assert_eq!(set.len(), 3);
    }
}

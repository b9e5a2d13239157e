//! Row identity shared by every entity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw value reserved for "no id" / "no relation".
const VOID_RAW: i64 = -1;

/// Identity of a stored row.
///
/// Stored rows always have a positive id. Any non-positive raw value is
/// normalized to [`ResourceId::VOID`] on construction (including when
/// deserialized), so a void id can never collide with a real row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct ResourceId(i64);

impl ResourceId {
    /// The sentinel meaning "no id".
    pub const VOID: ResourceId = ResourceId(VOID_RAW);

    /// Build an id, clamping non-positive values to [`ResourceId::VOID`].
    pub const fn new(raw: i64) -> Self {
        if raw > 0 {
            ResourceId(raw)
        } else {
            Self::VOID
        }
    }

    pub fn is_void(&self) -> bool {
        self.0 <= 0
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::VOID
    }
}

impl From<i64> for ResourceId {
    fn from(raw: i64) -> Self {
        Self::new(raw)
    }
}

impl From<ResourceId> for i64 {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_void() {
            write!(f, "void")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_values_are_kept() {
        assert_eq!(ResourceId::new(42).value(), 42);
        assert!(!ResourceId::new(1).is_void());
    }

    #[test]
    fn test_non_positive_values_clamp_to_void() {
        assert_eq!(ResourceId::new(0), ResourceId::VOID);
        assert_eq!(ResourceId::new(-7), ResourceId::VOID);
        assert!(ResourceId::default().is_void());
    }

    #[test]
    fn test_deserialize_clamps() {
        let id: ResourceId = serde_json::from_str("-3").unwrap();
        assert_eq!(id, ResourceId::VOID);
        let id: ResourceId = serde_json::from_str("9").unwrap();
        assert_eq!(id, ResourceId::new(9));
        assert_eq!(serde_json::to_string(&ResourceId::new(9)).unwrap(), "9");
    }

    #[test]
    fn test_display() {
        assert_eq!(ResourceId::new(5).to_string(), "5");
        assert_eq!(ResourceId::VOID.to_string(), "void");
    }
}

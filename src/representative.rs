//! Representative roster types.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Stable identifier of an elected representative.
///
/// Rosters in the wild carry ids as either JSON strings or integers; both
/// deserialize into the same string form.
///
/// # Examples
///
/// ```
/// use seatmap::RepresentativeId;
///
/// let id = RepresentativeId::new("R1");
/// assert_eq!(id.as_str(), "R1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RepresentativeId(String);

impl RepresentativeId {
    /// Creates an id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepresentativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RepresentativeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for RepresentativeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Ok(Self(s)),
            Raw::Int(n) => Ok(Self(n.to_string())),
        }
    }
}

fn default_active() -> bool {
    true
}

/// An elected representative as loaded from the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Representative {
    /// Stable identifier.
    pub id: RepresentativeId,

    /// Name shown to users.
    #[serde(alias = "name")]
    pub display_name: String,

    /// Current administrative area held, as written in the roster.
    #[serde(alias = "constituency", default)]
    pub area_name: String,

    /// Party affiliation.
    #[serde(alias = "party", default)]
    pub party_name: String,

    /// Whether the representative currently holds the seat.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Representative {
    /// Creates an active representative.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        area_name: impl Into<String>,
        party_name: impl Into<String>,
    ) -> Self {
        Self {
            id: RepresentativeId::new(id),
            display_name: display_name.into(),
            area_name: area_name.into(),
            party_name: party_name.into(),
            is_active: true,
        }
    }

    /// Marks the representative as no longer holding the seat.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_field_aliases_and_integer_ids() {
        let json = r#"[
            {"id": 4514, "name": "Carla Denyer", "constituency": "Bristol Central", "party": "Green", "isActive": true},
            {"id": "R2", "displayName": "Jo Bloggs", "areaName": "Newtown", "partyName": "Independent"},
            {"id": 7, "name": "Former Member", "constituency": "Oldtown", "party": "Labour", "isActive": false}
        ]"#;

        let reps: Vec<Representative> = serde_json::from_str(json).unwrap();
        assert_eq!(reps.len(), 3);
        assert_eq!(reps[0].id.as_str(), "4514");
        assert_eq!(reps[0].area_name, "Bristol Central");
        assert_eq!(reps[1].party_name, "Independent");
        assert!(reps[1].is_active, "isActive defaults to true");
        assert!(!reps[2].is_active);
    }

    #[test]
    fn test_missing_area_defaults_to_empty() {
        let rep: Representative =
            serde_json::from_str(r#"{"id": "R9", "name": "Nobody"}"#).unwrap();
        assert!(rep.area_name.is_empty());
        assert!(rep.party_name.is_empty());
    }
}

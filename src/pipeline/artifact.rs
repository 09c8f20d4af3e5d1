//! The published lookup documents.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PublishError, SeatmapResult, SourceError};
use crate::matcher::MatchTier;
use crate::representative::RepresentativeId;

/// Postcode (or district) to representative id.
///
/// Keys are display-formatted postcodes such as `"SW1A 0AA"`, or outward
/// codes such as `"SW1A"` for district-granular artifacts. Serializes as a
/// flat JSON object with sorted keys, so identical inputs produce
/// byte-identical documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupArtifact {
    entries: BTreeMap<String, RepresentativeId>,
}

impl LookupArtifact {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, returning the id it replaced.
    pub fn insert(&mut self, key: impl Into<String>, id: RepresentativeId) -> Option<RepresentativeId> {
        self.entries.insert(key.into(), id)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RepresentativeId> {
        self.entries.get(key)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RepresentativeId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialized document bytes.
    ///
    /// # Errors
    /// `PublishError::Serialize` if encoding fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, PublishError> {
        to_pretty_json(self)
    }

    /// Hex blake3 digest of [`Self::to_json_bytes`].
    ///
    /// # Errors
    /// `PublishError::Serialize` if encoding fails.
    pub fn digest(&self) -> Result<String, PublishError> {
        Ok(blake3::hash(&self.to_json_bytes()?).to_hex().to_string())
    }

    /// Reads a previously published artifact.
    ///
    /// # Errors
    /// `Unavailable` if unreadable, `Decode` if not an artifact.
    pub fn load(path: impl AsRef<Path>) -> SeatmapResult<Self> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|e| SourceError::Unavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let artifact = serde_json::from_slice(&raw).map_err(|e| SourceError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(artifact)
    }
}

impl FromIterator<(String, RepresentativeId)> for LookupArtifact {
    fn from_iter<T: IntoIterator<Item = (String, RepresentativeId)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// One postcode in the enriched lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedEntry {
    pub representative_id: RepresentativeId,
    /// Area name as written in the source.
    pub area_name: String,
    pub match_tier: MatchTier,
    /// Non-required source columns, keyed by header.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub auxiliary: BTreeMap<String, String>,
}

/// Postcode to [`EnrichedEntry`], keyed like [`LookupArtifact`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrichedLookup {
    entries: BTreeMap<String, EnrichedEntry>,
}

impl EnrichedLookup {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&EnrichedEntry> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// # Errors
    /// `PublishError::Serialize` if encoding fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, PublishError> {
        to_pretty_json(self)
    }
}

impl FromIterator<(String, EnrichedEntry)> for EnrichedLookup {
    fn from_iter<T: IntoIterator<Item = (String, EnrichedEntry)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, PublishError> {
    serde_json::to_vec_pretty(value).map_err(|e| PublishError::Serialize {
        reason: e.to_string(),
    })
}

//! Read-only postcode lookup over a published artifact.
//!
//! A [`LookupService`] is immutable once built and every query takes
//! `&self`, so one instance can be shared across threads behind an `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::SeatmapResult;
use crate::matcher::Matcher;
use crate::pipeline::LookupArtifact;
use crate::postcode::{canonical_postcode, format_postcode, is_valid_postcode, postcode_area};
use crate::representative::{Representative, RepresentativeId};
use crate::source::load_roster;

/// Which key produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKey {
    /// The full postcode.
    Postcode,
    /// The postcode's district (outward code).
    Area,
    /// A live area source, resolved through the matcher.
    Live,
}

/// Why a lookup found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundReason {
    /// The query does not have the shape of a postcode.
    MalformedQuery,
    /// Neither the postcode nor its district is in the artifact.
    NotInArtifact,
    /// The artifact names a representative missing from the roster.
    UnknownRepresentative,
}

/// Outcome of [`LookupService::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found {
        representative: Representative,
        key: LookupKey,
    },
    NotFound(NotFoundReason),
}

impl Lookup {
    /// The representative, if found.
    #[must_use]
    pub fn representative(&self) -> Option<&Representative> {
        match self {
            Self::Found { representative, .. } => Some(representative),
            Self::NotFound(_) => None,
        }
    }

    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Current administrative area for a postcode, from a system other than the
/// published artifact.
pub trait LiveAreaSource: Send + Sync {
    /// Raw area name for a canonical postcode, if known.
    fn area_for(&self, canonical_postcode: &str) -> Option<String>;
}

/// A [`LiveAreaSource`] backed by a fixed map.
#[derive(Debug, Clone, Default)]
pub struct StaticAreaSource {
    areas: HashMap<String, String>,
}

impl StaticAreaSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry; the postcode may be in any spacing or case.
    #[must_use]
    pub fn with(mut self, postcode: &str, area_name: impl Into<String>) -> Self {
        self.areas.insert(canonical_postcode(postcode), area_name.into());
        self
    }
}

impl LiveAreaSource for StaticAreaSource {
    fn area_for(&self, canonical_postcode: &str) -> Option<String> {
        self.areas.get(canonical_postcode).cloned()
    }
}

/// Resolves postcodes to representatives.
pub struct LookupService {
    by_key: BTreeMap<String, RepresentativeId>,
    representatives: HashMap<RepresentativeId, Representative>,
    matcher: Option<Matcher>,
    live: Option<Arc<dyn LiveAreaSource>>,
}

impl std::fmt::Debug for LookupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupService")
            .field("keys", &self.by_key.len())
            .field("representatives", &self.representatives.len())
            .field("matcher", &self.matcher.is_some())
            .field("live", &self.live.is_some())
            .finish()
    }
}

impl LookupService {
    /// Builds a service from an artifact and the roster it was built from.
    ///
    /// Artifact keys are re-keyed to canonical form, so queries match
    /// regardless of spacing or case.
    #[must_use]
    pub fn new(artifact: &LookupArtifact, representatives: &[Representative]) -> Self {
        let by_key = artifact
            .iter()
            .map(|(key, id)| (canonical_postcode(key), id.clone()))
            .collect();
        let mut by_id = HashMap::with_capacity(representatives.len());
        for rep in representatives {
            // Prefer the active record when an id appears twice.
            let replace = by_id
                .get(&rep.id)
                .map_or(true, |existing: &Representative| !existing.is_active && rep.is_active);
            if replace {
                by_id.insert(rep.id.clone(), rep.clone());
            }
        }
        Self {
            by_key,
            representatives: by_id,
            matcher: None,
            live: None,
        }
    }

    /// Loads a published artifact and roster from disk.
    ///
    /// # Errors
    /// Source errors for unreadable or undecodable files.
    pub fn load(artifact_path: impl AsRef<Path>, roster_path: impl AsRef<Path>) -> SeatmapResult<Self> {
        let artifact = LookupArtifact::load(artifact_path)?;
        let roster = load_roster(roster_path)?;
        let service = Self::new(&artifact, &roster);
        debug!(keys = service.by_key.len(), "lookup service loaded");
        Ok(service)
    }

    /// Enables [`Self::resolve_area`] and live fallback.
    #[must_use]
    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Consults `source` for postcodes the artifact does not cover. Needs a
    /// matcher to turn the live area name into a representative.
    #[must_use]
    pub fn with_live_source(mut self, source: Arc<dyn LiveAreaSource>) -> Self {
        self.live = Some(source);
        self
    }

    /// Number of artifact keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Resolves a postcode in any spacing or case.
    ///
    /// Tries the full postcode, then its district, then the live source.
    #[must_use]
    pub fn resolve(&self, postcode: &str) -> Lookup {
        if !is_valid_postcode(postcode) {
            return Lookup::NotFound(NotFoundReason::MalformedQuery);
        }
        let canonical = canonical_postcode(postcode);

        let hit = self
            .by_key
            .get(&canonical)
            .map(|id| (id, LookupKey::Postcode))
            .or_else(|| {
                postcode_area(&canonical)
                    .and_then(|district| self.by_key.get(district))
                    .map(|id| (id, LookupKey::Area))
            });

        match hit {
            Some((id, key)) => match self.representatives.get(id) {
                Some(rep) => Lookup::Found {
                    representative: rep.clone(),
                    key,
                },
                None => Lookup::NotFound(NotFoundReason::UnknownRepresentative),
            },
            None => self
                .resolve_live(&canonical)
                .map_or(Lookup::NotFound(NotFoundReason::NotInArtifact), |representative| Lookup::Found {
                    representative,
                    key: LookupKey::Live,
                }),
        }
    }

    fn resolve_live(&self, canonical: &str) -> Option<Representative> {
        let area = self.live.as_ref()?.area_for(canonical)?;
        let hit = self.matcher.as_ref()?.match_area(&area)?;
        self.representatives.get(&hit.representative_id).cloned()
    }

    /// The artifact's representative id for a postcode, without fallbacks.
    #[must_use]
    pub fn representative_id(&self, postcode: &str) -> Option<&RepresentativeId> {
        self.by_key.get(&canonical_postcode(postcode))
    }

    /// Resolves an area name through the matcher.
    ///
    /// Returns `None` when no matcher was supplied or nothing matches.
    #[must_use]
    pub fn resolve_area(&self, area_name: &str) -> Option<&Representative> {
        let hit = self.matcher.as_ref()?.match_area(area_name)?;
        self.representatives.get(&hit.representative_id)
    }

    /// Up to `limit` artifact postcodes starting with `prefix`, in display
    /// form and sorted order. Prefixes shorter than two characters return
    /// nothing.
    #[must_use]
    pub fn autocomplete(&self, prefix: &str, limit: usize) -> Vec<String> {
        let prefix = canonical_postcode(prefix);
        if prefix.len() < 2 {
            return Vec::new();
        }
        self.by_key
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .take(limit)
            .map(|(key, _)| format_postcode(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::alias::AliasTable;
    use crate::index::RepresentativeIndex;

    fn roster() -> Vec<Representative> {
        vec![
            Representative::new("1", "A", "Ipswich", "X"),
            Representative::new("2", "B", "Norwich North", "Y"),
            Representative::new("3", "C", "Old Seat", "Z").inactive(),
        ]
    }

    fn service() -> LookupService {
        let artifact: LookupArtifact = [
            ("IP1 1AA".to_string(), RepresentativeId::from("1")),
            ("IP1 1AB".to_string(), RepresentativeId::from("1")),
            ("IP2 9ZZ".to_string(), RepresentativeId::from("1")),
            ("NR3".to_string(), RepresentativeId::from("2")),
            ("ZZ1 1ZZ".to_string(), RepresentativeId::from("404")),
        ]
        .into_iter()
        .collect();
        LookupService::new(&artifact, &roster())
    }

    fn matcher() -> Matcher {
        let index = RepresentativeIndex::build(&roster()).unwrap();
        Matcher::new(Arc::new(index), Arc::new(AliasTable::new()))
    }

    #[test]
    fn test_resolves_any_spacing_and_case() {
        let svc = service();
        for q in ["IP1 1AA", "ip11aa", " Ip1  1aA "] {
            let hit = svc.resolve(q);
            assert_eq!(hit.representative().unwrap().id.as_str(), "1", "{q}");
            assert!(matches!(hit, Lookup::Found { key: LookupKey::Postcode, .. }));
        }
    }

    #[test]
    fn test_falls_back_to_district() {
        let hit = service().resolve("NR3 1AA");
        assert!(matches!(hit, Lookup::Found { key: LookupKey::Area, .. }));
        assert_eq!(hit.representative().unwrap().display_name, "B");
    }

    #[test]
    fn test_reports_why_nothing_was_found() {
        let svc = service();
        assert_eq!(svc.resolve("not a postcode"), Lookup::NotFound(NotFoundReason::MalformedQuery));
        assert_eq!(svc.resolve(""), Lookup::NotFound(NotFoundReason::MalformedQuery));
        assert_eq!(svc.resolve("CB1 1AA"), Lookup::NotFound(NotFoundReason::NotInArtifact));
        assert_eq!(svc.resolve("ZZ1 1ZZ"), Lookup::NotFound(NotFoundReason::UnknownRepresentative));
    }

    #[test]
    fn test_live_source_fills_gaps() {
        let live = StaticAreaSource::new().with("cb1 1aa", "IPSWICH");
        let svc = service().with_matcher(matcher()).with_live_source(Arc::new(live));
        let hit = svc.resolve("CB1 1AA");
        assert!(matches!(hit, Lookup::Found { key: LookupKey::Live, .. }));
        assert_eq!(svc.resolve("CB2 2AA"), Lookup::NotFound(NotFoundReason::NotInArtifact));

        // Without a matcher the live source cannot be used.
        let live = StaticAreaSource::new().with("cb1 1aa", "IPSWICH");
        let svc = service().with_live_source(Arc::new(live));
        assert!(!svc.resolve("CB1 1AA").is_found());
    }

    #[test]
    fn test_resolves_area_names() {
        let svc = service().with_matcher(matcher());
        assert_eq!(svc.resolve_area("norwich north").unwrap().id.as_str(), "2");
        assert!(svc.resolve_area("Old Seat").is_none());
        assert!(service().resolve_area("Ipswich").is_none());
    }

    #[test]
    fn test_autocompletes_in_sorted_display_form() {
        let svc = service();
        assert_eq!(svc.autocomplete("ip1", 10), vec!["IP1 1AA", "IP1 1AB"]);
        assert_eq!(svc.autocomplete("IP", 2), vec!["IP1 1AA", "IP1 1AB"]);
        assert!(svc.autocomplete("I", 10).is_empty());
        assert!(svc.autocomplete("QQ", 10).is_empty());
    }

    #[test]
    fn test_service_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LookupService>();
    }
}

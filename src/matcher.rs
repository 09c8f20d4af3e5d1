//! Tiered area name resolution.
//!
//! Tiers run in a fixed order and the first success wins:
//!
//! 1. **Exact** - the normalized name is an index key.
//! 2. **Alias** - the alias table maps the normalized name to an index key.
//!    No-op alias entries are skipped.
//! 3. **Fuzzy** - the first index key, in sorted order, sharing at least
//!    [`MIN_SHARED_TOKENS`] significant tokens with the name.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::alias::AliasTable;
use crate::index::RepresentativeIndex;
use crate::normalize::{normalize_area_name, tokens};
use crate::representative::RepresentativeId;

/// Shared significant tokens required for a fuzzy match.
pub const MIN_SHARED_TOKENS: usize = 2;

/// The strategy level at which a name was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Normalized name found directly in the index.
    Exact,
    /// Resolved through the alias table.
    Alias,
    /// Resolved by token overlap.
    Fuzzy,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Alias => write!(f, "alias"),
            Self::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// Token comparison rule for the fuzzy tier.
///
/// Exactly one policy applies to a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyPolicy {
    /// Tokens longer than 3 characters, compared for equality.
    #[default]
    Strict,
    /// Tokens longer than 2 characters, either containing the other.
    Loose,
}

impl FuzzyPolicy {
    /// Tokens must be strictly longer than this many characters to count.
    #[must_use]
    pub const fn min_token_len(self) -> usize {
        match self {
            Self::Strict => 3,
            Self::Loose => 2,
        }
    }

    fn tokens_match(self, input: &str, candidate: &str) -> bool {
        match self {
            Self::Strict => input == candidate,
            Self::Loose => input.contains(candidate) || candidate.contains(input),
        }
    }

    fn significant(self, normalized: &str) -> BTreeSet<&str> {
        let min = self.min_token_len();
        tokens(normalized).filter(|t| t.chars().count() > min).collect()
    }

    /// Counts input tokens with at least one matching candidate token.
    fn shared(self, input: &BTreeSet<&str>, candidate: &BTreeSet<&str>) -> usize {
        input
            .iter()
            .filter(|t| candidate.iter().any(|c| self.tokens_match(t, c)))
            .count()
    }
}

/// A successful resolution of an area name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaMatch {
    /// Representative holding the matched area.
    pub representative_id: RepresentativeId,
    /// Tier that produced the match.
    pub tier: MatchTier,
    /// Canonical index key that matched.
    pub matched_area_name: String,
}

/// Resolution of one postcode to a representative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub postcode: String,
    pub representative_id: RepresentativeId,
    pub match_tier: MatchTier,
    pub matched_area_name: String,
}

impl MatchResult {
    /// Attaches a postcode to an area match.
    #[must_use]
    pub fn new(postcode: impl Into<String>, area: AreaMatch) -> Self {
        Self {
            postcode: postcode.into(),
            representative_id: area.representative_id,
            match_tier: area.tier,
            matched_area_name: area.matched_area_name,
        }
    }
}

/// Resolves raw area names against an index and alias table.
///
/// Cheap to clone; the index and table are shared. Matching never mutates
/// either.
#[derive(Debug, Clone)]
pub struct Matcher {
    index: Arc<RepresentativeIndex>,
    aliases: Arc<AliasTable>,
    policy: FuzzyPolicy,
}

impl Matcher {
    /// Creates a matcher using the strict fuzzy policy.
    #[must_use]
    pub fn new(index: Arc<RepresentativeIndex>, aliases: Arc<AliasTable>) -> Self {
        Self {
            index,
            aliases,
            policy: FuzzyPolicy::Strict,
        }
    }

    /// Replaces the fuzzy policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: FuzzyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The index being matched against.
    #[must_use]
    pub fn index(&self) -> &RepresentativeIndex {
        &self.index
    }

    /// The alias table in use.
    #[must_use]
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// The fuzzy policy in use.
    #[must_use]
    pub const fn policy(&self) -> FuzzyPolicy {
        self.policy
    }

    /// Normalizes `raw` and resolves it.
    #[must_use]
    pub fn match_area(&self, raw: &str) -> Option<AreaMatch> {
        self.match_normalized(&normalize_area_name(raw))
    }

    /// Resolves an already-normalized name. Empty names never match.
    #[must_use]
    pub fn match_normalized(&self, normalized: &str) -> Option<AreaMatch> {
        if normalized.is_empty() {
            return None;
        }
        self.exact(normalized)
            .or_else(|| self.alias(normalized))
            .or_else(|| self.fuzzy(normalized))
    }

    fn hit(&self, key: &str, tier: MatchTier) -> Option<AreaMatch> {
        self.index.get(key).map(|id| AreaMatch {
            representative_id: id.clone(),
            tier,
            matched_area_name: key.to_string(),
        })
    }

    fn exact(&self, normalized: &str) -> Option<AreaMatch> {
        self.hit(normalized, MatchTier::Exact)
    }

    fn alias(&self, normalized: &str) -> Option<AreaMatch> {
        let target = self.aliases.resolve(normalized)?;
        if target == normalized {
            return None;
        }
        self.hit(target, MatchTier::Alias)
    }

    fn fuzzy(&self, normalized: &str) -> Option<AreaMatch> {
        let input = self.policy.significant(normalized);
        if input.len() < MIN_SHARED_TOKENS {
            return None;
        }
        self.index
            .iter()
            .find(|(key, _)| {
                let candidate = self.policy.significant(key);
                self.policy.shared(&input, &candidate) >= MIN_SHARED_TOKENS
            })
            .and_then(|(key, _)| self.hit(key, MatchTier::Fuzzy))
    }
}

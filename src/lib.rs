//! # seatmap - postcode to representative mapping
//!
//! seatmap turns a national postcode directory and a roster of elected
//! representatives into a lookup artifact mapping every in-use postcode to
//! the representative of its constituency, plus a statistics report
//! describing how each area name was resolved.
//!
//! ## Core Concepts
//!
//! - **Representative index**: normalized area name to active representative,
//!   built once per run and rejected if two representatives share an area
//! - **Matcher**: resolves raw area names by exact key, then alias table,
//!   then token overlap
//! - **Pipeline**: streams the postcode source once and folds every row into
//!   the artifact and report
//! - **Lookup service**: read-only queries against a published artifact
//!
//! ## Usage
//!
//! ```rust,ignore
//! use seatmap::{PipelineConfig, LookupService};
//!
//! let config = PipelineConfig::from_json_file("seatmap.json")?;
//! let (output, paths) = seatmap::pipeline::build(&config)?;
//! println!("{} postcodes mapped", output.artifact.len());
//!
//! let service = LookupService::load(&paths.artifact, &config.roster_path)?;
//! let mp = service.resolve("sw1a 0aa");
//! ```
//!
//! ```
//! use seatmap::{normalize_area_name, AliasTable, Matcher, MatchTier, Representative, RepresentativeIndex};
//! use std::sync::Arc;
//!
//! let index = RepresentativeIndex::build(&[Representative::new("4514", "A. Member", "Ipswich", "Ind")]).unwrap();
//! let matcher = Matcher::new(Arc::new(index), Arc::new(AliasTable::new()));
//!
//! assert_eq!(normalize_area_name("  IPSWICH "), "ipswich");
//! assert_eq!(matcher.match_area("Ipswich").unwrap().tier, MatchTier::Exact);
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod alias;
pub mod error;
pub mod index;
pub mod lookup;
pub mod matcher;
pub mod normalize;
pub mod pipeline;
pub mod postcode;
pub mod representative;
pub mod source;

pub use alias::{AliasEntry, AliasTable, IneffectiveAlias};
pub use error::{ConfigError, IntegrityError, PublishError, SeatmapError, SeatmapResult, SourceError};
pub use index::{IndexBuildSummary, RepresentativeIndex};
pub use lookup::{LiveAreaSource, Lookup, LookupKey, LookupService, NotFoundReason, StaticAreaSource};
pub use matcher::{AreaMatch, FuzzyPolicy, MatchResult, MatchTier, Matcher};
pub use normalize::normalize_area_name;
pub use pipeline::{
    ArtifactGranularity, LookupArtifact, Pipeline, PipelineConfig, PipelineOutput, RunOptions, StatisticsReport,
};
pub use postcode::{canonical_postcode, format_postcode, is_valid_postcode};
pub use representative::{Representative, RepresentativeId};
pub use source::{MalformedReason, PostcodeReader, PostcodeRecord, SourceRow};

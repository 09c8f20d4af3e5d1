//! Curated table of historical area names and their current successors.
//!
//! Lookup is a single hop: if a target has itself been renamed, the table
//! needs a direct entry for the old name. Entries whose source and target are
//! equal are allowed and record that a name is confirmed unchanged; the
//! matcher never counts them as alias matches.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IntegrityError, SeatmapResult, SourceError};
use crate::index::RepresentativeIndex;
use crate::normalize::normalize_area_name;

/// One alias rule, stored in normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasEntry {
    /// Historical or alternative name.
    #[serde(alias = "from")]
    pub from_name: String,
    /// Current canonical name.
    #[serde(alias = "to")]
    pub to_name: String,
}

impl AliasEntry {
    /// Returns true if the entry documents an unchanged name.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.from_name == self.to_name
    }
}

/// An alias whose target has no active representative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IneffectiveAlias {
    pub from_name: String,
    pub to_name: String,
    pub noop: bool,
}

/// Historical -> current constituency names following the 2023 boundary
/// review, consolidated from several overlapping hand-maintained lists.
/// Where those lists disagreed the earliest documented successor is kept.
const BOUNDARY_REVIEW_2024: &[(&str, &str)] = &[
    // Scotland
    ("aberdeenshire west and kincardine", "west aberdeenshire and kincardine"),
    ("angus", "angus and perthshire glens"),
    ("argyll and bute", "argyll, bute and south lochaber"),
    ("banff and buchan", "banffshire and buchan coast"),
    ("berwickshire, roxburgh and selkirk", "roxburgh, selkirk and southern tweeddale"),
    ("central ayrshire", "ayr, carrick and cumnock"),
    ("glasgow central", "glasgow west"),
    ("gordon", "gordon and buchan"),
    ("inverness, nairn, badenoch and strathspey", "inverness, skye and west ross-shire"),
    ("lanark and hamilton east", "east kilbride and strathaven"),
    ("moray", "aberdeenshire north and moray east"),
    ("moray west, nairn and strathspey", "aberdeenshire north and moray east"),
    ("motherwell and wishaw", "motherwell, wishaw and carluke"),
    ("ochil and south perthshire", "alloa and grangemouth"),
    ("perth and north perthshire", "perth and kinross-shire"),
    ("ross, skye and lochaber", "inverness, skye and west ross-shire"),
    ("rutherglen and hamilton west", "rutherglen"),
    ("stirling", "stirling and strathallan"),
    ("west dunbartonshire", "clydebank and milngavie"),
    ("dumfries and galloway", "dumfries and galloway"),
    ("na h-eileanan an iar", "na h-eileanan an iar"),
    // England
    ("bury st edmunds", "bury st edmunds and stowmarket"),
    ("waveney", "waveney valley"),
    ("bridlington and the wolds", "east yorkshire"),
    ("beverley and holderness", "east yorkshire"),
    ("hull north", "kingston upon hull north and cottingham"),
    ("hull east", "kingston upon hull east"),
    ("kingston upon hull west and hessle", "kingston upon hull west and haltemprice"),
    ("york", "york central"),
    ("selby and ainsty", "selby"),
    ("richmond (yorks)", "richmond and northallerton"),
    ("keighley", "keighley and ilkley"),
    ("dewsbury", "dewsbury and batley"),
    ("batley and spen", "dewsbury and batley"),
    ("barnsley east", "barnsley north"),
    ("great grimsby", "great grimsby and cleethorpes"),
    ("cleethorpes", "great grimsby and cleethorpes"),
    ("brigg and goole", "brigg and immingham"),
    ("stratford-on-avon", "stratford-on-avon"),
    ("aldridge-brownhills", "aldridge-brownhills"),
    // Wales
    ("ceredigion", "ceredigion preseli"),
    ("carmarthen east and dinefwr", "caerfyrddin"),
    ("carmarthen west and south pembrokeshire", "caerfyrddin"),
    ("neath", "neath and swansea east"),
    ("aberavon", "aberafan maesteg"),
    ("rhondda", "rhondda and ogmore"),
    ("merthyr tydfil and rhymney", "merthyr tydfil and aberdare"),
    ("blaenau gwent", "blaenau gwent and rhymney"),
    ("islwyn", "newport west and islwyn"),
    ("newport west", "newport west and islwyn"),
    ("monmouth", "monmouthshire"),
    ("cardiff central", "cardiff south and penarth"),
    ("vale of glamorgan", "vale of glamorgan"),
    // Northern Ireland
    ("belfast south", "belfast south and mid down"),
    ("east londonderry", "east derry"),
    ("fermanagh and south tyrone", "fermanagh and south tyrone"),
];

/// Single-hop alias lookup table.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl AliasTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table, normalizing both sides of every entry.
    ///
    /// # Errors
    /// - `DuplicateAlias` if two entries normalize to the same source name.
    /// - `EmptyAliasName` if either side normalizes to an empty string.
    pub fn from_entries<I, A, B>(entries: I) -> Result<Self, IntegrityError>
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let mut table = Self::new();
        for (from, to) in entries {
            let from = normalize_area_name(from.as_ref());
            let to = normalize_area_name(to.as_ref());
            if from.is_empty() || to.is_empty() {
                return Err(IntegrityError::EmptyAliasName);
            }
            if table.entries.contains_key(&from) {
                return Err(IntegrityError::DuplicateAlias { from });
            }
            table.entries.insert(from, to);
        }
        Ok(table)
    }

    /// Loads a JSON array of `{ "from": ..., "to": ... }` entries.
    ///
    /// # Errors
    /// Source errors when the file cannot be read or parsed, integrity errors
    /// per [`AliasTable::from_entries`].
    pub fn from_json_file(path: impl AsRef<Path>) -> SeatmapResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| SourceError::Unavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let entries: Vec<AliasEntry> =
            serde_json::from_str(&raw).map_err(|e| SourceError::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_entries(
            entries.into_iter().map(|e| (e.from_name, e.to_name)),
        )?)
    }

    /// The built-in table of 2024 boundary review renames.
    #[must_use]
    pub fn boundary_review_2024() -> Self {
        let entries = BOUNDARY_REVIEW_2024
            .iter()
            .map(|(from, to)| (normalize_area_name(from), normalize_area_name(to)))
            .collect();
        Self { entries }
    }

    /// Adds every entry of `other` not already present, returning the source
    /// names that were shadowed by an existing entry.
    pub fn extend_from(&mut self, other: &AliasTable) -> Vec<String> {
        let mut shadowed = Vec::new();
        for (from, to) in &other.entries {
            if self.entries.contains_key(from) {
                shadowed.push(from.clone());
            } else {
                self.entries.insert(from.clone(), to.clone());
            }
        }
        shadowed
    }

    /// Resolves a normalized name to its current name, one hop only.
    #[must_use]
    pub fn resolve(&self, canonical_raw_name: &str) -> Option<&str> {
        self.entries.get(canonical_raw_name).map(String::as_str)
    }

    /// Iterates entries in sorted source-name order.
    pub fn entries(&self) -> impl Iterator<Item = AliasEntry> + '_ {
        self.entries.iter().map(|(from, to)| AliasEntry {
            from_name: from.clone(),
            to_name: to.clone(),
        })
    }

    /// Entries whose target has no active representative in `index`.
    #[must_use]
    pub fn ineffective(&self, index: &RepresentativeIndex) -> Vec<IneffectiveAlias> {
        self.entries
            .iter()
            .filter(|(_, to)| !index.contains_area(to))
            .map(|(from, to)| IneffectiveAlias {
                from_name: from.clone(),
                to_name: to.clone(),
                noop: from == to,
            })
            .collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use std::fs;
use std::path::Path;

use seatmap::pipeline::{self, EnrichedLookup};
use seatmap::{
    ArtifactGranularity, FuzzyPolicy, LookupArtifact, MalformedReason, PipelineConfig, RepresentativeId,
    SeatmapError, SourceError, StatisticsReport,
};

const ROSTER: &str = r#"[
    {"id": 4514, "name": "Member One", "constituency": "Ipswich", "party": "Labour"},
    {"id": "4001", "name": "Member Two", "constituency": "Norwich North", "party": "Labour"},
    {"id": 3900, "name": "Member Three", "constituency": "Argyll, Bute and South Lochaber", "party": "SNP"},
    {"id": 4200, "name": "Member Four", "constituency": "Hull North and Cottingham", "party": "Labour"},
    {"id": 1000, "name": "Former Member", "constituency": "Old Seat", "party": "None", "isActive": false}
]"#;

const POSTCODES: &str = "\u{feff}Postcode,In Use?,Constituency Name 2024,Region\n\
IP1 1AA,Yes,Ipswich,East of England\n\
ip11ab,Yes,IPSWICH,East of England\n\
NR3 1AA,Yes,Norwich North,East of England\n\
PA1 1AA,Yes,Argyll and Bute,Scotland\n\
HU6 7RX,Yes,Cottingham North,Yorkshire\n\
XX1 1XX,Yes,Atlantis,Nowhere\n\
XX1 1XY,Yes,Atlantis,Nowhere\n\
IP9 9ZZ,No,Ipswich,East of England\n\
,Yes,Ipswich,East of England\n\
IP2 2AA,Yes,,East of England\n\
\n\
NR3 1AA,Yes,Ipswich,East of England\n";

fn write_inputs(dir: &Path) -> PipelineConfig {
    let source = dir.join("postcodes.csv");
    let roster = dir.join("mps.json");
    fs::write(&source, POSTCODES).unwrap();
    fs::write(&roster, ROSTER).unwrap();
    PipelineConfig {
        postcode_source: source,
        roster_path: roster,
        output_dir: dir.join("out"),
        ..PipelineConfig::default()
    }
}

fn read_report(path: &Path) -> StatisticsReport {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn build_publishes_artifact_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path());

    let (output, paths) = pipeline::build(&config).unwrap();

    let artifact = LookupArtifact::load(&paths.artifact).unwrap();
    assert_eq!(artifact, output.artifact);
    assert_eq!(artifact.get("IP1 1AA"), Some(&RepresentativeId::from("4514")));
    assert_eq!(artifact.get("IP1 1AB"), Some(&RepresentativeId::from("4514")));
    // Built-in alias: Argyll and Bute was renamed in the 2024 review.
    assert_eq!(artifact.get("PA1 1AA"), Some(&RepresentativeId::from("3900")));
    // Token overlap: "cottingham" and "north".
    assert_eq!(artifact.get("HU6 7RX"), Some(&RepresentativeId::from("4200")));
    // Later row wins for the duplicate.
    assert_eq!(artifact.get("NR3 1AA"), Some(&RepresentativeId::from("4514")));
    assert!(artifact.get("XX1 1XX").is_none());
    assert!(artifact.get("IP9 9ZZ").is_none());
    assert_eq!(artifact.len(), 5);

    let report = read_report(&paths.report);
    assert_eq!(report.run_id, output.report.run_id);
    let t = report.totals;
    assert_eq!(t.rows_scanned, 11);
    assert_eq!(t.malformed, 2);
    assert_eq!(t.inactive, 1);
    assert_eq!(t.active, 8);
    assert_eq!(t.matched, 6);
    assert_eq!(t.unmatched, 2);
    assert_eq!(t.duplicate_postcodes, 1);
    assert_eq!(t.artifact_entries, 5);
    assert_eq!(report.tiers.exact, 4);
    assert_eq!(report.tiers.alias, 1);
    assert_eq!(report.tiers.fuzzy, 1);
    assert_eq!(report.malformed_by_reason.get(&MalformedReason::MissingPostcode), Some(&1));
    assert_eq!(report.malformed_by_reason.get(&MalformedReason::MissingAreaName), Some(&1));
    assert_eq!(report.top_unmatched[0].name, "atlantis");
    assert_eq!(report.top_unmatched[0].count, 2);
    assert!((report.match_rate - 0.75).abs() < 1e-9);
    assert_eq!(report.coverage.indexed_representatives, 4);
    assert_eq!(report.coverage.representatives_with_postcodes, 3);
    assert_eq!(report.artifact_digest, output.artifact.digest().unwrap());
    assert!(paths.enriched.is_none());
}

#[test]
fn repeated_runs_publish_identical_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path());

    let (_, first) = pipeline::build(&config).unwrap();
    let first_bytes = fs::read(&first.artifact).unwrap();

    let pooled = PipelineConfig {
        match_workers: 3,
        batch_size: 2,
        ..config
    };
    let (_, second) = pipeline::build(&pooled).unwrap();
    assert_eq!(fs::read(&second.artifact).unwrap(), first_bytes);
}

#[test]
fn enriched_lookup_carries_auxiliary_columns() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        enriched_file_name: Some("enriched.json".to_string()),
        ..write_inputs(dir.path())
    };

    let (_, paths) = pipeline::build(&config).unwrap();
    let enriched: EnrichedLookup = serde_json::from_slice(&fs::read(paths.enriched.unwrap()).unwrap()).unwrap();
    let entry = enriched.get("PA1 1AA").unwrap();
    assert_eq!(entry.area_name, "Argyll and Bute");
    assert_eq!(entry.auxiliary.get("Region").map(String::as_str), Some("Scotland"));
    assert_eq!(enriched.len(), 5);
}

#[test]
fn district_granularity_collapses_postcodes() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        granularity: ArtifactGranularity::District,
        ..write_inputs(dir.path())
    };

    let (output, _) = pipeline::build(&config).unwrap();
    assert_eq!(output.artifact.get("IP1"), Some(&RepresentativeId::from("4514")));
    assert_eq!(output.artifact.get("NR3"), Some(&RepresentativeId::from("4514")));
    assert_eq!(output.artifact.get("HU6"), Some(&RepresentativeId::from("4200")));
    assert!(output.artifact.get("IP1 1AA").is_none());
}

#[test]
fn loose_policy_matches_more() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_inputs(dir.path());
    fs::write(
        &base.postcode_source,
        "Postcode,In Use?,Constituency Name 2024\nBS1 1AA,Yes,Somerset Northeast\n",
    )
    .unwrap();
    fs::write(
        &base.roster_path,
        r#"[{"id": 1, "name": "A", "constituency": "North East Somerset and Hanham", "party": "X"}]"#,
    )
    .unwrap();

    let (strict, _) = pipeline::build(&base).unwrap();
    assert_eq!(strict.report.totals.unmatched, 1);

    let loose = PipelineConfig {
        fuzzy_policy: FuzzyPolicy::Loose,
        ..base
    };
    let (loose, _) = pipeline::build(&loose).unwrap();
    assert_eq!(loose.report.totals.matched, 1);
    assert_eq!(loose.report.fuzzy_policy, FuzzyPolicy::Loose);
}

#[test]
fn missing_column_fails_and_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path());
    fs::write(&config.postcode_source, "Postcode,In Use?,Region\nIP1 1AA,Yes,East\n").unwrap();

    let err = pipeline::build(&config).unwrap_err();
    assert!(matches!(err, SeatmapError::Source(SourceError::MissingColumn { .. })));
    assert!(!config.output_dir.join(&config.artifact_file_name).exists());
}

#[test]
fn unavailable_source_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        postcode_source: dir.path().join("absent.csv"),
        ..write_inputs(dir.path())
    };
    let err = pipeline::build(&config).unwrap_err();
    assert!(matches!(err, SeatmapError::Source(SourceError::Unavailable { .. })));
}

#[test]
fn failed_run_keeps_previous_publication() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path());
    let (_, paths) = pipeline::build(&config).unwrap();
    let before = fs::read(&paths.artifact).unwrap();

    fs::write(
        &config.roster_path,
        r#"[{"id": 1, "name": "A", "constituency": "Ipswich"}, {"id": 2, "name": "B", "constituency": "ipswich "}]"#,
    )
    .unwrap();
    let err = pipeline::build(&config).unwrap_err();
    assert!(matches!(err, SeatmapError::Integrity(_)));
    assert_eq!(fs::read(&paths.artifact).unwrap(), before);
}

#[test]
fn config_file_drives_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path());
    let config_path = dir.path().join("seatmap.json");
    fs::write(
        &config_path,
        serde_json::to_vec(&serde_json::json!({
            "postcode_source": inputs.postcode_source,
            "roster_path": inputs.roster_path,
            "output_dir": inputs.output_dir,
            "artifact_file_name": "lookup.json",
            "builtin_aliases": false,
            "read_timeout_ms": 5000
        }))
        .unwrap(),
    )
    .unwrap();

    let config = PipelineConfig::from_json_file(&config_path).unwrap();
    let (output, paths) = pipeline::build(&config).unwrap();
    assert!(paths.artifact.ends_with("lookup.json"));
    // Without the built-in table the renamed seat is only found by token
    // overlap ("argyll" and "bute").
    assert_eq!(output.artifact.get("PA1 1AA"), Some(&RepresentativeId::from("3900")));
    assert_eq!(output.report.tiers.alias, 0);
    assert_eq!(output.report.tiers.fuzzy, 2);
    assert_eq!(output.report.aliases.rules, 0);
}

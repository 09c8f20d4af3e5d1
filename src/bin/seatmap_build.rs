//! seatmap build
//!
//! Runs the postcode pipeline once and publishes the lookup artifact and
//! statistics report.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use seatmap::{pipeline, FuzzyPolicy, PipelineConfig};

/// Command line overrides applied on top of the config file.
#[derive(Default)]
struct Args {
    config: Option<PathBuf>,
    source: Option<PathBuf>,
    roster: Option<PathBuf>,
    aliases: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    workers: Option<usize>,
    loose: bool,
}

fn usage() {
    println!("seatmap-build - map postcodes to representatives");
    println!();
    println!("USAGE:");
    println!("    seatmap-build [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>       JSON pipeline config");
    println!("    -s, --source <FILE>       Postcode source CSV [default: postcodes.csv]");
    println!("    -r, --roster <FILE>       Representative roster JSON [default: representatives.json]");
    println!("    -a, --aliases <FILE>      Extra alias entries JSON");
    println!("    -o, --output-dir <DIR>    Output directory [default: out]");
    println!("    -w, --workers <N>         Match workers [default: 1]");
    println!("        --loose               Use the loose fuzzy policy");
    println!("    -h, --help                Print help information");
    println!();
    println!("Log verbosity follows RUST_LOG (default: info).");
}

fn value(args: &[String], i: usize, flag: &str) -> Result<String, String> {
    args.get(i + 1)
        .cloned()
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_args() -> Result<Option<Args>, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" | "-c" => parsed.config = Some(PathBuf::from(value(&args, i, flag)?)),
            "--source" | "-s" => parsed.source = Some(PathBuf::from(value(&args, i, flag)?)),
            "--roster" | "-r" => parsed.roster = Some(PathBuf::from(value(&args, i, flag)?)),
            "--aliases" | "-a" => parsed.aliases = Some(PathBuf::from(value(&args, i, flag)?)),
            "--output-dir" | "-o" => parsed.output_dir = Some(PathBuf::from(value(&args, i, flag)?)),
            "--workers" | "-w" => {
                let raw = value(&args, i, flag)?;
                let n = raw
                    .parse::<usize>()
                    .map_err(|_| format!("invalid worker count: {raw}"))?;
                parsed.workers = Some(n);
            }
            "--loose" => {
                parsed.loose = true;
                i += 1;
                continue;
            }
            "--help" | "-h" => return Ok(None),
            arg => return Err(format!("unknown argument: {arg}")),
        }
        i += 2;
    }

    Ok(Some(parsed))
}

fn load_config(args: Args) -> seatmap::SeatmapResult<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(source) = args.source {
        config.postcode_source = source;
    }
    if let Some(roster) = args.roster {
        config.roster_path = roster;
    }
    if let Some(aliases) = args.aliases {
        config.alias_path = Some(aliases);
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(workers) = args.workers {
        config.match_workers = workers;
    }
    if args.loose {
        config.fuzzy_policy = FuzzyPolicy::Loose;
    }
    Ok(config.validate()?)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => {
            usage();
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::from(2);
        }
    };

    let result = load_config(args).and_then(|config| pipeline::build(&config));
    match result {
        Ok((output, paths)) => {
            let totals = output.report.totals;
            println!("seatmap-build v{}", env!("CARGO_PKG_VERSION"));
            println!("rows scanned:      {}", totals.rows_scanned);
            println!("active postcodes:  {}", totals.active);
            println!(
                "matched:           {} ({:.2}%)",
                totals.matched,
                output.report.match_rate * 100.0
            );
            println!("unmatched:         {}", totals.unmatched);
            println!("artifact entries:  {}", totals.artifact_entries);
            println!("artifact:          {}", paths.artifact.display());
            println!("report:            {}", paths.report.display());
            if let Some(enriched) = paths.enriched {
                println!("enriched lookup:   {}", enriched.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "build failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

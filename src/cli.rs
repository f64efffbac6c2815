/// Command-line interface
use clap::{value_parser, Arg, ArgAction, ArgGroup, ArgMatches, Command};
use std::path::PathBuf;

use crate::config::Config;
use crate::matcher::Tolerance;

/// Parse a duration range like `120-240` into `(min, max)` seconds
pub fn parse_duration_range(value: &str) -> Result<(f64, f64), String> {
    let parts: Vec<&str> = value.split('-').collect();
    let [min, max] = parts.as_slice() else {
        return Err(format!(
            "Invalid duration range: {}. Use format: MIN-MAX (e.g., 120-240)",
            value
        ));
    };

    match (min.trim().parse::<f64>(), max.trim().parse::<f64>()) {
        (Ok(min), Ok(max)) => Ok((min, max)),
        _ => Err(format!("Invalid duration range: {}. Values must be numbers.", value)),
    }
}

/// Build the command-line parser
pub fn build_cli() -> Command {
    Command::new("chapter-extractor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Extract recurring chapter segments from MKV collections")
        .arg(
            Arg::new("input-dir")
                .value_name("INPUT_DIR")
                .help("Directory to scan for MKV files")
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("output-dir")
                .value_name("OUTPUT_DIR")
                .help("Directory for extracted segments")
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("duration-range")
                .long("duration-range")
                .value_name("MIN-MAX")
                .help("Duration range in seconds (e.g., 120-240)")
                .value_parser(parse_duration_range),
        )
        .arg(
            Arg::new("chapter-names")
                .long("chapter-names")
                .help("Filter by predefined chapter name keywords")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("min-occurrences")
                .long("min-occurrences")
                .value_name("N")
                .help("Minimum occurrences for a pattern (0 = extract all matches). Default: 5")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("tolerance-seconds")
                .long("tolerance-seconds")
                .value_name("SECONDS")
                .help("Absolute duration tolerance in seconds. Default: 2")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("tolerance-percent")
                .long("tolerance-percent")
                .value_name("PERCENT")
                .help("Percentage duration tolerance (mutually exclusive with --tolerance-seconds)")
                .value_parser(value_parser!(f64)),
        )
        .group(
            ArgGroup::new("tolerance")
                .args(["tolerance-seconds", "tolerance-percent"])
                .multiple(false),
        )
        .arg(
            Arg::new("no-episode-parsing")
                .long("no-episode-parsing")
                .help("Disable episode tag parsing from filenames")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Preview detected patterns without extracting")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("recursive")
                .short('r')
                .long("recursive")
                .help("Scan subdirectories")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .help("Write a JSON report of detected patterns to the output directory")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
}

/// Override configuration with command-line values.
///
/// Flags only ever switch a setting on (or, for `--no-episode-parsing`, off),
/// so values from a config file survive when a flag is absent.
pub fn apply_matches(config: &mut Config, matches: &ArgMatches) {
    if let Some(dir) = matches.get_one::<PathBuf>("input-dir") {
        config.scan.input_dir = dir.clone();
    }
    if let Some(dir) = matches.get_one::<PathBuf>("output-dir") {
        config.output.output_dir = dir.clone();
    }
    if let Some(range) = matches.get_one::<(f64, f64)>("duration-range") {
        config.matching.duration_range = Some(*range);
    }
    if let Some(min) = matches.get_one::<usize>("min-occurrences") {
        config.matching.min_occurrences = *min;
    }
    if let Some(seconds) = matches.get_one::<f64>("tolerance-seconds") {
        config.matching.tolerance = Tolerance::Seconds(*seconds);
    }
    if let Some(percent) = matches.get_one::<f64>("tolerance-percent") {
        config.matching.tolerance = Tolerance::Percent(*percent);
    }

    if matches.get_flag("chapter-names") {
        config.matching.chapter_names = true;
    }
    if matches.get_flag("no-episode-parsing") {
        config.matching.episode_parsing = false;
    }
    if matches.get_flag("dry-run") {
        config.output.dry_run = true;
    }
    if matches.get_flag("recursive") {
        config.scan.recursive = true;
    }
    if matches.get_flag("report") {
        config.output.save_report = true;
    }
}

use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_parser, Arg, ArgAction,
    ArgMatches, Command,
};

use anyhow::Context;

use utils::{init_log, LogLevel};

use crate::{config::*, depth::MissingDepth, region::RegionCatalog, sample::*};

/// Set up definition of command options for clap
fn cli_model() -> Command {
    Command::new(crate_name!())
        .about(crate_description!())
        .version(crate_version!())
        .author(crate_authors!())
        .arg(
            Arg::new("timestamp")
                .short('X')
                .long("timestamp")
                .value_parser(value_parser!(stderrlog::Timestamp))
                .value_name("GRANULARITY")
                .default_value("none")
                .help("Prepend log entries with a timestamp"),
        )
        .arg(
            Arg::new("loglevel")
                .short('l')
                .long("loglevel")
                .value_name("LOGLEVEL")
                .value_parser(value_parser!(LogLevel))
                .ignore_case(true)
                .default_value("warn")
                .help("Set log level"),
        )
        .arg(
            Arg::new("quiet")
                .action(ArgAction::SetTrue)
                .long("quiet")
                .conflicts_with("loglevel")
                .help("Silence all output"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_parser(value_parser!(NonZeroUsize))
                .value_name("INT")
                .help("Set number of worker threads [default: available cores]"),
        )
        .arg(
            Arg::new("regions")
                .short('r')
                .long("regions")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .required(true)
                .help("BED file with the regions of interest"),
        )
        .arg(
            Arg::new("min_depth")
                .short('m')
                .long("min-depth")
                .value_parser(value_parser!(u32).range(1..))
                .value_name("INT")
                .required(true)
                .help("Minimum depth for a position to count as covered"),
        )
        .arg(
            Arg::new("missing_dp")
                .long("missing-dp")
                .value_parser(value_parser!(MissingDepth))
                .ignore_case(true)
                .value_name("POLICY")
                .default_value("zero")
                .help("Handling of depth records with no DP entry (zero or error)"),
        )
        .arg(
            Arg::new("run_dir")
                .short('D')
                .long("run-dir")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .help("Process all depth files found in directory"),
        )
        .arg(
            Arg::new("suffix")
                .short('S')
                .long("suffix")
                .value_parser(value_parser!(String))
                .value_name("STRING")
                .default_value(".genome.vcf")
                .help("Suffix of depth files when searching a run directory"),
        )
        .arg(
            Arg::new("sample_list")
                .short('s')
                .long("sample-list")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .help("File with list of sample names and depth files"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output-file")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .help("Set output file [default: <RUN_DIR>/Coverage/<RUN>_Coverage.txt with --run-dir, otherwise <stdout>]"),
        )
        .arg(
            Arg::new("stdout")
                .action(ArgAction::SetTrue)
                .long("stdout")
                .conflicts_with("output")
                .help("Write output to <stdout> even when --run-dir is set"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_parser(value_parser!(ReportFormat))
                .ignore_case(true)
                .value_name("FORMAT")
                .default_value("long")
                .help("Layout of output file (long or wide)"),
        )
        .arg(
            Arg::new("per_sample_dir")
                .short('d')
                .long("per-sample-dir")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .help("Also write a coverage report per sample to this directory"),
        )
        .arg(
            Arg::new("depth_files")
                .value_parser(value_parser!(PathBuf))
                .value_name("DEPTH_FILE")
                .num_args(1..)
                .action(ArgAction::Append)
                .help("Depth (genome VCF) input files"),
        )
}

/// Handle command line options.  Set up Config structure
pub fn handle_cli() -> anyhow::Result<Config> {
    // Get matches from command line
    let m = cli_model().get_matches();

    // Setup logging
    init_log(&m)?;

    config_from_matches(&m)
}

/// Combined report for a run directory goes to <run dir>/Coverage/<run>_Coverage.txt,
/// where <run> is the last component of the run directory path
fn default_output_path(run_dir: &Path) -> PathBuf {
    let run = run_dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| String::from("run"));
    run_dir
        .join("Coverage")
        .join(format!("{}_Coverage.txt", run))
}

fn config_from_matches(m: &ArgMatches) -> anyhow::Result<Config> {
    debug!("Processing command line options");

    let suffix = m
        .get_one::<String>("suffix")
        .expect("Missing default suffix");
    let matcher = DepthFileMatcher::new(suffix)?;

    // Collect samples from all sources
    let mut samples = Vec::new();
    if let Some(d) = m.get_one::<PathBuf>("run_dir") {
        let v = matcher
            .scan_dir(d)
            .with_context(|| "Error collecting input files")?;
        if v.is_empty() {
            return Err(anyhow!(
                "No files with suffix {} found in {}",
                suffix,
                d.display()
            ));
        }
        samples.extend(v)
    }
    if let Some(p) = m.get_one::<PathBuf>("sample_list") {
        samples.extend(
            read_sample_list_from_file(p).with_context(|| "Could not read from sample list file")?,
        )
    }
    if let Some(files) = m.get_many::<PathBuf>("depth_files") {
        for p in files {
            samples.push(matcher.sample_from_path(p)?)
        }
    }
    if samples.is_empty() {
        return Err(anyhow!(
            "No depth files given (use --run-dir, --sample-list or DEPTH_FILE arguments)"
        ));
    }
    check_unique_names(&samples)?;
    debug!("Number of samples: {}", samples.len());

    let regions = RegionCatalog::load(
        m.get_one::<PathBuf>("regions")
            .expect("Missing region file"),
    )
    .with_context(|| "Could not read from region file")?;
    if regions.is_empty() {
        warn!("No regions found in region file")
    }

    let min_depth = *m
        .get_one::<u32>("min_depth")
        .expect("Missing minimum depth");

    let threads = m
        .get_one::<NonZeroUsize>("threads")
        .map(|n| usize::from(*n))
        .unwrap_or_else(num_cpus::get)
        .min(samples.len());

    let mut cfg = Config::new(samples, regions, min_depth);
    cfg.set_threads(threads);
    if let Some(x) = m.get_one::<MissingDepth>("missing_dp") {
        cfg.set_missing_dp(*x)
    }
    if let Some(f) = m.get_one::<ReportFormat>("format") {
        cfg.set_format(*f)
    }
    if let Some(p) = m.get_one::<PathBuf>("output") {
        cfg.set_output_file(p.to_owned())
    } else if let Some(d) = m.get_one::<PathBuf>("run_dir") {
        if !m.get_flag("stdout") {
            let p = default_output_path(d);
            debug!("Output will be written to {}", p.display());
            cfg.set_output_file(p)
        }
    }
    if let Some(d) = m.get_one::<PathBuf>("per_sample_dir") {
        cfg.set_per_sample_dir(d.to_owned())
    }
    Ok(cfg)
}

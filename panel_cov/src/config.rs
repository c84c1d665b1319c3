use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{depth::MissingDepth, region::RegionCatalog, sample::Sample};

/// Layout of the combined report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// One line per sample and gene
    Long,
    /// One line per gene, one column per sample
    Wide,
}

impl FromStr for ReportFormat {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "long" => Ok(Self::Long),
            "wide" => Ok(Self::Wide),
            _ => Err("expected long or wide"),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Long => "long",
            Self::Wide => "wide",
        })
    }
}

/// Configuration for the run
/// This is generated from the command line arguments
/// Once set it is read only
///
/// sample_list - list of input samples
/// regions - region catalog, shared by all samples
/// min_depth - minimum depth for a position to count as covered
/// missing_dp - handling of depth records without a DP entry
/// threads - number of worker threads
/// output_file - combined report [default: stdout]
/// format - layout of the combined report
/// per_sample_dir - if set, also write a report per sample into this directory
///
pub struct Config {
    sample_list: Vec<Sample>,
    regions: RegionCatalog,
    min_depth: u32,
    missing_dp: MissingDepth,
    threads: usize,
    output_file: Option<PathBuf>,
    format: ReportFormat,
    per_sample_dir: Option<PathBuf>,
}

impl Config {
    pub fn new(sample_list: Vec<Sample>, regions: RegionCatalog, min_depth: u32) -> Self {
        Self {
            sample_list,
            regions,
            min_depth,
            missing_dp: MissingDepth::Zero,
            threads: 1,
            output_file: None,
            format: ReportFormat::Long,
            per_sample_dir: None,
        }
    }

    pub fn set_missing_dp(&mut self, m: MissingDepth) {
        self.missing_dp = m
    }

    pub fn set_threads(&mut self, n: usize) {
        self.threads = n.max(1)
    }

    pub fn set_output_file(&mut self, p: PathBuf) {
        self.output_file = Some(p)
    }

    pub fn set_format(&mut self, f: ReportFormat) {
        self.format = f
    }

    pub fn set_per_sample_dir(&mut self, d: PathBuf) {
        self.per_sample_dir = Some(d)
    }

    pub fn sample_list(&self) -> &[Sample] {
        &self.sample_list
    }

    pub fn regions(&self) -> &RegionCatalog {
        &self.regions
    }

    pub fn min_depth(&self) -> u32 {
        self.min_depth
    }

    pub fn missing_dp(&self) -> MissingDepth {
        self.missing_dp
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    pub fn per_sample_dir(&self) -> Option<&Path> {
        self.per_sample_dir.as_deref()
    }
}

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use anyhow::Context;
use compress_io::compress::CompressIo;
use regex::Regex;
use utils::get_next_line;

/// Input sample
///
/// name - sample identity used in the reports
/// path - depth (genome VCF) file for the sample
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    name: String,
    path: PathBuf,
}

impl Sample {
    pub fn new(name: String, path: PathBuf) -> Self {
        Self { name, path }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Matches depth file names (<stem><suffix>, optionally compressed) and
/// derives sample names from them
pub struct DepthFileMatcher {
    reg: Regex,
}

impl DepthFileMatcher {
    pub fn new(suffix: &str) -> anyhow::Result<Self> {
        let reg = Regex::new(
            format!(
                r"^(.+){}([.](gz|bgz|xz|bz2|zst|lz4))?$",
                regex::escape(suffix)
            )
            .as_str(),
        )?;
        Ok(Self { reg })
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.reg.is_match(name)
    }

    /// The sample name is the part of the file name before the first underscore, so
    /// S1_L001.genome.vcf gives S1.  If there is no underscore the stem is used
    /// (with the suffix removed if it matches).
    pub fn sample_name(&self, name: &str) -> anyhow::Result<String> {
        let s = if name.contains('_') {
            name.split('_').next().unwrap_or(name)
        } else if let Some(c) = self.reg.captures(name) {
            c.get(1).map(|m| m.as_str()).unwrap_or(name)
        } else {
            name
        };
        if s.is_empty() {
            Err(anyhow!("Could not get sample name from file name {}", name))
        } else {
            check_sample_name(s)?;
            Ok(s.to_owned())
        }
    }

    pub fn sample_from_path(&self, p: &Path) -> anyhow::Result<Sample> {
        let fname = p
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Illegal file name {}", p.display()))?;
        let name = self.sample_name(fname)?;
        trace!("Adding file {} for sample {}", p.display(), name);
        Ok(Sample::new(name, p.to_owned()))
    }

    /// Collect the depth files in a run directory, sorted by file name
    pub fn scan_dir(&self, dir: &Path) -> anyhow::Result<Vec<Sample>> {
        debug!("Looking for depth files in {}", dir.display());
        let mut v = Vec::new();
        for f in dir
            .read_dir()
            .with_context(|| format!("Error checking input directory {}", dir.display()))?
        {
            let entry =
                f.with_context(|| format!("Could not get directory entry from {}", dir.display()))?;
            let path = entry.path();
            if path.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    if self.is_match(name) {
                        v.push(path)
                    }
                }
            }
        }
        v.sort();
        let samples = v
            .iter()
            .map(|p| self.sample_from_path(p))
            .collect::<anyhow::Result<Vec<_>>>()?;

        debug!(
            "{} depth files found in {}",
            samples.len(),
            dir.display()
        );
        Ok(samples)
    }
}

/// Sample names are used to make output file names, so they must not contain
/// path separators or be a relative directory name
fn check_sample_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        Err(anyhow!("Illegal sample name {:?}", name))
    } else {
        Ok(())
    }
}

/// Read in sample list from file
/// Expects two tab separated columns.
/// The first column has the sample name (used in the reports)
/// The second column has the path to the depth file for this sample
///
pub fn read_sample_list_from_file<P: AsRef<Path>>(fname: P) -> anyhow::Result<Vec<Sample>> {
    let fname = fname.as_ref();
    debug!("Reading in sample list from {}", fname.display());

    trace!("Opening sample file for reading");
    let mut rdr = CompressIo::new()
        .path(fname)
        .bufreader()
        .with_context(|| format!("Error opening sample file {}", fname.display()))?;

    trace!("Reading from sample file");
    let mut buf = String::new();
    let mut line = 0;
    let mut sample_vec = Vec::new();

    while let Some(fields) = get_next_line(&mut rdr, &mut buf)
        .with_context(|| format!("Error after reading {} lines from {}", line, fname.display()))?
    {
        line += 1;

        // Skip blank and comment lines
        if fields[0].is_empty() || fields[0].starts_with('#') {
            continue;
        }
        if fields.len() < 2 {
            return Err(anyhow!(
                "{}:{} Expected sample name and depth file path",
                fname.display(),
                line
            ));
        }
        check_sample_name(fields[0])
            .with_context(|| format!("{}:{} Invalid sample name", fname.display(), line))?;
        let sample = Sample::new(fields[0].to_owned(), PathBuf::from(fields[1]));
        trace!(
            "Read in sample {} path {}",
            sample.name,
            sample.path.display()
        );
        sample_vec.push(sample)
    }

    debug!(
        "Finished reading in {} lines; found {} samples",
        line,
        sample_vec.len()
    );
    Ok(sample_vec)
}

/// Check that no two samples share a name
pub fn check_unique_names(samples: &[Sample]) -> anyhow::Result<()> {
    let mut h = HashSet::new();
    for s in samples.iter() {
        if !h.insert(s.name()) {
            return Err(anyhow!(
                "Sample {} occurs more than once (file {})",
                s.name(),
                s.path().display()
            ));
        }
    }
    Ok(())
}

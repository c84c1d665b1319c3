use std::{
    collections::{HashMap, HashSet},
    io::BufRead,
    path::Path,
    sync::Arc,
};

use anyhow::Context;
use compress_io::compress::CompressIo;
use log::Level::Trace;
use utils::get_next_fields;

use crate::chrom::ChromosomeId;

/// Region of interest from the BED file
///
/// start and end are 0 based, half open (BED convention), so the region covers
/// the 1 based positions start+1..=end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    chrom: ChromosomeId,
    start: u64,
    end: u64,
    // Gene (or feature) that the region belongs to.  Several regions can share a name
    name: Arc<str>,
}

impl Region {
    pub fn new(chrom: ChromosomeId, start: u64, end: u64, name: Arc<str>) -> anyhow::Result<Self> {
        if end >= start {
            Ok(Self {
                chrom,
                start,
                end,
                name,
            })
        } else {
            Err(anyhow!("Range error - {} > {}", start, end))
        }
    }
    pub fn chrom(&self) -> &ChromosomeId {
        &self.chrom
    }
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }
    pub fn len(&self) -> u64 {
        self.end - self.start
    }
    /// 1 based positions covered by the region
    pub fn positions(&self) -> std::ops::RangeInclusive<u64> {
        self.start + 1..=self.end
    }
}

/// The gene name is the part of the ROI label before the first underscore, so
/// JAK2_hotspotV617F_1 and JAK2_exon1 both belong to JAK2, while JAK2hotspotV617F_1 is
/// reported separately as JAK2hotspotV617F.  Anything after the first underscore is dropped.
fn gene_name(label: &str) -> &str {
    label.split('_').next().unwrap_or(label)
}

fn parse_coord(s: &str) -> anyhow::Result<u64> {
    s.parse::<u64>()
        .with_context(|| format!("Error parsing coordinate {}", s))
}

/// BED headers that carry no region
fn is_header(first: &str) -> bool {
    first.starts_with('#') || first == "track" || first == "browser"
}

/// Ordered list of regions of interest
///
/// Built once per run and then shared read only between all samples
#[derive(Debug, Default)]
pub struct RegionCatalog {
    regions: Vec<Region>,
}

impl RegionCatalog {
    /// Read regions from a BED file (possibly compressed)
    pub fn load<P: AsRef<Path>>(fname: P) -> anyhow::Result<Self> {
        let fname = fname.as_ref();
        info!("Reading BED file {}", fname.display());

        trace!("Opening region file for reading");
        let rdr = CompressIo::new()
            .path(fname)
            .bufreader()
            .with_context(|| format!("Could not open region file {}", fname.display()))?;

        Self::from_reader(rdr, &fname.display().to_string())
    }

    /// Parse regions from rdr.  src is only used for error messages
    pub fn from_reader<R: BufRead>(mut rdr: R, src: &str) -> anyhow::Result<Self> {
        let mut buf = String::new();
        let mut line = 0;
        let mut regions = Vec::new();

        // Interned gene names so that regions from the same gene share the string
        let mut names: HashSet<Arc<str>> = HashSet::new();

        while let Some(fields) = get_next_fields(&mut rdr, &mut buf)
            .with_context(|| format!("Error after reading {} lines from {}", line, src))?
        {
            line += 1;
            // Skip blank and header lines
            if fields.is_empty() || is_header(fields[0]) {
                continue;
            }
            if fields.len() < 3 {
                return Err(anyhow!(
                    "{}:{} Short line - expected at least 3 fields, found {}",
                    src,
                    line,
                    fields.len()
                ));
            }
            let chrom = ChromosomeId::new(fields[0]);
            let start = parse_coord(fields[1]).with_context(|| format!("{}:{}", src, line))?;
            let end = parse_coord(fields[2]).with_context(|| format!("{}:{}", src, line))?;

            // Without a label, make an ID from the coordinates
            let name = match fields.get(3) {
                Some(label) => gene_name(label).to_owned(),
                None => format!("{}:{}-{}", chrom, start, end),
            };
            let name = match names.get(name.as_str()) {
                Some(n) => Arc::clone(n),
                None => {
                    trace!("Adding gene {}", name);
                    let n: Arc<str> = Arc::from(name);
                    names.insert(Arc::clone(&n));
                    n
                }
            };

            regions.push(
                Region::new(chrom, start, end, name)
                    .with_context(|| format!("{}:{} Invalid region", src, line))?,
            );
        }

        debug!(
            "Finished reading {} lines from {}; found {} regions in {} genes",
            line,
            src,
            regions.len(),
            names.len()
        );
        if log_enabled!(Trace) {
            for r in regions.iter() {
                trace!("\t{:?}", r)
            }
        }
        Ok(Self { regions })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Gene names in order of first appearance
    pub fn gene_names(&self) -> Vec<Arc<str>> {
        let mut seen = HashSet::new();
        self.regions
            .iter()
            .filter(|r| seen.insert(Arc::clone(&r.name)))
            .map(|r| Arc::clone(&r.name))
            .collect()
    }

    /// Build the set of 1 based positions covered by any region, per chromosome
    pub fn target_mask(&self) -> TargetMask {
        let mut h: HashMap<ChromosomeId, Vec<(u64, u64)>> = HashMap::new();
        for r in self.regions.iter().filter(|r| r.end > r.start) {
            h.entry(r.chrom.clone())
                .or_default()
                .push((r.start + 1, r.end))
        }
        for v in h.values_mut() {
            merge_ranges(v)
        }
        TargetMask { ranges: h }
    }
}

/// Make a sorted list of non-overlapping (closed) ranges from v
fn merge_ranges(v: &mut Vec<(u64, u64)>) {
    if v.len() < 2 {
        return;
    }
    v.sort_unstable_by_key(|(a, _)| *a);
    let mut v1 = Vec::with_capacity(v.len());
    let mut prev = v[0];
    for (a, b) in &v[1..] {
        // Check for overlap (or adjacency)
        if *a <= prev.1.saturating_add(1) {
            prev.1 = prev.1.max(*b)
        } else {
            v1.push(prev);
            prev = (*a, *b)
        }
    }
    v1.push(prev);
    *v = v1
}

/// Positions (1 based) that lie in at least one region of the catalog.
///
/// Used when reading depth files so that only positions that can contribute to
/// a gene are kept in memory
#[derive(Debug, Default)]
pub struct TargetMask {
    // Sorted, non-overlapping closed ranges per chromosome
    ranges: HashMap<ChromosomeId, Vec<(u64, u64)>>,
}

impl TargetMask {
    pub fn contains(&self, chrom: &ChromosomeId, pos: u64) -> bool {
        self.ranges
            .get(chrom)
            .map(|v| {
                let i = v.partition_point(|(_, b)| *b < pos);
                v.get(i).map(|(a, _)| *a <= pos).unwrap_or(false)
            })
            .unwrap_or(false)
    }

    pub fn has_chrom(&self, chrom: &ChromosomeId) -> bool {
        self.ranges.contains_key(chrom)
    }
}

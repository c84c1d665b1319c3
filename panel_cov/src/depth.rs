use std::{collections::HashMap, fmt, io::BufRead, path::Path, str::FromStr};

use anyhow::Context;
use compress_io::compress::CompressIo;
use utils::get_next_fields;

use crate::{chrom::ChromosomeId, region::TargetMask};

/// Column holding the INFO field in a (genome) VCF
const INFO_COL: usize = 7;

/// What to do with a record that has no DP= entry in its INFO field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingDepth {
    /// Treat as zero depth (i.e., the position is not covered)
    Zero,
    /// Reject the record; the sample fails
    Error,
}

impl FromStr for MissingDepth {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zero" => Ok(Self::Zero),
            "error" => Ok(Self::Error),
            _ => Err("expected zero or error"),
        }
    }
}

impl fmt::Display for MissingDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Zero => "zero",
            Self::Error => "error",
        })
    }
}

/// Sparse per-sample depth lookup: chromosome -> (1 based position -> depth)
///
/// Positions with zero depth are never stored; a missing entry has depth 0
#[derive(Debug, Default)]
pub struct DepthIndex {
    depth: HashMap<ChromosomeId, HashMap<u64, u32>>,
}

impl DepthIndex {
    pub fn get(&self, chrom: &ChromosomeId, pos: u64) -> u32 {
        self.depth
            .get(chrom)
            .and_then(|h| h.get(&pos))
            .copied()
            .unwrap_or(0)
    }

    /// Number of stored (non-zero) positions
    pub fn len(&self) -> usize {
        self.depth.values().map(|h| h.len()).sum()
    }

    fn insert(&mut self, chrom: &ChromosomeId, pos: u64, dp: u32) {
        self.depth.entry(chrom.clone()).or_default().insert(pos, dp);
    }
}

/// Get depth from the INFO field.  If there are multiple DP entries the last is used
fn parse_dp(info: &str) -> anyhow::Result<Option<u32>> {
    let mut dp = None;
    for f in info.split(';') {
        if let Some(s) = f.strip_prefix("DP=") {
            dp = Some(
                s.parse::<u32>()
                    .with_context(|| format!("Error reading depth from {}", f))?,
            )
        }
    }
    Ok(dp)
}

/// Reads depth files into DepthIndex structures
///
/// missing - handling of records with no DP entry
/// mask - if set, only positions within the mask are kept
pub struct DepthReader<'a> {
    missing: MissingDepth,
    mask: Option<&'a TargetMask>,
}

impl<'a> DepthReader<'a> {
    pub fn new(missing: MissingDepth) -> Self {
        Self {
            missing,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: &'a TargetMask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn read_depth_file<P: AsRef<Path>>(&self, fname: P) -> anyhow::Result<DepthIndex> {
        let fname = fname.as_ref();
        trace!("Opening depth file {} for reading", fname.display());
        let rdr = CompressIo::new()
            .path(fname)
            .bufreader()
            .with_context(|| format!("Could not open depth file {}", fname.display()))?;
        self.read_depth_stream(rdr, &fname.display().to_string())
    }

    /// Read depth records from rdr.  src is used for messages only
    pub fn read_depth_stream<R: BufRead>(
        &self,
        mut rdr: R,
        src: &str,
    ) -> anyhow::Result<DepthIndex> {
        let mut buf = String::new();
        let mut line = 0;
        let mut n_records = 0;
        let mut n_missing = 0;
        let mut index = DepthIndex::default();

        // Current chromosome (as in the file and normalized), and whether the mask
        // has any regions on it
        let mut ctg: Option<(String, ChromosomeId, bool)> = None;

        while let Some(fields) = get_next_fields(&mut rdr, &mut buf)
            .with_context(|| format!("Error after reading {} lines from {}", line, src))?
        {
            line += 1;
            // Skip blank and header lines
            if fields.is_empty() || fields[0].starts_with('#') {
                continue;
            }
            if fields.len() <= INFO_COL {
                return Err(anyhow!(
                    "{}:{} Short line - expected at least {} fields, found {}",
                    src,
                    line,
                    INFO_COL + 1,
                    fields.len()
                ));
            }
            n_records += 1;

            // Check if the chromosome has changed
            if ctg.as_ref().map(|(s, _, _)| s != fields[0]).unwrap_or(false) {
                ctg = None
            }
            let &mut (_, ref chrom, wanted) = ctg.get_or_insert_with(|| {
                let c = ChromosomeId::new(fields[0]);
                debug!("Reading chromosome {} coverage from {}", c, src);
                let wanted = self.mask.map(|m| m.has_chrom(&c)).unwrap_or(true);
                (fields[0].to_owned(), c, wanted)
            });

            // Every record is checked, whether or not it is kept
            let pos = fields[1]
                .parse::<u64>()
                .with_context(|| format!("{}:{} Error reading position", src, line))?;

            let dp = match parse_dp(fields[INFO_COL])
                .with_context(|| format!("{}:{} Error reading INFO field", src, line))?
            {
                Some(d) => d,
                None => match self.missing {
                    MissingDepth::Zero => {
                        n_missing += 1;
                        0
                    }
                    MissingDepth::Error => {
                        return Err(anyhow!("{}:{} No DP entry in INFO field", src, line))
                    }
                },
            };

            // Zero depth positions and positions outside the mask are left out
            let keep = wanted && self.mask.map(|m| m.contains(chrom, pos)).unwrap_or(true);
            if dp > 0 && keep {
                index.insert(chrom, pos, dp)
            }
        }

        if n_missing > 0 {
            warn!(
                "{}: {} records with no DP entry were treated as zero depth",
                src, n_missing
            )
        }
        debug!(
            "Finished reading {} lines ({} records) from {}; {} positions stored",
            line,
            n_records,
            src,
            index.len()
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionCatalog;

    const VCF: &str = "##fileformat=VCFv4.1\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n\
        1\t101\t.\tA\t.\t.\tPASS\tDP=50\tGT\t0/0\n\
        1\t102\t.\tC\t.\t.\tPASS\tEND=102;DP=0\tGT\t0/0\n\
        1\t103\t.\tG\t.\t.\tPASS\tBLOCKAVG_min30p3a;DP=7;MQ=60\tGT\t0/0\n\
        X\t5\t.\tT\t.\t.\tPASS\tDP=12\tGT\t0/0\n";

    fn read(s: &str, missing: MissingDepth) -> anyhow::Result<DepthIndex> {
        DepthReader::new(missing).read_depth_stream(s.as_bytes(), "test")
    }

    #[test]
    fn read_records() {
        let d = read(VCF, MissingDepth::Error).unwrap();
        let c1 = ChromosomeId::Numeric(1);
        assert_eq!(d.get(&c1, 101), 50);
        assert_eq!(d.get(&c1, 103), 7);
        assert_eq!(d.get(&ChromosomeId::new("X"), 5), 12);
        assert_eq!(d.get(&c1, 104), 0);
        // Zero depth is not stored
        assert_eq!(d.get(&c1, 102), 0);
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn numeric_chromosome_matches_catalog() {
        let cat = RegionCatalog::from_reader(&b"1\t100\t101\tA\n"[..], "test").unwrap();
        let d = read(VCF, MissingDepth::Zero).unwrap();
        let r = &cat.regions()[0];
        assert_eq!(d.get(r.chrom(), 101), 50);
    }

    #[test]
    fn last_dp_wins() {
        assert_eq!(parse_dp("DP=3;X=1;DP=9").unwrap(), Some(9));
        assert_eq!(parse_dp("END=100;MQ=60").unwrap(), None);
        assert_eq!(parse_dp("ADP=10").unwrap(), None);
        assert!(parse_dp("DP=abc").is_err());
    }

    #[test]
    fn missing_dp_policy() {
        let s = "1\t101\t.\tA\t.\t.\tPASS\tDP=30\n1\t102\t.\tA\t.\t.\tPASS\tMQ=60\n";
        // A missing DP does not inherit the depth of the previous record
        let d = read(s, MissingDepth::Zero).unwrap();
        assert_eq!(d.get(&ChromosomeId::Numeric(1), 101), 30);
        assert_eq!(d.get(&ChromosomeId::Numeric(1), 102), 0);
        assert_eq!(d.len(), 1);

        let e = read(s, MissingDepth::Error).unwrap_err();
        assert!(format!("{:#}", e).contains("test:2"));
    }

    #[test]
    fn malformed_records() {
        assert!(read("1\t101\t.\tA\t.\t.\tPASS\n", MissingDepth::Zero).is_err());
        assert!(read("1\tx\t.\tA\t.\t.\tPASS\tDP=1\n", MissingDepth::Zero).is_err());
        assert!(read("1\t10\t.\tA\t.\t.\tPASS\tDP=-1\n", MissingDepth::Zero).is_err());
        assert_eq!(read("\n#only header\n", MissingDepth::Zero).unwrap().len(), 0);
    }

    #[test]
    fn mask_limits_stored_positions() {
        let cat = RegionCatalog::from_reader(&b"1\t100\t101\tA\n"[..], "test").unwrap();
        let mask = cat.target_mask();
        let d = DepthReader::new(MissingDepth::Zero)
            .with_mask(&mask)
            .read_depth_stream(VCF.as_bytes(), "test")
            .unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d.get(&ChromosomeId::Numeric(1), 101), 50);
    }

    // Read s with and without a mask built from a region on chromosome 1
    fn read_both(s: &str, missing: MissingDepth) -> [anyhow::Result<DepthIndex>; 2] {
        let cat = RegionCatalog::from_reader(&b"1\t100\t101\tA\n"[..], "test").unwrap();
        let mask = cat.target_mask();
        [
            DepthReader::new(missing).read_depth_stream(s.as_bytes(), "test"),
            DepthReader::new(missing)
                .with_mask(&mask)
                .read_depth_stream(s.as_bytes(), "test"),
        ]
    }

    #[test]
    fn mask_does_not_hide_malformed_records() {
        let good = "1\t101\t.\tA\t.\t.\tPASS\tDP=50\n";
        for bad in [
            // Outside the regions on a panel chromosome
            "1\t500\t.\tA\t.\t.\tPASS\tDP=abc\n",
            "1\tpos\t.\tA\t.\t.\tPASS\tDP=5\n",
            // Chromosome with no regions
            "2\t10\t.\tA\t.\t.\tPASS\tDP=abc\n",
            "2\tpos\t.\tA\t.\t.\tPASS\tDP=5\n",
        ] {
            let s = format!("{}{}", good, bad);
            for missing in [MissingDepth::Zero, MissingDepth::Error] {
                for res in read_both(&s, missing) {
                    assert!(res.is_err(), "accepted {:?} with {}", bad, missing);
                }
            }
        }
    }

    #[test]
    fn mask_applies_missing_dp_policy() {
        let s = "1\t101\t.\tA\t.\t.\tPASS\tDP=50\n\
                 1\t500\t.\tA\t.\t.\tPASS\tMQ=60\n\
                 2\t10\t.\tA\t.\t.\tPASS\tMQ=60\n";
        for res in read_both(s, MissingDepth::Error) {
            let e = res.unwrap_err();
            assert!(format!("{:#}", e).contains("test:2"));
        }
        let [all, masked] = read_both(s, MissingDepth::Zero);
        let (all, masked) = (all.unwrap(), masked.unwrap());
        assert_eq!(all.len(), 1);
        assert_eq!(masked.len(), 1);
        assert_eq!(masked.get(&ChromosomeId::Numeric(1), 101), 50);
    }

    #[test]
    fn missing_file_is_error() {
        assert!(DepthReader::new(MissingDepth::Zero)
            .read_depth_file("/no/such/dir/S1_x.genome.vcf")
            .is_err())
    }
}

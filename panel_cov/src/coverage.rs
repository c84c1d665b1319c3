use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use crate::{depth::DepthIndex, region::RegionCatalog};

/// Coverage summary for a gene
///
/// length - total size of all regions for the gene
/// covered - number of positions in these regions with depth >= the minimum depth
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GeneCoverage {
    pub length: u64,
    pub covered: u64,
}

impl GeneCoverage {
    /// Percentage of the gene that is covered.  None for a gene with zero length
    pub fn percentage(&self) -> Option<f64> {
        if self.length > 0 {
            Some(100.0 * (self.covered as f64) / (self.length as f64))
        } else {
            None
        }
    }
}

/// Gene -> GeneCoverage, iterated in order of first insertion
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GeneCoverageMap {
    genes: Vec<(Arc<str>, GeneCoverage)>,
    idx: HashMap<Arc<str>, usize>,
}

impl GeneCoverageMap {
    /// Get the entry for a gene, adding an empty entry if not already present
    pub fn entry(&mut self, name: &Arc<str>) -> &mut GeneCoverage {
        let i = match self.idx.entry(Arc::clone(name)) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let l = self.genes.len();
                self.genes.push((Arc::clone(name), GeneCoverage::default()));
                e.insert(l);
                l
            }
        };
        &mut self.genes[i].1
    }

    pub fn get(&self, name: &str) -> Option<&GeneCoverage> {
        self.idx.get(name).map(|i| &self.genes[*i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &GeneCoverage)> {
        self.genes.iter().map(|(n, g)| (n, g))
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Panics if any gene has more covered positions than its length.  This can only
    /// happen through a bug in the position accounting
    pub fn check(&self) {
        for (name, g) in self.genes.iter() {
            assert!(
                g.covered <= g.length,
                "{} has more coverage ({}) than length ({})",
                name,
                g.covered,
                g.length
            );
        }
    }
}

/// Summarize depth over the regions of the catalog, per gene
///
/// Regions are processed in catalog order.  Each region adds its size to the gene length,
/// and each of its positions with depth >= min_depth adds one to the gene covered count.
/// Positions missing from the depth index have depth 0.
/// Overlapping regions from the same gene are counted separately (both length and covered).
pub fn intersect(depth: &DepthIndex, catalog: &RegionCatalog, min_depth: u32) -> GeneCoverageMap {
    let mut genes = GeneCoverageMap::default();
    for reg in catalog.regions() {
        let chrom = reg.chrom();
        let covered = reg
            .positions()
            .filter(|x| depth.get(chrom, *x) >= min_depth)
            .count() as u64;
        let g = genes.entry(reg.name());
        g.length += reg.len();
        g.covered += covered;
    }
    genes.check();
    genes
}

/// Results for a set of samples, kept in the order the samples were added.
/// Samples that could not be processed are kept with the error message
#[derive(Debug, Default)]
pub struct CoverageSummarySet {
    samples: Vec<(String, GeneCoverageMap)>,
    failed: Vec<(String, String)>,
}

impl CoverageSummarySet {
    pub fn add_sample(&mut self, name: &str, cov: GeneCoverageMap) {
        self.samples.push((name.to_owned(), cov))
    }

    pub fn add_failure(&mut self, name: &str, msg: String) {
        self.failed.push((name.to_owned(), msg))
    }

    pub fn get(&self, name: &str) -> Option<&GeneCoverageMap> {
        self.samples.iter().find(|(s, _)| s == name).map(|(_, c)| c)
    }

    pub fn samples(&self) -> &[(String, GeneCoverageMap)] {
        &self.samples
    }

    pub fn failed(&self) -> &[(String, String)] {
        &self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chrom::ChromosomeId,
        depth::{DepthReader, MissingDepth},
    };

    fn catalog(s: &str) -> RegionCatalog {
        RegionCatalog::from_reader(s.as_bytes(), "test").unwrap()
    }

    // Make a depth file with the given depth over a range of positions on chromosome 1
    fn vcf(ranges: &[(u64, u64, u32)]) -> String {
        let mut s = String::from("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n");
        for (a, b, d) in ranges {
            for x in *a..=*b {
                s.push_str(&format!("1\t{}\t.\tA\t.\t.\tPASS\tDP={}\n", x, d))
            }
        }
        s
    }

    fn depth(s: &str) -> DepthIndex {
        DepthReader::new(MissingDepth::Error)
            .read_depth_stream(s.as_bytes(), "test")
            .unwrap()
    }

    #[test]
    fn end_to_end_gene() {
        let cat = catalog("1\t100\t110\tGENEA_a\n1\t200\t205\tGENEA_b\n");
        let d = depth(&vcf(&[(101, 108, 50), (201, 205, 3)]));
        let g = intersect(&d, &cat, 20);
        assert_eq!(g.len(), 1);
        assert_eq!(
            g.get("GENEA"),
            Some(&GeneCoverage {
                length: 15,
                covered: 8
            })
        );
    }

    #[test]
    fn region_boundaries() {
        // Region 100-103 (0 based, half open) should test positions 101, 102 and 103 only
        let cat = catalog("1\t100\t103\tA\n");
        let d = depth(&vcf(&[(100, 100, 50), (104, 104, 50)]));
        assert_eq!(intersect(&d, &cat, 1).get("A").unwrap().covered, 0);
        let d = depth(&vcf(&[(101, 103, 50)]));
        assert_eq!(intersect(&d, &cat, 1).get("A").unwrap().covered, 3);
        let d = depth(&vcf(&[(103, 103, 50)]));
        assert_eq!(intersect(&d, &cat, 1).get("A").unwrap().covered, 1);
    }

    #[test]
    fn threshold_is_inclusive() {
        let cat = catalog("1\t0\t3\tA\n");
        let d = depth(&vcf(&[(1, 1, 19), (2, 2, 20), (3, 3, 21)]));
        assert_eq!(intersect(&d, &cat, 20).get("A").unwrap().covered, 2);
    }

    #[test]
    fn zero_depth_same_as_missing() {
        let cat = catalog("1\t100\t102\tA\n");
        let with_zero = depth("1\t101\t.\tA\t.\t.\tPASS\tDP=0\n1\t102\t.\tA\t.\t.\tPASS\tDP=5\n");
        let without = depth("1\t102\t.\tA\t.\t.\tPASS\tDP=5\n");
        assert_eq!(intersect(&with_zero, &cat, 1), intersect(&without, &cat, 1));
    }

    #[test]
    fn genes_merged_by_name_prefix() {
        let cat = catalog(
            "9\t100\t110\tJAK2_hotspotV617F_1\n9\t200\t220\tJAK2_exon1\n\
             9\t300\t305\tJAK2hotspotV617F_1\n",
        );
        let g = intersect(&DepthIndex::default(), &cat, 1);
        assert_eq!(g.get("JAK2").unwrap().length, 30);
        assert_eq!(g.get("JAK2hotspotV617F").unwrap().length, 5);
        let names: Vec<_> = g.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["JAK2", "JAK2hotspotV617F"]);
    }

    #[test]
    fn lengths_independent_of_order() {
        let a = catalog("1\t0\t10\tA\n2\t5\t9\tB\n1\t20\t30\tA_2\nX\t0\t1\tB_x\n");
        let b = catalog("X\t0\t1\tB_x\n1\t20\t30\tA_2\n2\t5\t9\tB\n1\t0\t10\tA\n");
        let d = DepthIndex::default();
        let (ga, gb) = (intersect(&d, &a, 1), intersect(&d, &b, 1));
        for n in ["A", "B"] {
            assert_eq!(ga.get(n), gb.get(n));
        }
        let total: u64 = ga.iter().map(|(_, g)| g.length).sum();
        let expected: u64 = a.regions().iter().map(|r| r.len()).sum();
        assert_eq!(total, expected);
    }

    #[test]
    fn overlapping_regions_count_twice() {
        let cat = catalog("1\t100\t110\tA_1\n1\t105\t115\tA_2\n");
        let d = depth(&vcf(&[(101, 115, 30)]));
        let g = intersect(&d, &cat, 10);
        assert_eq!(g.get("A"), Some(&GeneCoverage { length: 20, covered: 20 }));
    }

    #[test]
    fn intersect_is_repeatable() {
        let cat = catalog("1\t100\t110\tA\nX\t0\t5\tB\n");
        let d = depth(&vcf(&[(95, 105, 30)]));
        let g1 = intersect(&d, &cat, 10);
        let g2 = intersect(&d, &cat, 10);
        assert_eq!(g1, g2);
        for (_, g) in g1.iter() {
            assert!(g.covered <= g.length)
        }
        assert_eq!(g1.get("B"), Some(&GeneCoverage { length: 5, covered: 0 }));
    }

    #[test]
    fn named_chromosomes() {
        let cat = catalog("X\t0\t2\tA\n");
        let d = depth("X\t1\t.\tA\t.\t.\tPASS\tDP=5\nX\t2\t.\tA\t.\t.\tPASS\tDP=5\n");
        assert_eq!(intersect(&d, &cat, 5).get("A").unwrap().covered, 2);
        assert_eq!(d.get(&ChromosomeId::new("X"), 2), 5);
    }

    #[test]
    fn percentages() {
        let g = GeneCoverage {
            length: 15,
            covered: 8,
        };
        assert!((g.percentage().unwrap() - 53.333333).abs() < 1e-4);
        assert_eq!(GeneCoverage::default().percentage(), None);
    }

    #[test]
    #[should_panic]
    fn check_catches_overcounting() {
        let mut g = GeneCoverageMap::default();
        let e = g.entry(&Arc::from("A"));
        e.length = 2;
        e.covered = 3;
        g.check();
    }

    #[test]
    fn summary_set_keeps_order() {
        let mut s = CoverageSummarySet::default();
        s.add_sample("S2", GeneCoverageMap::default());
        s.add_sample("S1", GeneCoverageMap::default());
        s.add_failure("S3", "bad".to_owned());
        let names: Vec<_> = s.samples().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["S2", "S1"]);
        assert!(s.get("S1").is_some());
        assert!(s.get("S3").is_none());
        assert_eq!(s.failed().len(), 1);
    }
}

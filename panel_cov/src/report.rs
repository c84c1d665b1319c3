use std::{fs, io::Write, path::PathBuf, sync::Arc};

use anyhow::Context;
use compress_io::compress::CompressIo;

use crate::{
    config::{Config, ReportFormat},
    coverage::{CoverageSummarySet, GeneCoverage, GeneCoverageMap},
};

fn fmt_pct(g: Option<&GeneCoverage>) -> String {
    g.and_then(|g| g.percentage())
        .map(|p| format!("{:.2}", p))
        .unwrap_or_else(|| String::from("NA"))
}

/// One line per sample and gene
pub fn write_long<W: Write>(wrt: &mut W, summary: &CoverageSummarySet) -> anyhow::Result<()> {
    writeln!(wrt, "sample\tgene\tlength\tcovered\tpercentage")?;
    for (sample, genes) in summary.samples() {
        for (name, g) in genes.iter() {
            writeln!(
                wrt,
                "{}\t{}\t{}\t{}\t{}",
                sample,
                name,
                g.length,
                g.covered,
                fmt_pct(Some(g))
            )?
        }
    }
    Ok(())
}

/// One line per gene with the percentage coverage for each sample in the following columns
pub fn write_wide<W: Write>(
    wrt: &mut W,
    genes: &[Arc<str>],
    summary: &CoverageSummarySet,
) -> anyhow::Result<()> {
    write!(wrt, "gene\tlength")?;
    for (sample, _) in summary.samples() {
        write!(wrt, "\t{}", sample)?
    }
    writeln!(wrt)?;

    for name in genes {
        // Gene length does not depend on the sample
        let length = summary
            .samples()
            .iter()
            .find_map(|(_, g)| g.get(name))
            .map(|g| g.length.to_string())
            .unwrap_or_else(|| String::from("NA"));
        write!(wrt, "{}\t{}", name, length)?;
        for (_, g) in summary.samples() {
            write!(wrt, "\t{}", fmt_pct(g.get(name)))?
        }
        writeln!(wrt)?
    }
    Ok(())
}

/// Coverage report for a single sample
pub fn write_sample_report<W: Write>(
    wrt: &mut W,
    sample: &str,
    min_depth: u32,
    genes: &GeneCoverageMap,
) -> anyhow::Result<()> {
    writeln!(wrt, "## Coverage report for sample {}", sample)?;
    writeln!(wrt, "## Minimum depth required: {}x", min_depth)?;
    writeln!(wrt, "#GENE\tLENGTH\tCOVERED\tPERCENTAGE")?;
    for (name, g) in genes.iter() {
        writeln!(
            wrt,
            "{}\t{}\t{}\t{}",
            name,
            g.length,
            g.covered,
            fmt_pct(Some(g))
        )?
    }
    Ok(())
}

/// Write combined report (and per sample reports if requested)
pub fn write_reports(cfg: &Config, summary: &CoverageSummarySet) -> anyhow::Result<()> {
    for (_, genes) in summary.samples() {
        genes.check()
    }

    if let Some(dir) = cfg.per_sample_dir() {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Error creating output directory {}", dir.display()))?;
        }
        for (sample, genes) in summary.samples() {
            let p: PathBuf = dir.join(format!("{}_Coverage.txt", sample));
            debug!("Writing coverage report for {} to {}", sample, p.display());
            let mut wrt = CompressIo::new()
                .path(&p)
                .bufwriter()
                .with_context(|| format!("Failed to open output file {}", p.display()))?;
            write_sample_report(&mut wrt, sample, cfg.min_depth(), genes)
                .with_context(|| format!("Error writing to {}", p.display()))?;
            wrt.flush()?
        }
    }

    if let Some(dir) = cfg.output_file().and_then(|p| p.parent()) {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Error creating output directory {}", dir.display()))?;
        }
    }
    let mut wrt = CompressIo::new()
        .opt_path(cfg.output_file())
        .bufwriter()
        .with_context(|| "Failed to open output file")?;

    let res = match cfg.format() {
        ReportFormat::Long => write_long(&mut wrt, summary),
        ReportFormat::Wide => write_wide(&mut wrt, &cfg.regions().gene_names(), summary),
    };
    res.with_context(|| "Error writing output")?;
    wrt.flush()?;
    Ok(())
}

mod chrom;
mod cli;
mod config;
mod coverage;
mod depth;
mod process;
mod region;
mod report;
mod sample;

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    let cfg = cli::handle_cli().with_context(|| "Error processing command line arguments")?;
    let summary = process::process_samples(&cfg)?;
    report::write_reports(&cfg, &summary)?;

    let failed = summary.failed();
    if failed.is_empty() {
        Ok(())
    } else {
        let names: Vec<_> = failed.iter().map(|(s, _)| s.as_str()).collect();
        Err(anyhow!(
            "{} of {} samples could not be processed: {}",
            failed.len(),
            cfg.sample_list().len(),
            names.join(", ")
        ))
    }
}

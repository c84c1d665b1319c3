use std::thread;

use anyhow::Context;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::{
    config::Config,
    coverage::{intersect, CoverageSummarySet, GeneCoverageMap},
    depth::DepthReader,
    region::TargetMask,
    sample::Sample,
};

type SampleResult = (usize, anyhow::Result<GeneCoverageMap>);

/// Read the depth file for a sample and summarize coverage per gene
pub fn process_sample(
    cfg: &Config,
    mask: &TargetMask,
    sample: &Sample,
) -> anyhow::Result<GeneCoverageMap> {
    info!("Reading coverage file for {}", sample.name());
    let depth = DepthReader::new(cfg.missing_dp())
        .with_mask(mask)
        .read_depth_file(sample.path())?;

    info!("Analysing coverage for sample {}", sample.name());
    let genes = intersect(&depth, cfg.regions(), cfg.min_depth());
    debug!("Coverage found for {} genes in {}", genes.len(), sample.name());
    Ok(genes)
}

fn process_task(
    cfg: &Config,
    mask: &TargetMask,
    ix: usize,
    recv: Receiver<usize>,
    snd: Sender<SampleResult>,
) {
    debug!("Process task {} starting up", ix);
    while let Ok(i) = recv.recv() {
        trace!("Task {} received sample {}", ix, i);
        let res = process_sample(cfg, mask, &cfg.sample_list()[i]);
        if snd.send((i, res)).is_err() {
            break;
        }
    }
    debug!("Process task {} closing down", ix);
}

/// Process all samples using a pool of cfg.threads() tasks
///
/// Each task takes sample indices from a shared job channel and returns the
/// results on a result channel.  The region catalog is shared read only between tasks.
/// A sample that fails is recorded as such in the returned set, and does not stop the
/// other samples.  Samples in the result set are in the same order as the input list.
pub fn process_samples(cfg: &Config) -> anyhow::Result<CoverageSummarySet> {
    debug!("Starting processing");
    let samples = cfg.sample_list();
    let ns = samples.len();
    let mask = cfg.regions().target_mask();

    let mut results: Vec<Option<anyhow::Result<GeneCoverageMap>>> =
        (0..ns).map(|_| None).collect();

    thread::scope(|sc| -> anyhow::Result<()> {
        let nt = cfg.threads().min(ns).max(1);
        let mask = &mask;

        // All jobs are queued up front
        let (send_job, recv_job) = bounded(ns.max(1));
        for i in 0..ns {
            send_job
                .send(i)
                .with_context(|| "Error queueing sample jobs")?
        }
        drop(send_job);

        let (send_res, recv_res) = bounded(nt * 2);
        for ix in 0..nt {
            let r = recv_job.clone();
            let s = send_res.clone();
            sc.spawn(move || process_task(cfg, mask, ix + 1, r, s));
        }
        drop(send_res);

        for (i, res) in recv_res.iter() {
            results[i] = Some(res)
        }
        Ok(())
    })?;

    let mut summary = CoverageSummarySet::default();
    for (s, res) in samples.iter().zip(results) {
        match res {
            Some(Ok(genes)) => summary.add_sample(s.name(), genes),
            Some(Err(e)) => {
                error!("Could not process sample {}: {:#}", s.name(), e);
                summary.add_failure(s.name(), format!("{:#}", e))
            }
            None => {
                error!("No results for sample {}", s.name());
                summary.add_failure(s.name(), "no results".to_owned())
            }
        }
    }
    debug!(
        "Finished processing: {} samples completed, {} failed",
        summary.samples().len(),
        summary.failed().len()
    );
    Ok(summary)
}

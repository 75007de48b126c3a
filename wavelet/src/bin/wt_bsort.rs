//! Wavelet tree construction by per-level bucket sorting: the text is
//! stably redistributed between levels, so the level-keyed bit vectors come
//! out balanced without a separate merge step.

use anyhow::Result;

use wavelet::cli::CommonArgs;
use wavelet::context::Context;
use wavelet::master_info;
use wavelet::stats::{PhaseTimer, RunStats};
use wavelet::strategy::bucket;
use wavelet::wt::HISTOGRAM_EXTENSION;

fn main() -> Result<()> {
    env_logger::init();
    let args = CommonArgs::parse_or_exit();

    let universe = mpi::initialize().expect("MPI initialization failed");
    let ctx = Context::new(&universe);

    let mut prep = wavelet::driver::prepare::<u8>(&ctx, &args)?;
    let mut times = prep.times;
    let mut timer = PhaseTimer::new(&ctx);

    master_info!(ctx, "computing WT ...");
    let wt = bucket::levelwise_wt(&ctx, &prep.input, &prep.hist, &mut prep.etext);
    times.construct = timer.lap();
    times.merge = 0.0;

    if let Some(output) = &args.output {
        ctx.synchronize();
        master_info!(ctx, "writing WT to disk ...");
        if ctx.is_master() {
            prep.hist
                .save(format!("{}.{}", output, HISTOGRAM_EXTENSION))?;
        }
        wt.save(&ctx, output)?;
    }

    master_info!(ctx, "waiting for exit signals ...");
    ctx.synchronize();

    let stats = RunStats::gather("wt-bsort", &ctx, &prep.input, wt.sigma(), times);
    if ctx.is_master() {
        println!("{}", stats.readable());
        println!("{}", stats.sqlplot());
    }
    Ok(())
}

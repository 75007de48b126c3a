//! Wavelet matrix construction by level concatenation: two buckets per
//! level, the 0-bucket placed before the 1-bucket, which yields the
//! matrix-specific ordering directly in the balanced levelwise layout.

use anyhow::Result;

use wavelet::cli::CommonArgs;
use wavelet::context::Context;
use wavelet::master_info;
use wavelet::stats::{PhaseTimer, RunStats};
use wavelet::strategy::bucket;
use wavelet::wt::{HISTOGRAM_EXTENSION, Z_EXTENSION};

fn main() -> Result<()> {
    env_logger::init();
    let args = CommonArgs::parse_or_exit();

    let universe = mpi::initialize().expect("MPI initialization failed");
    let ctx = Context::new(&universe);

    let mut prep = wavelet::driver::prepare::<u8>(&ctx, &args)?;
    let mut times = prep.times;
    let mut timer = PhaseTimer::new(&ctx);

    master_info!(ctx, "computing WM ...");
    let wm = bucket::concat_wm(&ctx, &prep.input, &prep.hist, &mut prep.etext);
    times.construct = timer.lap();
    times.merge = 0.0;

    if let Some(output) = &args.output {
        ctx.synchronize();
        master_info!(ctx, "writing WM to disk ...");
        if ctx.is_master() {
            prep.hist
                .save(format!("{}.{}", output, HISTOGRAM_EXTENSION))?;
            wm.save_z(format!("{}.{}", output, Z_EXTENSION))?;
        }
        wm.save(&ctx, output)?;
    }

    master_info!(ctx, "waiting for exit signals ...");
    ctx.synchronize();

    let stats = RunStats::gather("wm-concat", &ctx, &prep.input, wm.sigma(), times);
    if ctx.is_master() {
        println!("{}", stats.readable());
        println!("{}", stats.sqlplot());
    }
    Ok(())
}

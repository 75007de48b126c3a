//! Wavelet matrix construction by domain decomposition: the node-keyed
//! local build of `wt-dd`, merged in bit-reversed node order.

use anyhow::Result;

use wavelet::cli::CommonArgs;
use wavelet::context::Context;
use wavelet::master_info;
use wavelet::stats::{PhaseTimer, RunStats};
use wavelet::strategy::domain_decomp;
use wavelet::wt::{HISTOGRAM_EXTENSION, Z_EXTENSION};

fn main() -> Result<()> {
    env_logger::init();
    let args = CommonArgs::parse_or_exit();

    let universe = mpi::initialize().expect("MPI initialization failed");
    let ctx = Context::new(&universe);

    let mut prep = wavelet::driver::prepare::<u8>(&ctx, &args)?;
    let mut times = prep.times;
    let mut timer = PhaseTimer::new(&ctx);

    master_info!(ctx, "computing WT nodes ...");
    let wt_nodes = domain_decomp::build_nodebased(&prep.hist, &mut prep.etext);
    drop(std::mem::take(&mut prep.etext));

    master_info!(
        ctx,
        "done computing {} nodes, synchronizing ...",
        wt_nodes.nodes().len()
    );
    ctx.synchronize();
    times.construct = timer.lap();

    let wm = wt_nodes.merge_to_matrix(&ctx, &prep.input, &prep.hist, true);
    times.merge = timer.lap();

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

    let stats = RunStats::gather("wm-dd", &ctx, &prep.input, wm.sigma(), times);
    if ctx.is_master() {
        println!("{}", stats.readable());
        println!("{}", stats.sqlplot());
    }
    Ok(())
}

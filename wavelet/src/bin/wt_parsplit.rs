//! Wavelet tree construction by parallel splitting: worker groups recurse
//! on disjoint communicators, redistributing the text between the subtree
//! sides at every node; the node-keyed result is merged afterwards.

use anyhow::Result;

use wavelet::cli::CommonArgs;
use wavelet::context::Context;
use wavelet::master_info;
use wavelet::stats::{PhaseTimer, RunStats};
use wavelet::strategy::parallel_split;
use wavelet::wt::HISTOGRAM_EXTENSION;

fn main() -> Result<()> {
    env_logger::init();
    let args = CommonArgs::parse_or_exit();

    let universe = mpi::initialize().expect("MPI initialization failed");
    let mut ctx = Context::new(&universe);

    let prep = wavelet::driver::prepare::<u8>(&ctx, &args)?;
    let mut times = prep.times;

    master_info!(ctx, "computing WT ...");
    let construct_start = ctx.time();
    let wt_nodes = parallel_split::build_nodebased(&mut ctx, &prep.hist, prep.etext);

    master_info!(
        ctx,
        "done computing {} nodes, synchronizing ...",
        wt_nodes.nodes().len()
    );
    ctx.synchronize();
    times.construct = ctx.time() - construct_start;

    let mut timer = PhaseTimer::new(&ctx);
    let wt = wt_nodes.merge(&ctx, &prep.input, &prep.hist, true);
    times.merge = timer.lap();

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

    let stats = RunStats::gather("wt-parsplit", &ctx, &prep.input, wt.sigma(), times);
    if ctx.is_master() {
        println!("{}", stats.readable());
        println!("{}", stats.sqlplot());
    }
    Ok(())
}

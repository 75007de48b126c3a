//! Wavelet tree construction by domain decomposition: every worker builds
//! the tree of its local slice sequentially, then the node-keyed bits are
//! merged into the balanced levelwise layout.

use anyhow::Result;

use wavelet::cli::CommonArgs;
use wavelet::context::Context;
use wavelet::master_info;
use wavelet::stats::{PhaseTimer, RunStats};
use wavelet::strategy::domain_decomp;
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
    let wt_nodes = domain_decomp::build_nodebased(&prep.hist, &mut prep.etext);
    drop(std::mem::take(&mut prep.etext));

    master_info!(
        ctx,
        "done computing {} nodes, synchronizing ...",
        wt_nodes.nodes().len()
    );
    ctx.synchronize();
    times.construct = timer.lap();

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

    let stats = RunStats::gather("wt-dd", &ctx, &prep.input, wt.sigma(), times);
    if ctx.is_master() {
        println!("{}", stats.readable());
        println!("{}", stats.sqlplot());
    }
    Ok(())
}

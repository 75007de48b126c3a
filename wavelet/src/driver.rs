//! Shared pipeline of the construction tools: partition the input, build
//! the histogram, transform the text into the effective alphabet.

use anyhow::{ensure, Result};

use crate::alphabet::EffectiveAlphabet;
use crate::cli::CommonArgs;
use crate::context::Context;
use crate::histogram::Histogram;
use crate::input::FilePartitionReader;
use crate::master_info;
use crate::stats::{PhaseTimer, PhaseTimes};
use crate::sym::Symbol;

pub struct Prepared<S: Symbol> {
    pub input: FilePartitionReader<S>,
    pub hist: Histogram<S>,
    pub etext: Vec<S>,
    pub rdbufsize: usize,
    pub times: PhaseTimes,
}

pub fn prepare<S: Symbol>(ctx: &Context, args: &CommonArgs) -> Result<Prepared<S>> {
    let mut timer = PhaseTimer::new(ctx);
    let mut times = PhaseTimes::default();

    let prefix = args.prefix.unwrap_or(u64::MAX);
    ensure!(prefix > 0, "prefix must be positive");

    let mut input = FilePartitionReader::<S>::new(ctx, &args.file, prefix)?;
    let rdbufsize = match args.rbuf {
        Some(r) if r > 0 => r,
        _ => (input.local_num() as usize).max(1),
    };

    if let Some(local) = &args.local {
        master_info!(ctx, "extracting partition to {} ...", local.display());
        input.extract_local(local, rdbufsize)?;
        master_info!(ctx, "synchronizing ...");
        ctx.synchronize();
    }
    times.input = timer.lap();

    master_info!(ctx, "computing histogram ...");
    let hist = Histogram::compute(ctx, &input, rdbufsize)?;
    times.hist = timer.lap();

    master_info!(ctx, "computing effective transformation ...");
    let ea = EffectiveAlphabet::new(&hist);
    let etext = ea.transform_to_vec(&input, rdbufsize)?;
    times.eff = timer.lap();

    Ok(Prepared {
        input,
        hist,
        etext,
        rdbufsize,
        times,
    })
}

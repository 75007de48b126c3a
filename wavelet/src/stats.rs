//! Per-run statistics: phase wall times and gathered traffic counters.

use crate::context::{Context, Traffic};
use crate::input::FilePartitionReader;
use crate::sym::Symbol;

#[derive(Clone, Copy, Default, Debug)]
pub struct PhaseTimes {
    pub input: f64,
    pub hist: f64,
    pub eff: f64,
    pub construct: f64,
    pub merge: f64,
}

impl PhaseTimes {
    pub fn total(&self) -> f64 {
        self.input + self.hist + self.eff + self.construct + self.merge
    }
}

/// Stopwatch over the substrate clock.
pub struct PhaseTimer<'a> {
    ctx: &'a Context,
    last: f64,
}

impl<'a> PhaseTimer<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            last: ctx.time(),
        }
    }

    /// Seconds since the previous lap.
    pub fn lap(&mut self) -> f64 {
        let now = self.ctx.time();
        let dt = now - self.last;
        self.last = now;
        dt
    }
}

pub struct RunStats {
    algo: String,
    nodes: usize,
    workers_per_node: usize,
    input: String,
    size: u64,
    alphabet: usize,
    times: PhaseTimes,
    traffic: Traffic,
}

impl RunStats {
    /// Reduces the distributed counters; collective over all workers.
    pub fn gather<S: Symbol>(
        algo: &str,
        ctx: &Context,
        input: &FilePartitionReader<S>,
        alphabet: usize,
        times: PhaseTimes,
    ) -> Self {
        Self {
            algo: algo.to_string(),
            nodes: ctx.num_nodes(),
            workers_per_node: ctx.num_workers_per_node(),
            input: input.filename().display().to_string(),
            size: input.total_size(),
            alphabet,
            times,
            traffic: ctx.gather_traffic(),
        }
    }

    pub fn readable(&self) -> String {
        format!(
            "{} finished: input={} size={} sigma={} time={:.3}s \
             (input {:.3}s, hist {:.3}s, eff {:.3}s, construct {:.3}s, merge {:.3}s), \
             traffic {}B (est. {}B, local {}B)",
            self.algo,
            self.input,
            self.size,
            self.alphabet,
            self.times.total(),
            self.times.input,
            self.times.hist,
            self.times.eff,
            self.times.construct,
            self.times.merge,
            self.traffic.tx,
            self.traffic.tx_est,
            self.traffic.tx_shm,
        )
    }

    /// Single machine-greppable line.
    pub fn sqlplot(&self) -> String {
        let t = &self.traffic;
        format!(
            "RESULT algo={} nodes={} workers_per_node={} input={} size={} alphabet={} \
             time={:.6} time_input={:.6} time_hist={:.6} time_eff={:.6} \
             time_construct={:.6} time_merge={:.6} \
             traffic_tx={} traffic_rx={} traffic_tx_est={} traffic_rx_est={} \
             traffic_tx_shm={} traffic_rx_shm={}",
            self.algo,
            self.nodes,
            self.workers_per_node,
            self.input,
            self.size,
            self.alphabet,
            self.times.total(),
            self.times.input,
            self.times.hist,
            self.times.eff,
            self.times.construct,
            self.times.merge,
            t.tx,
            t.rx,
            t.tx_est,
            t.rx_est,
            t.tx_shm,
            t.rx_shm,
        )
    }
}

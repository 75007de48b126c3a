//! Balanced distributed split of a text by a predicate.
//!
//! All workers of the active communicator collectively hold a sequence in
//! rank order. After the split, workers `[0, s)` hold the items for which
//! the predicate was false and workers `[s, P)` the rest, both sides in
//! their original order and balanced by item count. The per-side counts
//! `local_num0`/`local_num1` are expected to be precomputed.

use std::mem;

use mpi::collective::SystemOperation;
use mpi::Tag;

use crate::context::{Context, DataMsg};
use crate::sym::Symbol;

/// Splits `data` across the active communicator, replacing each worker's
/// buffer with its contiguous piece of the appropriate side. Returns the
/// worker rank separating the two sides.
pub fn dsplit_str<S, P>(
    ctx: &Context,
    data: &mut Vec<S>,
    predicate: P,
    local_num0: u64,
    local_num1: u64,
    tag: Tag,
) -> usize
where
    S: Symbol,
    P: Fn(&S) -> bool,
{
    let targets = ctx.num_workers();
    assert!(targets >= 2);

    let local_num_total = local_num0 + local_num1;
    assert_eq!(local_num_total as usize, data.len());

    // global totals per side
    let mut num = [local_num0, local_num1];
    ctx.all_reduce(&mut num, SystemOperation::sum());
    let num_total = num[0] + num[1];

    // distribute workers over the sides proportionally to their volume,
    // with at least one worker for every non-empty side
    let p0 = num[0] as f64 / num_total as f64;
    let ceil0 = (p0 * targets as f64).ceil() as usize;
    let targets0 = if num[1] > 0 { ceil0.min(targets - 1) } else { ceil0 };
    let targets1 = targets - targets0;

    if num[0] > 0 {
        assert!(targets0 > 0);
    }
    if num[1] > 0 {
        assert!(targets1 > 0);
    }

    let num_per_target = [
        if targets0 == 0 { 0 } else { (num[0] + targets0 as u64 - 1) / targets0 as u64 },
        if targets1 == 0 { 0 } else { (num[1] + targets1 as u64 - 1) / targets1 as u64 },
    ];

    // global destination offset of this worker's items, per side
    let mut offs = [local_num0, local_num1];
    ctx.ex_scan(&mut offs);

    // send phase: walk the data in order and emit a message whenever a
    // target boundary is crossed
    let mut outbox: Vec<DataMsg<S>> = Vec::new();
    {
        let mut glob = offs;
        let mut target = [
            if num_per_target[0] == 0 {
                usize::MAX
            } else {
                (glob[0] / num_per_target[0]) as usize
            },
            if num_per_target[1] == 0 {
                usize::MAX
            } else {
                targets0 + (glob[1] / num_per_target[1]) as usize
            },
        ];
        let mut p = glob;
        let mut window: [Vec<S>; 2] = [Vec::new(), Vec::new()];

        for &item in data.iter() {
            let b = predicate(&item) as usize;
            window[b].push(item);
            p[b] += 1;

            if p[b] % num_per_target[b] == 0 {
                // ship the interval [glob[b], p[b]) to its target
                let count = window[b].len() as u64;
                debug_assert_eq!(p[b] - glob[b], count);
                outbox.push(DataMsg {
                    target: target[b],
                    header: [glob[b], count],
                    payload: mem::take(&mut window[b]),
                });
                target[b] += 1;
                glob[b] += count;
            }
        }

        // remainders
        for b in 0..2 {
            if !window[b].is_empty() {
                let count = window[b].len() as u64;
                outbox.push(DataMsg {
                    target: target[b],
                    header: [glob[b], count],
                    payload: mem::take(&mut window[b]),
                });
            }
        }
    }

    // receive phase: this worker owns the side-b range
    // [idx·npt, (idx+1)·npt), clamped to the side's total; trailing workers
    // of a sparse side may legitimately receive nothing
    let rank = ctx.rank();
    let b = (rank >= targets0) as usize;
    let idx = if b == 1 { rank - targets0 } else { rank } as u64;
    let global_offset = idx * num_per_target[b];
    let expect = num[b]
        .saturating_sub(global_offset)
        .min(num_per_target[b]);

    let mut new_data = vec![S::default(); expect as usize];
    ctx.distribute(&outbox, tag, expect, |moffs, payload| {
        debug_assert!(moffs >= global_offset);
        let local_offs = (moffs - global_offset) as usize;
        new_data[local_offs..local_offs + payload.len()].copy_from_slice(payload);
    });
    *data = new_data;

    // outbound buffers stay valid until every worker is drained
    ctx.synchronize();

    targets0
}

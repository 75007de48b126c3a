//! Stable distributed sample sort.
//!
//! Oversampled SSS-style sort: every worker draws `a` uniform samples and
//! ships them to the master, which either broadcasts exact key histograms
//! (small key sets, at most P distinct keys among the samples) or picks
//! `P - 1` splitters from the sorted sample. Records are then exchanged
//! all-to-all and finalized with a stable local sort, so equal keys keep
//! their original `(worker, local index)` order.

use itertools::Itertools;
use mpi::datatype::Equivalence;
use mpi::Tag;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::slice::ParallelSliceMut;

use crate::context::Context;

pub const SORT_MASTER: usize = 0;

const TAG_SAMPLES: Tag = 800;
const TAG_META: Tag = 801;
const TAG_KEYS: Tag = 802;
const TAG_COUNTS: Tag = 803;
const TAG_EXCHANGE: Tag = 804;

/// Bucket of `key` relative to sorted `splitters`: the number of splitters
/// less than or equal to the key.
fn lb_rank(splitters: &[u64], key: u64) -> usize {
    splitters.partition_point(|&s| s <= key)
}

/// Proportional worker assignment for a small key set: every key gets
/// `round(count·P / Σcounts)` workers, then the totals are rounded off to
/// exactly `p` by growing the smallest assignment or shrinking the largest.
fn assign_workers(key_count: &[u64], a: usize, p: usize) -> Vec<usize> {
    let mut workers: Vec<usize> = key_count
        .iter()
        .map(|&c| (c as f64 / a as f64).round() as usize)
        .collect();

    let mut assigned: usize = workers.iter().sum();
    while assigned < p {
        let i = workers.iter().position_min().unwrap();
        workers[i] += 1;
        assigned += 1;
    }
    while assigned > p {
        let i = workers.iter().position_max().unwrap();
        assert!(workers[i] > 1);
        workers[i] -= 1;
        assigned -= 1;
    }

    // every sampled key needs at least one worker
    while let Some(zi) = workers.iter().position(|&w| w == 0) {
        let mi = workers.iter().position_max().unwrap();
        assert!(workers[mi] > 1);
        workers[mi] -= 1;
        workers[zi] += 1;
    }
    workers
}

/// Sorts the distributed sequence `v` stably by `key` with oversampling
/// factor `a`. A fixed `seed` makes the sampling, and therefore the whole
/// construction, reproducible.
pub fn stable_sort_by_key<T, K>(
    ctx: &Context,
    v: &mut Vec<T>,
    key: K,
    a: usize,
    seed: Option<u64>,
) where
    T: Equivalence + Copy + Send,
    K: Fn(&T) -> u64 + Sync,
{
    let p = ctx.num_workers();
    let rank = ctx.rank();

    if p == 1 {
        v.par_sort_by(|x, y| key(x).cmp(&key(y)));
        return;
    }

    assert!(!v.is_empty());

    // --- 1: sampling ---
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s.wrapping_add(rank as u64)),
        None => StdRng::from_entropy(),
    };
    let mut samples: Vec<T> = (0..a).map(|_| v[rng.gen_range(0..v.len())]).collect();

    if rank != SORT_MASTER {
        ctx.send(&samples, SORT_MASTER, TAG_SAMPLES);
    }

    // --- 2: splitters ---
    let mut splitters: Vec<u64>;
    let mut key_count: Vec<u64> = Vec::new();
    let num_distinct_keys;

    if rank == SORT_MASTER {
        for i in 0..p {
            if i != SORT_MASTER {
                samples.extend(ctx.recv_vec::<T>(i, TAG_SAMPLES));
            }
        }
        samples.par_sort_by(|x, y| key(x).cmp(&key(y)));

        num_distinct_keys = samples.iter().map(|x| key(x)).dedup().count();
        for i in 0..p {
            if i != SORT_MASTER {
                ctx.send(&[num_distinct_keys as u64], i, TAG_META);
            }
        }

        if num_distinct_keys <= p {
            // small key set: ship the exact keys and their multiplicities
            splitters = Vec::with_capacity(num_distinct_keys);
            for (count, k) in samples.iter().map(|x| key(x)).dedup_with_count() {
                splitters.push(k);
                key_count.push(count as u64);
            }
            for i in 0..p {
                if i != SORT_MASTER {
                    ctx.send(&splitters, i, TAG_KEYS);
                    ctx.send(&key_count, i, TAG_COUNTS);
                }
            }
        } else {
            // classic SSS: p-1 splitters from the sorted sample
            splitters = (0..p - 1).map(|k| key(&samples[k * a + 1])).collect();
            for i in 0..p {
                if i != SORT_MASTER {
                    ctx.send(&splitters, i, TAG_KEYS);
                }
            }
        }
    } else {
        let mut meta = [0u64; 1];
        ctx.recv_into(&mut meta, SORT_MASTER, TAG_META);
        num_distinct_keys = meta[0] as usize;

        splitters = ctx.recv_vec(SORT_MASTER, TAG_KEYS);
        if num_distinct_keys <= p {
            key_count = ctx.recv_vec(SORT_MASTER, TAG_COUNTS);
        }
    }

    // --- 3: distribution ---
    let m = num_distinct_keys;
    let mut outbox: Vec<Vec<T>> = vec![Vec::new(); p];

    if m <= p {
        let workers = assign_workers(&key_count, a, p);

        // contiguous worker range per key, in key order
        let mut ranges: Vec<(usize, usize)> = Vec::with_capacity(m);
        let mut next_worker = 0;
        for &w in &workers {
            debug_assert!(w > 0);
            ranges.push((next_worker, next_worker + w - 1));
            next_worker += w;
        }

        let rel_rank = rank as f64 / p as f64;
        for x in v.iter() {
            let kx = key(x);
            // the key set stems from samples and may be incomplete; fall
            // back to the nearest known key
            let idx = match splitters.binary_search(&kx) {
                Ok(i) => i,
                Err(i) => i.min(m - 1),
            };
            let (lo, hi) = ranges[idx];
            let j = (lo + (rel_rank * (hi - lo) as f64).round() as usize).min(p - 1);
            outbox[j].push(*x);
        }
    } else {
        for x in v.iter() {
            outbox[lb_rank(&splitters, key(x))].push(*x);
        }
    }

    // --- 4: exchange and local finalizer ---
    let mut incoming: Vec<T> = Vec::with_capacity(v.len());
    mpi::request::multiple_scope(p, |scope, coll| {
        for (i, bucket) in outbox.iter().enumerate() {
            if i != rank {
                // zero-length sends keep the receive loop uniform
                coll.add(ctx.immediate_send(scope, &bucket[..], i, TAG_EXCHANGE));
            }
        }

        // consume in rank order, send-to-self at its own position, so the
        // concatenation respects the global (worker, index) order
        for i in 0..p {
            if i == rank {
                incoming.extend_from_slice(&outbox[rank]);
            } else {
                incoming.extend(ctx.recv_vec::<T>(i, TAG_EXCHANGE));
            }
        }

        let mut done = Vec::new();
        coll.wait_all(&mut done);
    });
    ctx.synchronize();

    *v = incoming;
    v.par_sort_by(|x, y| key(x).cmp(&key(y)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lb_rank_picks_the_right_bucket() {
        let splitters = [3u64, 7, 7, 10];
        assert_eq!(lb_rank(&splitters, 0), 0);
        assert_eq!(lb_rank(&splitters, 3), 1);
        assert_eq!(lb_rank(&splitters, 5), 1);
        assert_eq!(lb_rank(&splitters, 7), 3);
        assert_eq!(lb_rank(&splitters, 9), 3);
        assert_eq!(lb_rank(&splitters, 10), 4);
        assert_eq!(lb_rank(&splitters, 99), 4);
    }

    #[test]
    fn worker_assignment_sums_to_p() {
        // 4 workers, oversampling 4: 16 samples over 3 keys
        let workers = assign_workers(&[8, 6, 2], 4, 4);
        assert_eq!(workers.iter().sum::<usize>(), 4);
        assert!(workers.iter().all(|&w| w > 0));
        // the dominant key gets the most workers
        assert_eq!(*workers.iter().max().unwrap(), workers[0]);
    }

    #[test]
    fn worker_assignment_rounds_up_sparse_keys() {
        // more keys than the rounded shares would cover
        let workers = assign_workers(&[30, 1, 1], 8, 4);
        assert_eq!(workers.iter().sum::<usize>(), 4);
        assert!(workers.iter().all(|&w| w > 0));
    }

    #[test]
    fn worker_assignment_trims_overshoot() {
        let workers = assign_workers(&[10, 10, 10, 10], 10, 4);
        assert_eq!(workers, vec![1, 1, 1, 1]);
    }
}

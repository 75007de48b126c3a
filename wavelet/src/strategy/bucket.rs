//! Bucket-sort / level-concatenate construction.
//!
//! Per level, every worker builds its local share of the level's bit vector
//! and partitions its text into buckets: one per next-level node for the
//! wavelet tree, or two (by the current bit) for the wavelet matrix. An
//! exclusive scan of bucket sizes yields each worker's global offset within
//! the concatenation, and since a local bucket holds at most `W` symbols it
//! lands on at most two consecutive target workers. The received symbols
//! form the text for the next level.

use std::mem;

use mpi::collective::SystemOperation;
use mpi::Tag;

use crate::bits::BitVec;
use crate::context::{Context, DataMsg};
use crate::histogram::Histogram;
use crate::input::FilePartitionReader;
use crate::master_info;
use crate::sym::Symbol;
use crate::wt::levelwise::WaveletTreeLevelwise;
use crate::wt::matrix::WaveletMatrix;
use crate::wt::{node_sizes, Shape};

/// Splits a bucket at the worker boundary and queues one or two messages.
fn push_bucket<S: Symbol>(
    outbox: &mut Vec<DataMsg<S>>,
    mut bucket: Vec<S>,
    glob_offs: u64,
    w: u64,
) {
    let size = bucket.len() as u64;
    debug_assert!(size > 0 && size <= w);

    let target1 = (glob_offs / w) as usize;
    let glob_last = glob_offs + size - 1;
    let target2 = (glob_last / w) as usize;

    if target1 == target2 {
        outbox.push(DataMsg {
            target: target1,
            header: [glob_offs, size],
            payload: bucket,
        });
    } else {
        assert_eq!(target1 + 1, target2);

        let glob_first2 = target2 as u64 * w;
        debug_assert!(glob_first2 > glob_offs);
        debug_assert!(glob_first2 <= glob_last);

        let size1 = (glob_first2 - glob_offs) as usize;
        let tail = bucket.split_off(size1);
        outbox.push(DataMsg {
            target: target1,
            header: [glob_offs, size1 as u64],
            payload: bucket,
        });
        outbox.push(DataMsg {
            target: target2,
            header: [glob_first2, tail.len() as u64],
            payload: tail,
        });
    }
}

fn receive_into_text<S: Symbol>(
    ctx: &Context,
    etext: &mut [S],
    outbox: &[DataMsg<S>],
    tag: Tag,
    expect: u64,
    w: u64,
) {
    ctx.distribute(outbox, tag, expect, |glob_offs, payload| {
        let local_offs = (glob_offs % w) as usize;
        etext[local_offs..local_offs + payload.len()].copy_from_slice(payload);
    });
}

/// Builds the levelwise wavelet tree by redistributing the text between
/// levels into `2^(L+1)` buckets keyed by the symbols' bit prefix.
pub fn levelwise_wt<S: Symbol>(
    ctx: &Context,
    input: &FilePartitionReader<S>,
    hist: &Histogram<S>,
    etext: &mut Vec<S>,
) -> WaveletTreeLevelwise {
    let shape = Shape::new(hist.size());
    let height = shape.height();
    let sizes = node_sizes(&hist.compute_c(), height);

    let local_num = input.local_num() as usize;
    let w = input.size_per_worker();

    let mut bits = vec![BitVec::new(); height];

    for level in 0..height {
        let tag = level as Tag;
        master_info!(ctx, "level {} ...", level + 1);

        let num_nlevel_nodes = 1usize << (level + 1);
        let first_nlevel_node = num_nlevel_nodes;

        let mut level_bits = BitVec::zeroed(local_num);
        let rsh = height - 1 - level;

        if level + 1 == height {
            // last level: only the bit vector remains to be built
            for (i, c) in etext.iter().enumerate() {
                level_bits.set(i, (c.to_u64() >> rsh) & 1 != 0);
            }
            bits[level] = level_bits;
        } else {
            // fill the sort buckets while building the bit vector
            let mut buckets: Vec<Vec<S>> = vec![Vec::new(); num_nlevel_nodes];
            for (i, c) in etext.iter().enumerate() {
                let k = (c.to_u64() >> rsh) as usize;
                level_bits.set(i, k & 1 != 0);
                buckets[k].push(*c);
            }
            bits[level] = level_bits;

            // global start of this worker's portion of every bucket
            let mut bucket_offs: Vec<u64> =
                buckets.iter().map(|b| b.len() as u64).collect();
            ctx.ex_scan(&mut bucket_offs);

            let mut outbox: Vec<DataMsg<S>> = Vec::new();
            let mut glob_node_offs = 0u64;
            for (v, bucket) in buckets.iter_mut().enumerate() {
                if !bucket.is_empty() {
                    let glob_bucket_offs = glob_node_offs + bucket_offs[v];
                    push_bucket(&mut outbox, mem::take(bucket), glob_bucket_offs, w);
                }
                glob_node_offs += sizes[first_nlevel_node - 1 + v];
            }

            receive_into_text(ctx, etext, &outbox, tag, local_num as u64, w);

            // outbound buffers must survive until everyone has received
            ctx.synchronize();
        }
    }

    WaveletTreeLevelwise::from_levels(shape, bits)
}

/// Builds the levelwise wavelet matrix: two buckets per level, the 0-bucket
/// concatenated before the 1-bucket, `z` reduced across all workers.
pub fn concat_wm<S: Symbol>(
    ctx: &Context,
    input: &FilePartitionReader<S>,
    hist: &Histogram<S>,
    etext: &mut Vec<S>,
) -> WaveletMatrix {
    let shape = Shape::new(hist.size());
    let height = shape.height();

    let local_num = input.local_num() as usize;
    let w = input.size_per_worker();

    let mut bits = vec![BitVec::new(); height];
    let mut z = vec![0u64; height];

    for level in 0..height {
        let tag = level as Tag;
        master_info!(ctx, "level {} ...", level + 1);

        let mut level_bits = BitVec::zeroed(local_num);
        let rsh = height - 1 - level;
        let mut local_z = 0u64;

        let reduce_z = |local_z: u64| {
            let mut zz = [local_z];
            ctx.all_reduce(&mut zz, SystemOperation::sum());
            zz[0]
        };

        if level + 1 == height {
            // last level: only the bit vector
            for (i, c) in etext.iter().enumerate() {
                let bit = (c.to_u64() >> rsh) & 1 != 0;
                level_bits.set(i, bit);
                if !bit {
                    local_z += 1;
                }
            }
            z[level] = reduce_z(local_z);
        } else {
            let mut buffer: [Vec<S>; 2] = [Vec::new(), Vec::new()];
            for (i, c) in etext.iter().enumerate() {
                let bit = (c.to_u64() >> rsh) & 1 != 0;
                level_bits.set(i, bit);
                if !bit {
                    local_z += 1;
                }
                buffer[bit as usize].push(*c);
            }

            let glob_z = reduce_z(local_z);
            z[level] = glob_z;

            // global start of this worker's portion of both buffers
            let mut buffer_offs = [buffer[0].len() as u64, buffer[1].len() as u64];
            ctx.ex_scan(&mut buffer_offs);

            let mut outbox: Vec<DataMsg<S>> = Vec::new();
            let mut glob_offs = 0u64;
            for b in 0..2 {
                if !buffer[b].is_empty() {
                    let glob_buffer_offs = glob_offs + buffer_offs[b];
                    push_bucket(&mut outbox, mem::take(&mut buffer[b]), glob_buffer_offs, w);
                }
                // the 1-buffer starts where the level's 0-bits end
                glob_offs += glob_z;
            }

            receive_into_text(ctx, etext, &outbox, tag, local_num as u64, w);
            ctx.synchronize();
        }

        bits[level] = level_bits;
    }

    WaveletMatrix::from_levels(shape, bits, z)
}

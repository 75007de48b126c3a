//! Parallel-split construction.
//!
//! Invariant at every recursion step: the workers of the active
//! communicator collectively hold the text of node `v`, in order. The node
//! bit vector is computed locally, the text is split between a left and a
//! right worker group, and the groups recurse on disjoint communicators.
//! A worker left alone finishes its remaining subtree sequentially.

use mpi::Tag;

use crate::bits::BitVec;
use crate::context::Context;
use crate::dsplit::dsplit_str;
use crate::histogram::Histogram;
use crate::master_info;
use crate::sym::Symbol;
use crate::wt::nodebased::WaveletTreeNodebased;
use crate::wt::sequential::wt_pc;
use crate::wt::{ceil_log2, Shape};

/// Builds the node-keyed tree of the distributed text.
pub fn build_nodebased<S: Symbol>(
    ctx: &mut Context,
    hist: &Histogram<S>,
    mut etext: Vec<S>,
) -> WaveletTreeNodebased {
    let shape = Shape::new(hist.size());
    let num_nodes = shape.num_nodes();

    let mut bits = vec![BitVec::new(); num_nodes];
    if num_nodes > 0 {
        recursive_wt(&mut bits, ctx, 1, &mut etext, 0, num_nodes);
    }
    WaveletTreeNodebased::new(hist, bits)
}

fn recursive_wt<S: Symbol>(
    bits: &mut [BitVec],
    ctx: &mut Context,
    node_id: usize,
    text: &mut Vec<S>,
    a: usize,
    b: usize,
) {
    if a == b {
        return;
    }

    master_info!(
        ctx,
        "processing node {} using {} worker(s) ...",
        node_id,
        ctx.num_workers()
    );

    if ctx.num_workers() == 1 {
        // this worker ended up alone with the subtree, which happens
        // depending on the 0/1 balance of the parent's bits; finish with
        // the sequential algorithm
        if !text.is_empty() {
            let subtree_height = ceil_log2(b - a + 1);
            wt_pc(bits, text, node_id, subtree_height);
        }
        return;
    }

    let m = (a + b) / 2;

    // node bit vector and its number of 0-bits
    let n = text.len();
    let mut z = 0u64;
    {
        let bv = &mut bits[node_id - 1];
        *bv = BitVec::zeroed(n);
        for (i, c) in text.iter().enumerate() {
            if c.to_u64() as usize <= m {
                z += 1;
            } else {
                bv.set(i, true);
            }
        }
    }

    if a < m || m + 1 < b {
        let split = dsplit_str(
            ctx,
            text,
            |x| x.to_u64() as usize > m,
            z,
            n as u64 - z,
            node_id as Tag,
        );

        // disjoint communicators for the two sides; a worker that received
        // nothing recurses along so the subgroup collectives stay uniform
        let (left, right) = ctx.split_at(split);

        if ctx.rank() < split {
            ctx.set_comm(left.expect("worker missing from left subgroup"));
            recursive_wt(bits, ctx, 2 * node_id, text, a, m);
        } else {
            ctx.set_comm(right.expect("worker missing from right subgroup"));
            recursive_wt(bits, ctx, 2 * node_id + 1, text, m + 1, b);
        }
        ctx.restore_comm();

        // the unused subgroup handle is freed on unwind on every worker
        ctx.synchronize();
    }
}

//! Node-keyed wavelet trees and the node→level merge.
//!
//! The merge redistributes node-keyed bits into level-keyed bit vectors of
//! exactly `W = ⌈N/P⌉` bits per worker (the last possibly shorter). Every
//! worker first learns the global start of its own segment within each
//! node's concatenated bits via an exclusive scan, then ships each segment
//! as bit-interval messages; a segment straddles at most two target workers.

use std::mem;

use anyhow::Result;
use mpi::Tag;

use crate::bits::{self, BitVec};
use crate::context::{Context, WordMsg};
use crate::histogram::Histogram;
use crate::input::FilePartitionReader;
use crate::master_info;
use crate::sym::Symbol;
use crate::wt::levelwise::WaveletTreeLevelwise;
use crate::wt::matrix::WaveletMatrix;
use crate::wt::{bitrev, node_extension, node_sizes, Shape};

pub struct WaveletTreeNodebased {
    shape: Shape,
    nodes: Vec<BitVec>,
}

impl WaveletTreeNodebased {
    pub fn new<S: Symbol>(hist: &Histogram<S>, nodes: Vec<BitVec>) -> Self {
        let shape = Shape::new(hist.size());
        assert_eq!(nodes.len(), shape.num_nodes());
        Self { shape, nodes }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn nodes(&self) -> &[BitVec] {
        &self.nodes
    }

    /// Rebalances into the levelwise layout. With `discard`, node vectors
    /// are dropped as soon as they have been shipped, bounding peak memory.
    pub fn merge<S: Symbol>(
        self,
        ctx: &Context,
        input: &FilePartitionReader<S>,
        hist: &Histogram<S>,
        discard: bool,
    ) -> WaveletTreeLevelwise {
        let shape = self.shape;
        let levels = self.merge_impl(ctx, input, hist, discard, false);
        WaveletTreeLevelwise::from_levels(shape, levels)
    }

    /// Rebalances into a wavelet matrix: levels are concatenated in
    /// bit-reversed node order and `z` is recomputed from the histogram.
    pub fn merge_to_matrix<S: Symbol>(
        self,
        ctx: &Context,
        input: &FilePartitionReader<S>,
        hist: &Histogram<S>,
        discard: bool,
    ) -> WaveletMatrix {
        let shape = self.shape;
        let h = shape.height();
        let levels = self.merge_impl(ctx, input, hist, discard, true);

        let mut z = vec![0u64; h];
        for (level, zl) in z.iter_mut().enumerate() {
            let mask = 1u64 << (h - 1 - level);
            *zl = hist
                .entries()
                .iter()
                .enumerate()
                .filter(|&(esym, _)| esym as u64 & mask == 0)
                .map(|(_, &(_, occ))| occ)
                .sum();
        }

        WaveletMatrix::from_levels(shape, levels, z)
    }

    fn merge_impl<S: Symbol>(
        mut self,
        ctx: &Context,
        input: &FilePartitionReader<S>,
        hist: &Histogram<S>,
        discard: bool,
        bit_reversal: bool,
    ) -> Vec<BitVec> {
        let h = self.shape.height();
        let mut levels = vec![BitVec::new(); h];
        if h == 0 {
            return levels;
        }

        let sizes = node_sizes(&hist.compute_c(), h);

        // the root is in text order already, hence balanced
        levels[0] = mem::take(&mut self.nodes[0]);

        master_info!(ctx, "distributing node prefix sums ...");
        let mut local_node_offs: Vec<u64> =
            self.nodes.iter().map(|bv| bv.len() as u64).collect();
        ctx.ex_scan(&mut local_node_offs);

        master_info!(ctx, "distributing level bit vectors ...");
        let w = input.size_per_worker();
        let local_num = input.local_num();
        let glob_base = ctx.rank() as u64 * w;

        for level in 1..h {
            master_info!(ctx, "level {} ...", level + 1);
            let tag = level as Tag;

            let num_level_nodes = 1usize << level;
            let first_level_node = num_level_nodes;

            let mut outbox: Vec<WordMsg> = Vec::new();

            let mut level_node_offs = 0u64;
            for i in 0..num_level_nodes {
                let node_id =
                    first_level_node + if bit_reversal { bitrev(i, level) } else { i };
                let bv = &self.nodes[node_id - 1];

                if !bv.is_empty() {
                    let glob_node_offs = level_node_offs + local_node_offs[node_id - 1];

                    // the local segment spans [p, q) of the level's global
                    // bit vector
                    let mut p = glob_node_offs;
                    let q = glob_node_offs + bv.len() as u64;

                    while p < q {
                        let target = (p / w) as usize;
                        let x = ((target as u64 + 1) * w).min(q);

                        let local_first = (p - glob_node_offs) as usize;
                        let local_last = (x - 1 - glob_node_offs) as usize;
                        let words =
                            bits::encode_interval(bv, local_first, local_last, p, x - 1);
                        outbox.push(WordMsg { target, words });

                        p = x;
                    }

                    if discard {
                        self.nodes[node_id - 1] = BitVec::new();
                    }
                }

                level_node_offs += sizes[node_id - 1];
            }

            let mut level_bits = BitVec::zeroed(local_num as usize);
            ctx.distribute_words(&outbox, tag, local_num, |msg| {
                bits::decode_interval(msg, &mut level_bits, glob_base)
            });
            levels[level] = level_bits;

            // outbound buffers must survive until every worker is done
            ctx.synchronize();
        }

        levels
    }

    /// Writes one `<output><rank>.node_<v>` file per non-empty local node.
    pub fn save(&self, ctx: &Context, output: &str) -> Result<()> {
        for (idx, bv) in self.nodes.iter().enumerate() {
            if !bv.is_empty() {
                let filename =
                    format!("{}{:04}.{}", output, ctx.rank(), node_extension(idx + 1));
                crate::wt::write_bit_file(filename, bv)?;
            }
        }
        Ok(())
    }
}

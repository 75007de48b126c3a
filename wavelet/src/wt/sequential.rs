//! Sequential construction algorithms.
//!
//! Prefix counting builds all bit vectors of a subtree bottom-up from a
//! symbol histogram without ever permuting the text; the recursive
//! two-pointer algorithm partitions the text on the way down instead. The
//! matrix variant rearranges each level so that 0-bits precede 1-bits,
//! tracked by the per-level splitter `z`.

use crate::bits::BitVec;
use crate::sym::Symbol;
use crate::wt::{bitrev, Shape};

fn floor_log2(x: usize) -> usize {
    debug_assert!(x > 0);
    (usize::BITS - 1 - x.leading_zeros()) as usize
}

/// Prefix counting over the subtree of height `h` rooted at `root_node_id`
/// (1-based). `text` must only contain symbols routed through that subtree.
/// Fills the subtree's vectors in the node-keyed `bits` of the full tree.
pub fn wt_pc<S: Symbol>(bits: &mut [BitVec], text: &[S], root_node_id: usize, h: usize) {
    assert!(root_node_id > 0);
    assert!(h >= 1);

    let root_level = floor_log2(root_node_id);
    let root_rank = root_node_id - (1 << root_level);
    let glob_h = root_level + h;

    let n = text.len();
    let sigma = 1usize << h; // next power of two, not the effective σ

    // histogram of the subtree's symbols and the root bit vector
    let mut hist = vec![0u64; sigma];
    {
        let test = 1u64 << (glob_h - 1 - root_level);

        let root = &mut bits[root_node_id - 1];
        *root = BitVec::zeroed(n);
        for (i, c) in text.iter().enumerate() {
            let c = c.to_u64();
            let v = c as usize - root_rank * (1 << h);
            hist[v] += 1;
            root.set(i, c & test != 0);
        }
    }

    // remaining levels bottom-up
    let mut count = vec![0u64; sigma / 2];
    for level in (1..h).rev() {
        let num_level_nodes = 1usize << level;

        let glob_level = root_level + level;
        let glob_offs = ((1 << level) * root_node_id) - 1;

        // contract the histogram, allocate nodes, reset counters
        for v in 0..num_level_nodes {
            let size = hist[2 * v] + hist[2 * v + 1];
            hist[v] = size;
            bits[glob_offs + v] = BitVec::zeroed(size as usize);
            count[v] = 0;
        }

        let rsh = glob_h - glob_level;
        let test = 1u64 << (glob_h - 1 - glob_level);

        for c in text {
            let c = c.to_u64();
            let glob_v = (c >> rsh) as usize;
            let v = glob_v - (root_rank << level);

            let pos = count[v];
            count[v] += 1;
            bits[glob_offs + v].set(pos as usize, c & test != 0);
        }
    }
}

/// Recursive two-pointer construction over the alphabet interval `[a, b]`.
/// `buffer` is scratch space of the same length as `text`; both are
/// clobbered.
pub fn wt_navarro<S: Symbol>(
    bits: &mut [BitVec],
    node_id: usize,
    text: &mut [S],
    a: usize,
    b: usize,
    buffer: &mut [S],
) {
    if a == b {
        return;
    }

    let m = (a + b) / 2;
    let n = text.len();

    let mut z = 0usize;
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
        // stable partition of the text into the buffer
        let mut pl = 0;
        let mut pr = z;
        for i in 0..n {
            let c = text[i];
            if c.to_u64() as usize <= m {
                buffer[pl] = c;
                pl += 1;
            } else {
                buffer[pr] = c;
                pr += 1;
            }
        }

        // recurse with the roles of text and buffer swapped
        let (bl, br) = buffer.split_at_mut(z);
        let (tl, tr) = text.split_at_mut(z);
        wt_navarro(bits, 2 * node_id, bl, a, m, tl);
        wt_navarro(bits, 2 * node_id + 1, br, m + 1, b, tr);
    }
}

/// Node-keyed wavelet tree of an in-memory text, built sequentially.
pub fn wt_nodebased_sequential<S: Symbol>(shape: &Shape, text: &mut [S]) -> Vec<BitVec> {
    let num_nodes = shape.num_nodes();
    let mut bits = vec![BitVec::new(); num_nodes];
    if num_nodes > 0 && !text.is_empty() {
        let mut buffer = vec![S::default(); text.len()];
        wt_navarro(&mut bits, 1, text, 0, num_nodes, &mut buffer);
    }
    bits
}

/// Prefix-counting construction of the wavelet matrix: one bit vector per
/// level plus the splitter vector `z`.
pub fn wm_pc<S: Symbol>(shape: &Shape, text: &[S]) -> (Vec<BitVec>, Vec<u64>) {
    let h = shape.height();
    if h == 0 {
        return (Vec::new(), Vec::new());
    }

    let n = text.len();
    let sigma = 1usize << h;
    let mut bits = vec![BitVec::new(); h];
    let mut z = vec![0u64; h];

    // histogram and top level
    let mut hist = vec![0u64; sigma];
    {
        let test = 1u64 << (h - 1);
        let mut num0 = 0u64;

        let root = &mut bits[0];
        *root = BitVec::zeroed(n);
        for (i, c) in text.iter().enumerate() {
            let c = c.to_u64();
            hist[c as usize] += 1;
            if c & test != 0 {
                root.set(i, true);
            } else {
                num0 += 1;
            }
        }
        z[0] = num0;
    }

    // remaining levels bottom-up; borders enumerate the level's nodes in
    // bit-reversed order
    let mut borders = vec![0u64; sigma / 2];
    for level in (1..h).rev() {
        bits[level] = BitVec::zeroed(n);

        let num_level_nodes = 1usize << level;

        for v in 0..num_level_nodes {
            hist[v] = hist[2 * v] + hist[2 * v + 1];
        }

        borders[0] = 0;
        let mut prev = 0usize;
        for v in 1..num_level_nodes {
            let vrev = bitrev(v, level);
            borders[vrev] = borders[prev] + hist[prev];
            prev = vrev;
        }

        let rsh = h - level;
        let test = 1u64 << (h - 1 - level);
        let mut num0 = 0u64;

        for c in text {
            let c = c.to_u64();
            let v = (c >> rsh) as usize;

            let pos = borders[v];
            borders[v] += 1;

            if c & test != 0 {
                bits[level].set(pos as usize, true);
            } else {
                num0 += 1;
            }
        }
        z[level] = num0;
    }

    (bits, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::Histogram;
    use crate::wt::{concat_node_levels, node_sizes};

    fn etext(text: &[u8]) -> (Vec<u8>, Histogram<u8>, Shape) {
        let hist = Histogram::of_text(text);
        let ea = crate::alphabet::EffectiveAlphabet::new(&hist);
        let mut t = text.to_vec();
        ea.transform_slice(&mut t);
        let shape = Shape::new(hist.size());
        (t, hist, shape)
    }

    fn bit_string(bv: &BitVec) -> String {
        bv.iter().map(|b| if b { '1' } else { '0' }).collect()
    }

    #[test]
    fn pc_mississippi() {
        let (t, hist, shape) = etext(b"mississippi$");
        let mut bits = vec![BitVec::new(); shape.num_nodes()];
        wt_pc(&mut bits, &t, 1, shape.height());

        // effective codes: $=000 i=001 m=010 p=011 s=100
        assert_eq!(bit_string(&bits[0]), "001101100000");
        // node 2: {$, i, m, p} stably reordered; node 3: {s, s, s, s}
        assert_eq!(bit_string(&bits[1]), "10001100");
        assert_eq!(bit_string(&bits[2]), "0000");
        // level 2 nodes: {$, i}, {m, p}, {s}
        assert_eq!(bit_string(&bits[3]), "11110");
        assert_eq!(bit_string(&bits[4]), "011");
        assert_eq!(bit_string(&bits[5]), "0000");
        assert_eq!(bit_string(&bits[6]), "");

        // node lengths match the shape
        let sizes = node_sizes(&hist.compute_c(), shape.height());
        for (bv, &size) in bits.iter().zip(&sizes) {
            assert_eq!(bv.len() as u64, size);
        }
    }

    #[test]
    fn navarro_equals_pc() {
        let texts: [&[u8]; 4] = [
            b"mississippi$",
            b"abracadabra",
            b"zyxwvutsrqponm",
            b"aaaaabbbbbcccccddddd",
        ];
        for text in texts {
            let (t, _hist, shape) = etext(text);

            let mut pc_bits = vec![BitVec::new(); shape.num_nodes()];
            wt_pc(&mut pc_bits, &t, 1, shape.height());

            let mut tn = t.clone();
            let nav_bits = wt_nodebased_sequential(&shape, &mut tn);

            assert_eq!(pc_bits, nav_bits, "strategies disagree on {:?}", text);
        }
    }

    #[test]
    fn pc_subtree_matches_full_tree() {
        let (t, _hist, shape) = etext(b"abcdefghabcdabab");
        let h = shape.height();

        let mut full = vec![BitVec::new(); shape.num_nodes()];
        wt_pc(&mut full, &t, 1, h);

        // rebuild the left subtree (node 2, symbols < 4) from its text slice
        let sub_text: Vec<u8> = t.iter().copied().filter(|&c| c < 4).collect();
        let mut sub = vec![BitVec::new(); shape.num_nodes()];
        wt_pc(&mut sub, &sub_text, 2, h - 1);

        // the subtree's nodes must come out identical; order within a node
        // is the stable text order restricted to the subtree
        for node in [2usize, 4, 5] {
            assert_eq!(sub[node - 1], full[node - 1], "node {}", node);
        }
    }

    #[test]
    fn single_symbol_text_has_no_nodes() {
        let (mut t, _hist, shape) = etext(b"aaaaaaaa");
        assert_eq!(shape.height(), 0);
        assert!(wt_nodebased_sequential(&shape, &mut t).is_empty());
        let (bits, z) = wm_pc(&shape, &t);
        assert!(bits.is_empty());
        assert!(z.is_empty());
    }

    #[test]
    fn wm_z_counts_level_zeros() {
        let (t, _hist, shape) = etext(b"mississippi$");
        let (bits, z) = wm_pc(&shape, &t);
        assert_eq!(bits.len(), 3);
        assert_eq!(z.len(), 3);
        for (bv, &zl) in bits.iter().zip(&z) {
            assert_eq!(bv.len(), t.len());
            assert_eq!(bv.count_zeros(), zl);
        }
    }

    #[test]
    fn wm_top_level_equals_wt_root() {
        let (t, _hist, shape) = etext(b"abracadabra");
        let (wm_bits, _z) = wm_pc(&shape, &t);

        let mut wt_bits = vec![BitVec::new(); shape.num_nodes()];
        wt_pc(&mut wt_bits, &t, 1, shape.height());
        let levels = concat_node_levels(&wt_bits, shape.height());

        assert_eq!(wm_bits[0], levels[0]);
    }
}

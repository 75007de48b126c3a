//! Sequential decoders for levelwise trees and matrices.
//!
//! Decoding replays the construction forward: walking the levels top-down,
//! every text position follows its bits through the stable reordering, and
//! the collected bits form the symbol's effective code. Used by round-trip
//! tests and the verification tools.

use crate::bits::BitVec;
use crate::histogram::Histogram;
use crate::sym::Symbol;
use crate::wt::{node_sizes, Shape};

/// Reconstructs the text from a levelwise wavelet tree.
pub fn decode_levelwise_wt<S: Symbol>(levels: &[BitVec], hist: &Histogram<S>) -> Vec<S> {
    let shape = Shape::new(hist.size());
    let h = shape.height();
    let n = hist.text_length() as usize;

    if h == 0 {
        // single-symbol text
        return degenerate_text(hist, n);
    }
    assert_eq!(levels.len(), h);

    let sizes = node_sizes(&hist.compute_c(), h);
    let mut order: Vec<u32> = (0..n as u32).collect();
    let mut codes = vec![0u64; n];

    for (level, bits) in levels.iter().enumerate() {
        assert_eq!(bits.len(), n);

        let mut new_order = Vec::with_capacity(n);
        let mut ones = Vec::new();
        let mut pos = 0usize;

        // per node, zeros stay in front of ones
        for v in (1 << level)..(1 << (level + 1)) {
            let len = sizes[v - 1] as usize;
            ones.clear();
            for j in pos..pos + len {
                let t = order[j];
                if bits.get(j) {
                    codes[t as usize] |= 1u64 << (h - 1 - level);
                    ones.push(t);
                } else {
                    new_order.push(t);
                }
            }
            new_order.extend_from_slice(&ones);
            pos += len;
        }
        assert_eq!(pos, n);
        order = new_order;
    }

    codes_to_text(&codes, hist)
}

/// Reconstructs the text from a levelwise wavelet matrix and its `z` vector.
pub fn decode_levelwise_wm<S: Symbol>(
    levels: &[BitVec],
    z: &[u64],
    hist: &Histogram<S>,
) -> Vec<S> {
    let shape = Shape::new(hist.size());
    let h = shape.height();
    let n = hist.text_length() as usize;

    if h == 0 {
        return degenerate_text(hist, n);
    }
    assert_eq!(levels.len(), h);
    assert_eq!(z.len(), h);

    let mut order: Vec<u32> = (0..n as u32).collect();
    let mut codes = vec![0u64; n];

    for (level, bits) in levels.iter().enumerate() {
        assert_eq!(bits.len(), n);

        // all zeros of the level precede all ones
        let mut zeros = Vec::with_capacity(n);
        let mut ones = Vec::new();
        for (j, &t) in order.iter().enumerate() {
            if bits.get(j) {
                codes[t as usize] |= 1u64 << (h - 1 - level);
                ones.push(t);
            } else {
                zeros.push(t);
            }
        }
        assert_eq!(zeros.len() as u64, z[level]);
        zeros.extend_from_slice(&ones);
        order = zeros;
    }

    codes_to_text(&codes, hist)
}

fn degenerate_text<S: Symbol>(hist: &Histogram<S>, n: usize) -> Vec<S> {
    match hist.entries().first() {
        Some(&(sym, _)) => vec![sym; n],
        None => Vec::new(),
    }
}

fn codes_to_text<S: Symbol>(codes: &[u64], hist: &Histogram<S>) -> Vec<S> {
    let entries = hist.entries();
    codes.iter().map(|&c| entries[c as usize].0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::EffectiveAlphabet;
    use crate::wt::concat_node_levels;
    use crate::wt::sequential::{wm_pc, wt_nodebased_sequential};

    fn build_and_decode_wt(text: &[u8]) -> Vec<u8> {
        let hist = Histogram::of_text(text);
        let ea = EffectiveAlphabet::new(&hist);
        let shape = Shape::new(hist.size());

        let mut etext = text.to_vec();
        ea.transform_slice(&mut etext);

        let nodes = wt_nodebased_sequential(&shape, &mut etext);
        let levels = concat_node_levels(&nodes, shape.height());
        decode_levelwise_wt(&levels, &hist)
    }

    fn build_and_decode_wm(text: &[u8]) -> Vec<u8> {
        let hist = Histogram::of_text(text);
        let ea = EffectiveAlphabet::new(&hist);
        let shape = Shape::new(hist.size());

        let mut etext = text.to_vec();
        ea.transform_slice(&mut etext);

        let (levels, z) = wm_pc(&shape, &etext);
        decode_levelwise_wm(&levels, &z, &hist)
    }

    #[test]
    fn wt_roundtrip() {
        for text in [
            b"mississippi$".as_slice(),
            b"abracadabra",
            b"aa",
            b"ba",
            b"the quick brown fox jumps over the lazy dog",
        ] {
            assert_eq!(build_and_decode_wt(text), text);
        }
    }

    #[test]
    fn wm_roundtrip() {
        for text in [
            b"mississippi$".as_slice(),
            b"abracadabra",
            b"tobeornottobe",
            b"lorem ipsum dolor sit amet",
        ] {
            assert_eq!(build_and_decode_wm(text), text);
        }
    }

    #[test]
    fn roundtrip_random_bytes() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(0xc0ffee);
        let text: Vec<u8> = (0..4096).map(|_| rng.gen()).collect();
        assert_eq!(build_and_decode_wt(&text), text);
        assert_eq!(build_and_decode_wm(&text), text);
    }

    #[test]
    fn single_symbol_roundtrip() {
        let text = vec![b'a'; 1000];
        assert_eq!(build_and_decode_wt(&text), text);
        assert_eq!(build_and_decode_wm(&text), text);
    }

    #[test]
    fn alternating_text_root_level() {
        let text: Vec<u8> = b"ab".iter().copied().cycle().take(64).collect();
        let hist = Histogram::of_text(&text);
        let ea = EffectiveAlphabet::new(&hist);
        let shape = Shape::new(hist.size());
        assert_eq!(shape.height(), 1);

        let mut etext = text.clone();
        ea.transform_slice(&mut etext);
        let nodes = wt_nodebased_sequential(&shape, &mut etext);
        let levels = concat_node_levels(&nodes, shape.height());

        for (i, b) in levels[0].iter().enumerate() {
            assert_eq!(b, i % 2 == 1);
        }
        assert_eq!(decode_levelwise_wt(&levels, &hist), text);
    }
}

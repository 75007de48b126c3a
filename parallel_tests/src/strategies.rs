use mpi::Tag;

use wavelet::alphabet::EffectiveAlphabet;
use wavelet::bits::BitVec;
use wavelet::context::Context;
use wavelet::histogram::Histogram;
use wavelet::input::FilePartitionReader;
use wavelet::strategy::{bucket, domain_decomp, parallel_split};
use wavelet::wt::decode::{decode_levelwise_wt, decode_levelwise_wm};
use wavelet::wt::levelwise::WaveletTreeLevelwise;
use wavelet::wt::matrix::WaveletMatrix;

use crate::data;

const TAG_GATHER: Tag = 701;

struct Setup {
    input: FilePartitionReader<u8>,
    hist: Histogram<u8>,
    ea: EffectiveAlphabet<u8>,
    rdbuf: usize,
}

fn setup(ctx: &Context, name: &str, text: &[u8]) -> Setup {
    let path = data::shared_input(ctx, name, text);
    let input = FilePartitionReader::<u8>::new(ctx, &path, u64::MAX).unwrap();
    let rdbuf = (input.local_num() as usize).max(1);
    let hist = Histogram::compute(ctx, &input, rdbuf).unwrap();
    let ea = EffectiveAlphabet::new(&hist);
    Setup {
        input,
        hist,
        ea,
        rdbuf,
    }
}

/// Concatenates the per-worker shares of each level on the master.
fn gather_levels(ctx: &Context, levels: &[BitVec]) -> Vec<BitVec> {
    let p = ctx.num_workers();
    let mut full = Vec::new();
    for bv in levels {
        if ctx.is_master() {
            let mut g: BitVec = bv.iter().collect();
            for r in 1..p {
                let msg: Vec<u64> = ctx.recv_vec(r, TAG_GATHER);
                let share = BitVec::from_words(msg[1..].to_vec(), msg[0] as usize);
                for b in share.iter() {
                    g.push(b);
                }
            }
            full.push(g);
        } else {
            let mut msg = vec![bv.len() as u64];
            msg.extend_from_slice(bv.words());
            ctx.send(&msg, 0, TAG_GATHER);
        }
    }
    full
}

fn assert_balanced(ctx: &Context, input: &FilePartitionReader<u8>, levels: &[BitVec]) {
    for bv in levels {
        // every worker holds W bits, the last possibly fewer
        assert_eq!(bv.len() as u64, input.local_num());
        if ctx.rank() + 1 < ctx.num_workers() {
            assert_eq!(bv.len() as u64, input.size_per_worker());
        }
    }

    // the shares are contiguous: the running total over ranks ends exactly
    // at this worker's partition end
    let mut acc = [input.local_num()];
    ctx.scan(&mut acc);
    assert_eq!(acc[0], input.local_offset() + input.local_num());
}

fn assert_same_levels(a: &[BitVec], b: &[BitVec]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert_eq!(x, y);
    }
}

fn build_all_wt(
    ctx: &mut Context,
    s: &Setup,
) -> (WaveletTreeLevelwise, WaveletTreeLevelwise, WaveletTreeLevelwise) {
    let mut etext = s.ea.transform_to_vec(&s.input, s.rdbuf).unwrap();
    let bsort = bucket::levelwise_wt(ctx, &s.input, &s.hist, &mut etext);

    let mut etext = s.ea.transform_to_vec(&s.input, s.rdbuf).unwrap();
    let dd = domain_decomp::build_nodebased(&s.hist, &mut etext).merge(
        ctx, &s.input, &s.hist, true,
    );

    let etext = s.ea.transform_to_vec(&s.input, s.rdbuf).unwrap();
    let parsplit = parallel_split::build_nodebased(ctx, &s.hist, etext).merge(
        ctx, &s.input, &s.hist, true,
    );

    (bsort, dd, parsplit)
}

/// All three WT strategies must produce bit-identical balanced levels, and
/// the gathered structure must decode back to the text.
pub fn test_wt_agreement(ctx: &mut Context) {
    let n = (1 << 16) + 13;
    let texts: [(&str, Vec<u8>); 3] = [
        ("wt_random", data::random_text(n, 11)),
        ("wt_dna", data::random_text_over(n, b"acgt", 12)),
        ("wt_abc8", data::periodic_text(b"abcdefgh", n)),
    ];

    for (name, text) in &texts {
        let s = setup(ctx, name, text);
        let (bsort, dd, parsplit) = build_all_wt(ctx, &s);

        assert_balanced(ctx, &s.input, bsort.levels());
        assert_same_levels(bsort.levels(), dd.levels());
        assert_same_levels(bsort.levels(), parsplit.levels());

        let full = gather_levels(ctx, bsort.levels());
        if ctx.is_master() {
            for bv in &full {
                assert_eq!(bv.len(), text.len());
            }
            if *name == "wt_random" {
                // uniform bytes: every level is balanced up to sampling noise
                let nf = text.len() as f64;
                for bv in &full {
                    let ones = bv.count_ones() as f64;
                    assert!((ones - nf / 2.0).abs() <= 2.5 * nf.sqrt());
                }
            }
            assert_eq!(decode_levelwise_wt(&full, &s.hist), *text);
        }
        ctx.synchronize();
    }

    if ctx.is_master() {
        println!("... WT strategy agreement ok");
    }
}

/// The WM variants must agree with each other; `z` must count the zeros of
/// each gathered level and the matrix must decode back to the text.
pub fn test_wm_agreement(ctx: &mut Context) {
    let n = (1 << 15) + 7;
    let text = data::random_text(n, 21);
    let s = setup(ctx, "wm_random", &text);

    let mut etext = s.ea.transform_to_vec(&s.input, s.rdbuf).unwrap();
    let concat: WaveletMatrix = bucket::concat_wm(ctx, &s.input, &s.hist, &mut etext);

    let mut etext = s.ea.transform_to_vec(&s.input, s.rdbuf).unwrap();
    let dd = domain_decomp::build_nodebased(&s.hist, &mut etext).merge_to_matrix(
        ctx, &s.input, &s.hist, true,
    );

    let etext = s.ea.transform_to_vec(&s.input, s.rdbuf).unwrap();
    let dsplit = parallel_split::build_nodebased(ctx, &s.hist, etext).merge_to_matrix(
        ctx, &s.input, &s.hist, true,
    );

    assert_balanced(ctx, &s.input, concat.levels());
    assert_same_levels(concat.levels(), dd.levels());
    assert_same_levels(concat.levels(), dsplit.levels());
    assert_eq!(concat.z(), dd.z());
    assert_eq!(concat.z(), dsplit.z());

    let full = gather_levels(ctx, concat.levels());
    if ctx.is_master() {
        for (bv, &zl) in full.iter().zip(concat.z()) {
            assert_eq!(bv.count_zeros(), zl);
        }
        assert_eq!(decode_levelwise_wm(&full, concat.z(), &s.hist), text);
    }
    ctx.synchronize();

    if ctx.is_master() {
        println!("... WM strategy agreement ok");
    }
}

/// The distributed histogram must agree with a sequential recount.
pub fn test_histogram_agreement(ctx: &Context) {
    let text = data::random_text(1 << 14, 31);
    let s = setup(ctx, "hist", &text);
    assert_eq!(s.hist, Histogram::of_text(&text));

    // every worker derives the identical mapping
    assert_eq!(s.hist.text_length(), text.len() as u64);
    ctx.synchronize();

    if ctx.is_master() {
        println!("... histogram agreement ok");
    }
}

/// A single-symbol text has no tree nodes at all; all strategies must
/// return an empty bit-vector set that still decodes to the text.
pub fn test_single_symbol(ctx: &mut Context) {
    let text = vec![b'a'; 1 << 12];
    let s = setup(ctx, "single", &text);
    let (bsort, dd, parsplit) = build_all_wt(ctx, &s);

    assert!(bsort.levels().is_empty());
    assert!(dd.levels().is_empty());
    assert!(parsplit.levels().is_empty());

    let mut etext = s.ea.transform_to_vec(&s.input, s.rdbuf).unwrap();
    let wm = bucket::concat_wm(ctx, &s.input, &s.hist, &mut etext);
    assert!(wm.levels().is_empty());
    assert!(wm.z().is_empty());

    if ctx.is_master() {
        assert_eq!(decode_levelwise_wt(&[], &s.hist), text);
    }
    ctx.synchronize();

    if ctx.is_master() {
        println!("... single-symbol edge case ok");
    }
}

/// A 16-bit alphabet takes the butterfly histogram path; the generic
/// construction must behave exactly like the byte case.
pub fn test_wide_alphabet(ctx: &mut Context) {
    let n = (1 << 14) + 5;
    let text = data::random_wide_text(n, 200, 41);
    let bytes: Vec<u8> = text.iter().flat_map(|x| x.to_le_bytes()).collect();
    let path = data::shared_input(ctx, "wide", &bytes);

    let input = FilePartitionReader::<u16>::new(ctx, &path, u64::MAX).unwrap();
    let rdbuf = (input.local_num() as usize).max(1);
    let hist = Histogram::compute(ctx, &input, rdbuf).unwrap();
    assert_eq!(hist, Histogram::of_text(&text));

    let ea = EffectiveAlphabet::new(&hist);

    let mut etext = ea.transform_to_vec(&input, rdbuf).unwrap();
    let bsort = bucket::levelwise_wt(ctx, &input, &hist, &mut etext);

    let mut etext = ea.transform_to_vec(&input, rdbuf).unwrap();
    let dd = domain_decomp::build_nodebased(&hist, &mut etext).merge(
        ctx, &input, &hist, true,
    );

    assert_same_levels(bsort.levels(), dd.levels());

    let full = gather_levels(ctx, bsort.levels());
    if ctx.is_master() {
        assert_eq!(decode_levelwise_wt(&full, &hist), text);
    }
    ctx.synchronize();

    if ctx.is_master() {
        println!("... wide alphabet ok");
    }
}

/// An alternating two-symbol text: one level, strictly alternating bits,
/// identical for every worker count.
pub fn test_alternating(ctx: &mut Context) {
    let text = data::periodic_text(b"ab", 1 << 16);
    let s = setup(ctx, "alternating", &text);
    let (bsort, dd, parsplit) = build_all_wt(ctx, &s);

    assert_same_levels(bsort.levels(), dd.levels());
    assert_same_levels(bsort.levels(), parsplit.levels());

    let offset = s.input.local_offset();
    let level = &bsort.levels()[0];
    for i in 0..level.len() {
        assert_eq!(level.get(i), (offset + i as u64) % 2 == 1);
    }
    ctx.synchronize();

    if ctx.is_master() {
        println!("... alternating text ok");
    }
}

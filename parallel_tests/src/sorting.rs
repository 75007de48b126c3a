use mpi::traits::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wavelet::context::Context;
use wavelet::sort::stable_sort_by_key;

const TAG_GATHER: mpi::Tag = 700;

/// A sort record tagged with its origin, so stability is checkable after
/// the exchange. `origin` encodes `(worker, local index)` lexicographically.
#[derive(Equivalence, Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Rec {
    pub val: u64,
    pub origin: u64,
}

fn make_records(ctx: &Context, num: usize, max_val: u64, seed: u64) -> Vec<Rec> {
    let rank = ctx.rank() as u64;
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(rank));
    (0..num)
        .map(|i| Rec {
            val: rng.gen_range(0..max_val),
            origin: rank * 1_000_000 + i as u64,
        })
        .collect()
}

/// Gathers every worker's records on the master, in rank order.
fn gather(ctx: &Context, recs: &[Rec]) -> Vec<Rec> {
    let p = ctx.num_workers();
    let mut all = Vec::new();
    if ctx.is_master() {
        all.extend_from_slice(recs);
        for r in 1..p {
            all.extend(ctx.recv_vec::<Rec>(r, TAG_GATHER));
        }
    } else {
        ctx.send(recs, 0, TAG_GATHER);
    }
    all
}

fn check_sorted_and_stable(ctx: &Context, recs: &[Rec], key: impl Fn(&Rec) -> u64, total: usize) {
    let all = gather(ctx, recs);
    if ctx.is_master() {
        assert_eq!(all.len(), total);
        for w in all.windows(2) {
            let (ka, kb) = (key(&w[0]), key(&w[1]));
            assert!(ka <= kb, "keys out of order: {:?} before {:?}", w[0], w[1]);
            if ka == kb {
                assert!(
                    w[0].origin < w[1].origin,
                    "stability violated: {:?} before {:?}",
                    w[0],
                    w[1]
                );
            }
        }
    }
    ctx.synchronize();
}

/// Few distinct keys: with at least four workers, sorting by `val & 3`
/// takes the small-key-set path; the result must be a stable 4-key
/// bucketization either way.
pub fn test_stable_sort_small_keys(ctx: &Context) {
    let num = 14;
    let mut recs = make_records(ctx, num, 10, 1);
    stable_sort_by_key(ctx, &mut recs, |r| r.val & 3, ctx.num_workers().max(2), Some(42));
    check_sorted_and_stable(ctx, &recs, |r| r.val & 3, num * ctx.num_workers());

    if ctx.is_master() {
        println!("... stable sort (small key set) ok");
    }
}

/// Many distinct keys force the classic splitter path.
pub fn test_stable_sort_general(ctx: &Context) {
    let num = 500;
    let mut recs = make_records(ctx, num, 100_000, 2);
    stable_sort_by_key(ctx, &mut recs, |r| r.val, ctx.num_workers().max(2), Some(43));
    check_sorted_and_stable(ctx, &recs, |r| r.val, num * ctx.num_workers());

    if ctx.is_master() {
        println!("... stable sort (splitter path) ok");
    }
}

/// Same seed, two runs: the distributed result must be identical.
pub fn test_sort_determinism(ctx: &Context) {
    let num = 64;
    let mut first = make_records(ctx, num, 16, 3);
    let mut second = first.clone();

    stable_sort_by_key(ctx, &mut first, |r| r.val, ctx.num_workers().max(2), Some(7));
    stable_sort_by_key(ctx, &mut second, |r| r.val, ctx.num_workers().max(2), Some(7));
    assert_eq!(first, second);

    if ctx.is_master() {
        println!("... sort determinism ok");
    }
}

use wavelet::context::Context;

use parallel_tests::{sorting, strategies};

fn main() {
    env_logger::init();

    let universe = mpi::initialize().unwrap();
    let mut ctx = Context::new(&universe);

    if ctx.is_master() {
        println!(
            "running parallel tests on {} worker(s):",
            ctx.num_workers()
        );
    }

    // 1. Distributed sort
    sorting::test_stable_sort_small_keys(&ctx);
    sorting::test_stable_sort_general(&ctx);
    sorting::test_sort_determinism(&ctx);

    // 2. Histogram
    strategies::test_histogram_agreement(&ctx);

    // 3. Construction strategies
    strategies::test_wt_agreement(&mut ctx);
    strategies::test_wm_agreement(&mut ctx);
    strategies::test_single_symbol(&mut ctx);
    strategies::test_alternating(&mut ctx);
    strategies::test_wide_alphabet(&mut ctx);

    if ctx.is_master() {
        println!("all parallel tests passed");
    }
}

//! Thin wrapper over the MPI substrate.
//!
//! The context owns the world communicator plus a stack of subgroup
//! communicators (the topmost one is active), tagged point-to-point
//! operations, the collectives used by the construction algorithms, and
//! traffic counters. Point-to-point traffic is measured; collective traffic
//! is estimated from a log₂P reduction-broadcast tree.
//!
//! Any substrate failure is fatal: MPI's default error handler aborts the
//! job, which is the intended behavior for all construction tools.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::mem;

use mpi::collective::SystemOperation;
use mpi::datatype::Equivalence;
use mpi::environment::Universe;
use mpi::point_to_point::Status;
use mpi::request::{RequestCollection, Scope};
use mpi::topology::{Rank, SimpleCommunicator};
use mpi::traits::*;
use mpi::Tag;

/// Log line emitted by the master rank only.
#[macro_export]
macro_rules! master_info {
    ($ctx:expr, $($arg:tt)*) => {
        if $ctx.is_master() {
            log::info!($($arg)*);
        }
    };
}

/// Bytes moved by this worker, split into measured point-to-point traffic
/// (`tx`/`rx`), estimated collective traffic (`tx_est`/`rx_est`) and
/// node-local shared-memory traffic (`tx_shm`/`rx_shm`).
#[derive(Clone, Copy, Default, Debug)]
pub struct Traffic {
    pub tx: u64,
    pub rx: u64,
    pub tx_est: u64,
    pub rx_est: u64,
    pub tx_shm: u64,
    pub rx_shm: u64,
}

/// Result of a blocking probe.
#[derive(Clone, Copy, Debug)]
pub struct ProbeResult {
    pub sender: usize,
    pub size: usize,
}

/// A two-part transaction: `(glob_offset, count)` header followed by
/// `count` payload items on the same tag.
pub struct DataMsg<T> {
    pub target: usize,
    pub header: [u64; 2],
    pub payload: Vec<T>,
}

/// A single-message bit-interval transfer (see [`crate::bits`]).
pub struct WordMsg {
    pub target: usize,
    pub words: Vec<u64>,
}

pub struct Context {
    world: SimpleCommunicator,
    subs: Vec<SimpleCommunicator>,
    world_size: usize,
    workers_per_node: usize,
    traffic: RefCell<Traffic>,
}

impl Context {
    pub fn new(universe: &Universe) -> Self {
        let world = universe.world();
        let world_size = world.size() as usize;

        // Workers sharing a physical node are resolved by exchanging a hash
        // of the processor name.
        let mut hasher = DefaultHasher::new();
        mpi::environment::processor_name()
            .unwrap_or_default()
            .hash(&mut hasher);
        let name_hash = hasher.finish();

        let mut hashes = vec![0u64; world_size];
        world.all_gather_into(&name_hash, &mut hashes[..]);
        let mine = hashes[world.rank() as usize];
        let workers_per_node = hashes.iter().filter(|&&h| h == mine).count().max(1);

        Self {
            world,
            subs: Vec::new(),
            world_size,
            workers_per_node,
            traffic: RefCell::new(Traffic::default()),
        }
    }

    /// The active communicator.
    #[inline]
    fn comm(&self) -> &SimpleCommunicator {
        self.subs.last().unwrap_or(&self.world)
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.comm().rank() as usize
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.comm().size() as usize
    }

    #[inline]
    pub fn is_master(&self) -> bool {
        self.rank() == 0
    }

    pub fn num_workers_per_node(&self) -> usize {
        self.workers_per_node
    }

    pub fn num_nodes(&self) -> usize {
        self.world_size / self.workers_per_node
    }

    fn node_rank(&self, worker: usize) -> usize {
        worker / self.workers_per_node
    }

    fn same_node_as(&self, other: usize) -> bool {
        self.node_rank(self.rank()) == self.node_rank(other)
    }

    /// Wall-clock seconds from the substrate's timer.
    pub fn time(&self) -> f64 {
        mpi::time()
    }

    // --- communicator stack ---

    /// Makes `comm` the active communicator; rank and size now refer to it.
    pub fn set_comm(&mut self, comm: SimpleCommunicator) {
        self.subs.push(comm);
    }

    /// Restores the previously active communicator and frees the current one.
    pub fn restore_comm(&mut self) {
        self.subs.pop();
    }

    /// Creates communicators for ranks `[0, split)` and `[split, P)` of the
    /// active communicator. Collective; every worker receives the
    /// communicator it is a member of.
    pub fn split_at(
        &self,
        split: usize,
    ) -> (Option<SimpleCommunicator>, Option<SimpleCommunicator>) {
        let comm = self.comm();
        let group = comm.group();
        let ranks: Vec<Rank> = (0..split as Rank).collect();
        let left = group.include(&ranks);
        let right = group.exclude(&ranks);
        (
            comm.split_by_subgroup_collective(&left),
            comm.split_by_subgroup_collective(&right),
        )
    }

    // --- point-to-point ---

    pub fn send<T: Equivalence>(&self, buf: &[T], target: usize, tag: Tag) {
        self.comm()
            .process_at_rank(target as Rank)
            .send_with_tag(buf, tag);
        self.count_tx(target, mem::size_of_val(buf) as u64);
    }

    pub fn recv_into<T: Equivalence>(&self, buf: &mut [T], source: usize, tag: Tag) -> Status {
        let status = self
            .comm()
            .process_at_rank(source as Rank)
            .receive_into_with_tag(buf, tag);
        self.count_rx(source, mem::size_of_val(buf) as u64);
        status
    }

    pub fn recv_vec<T: Equivalence>(&self, source: usize, tag: Tag) -> Vec<T> {
        let (v, _status): (Vec<T>, Status) = self
            .comm()
            .process_at_rank(source as Rank)
            .receive_vec_with_tag(tag);
        self.count_rx(source, (v.len() * mem::size_of::<T>()) as u64);
        v
    }

    /// Blocks until a message with `tag` is available from any worker.
    pub fn probe<T: Equivalence>(&self, tag: Tag) -> ProbeResult {
        let status = self.comm().any_process().probe_with_tag(tag);
        ProbeResult {
            sender: status.source_rank() as usize,
            size: status.count(T::equivalent_datatype()) as usize,
        }
    }

    /// Blocks until a message with `tag` is available from `source`.
    pub fn probe_from<T: Equivalence>(&self, source: usize, tag: Tag) -> ProbeResult {
        let status = self
            .comm()
            .process_at_rank(source as Rank)
            .probe_with_tag(tag);
        ProbeResult {
            sender: status.source_rank() as usize,
            size: status.count(T::equivalent_datatype()) as usize,
        }
    }

    /// Posts a non-blocking send inside a request scope. The buffer must
    /// outlive the scope; the caller retires the request via its collection.
    pub fn immediate_send<'b, Sc, T>(
        &self,
        scope: Sc,
        buf: &'b [T],
        target: usize,
        tag: Tag,
    ) -> mpi::request::Request<'b, [T], Sc>
    where
        Sc: Scope<'b>,
        T: Equivalence,
    {
        self.count_tx(target, mem::size_of_val(buf) as u64);
        self.comm()
            .process_at_rank(target as Rank)
            .immediate_send_with_tag(scope, buf, tag)
    }

    // --- collectives ---

    pub fn synchronize(&self) {
        self.comm().barrier();
    }

    /// Element-wise all-reduce, in place.
    pub fn all_reduce<T: Equivalence + Default + Copy>(&self, v: &mut [T], op: SystemOperation) {
        let mut rbuf = vec![T::default(); v.len()];
        self.comm().all_reduce_into(&v[..], &mut rbuf[..], op);
        v.copy_from_slice(&rbuf);
        self.simulate_allreduce_traffic((4 + mem::size_of_val(v)) as u64);
    }

    /// Inclusive prefix sum, in place.
    pub fn scan(&self, v: &mut [u64]) {
        let mut rbuf = vec![0u64; v.len()];
        self.comm()
            .scan_into(&v[..], &mut rbuf[..], SystemOperation::sum());
        v.copy_from_slice(&rbuf);
        self.simulate_scan_traffic((4 + mem::size_of_val(v)) as u64);
    }

    /// Exclusive prefix sum, in place: worker `j` ends up with the
    /// element-wise sum over ranks `[0, j)`; rank 0 holds zeroes.
    pub fn ex_scan(&self, v: &mut [u64]) {
        let mut rbuf = vec![0u64; v.len()];
        self.comm()
            .exclusive_scan_into(&v[..], &mut rbuf[..], SystemOperation::sum());
        if self.rank() == 0 {
            // MPI leaves the receive buffer undefined on the first rank
            rbuf.fill(0);
        }
        v.copy_from_slice(&rbuf);
        self.simulate_scan_traffic((4 + mem::size_of_val(v)) as u64);
    }

    // --- phase-scoped distribution ---

    /// Posts all transactions of `outbox` as non-blocking sends, then blocks
    /// on probes until `expect` payload items have been absorbed. Send
    /// buffers stay alive for the whole call; the caller still barriers
    /// before reusing the channel.
    pub fn distribute<T: Equivalence>(
        &self,
        outbox: &[DataMsg<T>],
        tag: Tag,
        expect: u64,
        mut absorb: impl FnMut(u64, &[T]),
    ) {
        mpi::request::multiple_scope(outbox.len().max(1), |hscope, hcoll: &mut RequestCollection<'_, [u64]>| {
            mpi::request::multiple_scope(outbox.len().max(1), |pscope, pcoll: &mut RequestCollection<'_, [T]>| {
                // header and payload are posted back to back per
                // transaction; point-to-point FIFO keeps them adjacent even
                // when one target receives several transactions
                for msg in outbox {
                    hcoll.add(self.immediate_send(hscope, &msg.header[..], msg.target, tag));
                    pcoll.add(self.immediate_send(pscope, &msg.payload[..], msg.target, tag));
                }

                let mut received = 0u64;
                while received < expect {
                    let probe = self.probe::<u64>(tag);
                    debug_assert_eq!(probe.size, 2);

                    let mut header = [0u64; 2];
                    self.recv_into(&mut header[..], probe.sender, tag);

                    let payload: Vec<T> = self.recv_vec(probe.sender, tag);
                    debug_assert_eq!(payload.len() as u64, header[1]);

                    absorb(header[0], &payload);
                    received += header[1];
                }
                assert_eq!(received, expect);

                let mut done = Vec::new();
                pcoll.wait_all(&mut done);
            });

            let mut done = Vec::new();
            hcoll.wait_all(&mut done);
        });
    }

    /// Like [`Context::distribute`], but for single-message bit-interval
    /// transfers. `absorb` decodes one message and returns the number of
    /// bits it contained; the call returns once `expect_bits` have arrived.
    pub fn distribute_words(
        &self,
        outbox: &[WordMsg],
        tag: Tag,
        expect_bits: u64,
        mut absorb: impl FnMut(&[u64]) -> u64,
    ) {
        mpi::request::multiple_scope(outbox.len().max(1), |scope, coll: &mut RequestCollection<'_, [u64]>| {
            for msg in outbox {
                coll.add(self.immediate_send(scope, &msg.words[..], msg.target, tag));
            }

            let mut received = 0u64;
            while received < expect_bits {
                let probe = self.probe::<u64>(tag);
                let words: Vec<u64> = self.recv_vec(probe.sender, tag);
                debug_assert!(words.len() >= 3);
                received += absorb(&words);
            }
            assert_eq!(received, expect_bits);

            let mut done = Vec::new();
            coll.wait_all(&mut done);
        });
    }

    // --- instrumentation ---

    pub fn local_traffic(&self) -> Traffic {
        *self.traffic.borrow()
    }

    /// Sums the traffic counters over all workers of the world.
    pub fn gather_traffic(&self) -> Traffic {
        let t = *self.traffic.borrow();
        let local = [t.tx, t.rx, t.tx_est, t.rx_est, t.tx_shm, t.rx_shm];
        let mut total = [0u64; 6];
        self.world
            .all_reduce_into(&local[..], &mut total[..], SystemOperation::sum());
        Traffic {
            tx: total[0],
            rx: total[1],
            tx_est: total[2],
            rx_est: total[3],
            tx_shm: total[4],
            rx_shm: total[5],
        }
    }

    fn count_tx(&self, target: usize, bytes: u64) {
        let mut t = self.traffic.borrow_mut();
        if self.same_node_as(target) {
            t.tx_shm += bytes;
        } else {
            t.tx += bytes;
        }
    }

    fn count_rx(&self, source: usize, bytes: u64) {
        let mut t = self.traffic.borrow_mut();
        if self.same_node_as(source) {
            t.rx_shm += bytes;
        } else {
            t.rx += bytes;
        }
    }

    fn count_tx_est(&self, bytes: u64) {
        self.traffic.borrow_mut().tx_est += bytes;
    }

    fn count_rx_est(&self, bytes: u64) {
        self.traffic.borrow_mut().rx_est += bytes;
    }

    // Models an all-reduce as a reduction followed by a broadcast over a
    // binary merge tree.
    fn simulate_allreduce_traffic(&self, msg_size: u64) {
        let logp = crate::wt::ceil_log2(self.num_workers());
        let rank = self.rank();
        for level in 0..logp {
            let q = 1usize << level;
            let v = rank / q;

            if v % 2 == 0 && level + 1 < logp {
                // reduction: send to the right sibling;
                // broadcast: receive back from it
                self.count_tx_est(msg_size);
                self.count_rx_est(msg_size);
            }

            if level > 0 {
                // reduction: receive from the left sibling of the previous
                // level; broadcast: send back to it
                self.count_rx_est(msg_size);
                self.count_tx_est(msg_size);
            }
        }
    }

    fn simulate_scan_traffic(&self, msg_size: u64) {
        let logp = crate::wt::ceil_log2(self.num_workers());
        let rank = self.rank();
        for level in 0..logp {
            let q = 1usize << level;
            let v = rank / q;

            if v % 2 == 0 && level + 1 < logp {
                self.count_tx_est(msg_size);
                if rank > 0 {
                    self.count_tx_est(msg_size);
                }
            }

            if level > 0 {
                self.count_rx_est(msg_size);
                if v % 2 == 0 {
                    self.count_tx_est(msg_size);
                }
            }
        }
    }
}

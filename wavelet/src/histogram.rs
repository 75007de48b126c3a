//! Distributed symbol histogram.
//!
//! Byte alphabets take the fast path: a 256-slot counter and a single SUM
//! all-reduce. Wider alphabets use per-worker hash maps merged in a
//! butterfly pattern: ⌈log₂ P⌉ bottom-up rounds concentrate the counts on
//! the last worker, then the merged map is propagated back down the same
//! tree. Afterwards every worker holds the identical entry list, sorted by
//! symbol.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context as _, Result};
use mpi::collective::SystemOperation;
use mpi::Tag;

use crate::context::Context;
use crate::input::FilePartitionReader;
use crate::sym::Symbol;
use crate::wt::ceil_log2;

const TAG_SYMS: Tag = 900;
const TAG_OCCS: Tag = 901;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Histogram<S: Symbol> {
    entries: Vec<(S, u64)>,
}

fn extract_map<S: Symbol>(map: &HashMap<S, u64>) -> (Vec<S>, Vec<u64>) {
    let mut syms = Vec::with_capacity(map.len());
    let mut occs = Vec::with_capacity(map.len());
    for (&sym, &occ) in map {
        syms.push(sym);
        occs.push(occ);
    }
    (syms, occs)
}

impl<S: Symbol> Histogram<S> {
    /// Builds the global histogram of the distributed input.
    pub fn compute(
        ctx: &Context,
        input: &FilePartitionReader<S>,
        rdbufsize: usize,
    ) -> Result<Self> {
        if S::WIDTH == 1 {
            Self::compute_byte(ctx, input, rdbufsize)
        } else {
            Self::compute_general(ctx, input, rdbufsize)
        }
    }

    fn compute_byte(
        ctx: &Context,
        input: &FilePartitionReader<S>,
        rdbufsize: usize,
    ) -> Result<Self> {
        const SIGMA_MAX: usize = 256;

        let mut hist = vec![0u64; SIGMA_MAX];
        input.process_local(rdbufsize, |c| {
            hist[c.to_u64() as usize] += 1;
        })?;

        ctx.all_reduce(&mut hist, SystemOperation::sum());

        let entries = hist
            .iter()
            .enumerate()
            .filter(|(_, &occ)| occ > 0)
            .map(|(c, &occ)| (S::from_u64(c as u64), occ))
            .collect();
        Ok(Self { entries })
    }

    fn compute_general(
        ctx: &Context,
        input: &FilePartitionReader<S>,
        rdbufsize: usize,
    ) -> Result<Self> {
        let mut local: HashMap<S, u64> = HashMap::new();
        input.process_local(rdbufsize, |c| {
            *local.entry(c).or_insert(0) += 1;
        })?;

        let rank = ctx.rank();
        let p = ctx.num_workers();
        let last = rank == p - 1;
        let logp = ceil_log2(p);

        // bottom-up: merge towards the last worker
        for lv in 0..logp {
            let d = 1usize << lv;
            let mask = d - 1;

            // on the bottom level every worker is active; the last worker is
            // always active; otherwise the level mask decides
            if lv == 0 || last || (rank & mask) == mask {
                let lv_rank = rank >> lv;
                if lv_rank & 1 == 1 {
                    // odd: receive from the left neighbor's representative
                    let ln = (lv_rank - 1) * d + mask;
                    let syms: Vec<S> = ctx.recv_vec(ln, TAG_SYMS);
                    let occs: Vec<u64> = ctx.recv_vec(ln, TAG_OCCS);
                    for (sym, occ) in syms.into_iter().zip(occs) {
                        *local.entry(sym).or_insert(0) += occ;
                    }
                } else {
                    // even: send to the right neighbor
                    let rn = (rank + d).min(p - 1);
                    if rn != rank {
                        let (syms, occs) = extract_map(&local);
                        ctx.send(&syms, rn, TAG_SYMS);
                        ctx.send(&occs, rn, TAG_OCCS);
                    }
                }
            }
        }

        // top-down: propagate the merged map back
        for lv in (0..logp).rev() {
            let d = 1usize << lv;
            let mask = d - 1;

            if lv == 0 || last || (rank & mask) == mask {
                let lv_rank = rank >> lv;
                if lv_rank & 1 == 1 {
                    // odd: send to the left neighbor's representative
                    let ln = (lv_rank - 1) * d + mask;
                    let (syms, occs) = extract_map(&local);
                    ctx.send(&syms, ln, TAG_SYMS);
                    ctx.send(&occs, ln, TAG_OCCS);
                } else {
                    // even: receive the merged map from the right neighbor
                    let rn = (rank + d).min(p - 1);
                    if rn != rank {
                        let syms: Vec<S> = ctx.recv_vec(rn, TAG_SYMS);
                        let occs: Vec<u64> = ctx.recv_vec(rn, TAG_OCCS);
                        local.clear();
                        for (sym, occ) in syms.into_iter().zip(occs) {
                            local.insert(sym, occ);
                        }
                    }
                }
            }
        }

        let mut entries: Vec<(S, u64)> = local.into_iter().collect();
        entries.sort_by_key(|e| e.0);
        Ok(Self { entries })
    }

    /// A histogram from raw `(symbol, count)` pairs, sorted by symbol.
    pub fn from_entries(mut entries: Vec<(S, u64)>) -> Self {
        entries.sort_by_key(|e| e.0);
        Self { entries }
    }

    /// A histogram counted from an in-memory text (used by tests and the
    /// verification tools).
    pub fn of_text(text: &[S]) -> Self {
        let mut map: HashMap<S, u64> = HashMap::new();
        for &c in text {
            *map.entry(c).or_insert(0) += 1;
        }
        Self::from_entries(map.into_iter().collect())
    }

    pub fn entries(&self) -> &[(S, u64)] {
        &self.entries
    }

    /// Number of distinct symbols σ.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// C array: `C[0] = 0`, `C[i] = C[i-1] + count(i-1)`; `C[σ]` is the text
    /// length.
    pub fn compute_c(&self) -> Vec<u64> {
        let mut c = Vec::with_capacity(self.entries.len() + 1);
        c.push(0);
        for (_, occ) in &self.entries {
            c.push(c.last().unwrap() + occ);
        }
        c
    }

    pub fn text_length(&self) -> u64 {
        self.entries.iter().map(|(_, occ)| occ).sum()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut buf = Vec::with_capacity(8 + self.entries.len() * (S::WIDTH + 8));
        buf.extend_from_slice(&(self.entries.len() as u64).to_le_bytes());
        for &(sym, occ) in &self.entries {
            sym.append_le(&mut buf);
            buf.extend_from_slice(&occ.to_le_bytes());
        }
        File::create(path)
            .with_context(|| format!("cannot create histogram file {}", path.display()))?
            .write_all(&buf)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut buf = Vec::new();
        File::open(path)
            .with_context(|| format!("cannot open histogram file {}", path.display()))?
            .read_to_end(&mut buf)?;

        anyhow::ensure!(buf.len() >= 8, "truncated histogram file {}", path.display());
        let num = u64::from_le_bytes(buf[..8].try_into()?);

        let mut entries = Vec::with_capacity(num as usize);
        let mut pos = 8;
        for _ in 0..num {
            let sym = S::read_le(&buf[pos..pos + S::WIDTH]);
            pos += S::WIDTH;
            let occ = u64::from_le_bytes(buf[pos..pos + 8].try_into()?);
            pos += 8;
            entries.push((sym, occ));
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mississippi() -> Histogram<u8> {
        Histogram::of_text(b"mississippi$")
    }

    #[test]
    fn counts_and_order() {
        let hist = mississippi();
        assert_eq!(
            hist.entries(),
            &[(b'$', 1), (b'i', 4), (b'm', 1), (b'p', 2), (b's', 4)]
        );
        assert_eq!(hist.size(), 5);
        assert_eq!(hist.text_length(), 12);
    }

    #[test]
    fn c_array() {
        let hist = mississippi();
        assert_eq!(hist.compute_c(), vec![0, 1, 5, 6, 8, 12]);
    }

    #[test]
    fn extract_map_pairs_stay_aligned() {
        let mut map = HashMap::new();
        map.insert(3u16, 7u64);
        map.insert(9u16, 1u64);
        let (syms, occs) = extract_map(&map);
        let rebuilt: HashMap<u16, u64> = syms.into_iter().zip(occs).collect();
        assert_eq!(rebuilt, map);
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("text.hist");

        let hist = mississippi();
        hist.save(&path).unwrap();
        assert_eq!(Histogram::<u8>::load(&path).unwrap(), hist);
    }

    #[test]
    fn save_load_wide_symbols() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.hist");

        let hist = Histogram::<u16>::from_entries(vec![(999, 3), (4, 17), (260, 1)]);
        hist.save(&path).unwrap();
        let back = Histogram::<u16>::load(&path).unwrap();
        assert_eq!(back.entries(), &[(4, 17), (260, 1), (999, 3)]);
    }
}

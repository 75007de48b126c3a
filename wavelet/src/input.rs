//! Balanced input partitioning.
//!
//! The input is split into `P` ranges of `W = ⌈S/P⌉` symbols; the last
//! worker may hold fewer. `W` is the global block size used everywhere to
//! map a global offset to its target worker.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::context::Context;
use crate::sym::Symbol;

pub struct FilePartitionReader<S: Symbol> {
    filename: PathBuf,
    total_size: u64,
    size_per_worker: u64,
    rank: usize,
    local_offset: u64,
    local_num: u64,
    local_file: Option<PathBuf>,
    _sym: PhantomData<S>,
}

impl<S: Symbol> FilePartitionReader<S> {
    pub fn new(ctx: &Context, filename: impl Into<PathBuf>, prefix: u64) -> Result<Self> {
        Self::with_workers(filename, prefix, ctx.num_workers(), ctx.rank())
    }

    pub fn with_workers(
        filename: impl Into<PathBuf>,
        prefix: u64,
        num_workers: usize,
        rank: usize,
    ) -> Result<Self> {
        let filename = filename.into();
        let bytes = std::fs::metadata(&filename)
            .with_context(|| format!("cannot stat input file {}", filename.display()))?
            .len();

        let total_size = (bytes / S::WIDTH as u64).min(prefix);
        let p = num_workers as u64;
        let size_per_worker = (total_size + p - 1) / p;

        let local_offset = size_per_worker * rank as u64;
        let local_end = (local_offset + size_per_worker).min(total_size);
        let local_num = local_end.saturating_sub(local_offset);

        Ok(Self {
            filename,
            total_size,
            size_per_worker,
            rank,
            local_offset,
            local_num,
            local_file: None,
            _sym: PhantomData,
        })
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Total number of symbols processed across all workers.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// The global block size `W`.
    pub fn size_per_worker(&self) -> u64 {
        self.size_per_worker
    }

    pub fn local_offset(&self) -> u64 {
        self.local_offset
    }

    pub fn local_num(&self) -> u64 {
        self.local_num
    }

    /// Streams the local partition into `<base>.part.<rank>` so later passes
    /// read from node-local storage. Returns `false` if already extracted.
    pub fn extract_local(&mut self, base: &Path, bufsize: usize) -> Result<bool> {
        if self.local_file.is_some() {
            return Ok(false);
        }

        let local = PathBuf::from(format!("{}.part.{}", base.display(), self.rank));
        let mut src = File::open(&self.filename)
            .with_context(|| format!("cannot open input file {}", self.filename.display()))?;
        src.seek(SeekFrom::Start(self.local_offset * S::WIDTH as u64))?;
        let mut dst = File::create(&local)
            .with_context(|| format!("cannot create part file {}", local.display()))?;

        let bufsize = bufsize.max(1);
        let mut buf = vec![0u8; bufsize * S::WIDTH];
        let mut left = self.local_num as usize;

        while left > 0 {
            let num = bufsize.min(left);
            let bytes = num * S::WIDTH;
            src.read_exact(&mut buf[..bytes])?;
            dst.write_all(&buf[..bytes])?;
            left -= num;
        }

        self.local_file = Some(local);
        Ok(true)
    }

    /// Invokes `func` for every symbol of the local partition, reading
    /// through a bounded buffer of `bufsize` symbols.
    pub fn process_local(&self, bufsize: usize, mut func: impl FnMut(S)) -> Result<()> {
        let mut file = match &self.local_file {
            Some(local) => File::open(local)
                .with_context(|| format!("cannot open part file {}", local.display()))?,
            None => {
                let mut f = File::open(&self.filename).with_context(|| {
                    format!("cannot open input file {}", self.filename.display())
                })?;
                f.seek(SeekFrom::Start(self.local_offset * S::WIDTH as u64))?;
                f
            }
        };

        let bufsize = bufsize.max(1);
        let mut buf = vec![0u8; bufsize * S::WIDTH];
        let mut left = self.local_num as usize;

        while left > 0 {
            let num = bufsize.min(left);
            let bytes = num * S::WIDTH;
            file.read_exact(&mut buf[..bytes])?;
            for chunk in buf[..bytes].chunks_exact(S::WIDTH) {
                func(S::read_le(chunk));
            }
            left -= num;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn sample_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f
    }

    fn collect(r: &FilePartitionReader<u8>, bufsize: usize) -> Vec<u8> {
        let mut v = Vec::new();
        r.process_local(bufsize, |c| v.push(c)).unwrap();
        v
    }

    #[test]
    fn partition_bounds() {
        let f = sample_file(&[0u8; 100]);
        // W = ceil(100 / 3) = 34
        for (rank, expect) in [(0, 34), (1, 34), (2, 32)] {
            let r: FilePartitionReader<u8> =
                FilePartitionReader::with_workers(f.path(), u64::MAX, 3, rank).unwrap();
            assert_eq!(r.size_per_worker(), 34);
            assert_eq!(r.local_offset(), 34 * rank as u64);
            assert_eq!(r.local_num(), expect);
        }
    }

    #[test]
    fn prefix_caps_input() {
        let f = sample_file(&[7u8; 64]);
        let r: FilePartitionReader<u8> =
            FilePartitionReader::with_workers(f.path(), 10, 2, 1).unwrap();
        assert_eq!(r.total_size(), 10);
        assert_eq!(r.local_num(), 5);
    }

    #[test]
    fn bounded_reads_see_every_symbol() {
        let data: Vec<u8> = (0..=255).collect();
        let f = sample_file(&data);
        let r: FilePartitionReader<u8> =
            FilePartitionReader::with_workers(f.path(), u64::MAX, 4, 2).unwrap();
        for bufsize in [1, 7, 64, 1000] {
            assert_eq!(collect(&r, bufsize), &data[128..192]);
        }
    }

    #[test]
    fn extract_then_read() {
        let data: Vec<u8> = (0..100).collect();
        let f = sample_file(&data);
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("slice");

        let mut r: FilePartitionReader<u8> =
            FilePartitionReader::with_workers(f.path(), u64::MAX, 4, 1).unwrap();
        assert!(r.extract_local(&base, 8).unwrap());
        assert!(!r.extract_local(&base, 8).unwrap());
        assert!(dir.path().join("slice.part.1").exists());
        assert_eq!(collect(&r, 16), &data[25..50]);
    }

    #[test]
    fn wide_symbols_are_little_endian() {
        let mut bytes = Vec::new();
        for x in [0x0102u16, 0xbeef, 0x0042] {
            bytes.extend_from_slice(&x.to_le_bytes());
        }
        let f = sample_file(&bytes);
        let r: FilePartitionReader<u16> =
            FilePartitionReader::with_workers(f.path(), u64::MAX, 1, 0).unwrap();
        assert_eq!(r.total_size(), 3);
        let mut v = Vec::new();
        r.process_local(2, |c| v.push(c)).unwrap();
        assert_eq!(v, vec![0x0102, 0xbeef, 0x0042]);
    }
}

//! Level-keyed wavelet matrices.
//!
//! A wavelet matrix rearranges every level so that 0-bits precede 1-bits;
//! `z[L]` records the number of 0-bits on level `L`.

use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::bits::BitVec;
use crate::context::Context;
use crate::wt::{level_extension, Shape};

pub struct WaveletMatrix {
    shape: Shape,
    levels: Vec<BitVec>,
    z: Vec<u64>,
}

impl WaveletMatrix {
    pub fn from_levels(shape: Shape, levels: Vec<BitVec>, z: Vec<u64>) -> Self {
        assert_eq!(levels.len(), shape.height());
        assert_eq!(z.len(), shape.height());
        Self { shape, levels, z }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn sigma(&self) -> usize {
        self.shape.sigma()
    }

    pub fn height(&self) -> usize {
        self.shape.height()
    }

    pub fn levels(&self) -> &[BitVec] {
        &self.levels
    }

    pub fn z(&self) -> &[u64] {
        &self.z
    }

    /// Writes one `<output><rank>.lv_<L+1>` file per level.
    pub fn save(&self, ctx: &Context, output: &str) -> Result<()> {
        for (level, bv) in self.levels.iter().enumerate() {
            let filename =
                format!("{}{:04}.{}", output, ctx.rank(), level_extension(level));
            crate::wt::write_bit_file(filename, bv)?;
        }
        Ok(())
    }

    /// Writes the `z` vector as raw words; only the master should call this.
    pub fn save_z(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut buf = Vec::with_capacity(self.z.len() * 8);
        for zl in &self.z {
            buf.extend_from_slice(&zl.to_le_bytes());
        }
        File::create(path)
            .with_context(|| format!("cannot create z file {}", path.display()))?
            .write_all(&buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::Histogram;
    use crate::wt::sequential::wm_pc;

    #[test]
    fn z_file_format() {
        let text = b"mississippi$";
        let hist = Histogram::of_text(text);
        let ea = crate::alphabet::EffectiveAlphabet::new(&hist);
        let mut etext = text.to_vec();
        ea.transform_slice(&mut etext);

        let shape = Shape::new(hist.size());
        let (levels, z) = wm_pc(&shape, &etext);
        let wm = WaveletMatrix::from_levels(shape, levels, z.clone());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.z");
        wm.save_z(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8 * shape.height());
        for (level, chunk) in bytes.chunks_exact(8).enumerate() {
            assert_eq!(u64::from_le_bytes(chunk.try_into().unwrap()), z[level]);
        }
    }
}

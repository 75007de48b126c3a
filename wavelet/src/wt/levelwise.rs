//! Level-keyed wavelet trees: the terminal, balanced output layout.

use anyhow::Result;

use crate::bits::BitVec;
use crate::context::Context;
use crate::wt::{level_extension, Shape};

pub struct WaveletTreeLevelwise {
    shape: Shape,
    levels: Vec<BitVec>,
}

impl WaveletTreeLevelwise {
    pub fn from_levels(shape: Shape, levels: Vec<BitVec>) -> Self {
        assert_eq!(levels.len(), shape.height());
        Self { shape, levels }
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

    /// The local share of each level's bit vector.
    pub fn levels(&self) -> &[BitVec] {
        &self.levels
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
}

#[cfg(test)]
mod tests {
    use crate::bits::BitVec;
    use crate::wt::{read_bit_file, write_bit_file};

    #[test]
    fn bit_file_is_msb_first_within_word() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bits.lv_1");

        let mut bv = BitVec::zeroed(12);
        bv.set(0, true);
        bv.set(11, true);
        write_bit_file(&path, &bv).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8);
        let word = u64::from_le_bytes(bytes.try_into().unwrap());
        // bit 0 occupies position 63, bit 11 position 52
        assert_eq!(word, (1u64 << 63) | (1u64 << 52));
    }

    #[test]
    fn bit_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bits.lv_2");

        let bv: BitVec = (0..555).map(|i| i % 7 == 2).collect();
        write_bit_file(&path, &bv).unwrap();
        assert_eq!(read_bit_file(&path, 555).unwrap(), bv);
    }
}

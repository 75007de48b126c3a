//! Symbol types storable in a wavelet tree.
//!
//! The common case is the 8-bit alphabet; wider unsigned types cover texts
//! over effective ranks that do not fit a byte. On disk a symbol occupies
//! `WIDTH` little-endian bytes.

use std::fmt::Debug;
use std::hash::Hash;

use mpi::datatype::Equivalence;

pub trait Symbol:
    Equivalence + Copy + Ord + Hash + Debug + Default + Send + Sync + 'static
{
    const WIDTH: usize;

    fn to_u64(self) -> u64;
    fn from_u64(x: u64) -> Self;

    /// Reads one symbol from the first `WIDTH` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Appends the `WIDTH`-byte little-endian form.
    fn append_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_symbol {
    ($t:ty, $w:expr) => {
        impl Symbol for $t {
            const WIDTH: usize = $w;

            #[inline]
            fn to_u64(self) -> u64 {
                self as u64
            }

            #[inline]
            fn from_u64(x: u64) -> Self {
                x as $t
            }

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; $w];
                buf.copy_from_slice(&bytes[..$w]);
                <$t>::from_le_bytes(buf)
            }

            #[inline]
            fn append_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    };
}

impl_symbol!(u8, 1);
impl_symbol!(u16, 2);
impl_symbol!(u32, 4);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_roundtrip() {
        let mut buf = Vec::new();
        0xabu8.append_le(&mut buf);
        assert_eq!(buf, [0xab]);
        assert_eq!(u8::read_le(&buf), 0xab);
    }

    #[test]
    fn wide_roundtrip() {
        let mut buf = Vec::new();
        0x1234u16.append_le(&mut buf);
        0xdeadbeefu32.append_le(&mut buf);
        assert_eq!(u16::read_le(&buf), 0x1234);
        assert_eq!(u32::read_le(&buf[2..]), 0xdeadbeef);
    }
}

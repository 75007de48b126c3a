//! Effective alphabet transformation.
//!
//! Maps the original symbols to dense ranks `[0, σ)` in sorted order. Every
//! worker derives the identical mapping from the global histogram.

use std::collections::HashMap;

use anyhow::Result;

use crate::histogram::Histogram;
use crate::input::FilePartitionReader;
use crate::sym::Symbol;

pub struct EffectiveAlphabet<S: Symbol> {
    map: HashMap<S, S>,
}

impl<S: Symbol> EffectiveAlphabet<S> {
    pub fn new(hist: &Histogram<S>) -> Self {
        let map = hist
            .entries()
            .iter()
            .enumerate()
            .map(|(rank, &(sym, _))| (sym, S::from_u64(rank as u64)))
            .collect();
        Self { map }
    }

    /// The effective rank of an input symbol. The symbol must occur in the
    /// histogram the mapping was built from.
    #[inline]
    pub fn esym(&self, c: S) -> S {
        self.map[&c]
    }

    /// Streams the transformed local partition into `processor`.
    pub fn transform(
        &self,
        input: &FilePartitionReader<S>,
        rdbufsize: usize,
        mut processor: impl FnMut(S),
    ) -> Result<()> {
        input.process_local(rdbufsize, |c| processor(self.esym(c)))
    }

    /// Reads and transforms the whole local partition into memory.
    pub fn transform_to_vec(
        &self,
        input: &FilePartitionReader<S>,
        rdbufsize: usize,
    ) -> Result<Vec<S>> {
        let mut etext = Vec::with_capacity(input.local_num() as usize);
        self.transform(input, rdbufsize, |x| etext.push(x))?;
        Ok(etext)
    }

    /// Transforms an in-memory text in place.
    pub fn transform_slice(&self, text: &mut [S]) {
        for c in text {
            *c = self.esym(*c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_ranks_in_sorted_order() {
        let hist = Histogram::of_text(b"mississippi$");
        let ea = EffectiveAlphabet::new(&hist);
        assert_eq!(ea.esym(b'$'), 0);
        assert_eq!(ea.esym(b'i'), 1);
        assert_eq!(ea.esym(b'm'), 2);
        assert_eq!(ea.esym(b'p'), 3);
        assert_eq!(ea.esym(b's'), 4);
    }

    #[test]
    fn slice_transform() {
        let hist = Histogram::of_text(b"abba");
        let ea = EffectiveAlphabet::new(&hist);
        let mut text = *b"abba";
        ea.transform_slice(&mut text);
        assert_eq!(text, [0, 1, 1, 0]);
    }
}

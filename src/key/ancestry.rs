use std::iter::FusedIterator;

use super::Key;

/// Root-first iterator over a key's ancestry chain, ending with the key itself.
///
/// Walks the parent links once on construction; yields borrowed keys.
pub struct Ancestry<'a> {
    chain: Vec<&'a Key>,
}

impl<'a> Ancestry<'a> {
    pub(super) fn new(leaf: &'a Key) -> Self {
        let mut chain = Vec::new();
        let mut current = Some(leaf);
        while let Some(key) = current {
            chain.push(key);
            current = key.parent();
        }
        Ancestry { chain }
    }
}

impl<'a> Iterator for Ancestry<'a> {
    type Item = &'a Key;

    fn next(&mut self) -> Option<Self::Item> {
        self.chain.pop()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.chain.len(), Some(self.chain.len()))
    }
}

impl ExactSizeIterator for Ancestry<'_> {}

impl FusedIterator for Ancestry<'_> {}

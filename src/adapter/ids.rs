use std::iter::FusedIterator;

/// A block of freshly allocated ids: `count` strictly increasing integers.
///
/// Single pass. Once exhausted it stays empty; allocate again for more ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdRange {
    next: i64,
    remaining: usize,
}

impl IdRange {
    /// Ids `first ..= first + count - 1`, or `None` if that runs past `i64::MAX`.
    pub fn new(first: i64, count: usize) -> Option<Self> {
        if count > 0 {
            let span = i64::try_from(count - 1).ok()?;
            first.checked_add(span)?;
        }
        Some(IdRange {
            next: first,
            remaining: count,
        })
    }

    /// The `count` ids following `last`, which is the highest id already taken.
    pub fn after(last: i64, count: usize) -> Option<Self> {
        if count == 0 {
            return Some(IdRange::empty());
        }
        IdRange::new(last.checked_add(1)?, count)
    }

    pub fn empty() -> Self {
        IdRange {
            next: 0,
            remaining: 0,
        }
    }

    /// The next id without consuming it.
    pub fn peek(&self) -> Option<i64> {
        (self.remaining > 0).then_some(self.next)
    }

    /// The highest id in the block.
    pub fn last_id(&self) -> Option<i64> {
        // in range: checked in `new`
        (self.remaining > 0).then(|| self.next + (self.remaining as i64 - 1))
    }
}

impl Iterator for IdRange {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let id = self.peek()?;
        self.remaining -= 1;
        self.next = self.next.saturating_add(1);
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for IdRange {}

impl FusedIterator for IdRange {}

//! Byte ranges and sets of byte ranges of a file.
//!
//! A [`Region`] is used to track what is still missing from a file, or what
//! is left to process of it. Subtracting the ranges that were obtained from
//! a region covering the whole file leaves exactly the bytes that still
//! have to be requested.

/// Half-open interval `[left, right)` of byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Range {
    pub left: u64,
    pub right: u64,
}

impl Range {
    pub fn make(left: u64, right: u64) -> Self {
        assert!(left <= right, "range [{left}, {right}) is inverted");
        Self { left, right }
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.right - self.left
    }

    pub fn is_empty(&self) -> bool {
        self.left == self.right
    }

    /// The bytes shared by both ranges, if any.
    pub fn intersect(&self, other: &Range) -> Option<Range> {
        let left = self.left.max(other.left);
        let right = self.right.min(other.right);
        (left < right).then_some(Range { left, right })
    }

    fn sub(a: Range, b: Range, out: &mut Vec<Range>) {
        // [    a    )
        //   [ b )      -> [ )   [ )
        if a.left < b.left && a.right > b.right {
            out.push(Range::make(a.left, b.left));
            out.push(Range::make(b.right, a.right));
        }
        // [ a )
        //       [ b )  -> [ a )
        else if a.right <= b.left || b.right <= a.left {
            out.push(a);
        }
        // [ a   )
        //    [ b )     -> [  )
        else if b.left > a.left && b.left < a.right {
            out.push(Range::make(a.left, b.left));
        }
        //    [ a   )
        // [ b )        ->     [  )
        else if b.right > a.left && b.right < a.right {
            out.push(Range::make(b.right, a.right));
        }
        // b covers a entirely
    }
}

impl From<std::ops::Range<u64>> for Range {
    fn from(value: std::ops::Range<u64>) -> Self {
        Range::make(value.start, value.end)
    }
}

/// An ordered set of [`Range`]s.
///
/// Ranges are kept in the order they were produced and are never merged,
/// two adjacent ranges stay two ranges.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Region {
    segments: Vec<Range>,
}

impl Region {
    pub fn new(range: Range) -> Self {
        Self { segments: vec![range] }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Range> {
        self.segments.iter()
    }

    pub fn ranges(&self) -> &[Range] {
        &self.segments
    }

    /// Amount of bytes covered by all ranges.
    pub fn total(&self) -> u64 {
        self.segments.iter().map(Range::len).sum()
    }

    /// Remove `seq` from every range of this region.
    pub fn sub(&self, seq: Range) -> Region {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        for range in &self.segments {
            Range::sub(*range, seq, &mut segments);
        }
        Region { segments }
    }

    /// Truncate the single range of this region to `size` bytes.
    ///
    /// # Panics
    /// If the region does not hold exactly one range.
    pub fn shrink_end(&self, size: u64) -> Region {
        assert_eq!(self.segments.len(), 1, "shrink_end on a region of arity != 1");
        let range = self.segments[0];
        Region::new(Range::make(range.left, range.left + size))
    }

    /// Left bound of the single range of this region.
    ///
    /// # Panics
    /// If the region does not hold exactly one range.
    pub fn begin(&self) -> u64 {
        assert_eq!(self.segments.len(), 1, "begin on a region of arity != 1");
        self.segments[0].left
    }
}

impl From<Range> for Region {
    fn from(value: Range) -> Self {
        Region::new(value)
    }
}

impl From<Vec<Range>> for Region {
    fn from(segments: Vec<Range>) -> Self {
        Self { segments }
    }
}

impl FromIterator<Range> for Region {
    fn from_iter<T: IntoIterator<Item = Range>>(iter: T) -> Self {
        Self { segments: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a Region {
    type Item = &'a Range;
    type IntoIter = std::slice::Iter<'a, Range>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

//! Point edits against a contig reference

use crate::sequence::reverse_complement;
use std::ops::Range;

/// Alternate allele of a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Alt {
    /// Full replacement bases
    Seq(Vec<u8>),
    /// Only the replacement length is retained
    Span(usize),
}

impl Alt {
    /// Number of replacement bases.
    pub fn len(&self) -> usize {
        match self {
            Alt::Seq(seq) => seq.len(),
            Alt::Span(len) => *len,
        }
    }

    /// Returns `true` for an empty replacement (a deletion).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn split_at(&self, at: usize) -> (Alt, Alt) {
        match self {
            Alt::Seq(seq) => (Alt::Seq(seq[..at].to_vec()), Alt::Seq(seq[at..].to_vec())),
            Alt::Span(len) => (Alt::Span(at), Alt::Span(len - at)),
        }
    }
}

/// Kind of edit, derived from the reference and alternate lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Substitution,
    Insertion,
    Deletion,
}

/// An edit replacing reference interval `[start, end)` of a contig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub(crate) range: Range<usize>,
    pub(crate) alt: Alt,
}

impl Mutation {
    /// Creates a mutation.
    ///
    /// # Panics
    ///
    /// Panics if both the reference span and the alternate are empty.
    pub fn new(range: Range<usize>, alt: Vec<u8>) -> Self {
        Self::with_alt(range, Alt::Seq(alt))
    }

    pub(crate) fn with_alt(range: Range<usize>, alt: Alt) -> Self {
        assert!(range.start <= range.end, "Reversed mutation range {:?}", range);
        assert!(
            !range.is_empty() || !alt.is_empty(),
            "Empty mutation at {}",
            range.start
        );
        Mutation { range, alt }
    }

    /// Reference interval.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn start(&self) -> usize {
        self.range.start
    }

    pub fn end(&self) -> usize {
        self.range.end
    }

    /// Replaced reference bases.
    pub fn ref_len(&self) -> usize {
        self.range.len()
    }

    /// Replacement bases.
    pub fn alt_len(&self) -> usize {
        self.alt.len()
    }

    /// Alternate allele.
    pub fn alt(&self) -> &Alt {
        &self.alt
    }

    /// Alternate bases, unless they were stripped.
    pub fn alt_seq(&self) -> Option<&[u8]> {
        match &self.alt {
            Alt::Seq(seq) => Some(seq),
            Alt::Span(_) => None,
        }
    }

    pub fn kind(&self) -> MutationKind {
        if self.range.is_empty() {
            MutationKind::Insertion
        } else if self.alt.is_empty() {
            MutationKind::Deletion
        } else {
            MutationKind::Substitution
        }
    }

    /// Returns `true` if the mutation has an empty reference span.
    pub fn is_insertion(&self) -> bool {
        self.range.is_empty()
    }

    /// Splits the mutation and returns the right-hand part.
    ///
    /// For a mutation with a reference span, `offset` is a reference offset
    /// in `(0, ref_len)` and the alternate is split at `min(offset, alt_len)`.
    /// For an insertion, `offset` is an alternate offset in `(0, alt_len)` and
    /// both parts stay at the same position.
    pub fn cut(&mut self, offset: usize) -> Mutation {
        if self.is_insertion() {
            assert!(
                0 < offset && offset < self.alt_len(),
                "Insertion cut at {} outside (0, {})",
                offset,
                self.alt_len()
            );
            let (left, right) = self.alt.split_at(offset);
            self.alt = left;
            return Mutation::with_alt(self.range.clone(), right);
        }
        assert!(
            0 < offset && offset < self.ref_len(),
            "Mutation cut at {} outside (0, {})",
            offset,
            self.ref_len()
        );
        let at = self.range.start + offset;
        let (left, right) = self.alt.split_at(offset.min(self.alt_len()));
        let right = Mutation::with_alt(at..self.range.end, right);
        self.range.end = at;
        self.alt = left;
        right
    }

    /// Moves the alternate bases beyond the reference length into a new
    /// insertion placed at the end of the mutation.
    pub fn detach_tail(&mut self) -> Mutation {
        let keep = self.ref_len();
        assert!(
            keep > 0 && keep < self.alt_len(),
            "Mutation {:?} has no alternate tail",
            self.range
        );
        let (left, right) = self.alt.split_at(keep);
        self.alt = left;
        Mutation::with_alt(self.range.end..self.range.end, right)
    }

    pub(crate) fn shift(&mut self, delta: isize) {
        let start = self.range.start as isize + delta;
        let end = self.range.end as isize + delta;
        assert!(start >= 0, "Mutation shifted to a negative coordinate");
        self.range = start as usize..end as usize;
    }

    /// Moves the mutation to the reverse strand of a contig of length `len`.
    pub(crate) fn mirror(&mut self, len: usize) {
        self.range = len - self.range.end..len - self.range.start;
        if let Alt::Seq(seq) = &self.alt {
            self.alt = Alt::Seq(reverse_complement(seq));
        }
    }

    /// Replaces the alternate bases by their count.
    pub(crate) fn strip(&mut self) {
        self.alt = Alt::Span(self.alt.len());
    }

    /// Writes the alternate bases, or `N` for each stripped base.
    pub(crate) fn write_alt(&self, out: &mut Vec<u8>) {
        match &self.alt {
            Alt::Seq(seq) => out.extend_from_slice(seq),
            Alt::Span(len) => out.extend(std::iter::repeat(b'N').take(*len)),
        }
    }
}

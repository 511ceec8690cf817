//! CIGAR alignment translation
//!
//! A [`Cigar`] is an immutable-by-convention list of typed operations, each
//! carrying its length and its precomputed offsets into the reference and
//! the query. The reference is the first read of an overlap (or a contig),
//! the query is the sequence aligned against it. Operations consume:
//!
//! | op | reference | query |
//! |----|-----------|-------|
//! | `M`, `=`, `X` | yes | yes |
//! | `I` | no | yes |
//! | `D` | yes | no |
//!
//! `M` is ambiguous: [`Cigar::disambiguate`] resolves it into `=`/`X` runs by
//! comparing bases, which is required before edits can be extracted.

use crate::error::{GraphError, Result};
use std::fmt;
use std::ops::Range;

/// Type of a CIGAR operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Aligned column, match or mismatch (`M`)
    Match,
    /// Aligned column, identical bases (`=`)
    Equal,
    /// Aligned column, different bases (`X`)
    Mismatch,
    /// Query bases absent from the reference (`I`)
    Insertion,
    /// Reference bases absent from the query (`D`)
    Deletion,
}

impl OpKind {
    /// Parses an operation symbol.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'M' => Some(OpKind::Match),
            b'=' => Some(OpKind::Equal),
            b'X' => Some(OpKind::Mismatch),
            b'I' => Some(OpKind::Insertion),
            b'D' => Some(OpKind::Deletion),
            _ => None,
        }
    }

    /// Operation symbol.
    pub fn to_byte(self) -> u8 {
        match self {
            OpKind::Match => b'M',
            OpKind::Equal => b'=',
            OpKind::Mismatch => b'X',
            OpKind::Insertion => b'I',
            OpKind::Deletion => b'D',
        }
    }

    /// Returns `true` if the operation advances the reference.
    #[inline]
    pub fn consumes_ref(self) -> bool {
        !matches!(self, OpKind::Insertion)
    }

    /// Returns `true` if the operation advances the query.
    #[inline]
    pub fn consumes_query(self) -> bool {
        !matches!(self, OpKind::Deletion)
    }

    /// Returns `true` for `M`, `=`, and `X`.
    #[inline]
    pub fn is_aligned(self) -> bool {
        matches!(self, OpKind::Match | OpKind::Equal | OpKind::Mismatch)
    }

    /// The same operation seen from the query's side.
    pub fn complement(self) -> Self {
        match self {
            OpKind::Insertion => OpKind::Deletion,
            OpKind::Deletion => OpKind::Insertion,
            other => other,
        }
    }
}

/// A single operation with its offsets from the start of the alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    /// Operation type
    pub kind: OpKind,
    /// Number of columns
    pub len: usize,
    /// Reference offset of the first column
    pub ref_offset: usize,
    /// Query offset of the first column
    pub query_offset: usize,
}

impl CigarOp {
    /// Reference bases covered.
    #[inline]
    pub fn ref_len(&self) -> usize {
        if self.kind.consumes_ref() {
            self.len
        } else {
            0
        }
    }

    /// Query bases covered.
    #[inline]
    pub fn query_len(&self) -> usize {
        if self.kind.consumes_query() {
            self.len
        } else {
            0
        }
    }

    /// Reference offset after the operation.
    #[inline]
    pub fn ref_end(&self) -> usize {
        self.ref_offset + self.ref_len()
    }

    /// Query offset after the operation.
    #[inline]
    pub fn query_end(&self) -> usize {
        self.query_offset + self.query_len()
    }
}

/// A difference between the reference and the query extracted from a disambiguated alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Replaced reference interval
    pub ref_range: Range<usize>,
    /// Replacement bases from the query
    pub alt: Vec<u8>,
}

impl Edit {
    /// Drops the bases the edit shares with the reference at either end.
    ///
    /// Returns `None` if the edit turns out to reproduce the reference.
    pub fn trimmed(self, ref_seq: &[u8]) -> Option<Edit> {
        let reference = &ref_seq[self.ref_range.clone()];
        let same = |(a, b): &(&u8, &u8)| a.eq_ignore_ascii_case(b);
        let prefix = reference.iter().zip(&self.alt).take_while(same).count();
        let suffix = reference[prefix..]
            .iter()
            .rev()
            .zip(self.alt[prefix..].iter().rev())
            .take_while(same)
            .count();
        let ref_range = self.ref_range.start + prefix..self.ref_range.end - suffix;
        let alt = self.alt[prefix..self.alt.len() - suffix].to_vec();
        if ref_range.is_empty() && alt.is_empty() {
            None
        } else {
            Some(Edit { ref_range, alt })
        }
    }
}

/// An alignment that was stripped of unanchored indels at both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trimmed {
    /// The remaining alignment, anchored at offset zero
    pub cigar: Cigar,
    /// Reference bases removed from the start
    pub ref_head: usize,
    /// Query bases removed from the start
    pub query_head: usize,
    /// Reference bases removed from the end
    pub ref_tail: usize,
    /// Query bases removed from the end
    pub query_tail: usize,
}

/// An ordered list of alignment operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cigar {
    ops: Vec<CigarOp>,
}

impl Cigar {
    /// Builds an alignment from `(kind, length)` pairs, merging neighbours of the same kind.
    pub fn from_ops<I: IntoIterator<Item = (OpKind, usize)>>(ops: I) -> Self {
        let mut cigar = Cigar { ops: Vec::new() };
        for (kind, len) in ops {
            cigar.push(kind, len);
        }
        cigar.anchor();
        cigar
    }

    // Appends without recomputing offsets.
    fn push(&mut self, kind: OpKind, len: usize) {
        if len == 0 {
            return;
        }
        if let Some(last) = self.ops.last_mut() {
            if last.kind == kind {
                last.len += len;
                return;
            }
        }
        self.ops.push(CigarOp {
            kind,
            len,
            ref_offset: 0,
            query_offset: 0,
        });
    }

    // Recomputes offsets from zero.
    fn anchor(&mut self) {
        let (mut r, mut q) = (0, 0);
        for op in self.ops.iter_mut() {
            op.ref_offset = r;
            op.query_offset = q;
            r += op.ref_len();
            q += op.query_len();
        }
    }

    /// Parses a CIGAR string such as `3=1X5=` or `10M2I4M`.
    ///
    /// Returns an error for unsupported operations, missing lengths, or trailing digits.
    /// The empty string and `*` both parse into an empty alignment.
    pub fn parse(cigar: &str) -> Result<Self> {
        if cigar.is_empty() || cigar == "*" {
            return Ok(Cigar::default());
        }
        let mut ops = Vec::new();
        let mut len: Option<usize> = None;
        for &byte in cigar.as_bytes() {
            if byte.is_ascii_digit() {
                let digit = (byte - b'0') as usize;
                let value = len
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit))
                    .ok_or_else(|| {
                        GraphError::InvalidCigar(format!("{}: operation length overflows", cigar))
                    })?;
                len = Some(value);
                continue;
            }
            let kind = OpKind::from_byte(byte).ok_or_else(|| {
                GraphError::InvalidCigar(format!(
                    "{}: unsupported operation '{}'",
                    cigar, byte as char
                ))
            })?;
            let op_len = len.take().ok_or_else(|| {
                GraphError::InvalidCigar(format!(
                    "{}: operation '{}' has no length",
                    cigar, byte as char
                ))
            })?;
            ops.push((kind, op_len));
        }
        if len.is_some() {
            return Err(GraphError::InvalidCigar(format!(
                "{}: trailing length without an operation",
                cigar
            )));
        }
        Ok(Self::from_ops(ops))
    }

    /// The operations.
    pub fn ops(&self) -> &[CigarOp] {
        &self.ops
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if there are no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Reference bases covered by the alignment.
    pub fn ref_len(&self) -> usize {
        self.ops.last().map_or(0, |op| op.ref_end())
    }

    /// Query bases covered by the alignment.
    pub fn query_len(&self) -> usize {
        self.ops.last().map_or(0, |op| op.query_end())
    }

    /// Number of alignment columns.
    pub fn columns(&self) -> usize {
        self.ops.iter().map(|op| op.len).sum()
    }

    /// Returns `true` if no `M` operations remain.
    pub fn is_disambiguated(&self) -> bool {
        self.ops.iter().all(|op| op.kind != OpKind::Match)
    }

    /// The alignment of the reversed reference against the reversed query.
    ///
    /// When both sequences are reverse-complemented this is the alignment
    /// between the reverse strands.
    pub fn reverse(&self) -> Self {
        Self::from_ops(self.ops.iter().rev().map(|op| (op.kind, op.len)))
    }

    /// The same alignment with the roles of reference and query swapped.
    pub fn complement(&self) -> Self {
        Self::from_ops(self.ops.iter().map(|op| (op.kind.complement(), op.len)))
    }

    /// Operations `[i, j)` anchored at offset zero.
    pub fn subrange(&self, i: usize, j: usize) -> Self {
        assert!(i <= j && j <= self.ops.len(), "Invalid subrange {}..{} of {} ops", i, j, self.ops.len());
        let mut result = Cigar {
            ops: self.ops[i..j].to_vec(),
        };
        result.anchor();
        result
    }

    /// Splits operation `i` after `len` columns, inserting the remainder as operation `i + 1`.
    pub fn cut_op(&mut self, i: usize, len: usize) {
        let op = self.ops[i];
        assert!(0 < len && len < op.len, "Cannot cut op of length {} at {}", op.len, len);
        self.ops[i].len = len;
        let rest = CigarOp {
            kind: op.kind,
            len: op.len - len,
            ref_offset: if op.kind.consumes_ref() { op.ref_offset + len } else { op.ref_offset },
            query_offset: if op.kind.consumes_query() { op.query_offset + len } else { op.query_offset },
        };
        self.ops.insert(i + 1, rest);
    }

    // Finds (op index, offset within op) for an alignment column; columns() maps to (len, 0).
    fn locate_column(&self, column: usize) -> (usize, usize) {
        let mut seen = 0;
        for (i, op) in self.ops.iter().enumerate() {
            if column < seen + op.len {
                return (i, column - seen);
            }
            seen += op.len;
        }
        assert!(column == seen, "Column {} beyond alignment of {} columns", column, seen);
        (self.ops.len(), 0)
    }

    /// Columns `[from, to)` as a new alignment anchored at offset zero.
    pub fn slice(&self, from: usize, to: usize) -> Self {
        assert!(from <= to, "Reversed column slice {}..{}", from, to);
        let mut cigar = self.clone();
        let (mut end, end_offset) = cigar.locate_column(to);
        if end_offset > 0 {
            cigar.cut_op(end, end_offset);
            end += 1;
        }
        let (mut start, start_offset) = cigar.locate_column(from);
        if start_offset > 0 {
            cigar.cut_op(start, start_offset);
            start += 1;
            end += 1;
        }
        cigar.subrange(start, end)
    }

    /// Resolves `M` operations into `=`/`X` runs by comparing bases.
    ///
    /// Explicit `=` and `X` operations are kept as given.
    ///
    /// # Panics
    ///
    /// Panics if the sequence lengths do not match the alignment.
    pub fn disambiguate(&self, ref_seq: &[u8], query_seq: &[u8]) -> Self {
        assert_eq!(ref_seq.len(), self.ref_len(), "Reference length does not match the alignment");
        assert_eq!(query_seq.len(), self.query_len(), "Query length does not match the alignment");
        let mut result = Cigar::default();
        for op in &self.ops {
            if op.kind != OpKind::Match {
                result.push(op.kind, op.len);
                continue;
            }
            for t in 0..op.len {
                let r = ref_seq[op.ref_offset + t];
                let q = query_seq[op.query_offset + t];
                let kind = if r.eq_ignore_ascii_case(&q) { OpKind::Equal } else { OpKind::Mismatch };
                result.push(kind, 1);
            }
        }
        result.anchor();
        result
    }

    /// Reference offset of the first `=` column whose bases differ.
    pub fn false_match(&self, ref_seq: &[u8], query_seq: &[u8]) -> Option<usize> {
        self.ops
            .iter()
            .filter(|op| op.kind == OpKind::Equal)
            .flat_map(|op| (0..op.len).map(move |t| (op.ref_offset + t, op.query_offset + t)))
            .find(|&(r, q)| !ref_seq[r].eq_ignore_ascii_case(&query_seq[q]))
            .map(|(r, _)| r)
    }

    /// Removes insertions and deletions from both ends.
    pub fn trimmed(&self) -> Trimmed {
        let first = self.ops.iter().position(|op| op.kind.is_aligned());
        let Some(first) = first else {
            return Trimmed {
                cigar: Cigar::default(),
                ref_head: self.ref_len(),
                query_head: self.query_len(),
                ref_tail: 0,
                query_tail: 0,
            };
        };
        let last = self
            .ops
            .iter()
            .rposition(|op| op.kind.is_aligned())
            .unwrap_or(first);
        let head = &self.ops[first];
        let tail = &self.ops[last];
        Trimmed {
            cigar: self.subrange(first, last + 1),
            ref_head: head.ref_offset,
            query_head: head.query_offset,
            ref_tail: self.ref_len() - tail.ref_end(),
            query_tail: self.query_len() - tail.query_end(),
        }
    }

    /// Composes `self` (X against Y) with `other` (Y against Z) into an alignment of X against Z.
    ///
    /// Aligned columns of the result are `=` only if both inputs say `=`, `X` if exactly one
    /// says `X` and the other `=`, and `M` otherwise.
    ///
    /// # Panics
    ///
    /// Panics if the query of `self` and the reference of `other` differ in length.
    pub fn compose(&self, other: &Cigar) -> Self {
        assert_eq!(
            self.query_len(),
            other.ref_len(),
            "Cannot compose alignments through sequences of different lengths"
        );
        let mut result = Cigar::default();
        let (mut i, mut j) = (0, 0);
        let mut a_rem = self.ops.first().map_or(0, |op| op.len);
        let mut b_rem = other.ops.first().map_or(0, |op| op.len);
        loop {
            let a = self.ops.get(i).map(|op| op.kind);
            let b = other.ops.get(j).map(|op| op.kind);
            match (a, b) {
                (None, None) => break,
                (Some(OpKind::Deletion), _) => {
                    result.push(OpKind::Deletion, a_rem);
                    i += 1;
                    a_rem = self.ops.get(i).map_or(0, |op| op.len);
                }
                (_, Some(OpKind::Insertion)) => {
                    result.push(OpKind::Insertion, b_rem);
                    j += 1;
                    b_rem = other.ops.get(j).map_or(0, |op| op.len);
                }
                (Some(a), Some(b)) => {
                    let n = a_rem.min(b_rem);
                    let kind = match (a, b) {
                        (OpKind::Insertion, OpKind::Deletion) => None,
                        (OpKind::Insertion, _) => Some(OpKind::Insertion),
                        (_, OpKind::Deletion) => Some(OpKind::Deletion),
                        (OpKind::Equal, OpKind::Equal) => Some(OpKind::Equal),
                        (OpKind::Equal, OpKind::Mismatch) | (OpKind::Mismatch, OpKind::Equal) => {
                            Some(OpKind::Mismatch)
                        }
                        _ => Some(OpKind::Match),
                    };
                    if let Some(kind) = kind {
                        result.push(kind, n);
                    }
                    a_rem -= n;
                    b_rem -= n;
                    if a_rem == 0 {
                        i += 1;
                        a_rem = self.ops.get(i).map_or(0, |op| op.len);
                    }
                    if b_rem == 0 {
                        j += 1;
                        b_rem = other.ops.get(j).map_or(0, |op| op.len);
                    }
                }
                _ => panic!("Alignment composition ran out of operations on one side"),
            }
        }
        result.anchor();
        result
    }

    /// Restricts the alignment to the columns covering query interval `[start, end)`.
    ///
    /// Deletions are kept only strictly inside the interval. Returns the
    /// reference interval covered by the kept columns and the restricted alignment.
    pub fn query_window(&self, start: usize, end: usize) -> (Range<usize>, Cigar) {
        let mut result = Cigar::default();
        let mut ref_start = None;
        let mut ref_end = 0;
        for op in &self.ops {
            let (r, q) = (op.ref_offset, op.query_offset);
            match op.kind {
                OpKind::Deletion => {
                    if start < q && q < end {
                        ref_start.get_or_insert(r);
                        result.push(op.kind, op.len);
                        ref_end = r + op.len;
                    }
                }
                kind => {
                    let a = q.max(start);
                    let b = (q + op.len).min(end);
                    if a >= b {
                        continue;
                    }
                    if kind == OpKind::Insertion {
                        ref_start.get_or_insert(r);
                        ref_end = r;
                    } else {
                        ref_start.get_or_insert(r + (a - q));
                        ref_end = r + (b - q);
                    }
                    result.push(kind, b - a);
                }
            }
        }
        result.anchor();
        let ref_start = ref_start.unwrap_or(ref_end);
        (ref_start..ref_end.max(ref_start), result)
    }

    /// Extracts the differences of a disambiguated alignment as edits.
    ///
    /// Every maximal run of non-`=` operations becomes one edit.
    ///
    /// # Panics
    ///
    /// Panics if the alignment still contains `M` operations.
    pub fn edits(&self, query_seq: &[u8]) -> Vec<Edit> {
        self.runs(query_seq).into_iter().map(|(edit, _)| edit).collect()
    }

    // Edits paired with whether their run holds nothing but `X` columns.
    fn runs(&self, query_seq: &[u8]) -> Vec<(Edit, bool)> {
        assert!(self.is_disambiguated(), "Edits require a disambiguated alignment");
        let mut runs = Vec::new();
        let mut current: Option<(usize, usize, bool)> = None;
        for op in &self.ops {
            if op.kind == OpKind::Equal {
                if let Some((rs, qs, substitution)) = current.take() {
                    let edit = Edit {
                        ref_range: rs..op.ref_offset,
                        alt: query_seq[qs..op.query_offset].to_vec(),
                    };
                    runs.push((edit, substitution));
                }
                continue;
            }
            let run = current.get_or_insert((op.ref_offset, op.query_offset, true));
            run.2 &= op.kind == OpKind::Mismatch;
        }
        if let Some((rs, qs, substitution)) = current {
            let edit = Edit {
                ref_range: rs..self.ref_len(),
                alt: query_seq[qs..self.query_len()].to_vec(),
            };
            runs.push((edit, substitution));
        }
        runs
    }

    /// Edits of a disambiguated alignment, with indel runs reduced to the bases that differ.
    ///
    /// Runs of `X` columns are kept whole, even where the bases agree.
    pub fn minimal_edits(&self, ref_seq: &[u8], query_seq: &[u8]) -> Vec<Edit> {
        self.runs(query_seq)
            .into_iter()
            .filter_map(|(edit, substitution)| if substitution { Some(edit) } else { edit.trimmed(ref_seq) })
            .collect()
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            write!(f, "{}{}", op.len, op.kind.to_byte() as char)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Cigar {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        Cigar::parse(s)
    }
}

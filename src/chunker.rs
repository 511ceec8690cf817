//! Lockstep walk of an overlap alignment and two chunk partitions
//!
//! The walk partitions an overlap alignment into pieces whose reference and
//! query extents coincide exactly with one chunk of each read. Whenever one
//! read reaches a chunk boundary that the other read does not have, the other
//! read is cut there and the walk starts over. Every restart adds at least one
//! boundary inside the overlap windows, so the number of interior window
//! positions that are not chunk boundaries strictly decreases; the loop
//! asserts this on each iteration.

use crate::arena::Handle;
use crate::chunk::Chunk;
use crate::cigar::{Cigar, CigarOp, OpKind};
use crate::contig::Contig;
use crate::read::Read;
use crate::store::Store;
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::{debug, trace};

/// The trimmed extent of an overlap on both reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Window {
    pub read1: Handle<Read>,
    pub read2: Handle<Read>,
    pub r1: Range<usize>,
    pub r2: Range<usize>,
    /// The query is the reverse complement of the read-2 window.
    pub rc: bool,
}

impl Window {
    /// Read-2 position of the boundary before query offset `j`.
    pub fn read2_boundary(&self, j: usize) -> usize {
        if self.rc {
            self.r2.end - j
        } else {
            self.r2.start + j
        }
    }

    /// Read-2 position of the base at query offset `j`.
    fn read2_base(&self, j: usize) -> usize {
        if self.rc {
            self.r2.end - 1 - j
        } else {
            self.r2.start + j
        }
    }

    fn unaligned(&self, store: &Store) -> usize {
        store.reads[self.read1].interior_positions(self.r1.start, self.r1.end)
            + store.reads[self.read2].interior_positions(self.r2.start, self.r2.end)
    }

    fn snapshot(&self, store: &Store) -> (BTreeMap<usize, Handle<Chunk>>, BTreeMap<usize, Handle<Chunk>>) {
        (
            store.reads[self.read1].chunks.clone(),
            store.reads[self.read2].chunks.clone(),
        )
    }
}

/// A piece of the overlap alignment between one chunk of each read.
#[derive(Debug, Clone)]
pub(crate) struct Triple {
    pub a: Handle<Chunk>,
    pub b: Handle<Chunk>,
    pub cigar: Cigar,
}

enum Walk {
    Cut { read: Handle<Read>, pos: usize },
    Done(Vec<Triple>),
}

/// Partitions `cigar` into chunk-exact triples.
///
/// On return, the contig of every `b` chunk spans exactly that chunk, and
/// the chunk handles in the triples are current.
pub(crate) fn partition(store: &mut Store, window: &Window, cigar: &Cigar) -> Vec<Triple> {
    assert_eq!(cigar.ref_len(), window.r1.len(), "Alignment does not cover the read-1 window");
    assert_eq!(cigar.query_len(), window.r2.len(), "Alignment does not cover the read-2 window");
    let mut remaining = window.unaligned(store);
    let mut restarts = 0usize;
    loop {
        match walk(store, window, cigar) {
            Walk::Cut { read, pos } => {
                trace!("Chunker cuts read {:?} at {}", read, pos);
                Read::cut(store, read, pos);
                let now = window.unaligned(store);
                assert!(
                    now < remaining,
                    "Chunker made no progress: {} unaligned positions before, {} after",
                    remaining,
                    now
                );
                remaining = now;
                restarts += 1;
            }
            Walk::Done(triples) => {
                let before = window.snapshot(store);
                for triple in &triples {
                    isolate(store, triple.b);
                    if window.snapshot(store) != before {
                        break;
                    }
                }
                if window.snapshot(store) == before {
                    debug!(
                        "Chunker produced {} triples after {} restarts",
                        triples.len(),
                        restarts
                    );
                    return triples;
                }
                let now = window.unaligned(store);
                assert!(now <= remaining, "Contig isolation removed chunk boundaries");
                remaining = now;
                restarts += 1;
            }
        }
    }
}

// Cuts the contig of `chunk` at both ends of the chunk.
fn isolate(store: &mut Store, chunk: Handle<Chunk>) {
    let (contig, range) = {
        let c = &store.chunks[chunk];
        (c.contig, c.contig_range.clone())
    };
    Contig::cut(store, contig, range.end, None);
    Contig::cut(store, contig, range.start, None);
}

/// Position along an alignment: op index, columns into that op, and the
/// reference, query and column offsets reached so far.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    op: usize,
    offset: usize,
    i: usize,
    j: usize,
    col: usize,
}

impl Cursor {
    fn current(&self, ops: &[CigarOp]) -> Option<CigarOp> {
        ops.get(self.op).copied()
    }

    fn advance(&mut self, ops: &[CigarOp], step: usize) {
        let op = ops[self.op];
        if op.kind.consumes_ref() {
            self.i += step;
        }
        if op.kind.consumes_query() {
            self.j += step;
        }
        self.col += step;
        self.offset += step;
        if self.offset == op.len {
            self.op += 1;
            self.offset = 0;
        }
    }

    // Consumes leading ops of `kind` until `limit` is reached on the axis they advance.
    fn absorb(&mut self, ops: &[CigarOp], kind: OpKind, limit: usize) {
        while let Some(op) = self.current(ops).filter(|op| op.kind == kind) {
            let reached = if kind == OpKind::Insertion { self.j } else { self.i };
            if reached >= limit {
                break;
            }
            self.advance(ops, (op.len - self.offset).min(limit - reached));
        }
    }
}

fn walk(store: &Store, window: &Window, cigar: &Cigar) -> Walk {
    let ops = cigar.ops();
    let mut at = Cursor::default();
    let mut triples = Vec::new();

    while at.op < ops.len() {
        let start = at;
        let x = store.reads[window.read1]
            .chunk_at(window.r1.start + at.i)
            .unwrap_or_else(|| panic!("No read-1 chunk at window offset {}", at.i));
        let y = store.reads[window.read2]
            .chunk_at(window.read2_base(at.j))
            .unwrap_or_else(|| panic!("No read-2 chunk at query offset {}", at.j));
        let x_end = store.chunks[x].read_range.end.min(window.r1.end) - window.r1.start;
        let y_range = &store.chunks[y].read_range;
        let y_end = if window.rc {
            window.r2.end - y_range.start.max(window.r2.start)
        } else {
            y_range.end.min(window.r2.end) - window.r2.start
        };

        while at.i < x_end && at.j < y_end {
            let op = at
                .current(ops)
                .unwrap_or_else(|| panic!("Alignment ended inside chunks at ({}, {})", at.i, at.j));
            let rem = op.len - at.offset;
            let step = match op.kind {
                OpKind::Insertion => rem.min(y_end - at.j),
                OpKind::Deletion => rem.min(x_end - at.i),
                _ => rem.min(x_end - at.i).min(y_end - at.j),
            };
            at.advance(ops, step);
        }
        if at.i == x_end && at.j < y_end {
            at.absorb(ops, OpKind::Insertion, y_end);
        } else if at.j == y_end && at.i < x_end {
            at.absorb(ops, OpKind::Deletion, x_end);
        }

        let (reached_x, reached_y) = (at.i == x_end, at.j == y_end);
        if reached_x && reached_y {
            triples.push(Triple {
                a: x,
                b: y,
                cigar: cigar.slice(start.col, at.col),
            });
            continue;
        }
        if at.i == start.i || at.j == start.j {
            // Pure indel against one chunk: nothing to fold.
            continue;
        }
        return if reached_x {
            Walk::Cut {
                read: window.read2,
                pos: window.read2_boundary(at.j),
            }
        } else {
            Walk::Cut {
                read: window.read1,
                pos: window.r1.start + at.i,
            }
        };
    }
    Walk::Done(triples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn window(graph: &Graph, r1: Range<usize>, r2: Range<usize>, rc: bool) -> Window {
        Window {
            read1: graph.read_by_name("a").unwrap(),
            read2: graph.read_by_name("b").unwrap(),
            r1,
            r2,
            rc,
        }
    }

    #[test]
    fn test_single_triple() {
        let mut graph = Graph::new();
        graph.add_read("a", b"ACGTACGTAC").unwrap();
        graph.add_read("b", b"ACGTACGTAC").unwrap();
        let w = window(&graph, 0..10, 0..10, false);
        let cigar = Cigar::parse("10=").unwrap();
        let triples = partition(graph.store_mut(), &w, &cigar);
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].cigar.to_string(), "10=");
    }

    #[test]
    fn test_cuts_other_read() {
        let mut graph = Graph::new();
        graph.add_read("a", b"ACGTACGTAC").unwrap();
        graph.add_read("b", b"ACGTACGTAC").unwrap();
        let w = window(&graph, 0..10, 0..10, false);
        let a = w.read1;
        Read::cut(graph.store_mut(), a, 4);
        let cigar = Cigar::parse("10=").unwrap();
        let triples = partition(graph.store_mut(), &w, &cigar);
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].cigar.to_string(), "4=");
        assert_eq!(triples[1].cigar.to_string(), "6=");
        assert!(graph.read(w.read2).is_boundary(4));
    }

    #[test]
    fn test_reverse_window() {
        let mut graph = Graph::new();
        graph.add_read("a", b"ACGTAACC").unwrap();
        graph.add_read("b", b"GGTTACGT").unwrap();
        let w = window(&graph, 0..8, 0..8, true);
        let a = w.read1;
        Read::cut(graph.store_mut(), a, 3);
        let cigar = Cigar::parse("8=").unwrap();
        let triples = partition(graph.store_mut(), &w, &cigar);
        assert_eq!(triples.len(), 2);
        // Query offset 3 is read-2 position 5 on the reverse strand.
        assert!(graph.read(w.read2).is_boundary(5));
        let b0 = graph.chunk(triples[0].b);
        assert_eq!(b0.read_range(), 5..8);
    }

    #[test]
    fn test_indel_at_boundary_is_absorbed() {
        let mut graph = Graph::new();
        graph.add_read("a", b"ACGTACGT").unwrap();
        graph.add_read("b", b"ACGTTTACGT").unwrap();
        let w = window(&graph, 0..8, 0..10, false);
        let a = w.read1;
        Read::cut(graph.store_mut(), a, 4);
        let cigar = Cigar::parse("4=2I4=").unwrap();
        let triples = partition(graph.store_mut(), &w, &cigar);
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].cigar.to_string(), "4=2I");
        assert!(graph.read(w.read2).is_boundary(6));
    }
}

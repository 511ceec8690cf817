//! Reads and their chunk partitions

use crate::arena::Handle;
use crate::chunk::Chunk;
use crate::contig::Contig;
use crate::mutation::Mutation;
use crate::store::Store;
use std::collections::BTreeMap;
use tracing::trace;

/// An input sequence, partitioned into chunks indexed by read start.
#[derive(Debug, Clone)]
pub struct Read {
    pub(crate) name: String,
    pub(crate) len: usize,
    pub(crate) chunks: BTreeMap<usize, Handle<Chunk>>,
}

impl Read {
    pub(crate) fn new(name: String, len: usize) -> Self {
        Read {
            name,
            len,
            chunks: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Chunks in read order.
    pub fn chunks(&self) -> impl Iterator<Item = Handle<Chunk>> + '_ {
        self.chunks.values().copied()
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// The chunk covering read position `pos`.
    pub fn chunk_at(&self, pos: usize) -> Option<Handle<Chunk>> {
        if pos >= self.len {
            return None;
        }
        self.chunks.range(..=pos).next_back().map(|(_, &chunk)| chunk)
    }

    /// Returns `true` if a chunk starts or ends at `pos`.
    pub fn is_boundary(&self, pos: usize) -> bool {
        pos == 0 || pos == self.len || self.chunks.contains_key(&pos)
    }

    /// Number of positions strictly inside `start..end` that are not chunk boundaries.
    pub(crate) fn interior_positions(&self, start: usize, end: usize) -> usize {
        if end <= start + 1 {
            return 0;
        }
        let boundaries = self.chunks.range(start + 1..end).count();
        end - start - 1 - boundaries
    }

    /// Makes `pos` a chunk boundary of `read`, cutting contigs and mutations as needed.
    pub(crate) fn cut(store: &mut Store, read: Handle<Read>, pos: usize) {
        loop {
            let r = &store.reads[read];
            assert!(pos <= r.len, "Read cut at {} beyond length {}", pos, r.len);
            if r.is_boundary(pos) {
                return;
            }
            let chunk = r
                .chunk_at(pos)
                .unwrap_or_else(|| panic!("Read {:?} has no chunk at {}", read, pos));
            let c = &store.chunks[chunk];
            let (contig, cs, ce) = (c.contig, c.contig_range.start, c.contig_range.end);
            let offset = if c.rc {
                c.read_range.end - pos
            } else {
                pos - c.read_range.start
            };
            trace!("Cutting read {:?} at {} (chunk {:?}, offset {})", read, pos, chunk, offset);

            match plan_cut(store, c, offset) {
                CutPlan::Contig { at, keep_left } if at == cs || at == ce => {
                    let mutation = keep_left
                        .or_else(|| store.chunks[chunk].mutations.last().copied())
                        .unwrap_or_else(|| panic!("Chunk {:?} cut on its own boundary", chunk));
                    Contig::detach_insertion(store, chunk, mutation);
                }
                CutPlan::Contig { at, keep_left } => {
                    Contig::cut(store, contig, at, keep_left);
                    assert!(
                        store.reads[read].is_boundary(pos),
                        "Contig cut at {} did not cut read {:?} at {}",
                        at,
                        read,
                        pos
                    );
                }
                CutPlan::Insertion { mutation, offset } => {
                    let at = store.mutations[mutation].start();
                    if at == cs || at == ce {
                        Contig::detach_insertion(store, chunk, mutation);
                    } else {
                        Contig::cut_insertion(store, contig, mutation, offset);
                    }
                }
                CutPlan::Tail(mutation) => Contig::detach_tail(store, contig, mutation),
            }
        }
    }
}

/// How to place a read boundary at a produced-base offset of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CutPlan {
    /// Cut the contig at `at`; an insertion there stays left iff it is `keep_left`.
    Contig {
        at: usize,
        keep_left: Option<Handle<Mutation>>,
    },
    /// Cut inside an insertion after `offset` inserted bases.
    Insertion {
        mutation: Handle<Mutation>,
        offset: usize,
    },
    /// The offset falls in the part of a mutation's alternate that exceeds its reference span.
    Tail(Handle<Mutation>),
}

// `offset` counts produced bases in contig orientation, strictly inside the chunk.
fn plan_cut(store: &Store, chunk: &Chunk, offset: usize) -> CutPlan {
    let mut pos = chunk.contig_range.start;
    let mut produced = 0;
    for &h in &chunk.mutations {
        let m = &store.mutations[h];
        let gap = m.start() - pos;
        if offset <= produced + gap {
            return CutPlan::Contig {
                at: pos + (offset - produced),
                keep_left: None,
            };
        }
        produced += gap;
        let alt = m.alt_len();
        if offset < produced + alt {
            let k = offset - produced;
            return if m.is_insertion() {
                CutPlan::Insertion {
                    mutation: h,
                    offset: k,
                }
            } else if k < m.ref_len() {
                CutPlan::Contig {
                    at: m.start() + k,
                    keep_left: None,
                }
            } else {
                CutPlan::Tail(h)
            };
        }
        if offset == produced + alt {
            return CutPlan::Contig {
                at: m.end(),
                keep_left: m.is_insertion().then_some(h),
            };
        }
        produced += alt;
        pos = m.end();
    }
    CutPlan::Contig {
        at: pos + (offset - produced),
        keep_left: None,
    }
}

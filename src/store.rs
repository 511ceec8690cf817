//! Storage context shared by all graph entities
//!
//! Entities refer to each other through handles only. Every operation that
//! resolves a handle receives the [`Store`] explicitly; there is no global
//! arena. The store also owns the cross-container bookkeeping: linking a
//! chunk into its read partition and its contig's interval index, and
//! unlinking it again before its slot can be released.

use crate::arena::{Arena, Handle, Unlinked};
use crate::chunk::Chunk;
use crate::cigar::{Cigar, OpKind};
use crate::contig::Contig;
use crate::mutation::Mutation;
use crate::read::Read;
use crate::sequence::reverse_complement;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

/// The four entity arenas.
#[derive(Debug, Default)]
pub struct Store {
    pub(crate) reads: Arena<Read>,
    pub(crate) contigs: Arena<Contig>,
    pub(crate) chunks: Arena<Chunk>,
    pub(crate) mutations: Arena<Mutation>,
    dirty: BTreeSet<Handle<Contig>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read arena
    pub fn reads(&self) -> &Arena<Read> {
        &self.reads
    }

    /// Contig arena
    pub fn contigs(&self) -> &Arena<Contig> {
        &self.contigs
    }

    /// Chunk arena
    pub fn chunks(&self) -> &Arena<Chunk> {
        &self.chunks
    }

    /// Mutation arena
    pub fn mutations(&self) -> &Arena<Mutation> {
        &self.mutations
    }

    // ------------------------------------------------------------------
    // Dirty contig tracking

    /// Marks a contig as changed by the current operation.
    pub(crate) fn touch(&mut self, contig: Handle<Contig>) {
        self.dirty.insert(contig);
    }

    /// Returns and clears the set of changed contigs that are still live.
    pub(crate) fn take_dirty(&mut self) -> Vec<Handle<Contig>> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty.into_iter().filter(|&c| self.contigs.contains(c)).collect()
    }

    // ------------------------------------------------------------------
    // Contigs

    /// Allocates an empty-indexed contig over `seq`.
    pub(crate) fn add_contig(&mut self, seq: Vec<u8>) -> Handle<Contig> {
        let contig = self.contigs.allocate(Contig::new(seq));
        self.touch(contig);
        contig
    }

    /// Releases a contig whose chunks have all been moved elsewhere.
    ///
    /// The returned value still holds the (stale) indexes so the caller can
    /// absorb or free their contents.
    pub(crate) fn release_contig(&mut self, contig: Handle<Contig>) -> Contig {
        for (chunk, _) in self.contigs[contig].chunks.iter() {
            assert!(
                self.chunks[chunk].contig != contig,
                "Releasing contig {:?} still referenced by chunk {:?}",
                contig,
                chunk
            );
        }
        self.dirty.remove(&contig);
        self.contigs.free(Unlinked::new(contig))
    }

    // ------------------------------------------------------------------
    // Chunks

    /// Stores a chunk and links it into its read and contig.
    pub(crate) fn link_chunk(&mut self, chunk: Chunk) -> Handle<Chunk> {
        let handle = self.chunks.allocate(chunk);
        self.attach(handle);
        handle
    }

    fn attach(&mut self, handle: Handle<Chunk>) {
        let chunk = &self.chunks[handle];
        let (read, read_start, contig, range) = (
            chunk.read,
            chunk.read_range.start,
            chunk.contig,
            chunk.contig_range.clone(),
        );
        let previous = self.reads[read].chunks.insert(read_start, handle);
        assert!(
            previous.is_none(),
            "Read {:?} already has a chunk at {}",
            read,
            read_start
        );
        self.contigs[contig].chunks.insert(handle, range);
    }

    fn detach(&mut self, handle: Handle<Chunk>) {
        let chunk = &self.chunks[handle];
        let (read, read_start, contig, start) = (
            chunk.read,
            chunk.read_range.start,
            chunk.contig,
            chunk.contig_range.start,
        );
        let removed = self.reads[read].chunks.remove(&read_start);
        assert_eq!(removed, Some(handle), "Chunk {:?} missing from its read", handle);
        let erased = self.contigs[contig].chunks.erase(handle, start);
        assert!(erased.is_some(), "Chunk {:?} missing from its contig", handle);
    }

    /// Unlinks a chunk from its read and contig and releases it.
    pub(crate) fn release_chunk(&mut self, handle: Handle<Chunk>) -> Chunk {
        self.detach(handle);
        self.chunks.free(Unlinked::new(handle))
    }

    /// Changes a linked chunk, keeping both containers in sync.
    pub(crate) fn update_chunk<F: FnOnce(&mut Chunk)>(&mut self, handle: Handle<Chunk>, f: F) {
        self.detach(handle);
        f(&mut self.chunks[handle]);
        self.attach(handle);
    }

    // ------------------------------------------------------------------
    // Mutations

    /// Stores a mutation and indexes it in `contig`.
    pub(crate) fn add_mutation(&mut self, contig: Handle<Contig>, mutation: Mutation) -> Handle<Mutation> {
        let range = mutation.range();
        let handle = self.mutations.allocate(mutation);
        self.contigs[contig].mutations.insert(handle, range);
        handle
    }

    /// Removes a mutation from the index of `contig` and releases it.
    pub(crate) fn release_mutation(&mut self, contig: Handle<Contig>, handle: Handle<Mutation>) -> Mutation {
        let start = self.mutations[handle].start();
        let erased = self.contigs[contig].mutations.erase(handle, start);
        assert!(erased.is_some(), "Mutation {:?} missing from its contig", handle);
        self.mutations.free(Unlinked::new(handle))
    }

    /// Folds mutations of `contig` with the same range and alternate into one.
    ///
    /// Observers of a duplicate are moved to the surviving mutation. Returns
    /// the number of duplicates released.
    pub(crate) fn merge_duplicates(&mut self, contig: Handle<Contig>) -> usize {
        let mut seen: HashMap<(usize, usize, Vec<u8>), Handle<Mutation>> = HashMap::new();
        let mut duplicates = Vec::new();
        for (m, range) in self.contigs[contig].mutations.iter() {
            let Some(alt) = self.mutations[m].alt_seq() else {
                continue;
            };
            match seen.entry((range.start, range.end, alt.to_vec())) {
                Entry::Occupied(kept) => duplicates.push((m, *kept.get())),
                Entry::Vacant(slot) => {
                    slot.insert(m);
                }
            }
        }
        for &(duplicate, kept) in &duplicates {
            let observers = self.observers(contig, duplicate);
            self.replace_observed(&observers, duplicate, &[kept]);
            self.release_mutation(contig, duplicate);
        }
        duplicates.len()
    }

    /// Chunks of `contig` whose observation list contains `mutation`.
    pub fn observers(&self, contig: Handle<Contig>, mutation: Handle<Mutation>) -> Vec<Handle<Chunk>> {
        let range = self.mutations[mutation].range();
        self.contigs[contig]
            .chunks
            .intersect(range.start, range.end)
            .map(|(chunk, _)| chunk)
            .filter(|&chunk| self.chunks[chunk].mutations.contains(&mutation))
            .collect()
    }

    /// Replaces `old` by `new` in the observation list of each chunk.
    pub(crate) fn replace_observed(
        &mut self,
        chunks: &[Handle<Chunk>],
        old: Handle<Mutation>,
        new: &[Handle<Mutation>],
    ) {
        for &chunk in chunks {
            let list = &mut self.chunks[chunk].mutations;
            let at = list
                .iter()
                .position(|&m| m == old)
                .unwrap_or_else(|| panic!("Chunk {:?} does not observe {:?}", chunk, old));
            list.splice(at..at + 1, new.iter().copied());
        }
    }

    // ------------------------------------------------------------------
    // Derived sequences

    /// Bases produced by a chunk, in contig orientation.
    pub fn forward_sequence(&self, chunk: Handle<Chunk>) -> Vec<u8> {
        let chunk = &self.chunks[chunk];
        let seq = &self.contigs[chunk.contig].seq;
        let mut out = Vec::with_capacity(chunk.read_range.len());
        let mut pos = chunk.contig_range.start;
        for &m in &chunk.mutations {
            let m = &self.mutations[m];
            out.extend_from_slice(&seq[pos..m.start()]);
            m.write_alt(&mut out);
            pos = m.end();
        }
        out.extend_from_slice(&seq[pos..chunk.contig_range.end]);
        out
    }

    /// Bases of the read segment covered by a chunk, in read orientation.
    pub fn chunk_sequence(&self, chunk: Handle<Chunk>) -> Vec<u8> {
        let forward = self.forward_sequence(chunk);
        if self.chunks[chunk].rc {
            reverse_complement(&forward)
        } else {
            forward
        }
    }

    /// Number of read bases a chunk produces from its contig range and mutations.
    pub fn produced_len(&self, chunk: Handle<Chunk>) -> usize {
        let chunk = &self.chunks[chunk];
        let mut len = chunk.contig_range.len() as isize;
        for &m in &chunk.mutations {
            let m = &self.mutations[m];
            len += m.alt_len() as isize - m.ref_len() as isize;
        }
        assert!(len >= 0, "Chunk deletes more than its contig span");
        len as usize
    }

    /// Alignment of a chunk's contig range against its forward sequence.
    ///
    /// Unchanged stretches are `=`. A substitution contributes `X` columns;
    /// any other mutation contributes `M` for the shared length and `D` or
    /// `I` for the excess.
    pub(crate) fn edit_cigar(&self, chunk: Handle<Chunk>) -> Cigar {
        let chunk = &self.chunks[chunk];
        let mut ops = Vec::with_capacity(2 * chunk.mutations.len() + 1);
        let mut pos = chunk.contig_range.start;
        for &m in &chunk.mutations {
            let m = &self.mutations[m];
            let (r, a) = (m.ref_len(), m.alt_len());
            ops.push((OpKind::Equal, m.start() - pos));
            let shared = if r == a { OpKind::Mismatch } else { OpKind::Match };
            ops.push((shared, r.min(a)));
            if r > a {
                ops.push((OpKind::Deletion, r - a));
            } else {
                ops.push((OpKind::Insertion, a - r));
            }
            pos = m.end();
        }
        ops.push((OpKind::Equal, chunk.contig_range.end - pos));
        Cigar::from_ops(ops)
    }
}

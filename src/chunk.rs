//! Chunks: the mapping of a read interval onto a contig interval

use crate::arena::{Handle, Unlinked};
use crate::cigar::Cigar;
use crate::contig::Contig;
use crate::mutation::Mutation;
use crate::read::Read;
use crate::store::Store;
use std::collections::HashMap;
use std::ops::Range;
use tracing::{debug, trace};

/// One read interval mapped onto one contig interval.
///
/// The chunk produces the contig bases in `contig_range` with its observed
/// mutations applied, reverse-complemented when `rc` is set. Observed
/// mutations are kept in contig order and never overlap each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub(crate) read: Handle<Read>,
    pub(crate) read_range: Range<usize>,
    pub(crate) contig: Handle<Contig>,
    pub(crate) contig_range: Range<usize>,
    pub(crate) rc: bool,
    pub(crate) mutations: Vec<Handle<Mutation>>,
}

impl Chunk {
    pub fn read(&self) -> Handle<Read> {
        self.read
    }

    pub fn read_range(&self) -> Range<usize> {
        self.read_range.clone()
    }

    pub fn contig(&self) -> Handle<Contig> {
        self.contig
    }

    pub fn contig_range(&self) -> Range<usize> {
        self.contig_range.clone()
    }

    /// Returns `true` if the read runs along the reverse strand of the contig.
    pub fn is_reverse(&self) -> bool {
        self.rc
    }

    /// Observed mutations in contig order.
    pub fn mutations(&self) -> &[Handle<Mutation>] {
        &self.mutations
    }

    /// Splits a chunk at contig coordinate `at`, strictly inside its contig range.
    ///
    /// Mutations ending at or before `at` go left, the others right; an
    /// insertion exactly at `at` goes left only if it is `keep_left`. The
    /// read interval is divided by the number of bases each side produces.
    /// A side that produces no read bases is dropped. Both halves stay in
    /// the original contig; the old chunk is released.
    pub(crate) fn split(
        store: &mut Store,
        chunk: Handle<Chunk>,
        at: usize,
        keep_left: Option<Handle<Mutation>>,
    ) -> (Option<Handle<Chunk>>, Option<Handle<Chunk>>) {
        let old = store.release_chunk(chunk);
        let (cs, ce) = (old.contig_range.start, old.contig_range.end);
        assert!(cs < at && at < ce, "Chunk split at {} outside ({}, {})", at, cs, ce);

        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut left_len = (at - cs) as isize;
        for &m in &old.mutations {
            let mutation = &store.mutations[m];
            let goes_left = if mutation.is_insertion() && mutation.start() == at {
                keep_left == Some(m)
            } else {
                assert!(
                    mutation.end() <= at || mutation.start() >= at,
                    "Mutation {:?} straddles chunk split point {}",
                    mutation.range(),
                    at
                );
                mutation.end() <= at
            };
            if goes_left {
                left_len += mutation.alt_len() as isize - mutation.ref_len() as isize;
                left.push(m);
            } else {
                right.push(m);
            }
        }
        assert!(
            left_len >= 0 && left_len as usize <= old.read_range.len(),
            "Chunk split produces {} of {} read bases",
            left_len,
            old.read_range.len()
        );
        let left_len = left_len as usize;
        let (rs, re) = (old.read_range.start, old.read_range.end);
        let (left_read, right_read) = if old.rc {
            (re - left_len..re, rs..re - left_len)
        } else {
            (rs..rs + left_len, rs + left_len..re)
        };

        let mut link = |read_range: Range<usize>, contig_range: Range<usize>, mutations| {
            if read_range.is_empty() {
                return None;
            }
            Some(store.link_chunk(Chunk {
                read: old.read,
                read_range,
                contig: old.contig,
                contig_range,
                rc: old.rc,
                mutations,
            }))
        };
        let l = link(left_read, cs..at, left);
        let r = link(right_read, at..ce, right);
        (l, r)
    }

    /// Folds the whole contig of `b` onto the contig of `a`.
    ///
    /// `cigar` aligns the read interval of `a` (reference) against the read
    /// interval of `b` (query, reverse-complemented when `reverse_complement`
    /// is set); `b` must span its whole contig. The contig of `b` is flipped
    /// if needed so that both contigs share a strand, then the alignment
    /// from contig A to contig B is composed from the edit alignment of `a`,
    /// the overlap alignment, and the inverted edit alignment of `b`. Every
    /// chunk of contig B is rewritten in place onto its image in A, with the
    /// mutations it needs there; mutations equal to an existing one in A are
    /// shared. A chunk whose image covers no reference base of A gets a
    /// contig of its own. Contig B is released.
    pub(crate) fn collapse_through(
        store: &mut Store,
        a: Handle<Chunk>,
        b: Handle<Chunk>,
        cigar: &Cigar,
        reverse_complement: bool,
    ) -> Handle<Contig> {
        let (target, a_range, a_rc) = {
            let chunk = &store.chunks[a];
            (chunk.contig, chunk.contig_range.clone(), chunk.rc)
        };
        let source = store.chunks[b].contig;
        assert_ne!(target, source, "Cannot fold a contig onto itself");
        assert_eq!(
            store.chunks[b].contig_range,
            0..store.contigs[source].len(),
            "Folded chunk {:?} does not span its contig",
            b
        );

        if (a_rc ^ reverse_complement) != store.chunks[b].rc {
            Contig::flip(store, source);
        }
        let overlap = if a_rc { cigar.reverse() } else { cigar.clone() };
        let a_to_b = store
            .edit_cigar(a)
            .compose(&overlap)
            .compose(&store.edit_cigar(b).complement());
        debug!(
            "Folding contig {:?} ({} bp) onto {:?} at {}..{}",
            source,
            store.contigs[source].len(),
            target,
            a_range.start,
            a_range.end
        );

        let reference = store.contigs[target].seq[a_range.clone()].to_vec();
        let mut known: HashMap<(usize, usize, Vec<u8>), Handle<Mutation>> = HashMap::new();
        for (m, range) in store.contigs[target].mutations.iter() {
            if let Some(alt) = store.mutations[m].alt_seq() {
                known.insert((range.start, range.end, alt.to_vec()), m);
            }
        }

        for (member, range) in store.contigs[source].chunks.entries() {
            let produced = store.forward_sequence(member);
            let (window, path) = a_to_b.query_window(range.start, range.end);
            if window.is_empty() {
                let own = store.add_contig(produced.clone());
                trace!("Chunk {:?} has no anchor in {:?}, moved to {:?}", member, target, own);
                let chunk = &mut store.chunks[member];
                chunk.contig = own;
                chunk.contig_range = 0..produced.len();
                chunk.mutations.clear();
                store.contigs[own].chunks.insert(member, 0..produced.len());
                continue;
            }

            let path = path
                .compose(&store.edit_cigar(member))
                .disambiguate(&reference[window.clone()], &produced);
            let offset = a_range.start + window.start;
            let mut observed = Vec::new();
            for edit in path.minimal_edits(&reference[window.clone()], &produced) {
                let key = (
                    offset + edit.ref_range.start,
                    offset + edit.ref_range.end,
                    edit.alt,
                );
                let handle = match known.get(&key) {
                    Some(&handle) => handle,
                    None => {
                        let handle = store.add_mutation(target, Mutation::new(key.0..key.1, key.2.clone()));
                        known.insert(key, handle);
                        handle
                    }
                };
                observed.push(handle);
            }
            trace!(
                "Chunk {:?} -> {:?} {}..{} with {} mutations",
                member,
                target,
                offset,
                offset + window.len(),
                observed.len()
            );
            let image = offset..offset + window.len();
            let chunk = &mut store.chunks[member];
            chunk.contig = target;
            chunk.contig_range = image.clone();
            chunk.mutations = observed;
            store.contigs[target].chunks.insert(member, image);
        }

        let folded = store.release_contig(source);
        for (m, _) in folded.mutations.entries() {
            store.mutations.free(Unlinked::new(m));
        }
        store.touch(target);
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One read of `seq` mapped onto one contig of the same bases.
    fn single(store: &mut Store, seq: &[u8]) -> (Handle<Read>, Handle<Contig>, Handle<Chunk>) {
        let read = store.reads.allocate(Read::new("r".to_string(), seq.len()));
        let contig = store.add_contig(seq.to_vec());
        let chunk = store.link_chunk(Chunk {
            read,
            read_range: 0..seq.len(),
            contig,
            contig_range: 0..seq.len(),
            rc: false,
            mutations: Vec::new(),
        });
        (read, contig, chunk)
    }

    #[test]
    fn test_split_forward() {
        let mut store = Store::new();
        let (read, contig, chunk) = single(&mut store, b"ACGTACGTAC");
        let m = store.add_mutation(contig, Mutation::new(2..3, b"TT".to_vec()));
        store.chunks[chunk].mutations.push(m);
        store.update_chunk(chunk, |c| c.read_range = 0..11);
        store.reads[read].len = 11;

        let (left, right) = Chunk::split(&mut store, chunk, 5, None);
        let (left, right) = (left.unwrap(), right.unwrap());
        assert_eq!(store.chunks[left].read_range(), 0..6);
        assert_eq!(store.chunks[left].mutations(), &[m]);
        assert_eq!(store.chunks[right].read_range(), 6..11);
        assert_eq!(store.chunks[right].contig_range(), 5..10);
        assert!(store.chunks[right].mutations().is_empty());
        assert_eq!(store.reads[read].chunks.len(), 2);
    }

    #[test]
    fn test_split_reverse() {
        let mut store = Store::new();
        let (read, _, chunk) = single(&mut store, b"ACGTACGTAC");
        store.update_chunk(chunk, |c| c.rc = true);

        let (left, right) = Chunk::split(&mut store, chunk, 3, None);
        // Contig-left bases sit at the end of a reverse read.
        assert_eq!(store.chunks[left.unwrap()].read_range(), 7..10);
        assert_eq!(store.chunks[right.unwrap()].read_range(), 0..7);
        assert_eq!(store.reads[read].chunk_at(8), left);
    }

    #[test]
    fn test_split_drops_empty_side() {
        let mut store = Store::new();
        let (read, contig, chunk) = single(&mut store, b"ACGTACGT");
        let m = store.add_mutation(contig, Mutation::new(0..3, Vec::new()));
        store.chunks[chunk].mutations.push(m);
        store.update_chunk(chunk, |c| c.read_range = 0..5);
        store.reads[read].len = 5;

        let (left, right) = Chunk::split(&mut store, chunk, 3, None);
        assert!(left.is_none());
        assert_eq!(store.chunks[right.unwrap()].read_range(), 0..5);
    }

    #[test]
    fn test_insertion_side() {
        let mut store = Store::new();
        let (read, contig, chunk) = single(&mut store, b"ACGTACGT");
        let m = store.add_mutation(contig, Mutation::new(4..4, b"GG".to_vec()));
        store.chunks[chunk].mutations.push(m);
        store.update_chunk(chunk, |c| c.read_range = 0..10);
        store.reads[read].len = 10;

        let (left, _) = Chunk::split(&mut store, chunk, 4, Some(m));
        assert_eq!(store.chunks[left.unwrap()].read_range(), 0..6);
    }

    #[test]
    fn test_forward_sequence() {
        let mut store = Store::new();
        let (_, contig, chunk) = single(&mut store, b"ACGTACGT");
        let sub = store.add_mutation(contig, Mutation::new(1..2, b"T".to_vec()));
        let ins = store.add_mutation(contig, Mutation::new(4..4, b"GG".to_vec()));
        let del = store.add_mutation(contig, Mutation::new(6..7, Vec::new()));
        store.chunks[chunk].mutations = vec![sub, ins, del];
        assert_eq!(store.forward_sequence(chunk), b"ATGTGGACT".to_vec());
        assert_eq!(store.produced_len(chunk), 9);
        assert_eq!(store.edit_cigar(chunk).to_string(), "1=1X2=2I2=1D1=");
        store.chunks[chunk].rc = true;
        assert_eq!(store.chunk_sequence(chunk), b"AGTCCACAT".to_vec());
    }
}

//! Contigs: consensus sequences with chunk and mutation indexes

use crate::arena::Handle;
use crate::chunk::Chunk;
use crate::interval::IntervalIndex;
use crate::mutation::Mutation;
use crate::sequence::reverse_complement;
use crate::store::Store;
use tracing::{debug, trace};

/// A consensus sequence with the chunks mapped onto it and the edits they observe.
#[derive(Debug)]
pub struct Contig {
    pub(crate) seq: Vec<u8>,
    pub(crate) chunks: IntervalIndex<Chunk>,
    pub(crate) mutations: IntervalIndex<Mutation>,
}

impl Contig {
    pub(crate) fn new(seq: Vec<u8>) -> Self {
        Contig {
            seq,
            chunks: IntervalIndex::new(),
            mutations: IntervalIndex::new(),
        }
    }

    /// Reference bases.
    pub fn seq(&self) -> &[u8] {
        &self.seq
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Chunks mapped onto this contig, keyed by contig range.
    pub fn chunks(&self) -> &IntervalIndex<Chunk> {
        &self.chunks
    }

    /// Mutations of this contig, keyed by reference range.
    pub fn mutations(&self) -> &IntervalIndex<Mutation> {
        &self.mutations
    }

    /// Cuts `contig` at coordinate `at` and returns the new right-hand contig.
    ///
    /// Mutations straddling `at` are cut first, then chunks straddling `at`
    /// are split. Insertions sitting exactly at `at` follow their observers:
    /// chunks ending at `at` keep them on the left, chunks starting at `at`
    /// on the right, and straddling chunks keep only `keep_left` on the left.
    /// An insertion observed from both sides is duplicated.
    ///
    /// Cutting at either end of the contig is a no-op and returns `None`.
    pub(crate) fn cut(
        store: &mut Store,
        contig: Handle<Contig>,
        at: usize,
        keep_left: Option<Handle<Mutation>>,
    ) -> Option<Handle<Contig>> {
        let len = store.contigs[contig].len();
        assert!(at <= len, "Contig cut at {} beyond length {}", at, len);
        if at == 0 || at == len {
            return None;
        }
        debug!("Cutting contig {:?} ({} bp) at {}", contig, len, at);

        let straddling: Vec<_> = store.contigs[contig]
            .mutations
            .intersect(at, at)
            .filter(|(_, range)| range.start < at && at < range.end)
            .map(|(m, _)| m)
            .collect();
        for m in straddling {
            let observers = store.observers(contig, m);
            let start = store.mutations[m].start();
            let right = store.mutations[m].cut(at - start);
            let index = &mut store.contigs[contig].mutations;
            let erased = index.erase(m, start);
            assert!(erased.is_some(), "Mutation {:?} missing from its contig", m);
            index.insert(m, start..at);
            let right = store.add_mutation(contig, right);
            store.replace_observed(&observers, m, &[m, right]);
        }

        let insertions: Vec<_> = store.contigs[contig]
            .mutations
            .intersect(at, at)
            .filter(|(_, range)| range.start == at && range.end == at)
            .map(|(m, _)| m)
            .collect();
        let mut left_insertions = Vec::new();
        let mut right_insertions = Vec::new();
        for m in insertions {
            let observers = store.observers(contig, m);
            let right_observers: Vec<_> = observers
                .iter()
                .copied()
                .filter(|&c| {
                    let range = &store.chunks[c].contig_range;
                    range.start == at || (range.start < at && at < range.end && keep_left != Some(m))
                })
                .collect();
            store.contigs[contig].mutations.erase(m, at);
            if right_observers.is_empty() {
                left_insertions.push(m);
            } else if right_observers.len() == observers.len() {
                right_insertions.push(m);
            } else {
                let copy = store.mutations[m].clone();
                let copy = store.mutations.allocate(copy);
                store.replace_observed(&right_observers, m, &[copy]);
                left_insertions.push(m);
                right_insertions.push(copy);
            }
        }

        let straddling: Vec<_> = store.contigs[contig]
            .chunks
            .intersect(at, at)
            .filter(|(_, range)| range.start < at && at < range.end)
            .map(|(c, _)| c)
            .collect();
        for chunk in straddling {
            Chunk::split(store, chunk, at, keep_left);
        }

        let right = {
            let left = &mut store.contigs[contig];
            let mut chunks = left.chunks.split(at);
            let mut mutations = left.mutations.split(at);
            chunks.shift(-(at as isize));
            mutations.shift(-(at as isize));
            Contig {
                seq: left.seq.split_off(at),
                chunks,
                mutations,
            }
        };
        let right = store.contigs.allocate(right);
        for (c, range) in store.contigs[right].chunks.entries() {
            let chunk = &mut store.chunks[c];
            chunk.contig = right;
            chunk.contig_range = range;
        }
        for (m, range) in store.contigs[right].mutations.entries() {
            store.mutations[m].range = range;
        }
        for m in left_insertions {
            store.contigs[contig].mutations.insert(m, at..at);
        }
        for m in right_insertions {
            store.mutations[m].range = 0..0;
            store.contigs[right].mutations.insert(m, 0..0);
        }
        store.touch(contig);
        store.touch(right);
        Some(right)
    }

    /// Cuts the contig inside insertion `mutation`, after `offset` inserted bases.
    ///
    /// Chunks straddling the insertion see it split in two, one part on each
    /// side of the cut. Chunks that only touch it keep a whole copy.
    pub(crate) fn cut_insertion(
        store: &mut Store,
        contig: Handle<Contig>,
        mutation: Handle<Mutation>,
        offset: usize,
    ) -> Option<Handle<Contig>> {
        let at = store.mutations[mutation].start();
        let observers = store.observers(contig, mutation);
        let whole = store.mutations[mutation].clone();
        let tail = store.mutations[mutation].cut(offset);
        let tail = store.add_mutation(contig, tail);
        trace!("Insertion {:?} at {} cut after {} bases", mutation, at, offset);

        let (straddling, touching): (Vec<_>, Vec<_>) = observers.into_iter().partition(|&c| {
            let range = &store.chunks[c].contig_range;
            range.start < at && at < range.end
        });
        store.replace_observed(&straddling, mutation, &[mutation, tail]);
        if !touching.is_empty() {
            let whole = store.add_mutation(contig, whole);
            store.replace_observed(&touching, mutation, &[whole]);
        }
        Contig::cut(store, contig, at, Some(mutation))
    }

    /// Moves the alternate bases beyond the reference span of `mutation` into
    /// a new insertion at its end, observed by the same chunks.
    pub(crate) fn detach_tail(store: &mut Store, contig: Handle<Contig>, mutation: Handle<Mutation>) {
        let observers = store.observers(contig, mutation);
        let tail = store.mutations[mutation].detach_tail();
        let tail = store.add_mutation(contig, tail);
        store.replace_observed(&observers, mutation, &[mutation, tail]);
        store.touch(contig);
    }

    /// Moves insertion `mutation`, sitting on a contig boundary of `chunk`,
    /// into a new contig holding only the inserted bases.
    ///
    /// The read bases of the insertion get their own chunk on the new contig.
    /// The rest of `chunk` stays where it is, or is released if it produces
    /// no read bases any more.
    pub(crate) fn detach_insertion(
        store: &mut Store,
        chunk: Handle<Chunk>,
        mutation: Handle<Mutation>,
    ) -> Handle<Contig> {
        let (read, read_range, contig, contig_range, rc, first) = {
            let c = &store.chunks[chunk];
            let first = c.mutations.first() == Some(&mutation);
            let last = c.mutations.last() == Some(&mutation);
            assert!(first || last, "Insertion {:?} is not on a chunk boundary", mutation);
            (c.read, c.read_range.clone(), c.contig, c.contig_range.clone(), c.rc, first)
        };
        let m = &store.mutations[mutation];
        assert!(m.is_insertion(), "Mutation {:?} is not an insertion", mutation);
        assert!(
            (first && m.start() == contig_range.start) || m.start() == contig_range.end,
            "Insertion {:?} is not on a chunk boundary",
            mutation
        );
        let at_start = m.start() == contig_range.start && first;
        let mut bases = Vec::with_capacity(m.alt_len());
        m.write_alt(&mut bases);
        let n = bases.len();

        // Inserted bases lead the read when they lead the contig on a forward chunk.
        let (inserted, rest) = if at_start != rc {
            (read_range.start..read_range.start + n, read_range.start + n..read_range.end)
        } else {
            (read_range.end - n..read_range.end, read_range.start..read_range.end - n)
        };

        let own = store.add_contig(bases);
        store.touch(contig);
        debug!(
            "Detaching {} inserted bases at {} of {:?} into {:?}",
            n, contig_range.start, contig, own
        );
        if rest.is_empty() {
            store.release_chunk(chunk);
        } else {
            store.update_chunk(chunk, |c| {
                c.read_range = rest;
                c.mutations.retain(|&h| h != mutation);
            });
        }
        store.link_chunk(Chunk {
            read,
            read_range: inserted,
            contig: own,
            contig_range: 0..n,
            rc,
            mutations: Vec::new(),
        });
        if store.observers(contig, mutation).is_empty() {
            store.release_mutation(contig, mutation);
        }
        own
    }

    /// Appends `other` to the end of `contig`, moving all its chunks and mutations.
    pub(crate) fn splice_right(store: &mut Store, contig: Handle<Contig>, other: Handle<Contig>) {
        assert_ne!(contig, other, "Cannot splice a contig onto itself");
        let offset = store.contigs[contig].len();
        debug!(
            "Splicing contig {:?} ({} bp) after {:?} ({} bp)",
            other,
            store.contigs[other].len(),
            contig,
            offset
        );
        for (c, range) in store.contigs[other].chunks.entries() {
            let chunk = &mut store.chunks[c];
            chunk.contig = contig;
            chunk.contig_range = range.start + offset..range.end + offset;
        }
        for (m, _) in store.contigs[other].mutations.entries() {
            store.mutations[m].shift(offset as isize);
        }
        let mut tail = store.release_contig(other);
        tail.chunks.shift(offset as isize);
        tail.mutations.shift(offset as isize);
        let head = &mut store.contigs[contig];
        head.chunks.absorb(tail.chunks);
        head.mutations.absorb(tail.mutations);
        head.seq.extend_from_slice(&tail.seq);
        store.touch(contig);
    }

    /// Reverse-complements a contig in place.
    ///
    /// Coordinates are mirrored, chunk orientations toggled, observation
    /// lists reversed, and alternate sequences reverse-complemented.
    pub(crate) fn flip(store: &mut Store, contig: Handle<Contig>) {
        let len = store.contigs[contig].len();
        trace!("Flipping contig {:?} ({} bp)", contig, len);
        let (chunk_entries, mutation_entries) = {
            let c = &mut store.contigs[contig];
            c.seq = reverse_complement(&c.seq);
            (c.chunks.entries(), c.mutations.entries())
        };

        let mut chunks = Vec::with_capacity(chunk_entries.len());
        for (c, range) in chunk_entries {
            let mirrored = len - range.end..len - range.start;
            let chunk = &mut store.chunks[c];
            chunk.contig_range = mirrored.clone();
            chunk.rc = !chunk.rc;
            chunk.mutations.reverse();
            chunks.push((c, mirrored));
        }
        chunks.sort_by_key(|(c, range)| (range.start, *c));

        let mut mutations = Vec::with_capacity(mutation_entries.len());
        for (m, _) in mutation_entries {
            let mutation = &mut store.mutations[m];
            mutation.mirror(len);
            mutations.push((m, mutation.range()));
        }
        mutations.sort_by_key(|(m, range)| (range.start, *m));

        let c = &mut store.contigs[contig];
        c.chunks = IntervalIndex::from_sorted(&chunks);
        c.mutations = IntervalIndex::from_sorted(&mutations);
        store.touch(contig);
    }

    /// Releases the mutations of `contig` that no chunk observes. Returns their number.
    pub(crate) fn prune(store: &mut Store, contig: Handle<Contig>) -> usize {
        let unobserved: Vec<_> = store.contigs[contig]
            .mutations
            .iter()
            .map(|(m, _)| m)
            .filter(|&m| store.observers(contig, m).is_empty())
            .collect();
        for &m in &unobserved {
            store.release_mutation(contig, m);
        }
        if !unobserved.is_empty() {
            trace!("Pruned {} unobserved mutations from {:?}", unobserved.len(), contig);
        }
        unobserved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::Read;

    fn setup(seq: &[u8]) -> (Store, Handle<Read>, Handle<Contig>) {
        let mut store = Store::new();
        let read = store.reads.allocate(Read::new("r".to_string(), seq.len()));
        let contig = store.add_contig(seq.to_vec());
        store.link_chunk(Chunk {
            read,
            read_range: 0..seq.len(),
            contig,
            contig_range: 0..seq.len(),
            rc: false,
            mutations: Vec::new(),
        });
        (store, read, contig)
    }

    fn read_seq(store: &Store, read: Handle<Read>) -> Vec<u8> {
        store.reads[read]
            .chunks()
            .flat_map(|c| store.chunk_sequence(c))
            .collect()
    }

    #[test]
    fn test_cut_plain() {
        let (mut store, read, contig) = setup(b"AAACCCGGG");
        let right = Contig::cut(&mut store, contig, 3, None).unwrap();
        assert_eq!(store.contigs[contig].seq(), b"AAA");
        assert_eq!(store.contigs[right].seq(), b"CCCGGG");
        assert_eq!(store.reads[read].num_chunks(), 2);
        let second = store.reads[read].chunk_at(3).unwrap();
        assert_eq!(store.chunks[second].contig(), right);
        assert_eq!(store.chunks[second].contig_range(), 0..6);
        assert_eq!(read_seq(&store, read), b"AAACCCGGG".to_vec());
    }

    #[test]
    fn test_cut_at_end_is_noop() {
        let (mut store, read, contig) = setup(b"AAACCCGGG");
        let right = Contig::cut(&mut store, contig, 3, None).unwrap();
        assert!(Contig::cut(&mut store, contig, 3, None).is_none());
        assert!(Contig::cut(&mut store, right, 0, None).is_none());
        assert_eq!(store.contigs.len(), 2);
        assert_eq!(store.reads[read].num_chunks(), 2);
    }

    #[test]
    fn test_cut_through_mutation() {
        let (mut store, read, contig) = setup(b"AAACCCGGG");
        let chunk = store.reads[read].chunk_at(0).unwrap();
        let m = store.add_mutation(contig, Mutation::new(2..5, b"TT".to_vec()));
        store.update_chunk(chunk, |c| {
            c.mutations.push(m);
            c.read_range = 0..8;
        });
        store.reads[read].len = 8;
        let before = read_seq(&store, read);
        assert_eq!(before, b"AATTCGGG".to_vec());

        let right = Contig::cut(&mut store, contig, 4, None).unwrap();
        assert_eq!(store.contigs[contig].mutations().len(), 1);
        assert_eq!(store.contigs[right].mutations().len(), 1);
        let (tail, range) = store.contigs[right].mutations().entries()[0].clone();
        assert_eq!(range, 0..1);
        assert_eq!(store.mutations[tail].alt_len(), 0);
        assert_eq!(read_seq(&store, read), before);
    }

    #[test]
    fn test_cut_insertion_shared_by_both_sides() {
        let (mut store, read, contig) = setup(b"AAACCC");
        let chunk = store.reads[read].chunk_at(0).unwrap();
        // A second read ending where the first one's insertion sits.
        let other = store.reads.allocate(Read::new("o".to_string(), 5));
        let m = store.add_mutation(contig, Mutation::new(3..3, b"GG".to_vec()));
        store.update_chunk(chunk, |c| {
            c.mutations.push(m);
            c.read_range = 0..8;
        });
        store.reads[read].len = 8;
        store.link_chunk(Chunk {
            read: other,
            read_range: 0..5,
            contig,
            contig_range: 0..3,
            rc: false,
            mutations: vec![m],
        });

        let right = Contig::cut_insertion(&mut store, contig, m, 1).unwrap();
        assert_eq!(read_seq(&store, read), b"AAAGGCCC".to_vec());
        assert_eq!(read_seq(&store, other), b"AAAGG".to_vec());
        assert_eq!(store.contigs[contig].mutations().len(), 2);
        assert_eq!(store.contigs[right].mutations().len(), 1);
        assert!(store.reads[read].is_boundary(4));
    }

    #[test]
    fn test_splice_and_flip() {
        let (mut store, read, contig) = setup(b"AACCGGTT");
        let right = Contig::cut(&mut store, contig, 5, None).unwrap();
        Contig::flip(&mut store, right);
        assert_eq!(store.contigs[right].seq(), b"AAC");
        assert_eq!(read_seq(&store, read), b"AACCGGTT".to_vec());

        Contig::flip(&mut store, right);
        Contig::splice_right(&mut store, contig, right);
        assert_eq!(store.contigs.len(), 1);
        assert_eq!(store.contigs[contig].seq(), b"AACCGGTT");
        let chunks: Vec<_> = store.reads[read].chunks().collect();
        assert_eq!(store.chunks[chunks[1]].contig_range(), 5..8);
        assert_eq!(read_seq(&store, read), b"AACCGGTT".to_vec());
    }

    #[test]
    fn test_rejoined_insertion_copies_merge() {
        let (mut store, read, contig) = setup(b"AAACCC");
        let m = store.add_mutation(contig, Mutation::new(3..3, b"GG".to_vec()));
        let left = store.reads.allocate(Read::new("p".to_string(), 5));
        let right_read = store.reads.allocate(Read::new("q".to_string(), 5));
        for (r, range) in [(left, 0..3), (right_read, 3..6)] {
            store.link_chunk(Chunk {
                read: r,
                read_range: 0..5,
                contig,
                contig_range: range,
                rc: false,
                mutations: vec![m],
            });
        }

        let right = Contig::cut(&mut store, contig, 3, None).unwrap();
        assert_eq!(store.contigs[right].mutations().len(), 1);
        Contig::splice_right(&mut store, contig, right);
        assert_eq!(store.contigs[contig].mutations().len(), 2);
        assert!(crate::check::check_contig(&store, contig).is_err());

        assert_eq!(store.merge_duplicates(contig), 1);
        assert_eq!(store.contigs[contig].mutations().len(), 1);
        assert_eq!(store.mutations.len(), 1);
        assert_eq!(store.observers(contig, m).len(), 2);
        assert_eq!(read_seq(&store, left), b"AAAGG".to_vec());
        assert_eq!(read_seq(&store, right_read), b"GGCCC".to_vec());
        assert_eq!(read_seq(&store, read), b"AAACCC".to_vec());
        assert!(crate::check::check_contig(&store, contig).is_ok());
    }

    #[test]
    fn test_prune() {
        let (mut store, _, contig) = setup(b"AACCGGTT");
        store.add_mutation(contig, Mutation::new(1..2, b"G".to_vec()));
        assert_eq!(Contig::prune(&mut store, contig), 1);
        assert!(store.contigs[contig].mutations().is_empty());
        assert!(store.mutations.is_empty());
    }
}

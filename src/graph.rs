//! The read-overlap assembly graph
//!
//! [`Graph`] is the single writer of the [`Store`]. Its only mutating entry
//! points are [`Graph::add_read`] and [`Graph::add_overlap`]; everything else
//! is a read-only query. The graph is consistent between calls; internal
//! invariant violations inside a call panic.

use crate::arena::Handle;
use crate::check::{self, Violation};
use crate::chunk::Chunk;
use crate::chunker::{self, Window};
use crate::cigar::Cigar;
use crate::contig::Contig;
use crate::error::{GraphError, Result};
use crate::interval::Intersect;
use crate::mutation::Mutation;
use crate::read::Read;
use crate::sequence::{normalize_bases, reverse_complement};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::ops::Range;
use tracing::{debug, info, trace};

/// Tunables of [`Graph`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Audit touched reads and contigs at the end of every overlap
    pub check_after_overlap: bool,
    /// Rejoin adjacent contig fragments and merge adjacent chunks after every overlap
    pub compact_after_overlap: bool,
    /// Overlaps covering fewer read-1 bases after trimming are ignored
    pub min_overlap_len: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            check_after_overlap: true,
            compact_after_overlap: true,
            min_overlap_len: 1,
        }
    }
}

/// An alignment between windows of two reads.
///
/// `cigar` aligns `read1[r1_start..r1_start + r1_len]` (reference) against
/// `read2[r2_start..r2_start + r2_len]` (query), reverse-complemented when
/// `reverse_complement` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub read1: Handle<Read>,
    pub read2: Handle<Read>,
    pub r1_start: usize,
    pub r1_len: usize,
    pub r2_start: usize,
    pub r2_len: usize,
    pub reverse_complement: bool,
    pub cigar: String,
}

/// An incremental assembly graph of reads, contigs, chunks and mutations.
#[derive(Debug, Default)]
pub struct Graph {
    store: Store,
    names: HashMap<String, Handle<Read>>,
    config: GraphConfig,
    frozen: bool,
}

impl Graph {
    /// Creates an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty graph with the given configuration.
    pub fn with_config(config: GraphConfig) -> Self {
        Graph {
            config,
            ..Self::default()
        }
    }

    /// Get the graph configuration
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Read-only access to all entities.
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Returns `true` once alternate sequences have been stripped.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    // ------------------------------------------------------------------
    // Mutating entry points

    /// Adds a read as a fresh contig holding a single chunk.
    pub fn add_read(&mut self, name: &str, sequence: &[u8]) -> Result<Handle<Read>> {
        if self.frozen {
            return Err(GraphError::Frozen);
        }
        if self.names.contains_key(name) {
            return Err(GraphError::DuplicateRead(name.to_string()));
        }
        if name.is_empty() {
            return Err(GraphError::InvalidRead("read name is empty".to_string()));
        }
        if sequence.is_empty() {
            return Err(GraphError::InvalidRead(format!("{}: sequence is empty", name)));
        }
        let mut seq = sequence.to_vec();
        normalize_bases(&mut seq);
        let len = seq.len();

        let read = self.store.reads.allocate(Read::new(name.to_string(), len));
        let contig = self.store.add_contig(seq);
        self.store.link_chunk(Chunk {
            read,
            read_range: 0..len,
            contig,
            contig_range: 0..len,
            rc: false,
            mutations: Vec::new(),
        });
        // A fresh read touches nothing else.
        self.store.take_dirty();
        self.names.insert(name.to_string(), read);
        Ok(read)
    }

    /// Merges the contigs of two reads along an overlap alignment.
    ///
    /// Unanchored indels at both ends of the alignment are ignored; an
    /// alignment that trims to fewer than `min_overlap_len` reference bases
    /// is a no-op. Caller errors (unknown reads, windows outside the reads,
    /// malformed or inconsistent alignments) are returned before anything
    /// changes.
    pub fn add_overlap(&mut self, overlap: &Overlap) -> Result<()> {
        if self.frozen {
            return Err(GraphError::Frozen);
        }
        let Some((window, cigar)) = self.prepare(overlap)? else {
            return Ok(());
        };
        debug!(
            "Overlap {}[{}..{}] ~ {}[{}..{}]{} {}",
            self.store.reads[window.read1].name,
            window.r1.start,
            window.r1.end,
            self.store.reads[window.read2].name,
            window.r2.start,
            window.r2.end,
            if window.rc { " (rc)" } else { "" },
            cigar
        );

        Read::cut(&mut self.store, window.read1, window.r1.start);
        Read::cut(&mut self.store, window.read1, window.r1.end);
        Read::cut(&mut self.store, window.read2, window.r2.start);
        Read::cut(&mut self.store, window.read2, window.r2.end);

        'fold: loop {
            let triples = chunker::partition(&mut self.store, &window, &cigar);
            for triple in &triples {
                let a = self.store.chunks[triple.a].contig;
                let b = &self.store.chunks[triple.b];
                if a == b.contig {
                    continue;
                }
                if b.contig_range != (0..self.store.contigs[b.contig].len()) {
                    debug!("Chunk {:?} no longer spans its contig, re-partitioning", triple.b);
                    continue 'fold;
                }
                Chunk::collapse_through(&mut self.store, triple.a, triple.b, &triple.cigar, window.rc);
            }
            break;
        }
        self.settle();
        Ok(())
    }

    /// Validates an overlap without applying it.
    ///
    /// Returns `false` if the overlap would be ignored as too short.
    pub fn check_overlap(&self, overlap: &Overlap) -> Result<bool> {
        Ok(self.prepare(overlap)?.is_some())
    }

    // Validates an overlap and returns its trimmed window and disambiguated alignment.
    fn prepare(&self, overlap: &Overlap) -> Result<Option<(Window, Cigar)>> {
        let read1 = self.checked_read(overlap.read1)?;
        let read2 = self.checked_read(overlap.read2)?;
        if overlap.read1 == overlap.read2 {
            return Err(GraphError::InvalidOverlap(format!(
                "{}: a read cannot overlap itself",
                read1.name
            )));
        }
        let r1 = Self::window(read1, overlap.r1_start, overlap.r1_len)?;
        let r2 = Self::window(read2, overlap.r2_start, overlap.r2_len)?;
        for (read, window) in [(read1, &r1), (read2, &r2)] {
            if window.end > read.len {
                return Err(GraphError::InvalidOverlap(format!(
                    "{}: window {}..{} exceeds read length {}",
                    read.name, window.start, window.end, read.len
                )));
            }
        }
        let cigar = Cigar::parse(&overlap.cigar)?;
        if cigar.ref_len() != r1.len() || cigar.query_len() != r2.len() {
            return Err(GraphError::InvalidOverlap(format!(
                "{} ~ {}: alignment covers {}x{} bases but the windows are {}x{}",
                read1.name,
                read2.name,
                cigar.ref_len(),
                cigar.query_len(),
                r1.len(),
                r2.len()
            )));
        }

        let trimmed = cigar.trimmed();
        if trimmed.cigar.is_empty() || trimmed.cigar.ref_len() < self.config.min_overlap_len {
            debug!(
                "Ignoring overlap {} ~ {}: {} aligned reference bases",
                read1.name,
                read2.name,
                trimmed.cigar.ref_len()
            );
            return Ok(None);
        }
        let r1 = r1.start + trimmed.ref_head..r1.end - trimmed.ref_tail;
        let r2 = if overlap.reverse_complement {
            r2.start + trimmed.query_tail..r2.end - trimmed.query_head
        } else {
            r2.start + trimmed.query_head..r2.end - trimmed.query_tail
        };

        let reference = self.read_sequence(overlap.read1);
        let query = self.read_sequence(overlap.read2);
        let query = if overlap.reverse_complement {
            reverse_complement(&query[r2.clone()])
        } else {
            query[r2.clone()].to_vec()
        };
        let reference = &reference[r1.clone()];
        if let Some(offset) = trimmed.cigar.false_match(reference, &query) {
            return Err(GraphError::InvalidOverlap(format!(
                "{} ~ {}: alignment claims a match at {} but the bases differ",
                read1.name,
                read2.name,
                r1.start + offset
            )));
        }
        let cigar = trimmed.cigar.disambiguate(reference, &query);
        let window = Window {
            read1: overlap.read1,
            read2: overlap.read2,
            r1,
            r2,
            rc: overlap.reverse_complement,
        };
        Ok(Some((window, cigar)))
    }

    fn window(read: &Read, start: usize, len: usize) -> Result<Range<usize>> {
        start
            .checked_add(len)
            .map(|end| start..end)
            .ok_or_else(|| {
                GraphError::InvalidOverlap(format!(
                    "{}: window of {} bases at {} is out of range",
                    read.name, len, start
                ))
            })
    }

    fn checked_read(&self, read: Handle<Read>) -> Result<&Read> {
        self.store
            .reads
            .try_get(read)
            .ok_or_else(|| GraphError::UnknownRead(format!("{:?}", read)))
    }

    // Prunes, compacts, merges duplicate mutations and audits everything the
    // last overlap touched.
    fn settle(&mut self) {
        let dirty = self.store.take_dirty();
        for &contig in &dirty {
            Contig::prune(&mut self.store, contig);
        }
        if self.config.compact_after_overlap {
            for read in self.reads_of(&dirty) {
                self.compact_read(read);
            }
        }
        let contigs: BTreeSet<_> = dirty
            .into_iter()
            .chain(self.store.take_dirty())
            .filter(|&c| self.store.contigs.contains(c))
            .collect();
        for &contig in &contigs {
            let merged = self.store.merge_duplicates(contig);
            if merged > 0 {
                trace!("Merged {} duplicate mutations in {:?}", merged, contig);
            }
        }
        if self.config.check_after_overlap {
            let contigs: Vec<_> = contigs.into_iter().collect();
            for read in self.reads_of(&contigs) {
                if let Err(violation) = check::check_read(&self.store, read) {
                    panic!("Graph invariant violated: {}", violation);
                }
            }
            for contig in contigs {
                if let Err(violation) = check::check_contig(&self.store, contig) {
                    panic!("Graph invariant violated: {}", violation);
                }
            }
        }
    }

    fn reads_of(&self, contigs: &[Handle<Contig>]) -> BTreeSet<Handle<Read>> {
        contigs
            .iter()
            .filter(|&&c| self.store.contigs.contains(c))
            .flat_map(|&c| self.store.contigs[c].chunks.iter())
            .map(|(chunk, _)| self.store.chunks[chunk].read)
            .collect()
    }

    // ------------------------------------------------------------------
    // Compaction

    // Splices and coalesces along one read until nothing changes.
    fn compact_read(&mut self, read: Handle<Read>) {
        loop {
            let chunks: Vec<_> = self.store.reads[read].chunks().collect();
            let changed = chunks
                .windows(2)
                .any(|pair| self.try_splice(pair[0], pair[1]) || self.try_coalesce(pair[0], pair[1]));
            if !changed {
                break;
            }
        }
    }

    // Joins the contigs of read-consecutive chunks `x` and `y` if the read
    // leaves the first contig at one end and enters the second at one end.
    fn try_splice(&mut self, x: Handle<Chunk>, y: Handle<Chunk>) -> bool {
        let store = &self.store;
        let (xc, yc) = (&store.chunks[x], &store.chunks[y]);
        if xc.contig == yc.contig {
            return false;
        }
        let (x_len, y_len) = (store.contigs[xc.contig].len(), store.contigs[yc.contig].len());
        let exits = if xc.rc {
            xc.contig_range.start == 0
        } else {
            xc.contig_range.end == x_len
        };
        let enters = if yc.rc {
            yc.contig_range.end == y_len
        } else {
            yc.contig_range.start == 0
        };
        if !exits || !enters {
            return false;
        }
        let (x_contig, y_contig) = (xc.contig, yc.contig);
        if xc.rc != yc.rc {
            let shorter = if x_len < y_len { x_contig } else { y_contig };
            Contig::flip(&mut self.store, shorter);
        }
        if self.store.chunks[x].rc {
            Contig::splice_right(&mut self.store, y_contig, x_contig);
        } else {
            Contig::splice_right(&mut self.store, x_contig, y_contig);
        }
        true
    }

    // Merges read-consecutive chunks `x` and `y` that are also adjacent on the same contig strand.
    fn try_coalesce(&mut self, x: Handle<Chunk>, y: Handle<Chunk>) -> bool {
        let store = &self.store;
        let (xc, yc) = (&store.chunks[x], &store.chunks[y]);
        if xc.contig != yc.contig || xc.rc != yc.rc {
            return false;
        }
        let (first, second) = if xc.rc { (yc, xc) } else { (xc, yc) };
        if first.contig_range.end != second.contig_range.start {
            return false;
        }
        if let (Some(&l), Some(&r)) = (first.mutations.last(), second.mutations.first()) {
            let (l, r) = (&store.mutations[l], &store.mutations[r]);
            if l.is_insertion() && r.is_insertion() && l.start() == r.start() {
                return false;
            }
        }
        let merged = Chunk {
            read: xc.read,
            read_range: xc.read_range.start..yc.read_range.end,
            contig: xc.contig,
            contig_range: first.contig_range.start..second.contig_range.end,
            rc: xc.rc,
            mutations: first.mutations.iter().chain(&second.mutations).copied().collect(),
        };
        self.store.release_chunk(x);
        self.store.release_chunk(y);
        self.store.link_chunk(merged);
        true
    }

    // ------------------------------------------------------------------
    // Maintenance

    /// Drops all alternate sequences, keeping only their lengths.
    ///
    /// The graph stays queryable but can no longer be extended; reconstructed
    /// sequences show stripped bases as `N`.
    pub fn strip_alternates(&mut self) {
        let handles = self.store.mutations.handles();
        for &m in &handles {
            self.store.mutations[m].strip();
        }
        self.frozen = true;
        info!("Stripped alternate sequences of {} mutations", handles.len());
    }

    // ------------------------------------------------------------------
    // Queries

    /// Looks up a read by name.
    pub fn read_by_name(&self, name: &str) -> Option<Handle<Read>> {
        self.names.get(name).copied()
    }

    /// Get a read by handle
    pub fn read(&self, read: Handle<Read>) -> &Read {
        &self.store.reads[read]
    }

    /// Get a contig by handle
    pub fn contig(&self, contig: Handle<Contig>) -> &Contig {
        &self.store.contigs[contig]
    }

    /// Get a chunk by handle
    pub fn chunk(&self, chunk: Handle<Chunk>) -> &Chunk {
        &self.store.chunks[chunk]
    }

    /// Get a mutation by handle
    pub fn mutation(&self, mutation: Handle<Mutation>) -> &Mutation {
        &self.store.mutations[mutation]
    }

    /// All reads in insertion order.
    pub fn reads(&self) -> impl Iterator<Item = (Handle<Read>, &Read)> {
        self.store.reads.iter()
    }

    /// All live contigs.
    pub fn contigs(&self) -> impl Iterator<Item = (Handle<Contig>, &Contig)> {
        self.store.contigs.iter()
    }

    /// Number of reads
    pub fn num_reads(&self) -> usize {
        self.store.reads.len()
    }

    /// Number of live contigs
    pub fn num_contigs(&self) -> usize {
        self.store.contigs.len()
    }

    /// Number of chunks across all reads
    pub fn num_chunks(&self) -> usize {
        self.store.chunks.len()
    }

    /// Number of mutations across all contigs
    pub fn num_mutations(&self) -> usize {
        self.store.mutations.len()
    }

    /// The chunk partition of a read, in read order.
    pub fn read_chunks(&self, read: Handle<Read>) -> Vec<Handle<Chunk>> {
        self.store.reads[read].chunks().collect()
    }

    /// Chunks of a contig intersecting `range`.
    pub fn contig_chunks(&self, contig: Handle<Contig>, range: Range<usize>) -> Intersect<'_, Chunk> {
        self.store.contigs[contig].chunks.intersect(range.start, range.end)
    }

    /// Mutations of a contig intersecting `range`.
    pub fn contig_mutations(&self, contig: Handle<Contig>, range: Range<usize>) -> Intersect<'_, Mutation> {
        self.store.contigs[contig].mutations.intersect(range.start, range.end)
    }

    /// Chunks observing a mutation of a contig.
    pub fn observers(&self, contig: Handle<Contig>, mutation: Handle<Mutation>) -> Vec<Handle<Chunk>> {
        self.store.observers(contig, mutation)
    }

    /// Bases of a chunk in read orientation.
    pub fn chunk_sequence(&self, chunk: Handle<Chunk>) -> Vec<u8> {
        self.store.chunk_sequence(chunk)
    }

    /// Rebuilds a read from its chunks, their contigs and observed mutations.
    pub fn read_sequence(&self, read: Handle<Read>) -> Vec<u8> {
        let r = &self.store.reads[read];
        let mut seq = Vec::with_capacity(r.len);
        for chunk in r.chunks() {
            seq.extend(self.store.chunk_sequence(chunk));
        }
        seq
    }

    /// Runs the full invariant audit.
    pub fn check_all(&self) -> bool {
        self.validate().is_ok()
    }

    /// Runs the full invariant audit and reports the first violation.
    pub fn validate(&self) -> std::result::Result<(), Violation> {
        check::check_all(&self.store)
    }

    /// Writes every contig as a FASTA record, 80 bases per line.
    pub fn write_contigs_fasta<W: Write>(&self, mut writer: W) -> Result<()> {
        for (index, (handle, contig)) in self.contigs().enumerate() {
            writeln!(
                writer,
                ">contig{} len={} chunks={} mutations={}",
                index + 1,
                contig.len(),
                contig.chunks.len(),
                contig.mutations.len()
            )?;
            debug!("Writing contig {:?} as contig{}", handle, index + 1);
            for line in contig.seq().chunks(80) {
                writer.write_all(line)?;
                writer.write_all(b"\n")?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

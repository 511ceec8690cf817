//! Structural audit of the graph
//!
//! Each check returns the first [`Violation`] it finds. The graph runs the
//! read and contig checks on everything an overlap touched and treats a
//! violation as fatal; [`check_all`] audits the whole store.

use crate::arena::Handle;
use crate::contig::Contig;
use crate::mutation::Alt;
use crate::read::Read;
use crate::store::Store;
use std::collections::HashSet;
use thiserror::Error;

/// A broken structural invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{subject}: {message}")]
pub struct Violation {
    pub subject: String,
    pub message: String,
}

type Check = std::result::Result<(), Violation>;

fn fail<T: std::fmt::Debug>(subject: T, message: String) -> Check {
    Err(Violation {
        subject: format!("{:?}", subject),
        message,
    })
}

macro_rules! ensure {
    ($cond:expr, $subject:expr, $($arg:tt)+) => {
        if !$cond {
            return fail($subject, format!($($arg)+));
        }
    };
}

/// Checks the chunk partition of one read and every chunk on it.
pub fn check_read(store: &Store, read: Handle<Read>) -> Check {
    let Some(r) = store.reads.try_get(read) else {
        return fail(read, "read is not live".to_string());
    };
    let mut expected = 0;
    for (&start, &chunk) in &r.chunks {
        let Some(c) = store.chunks.try_get(chunk) else {
            return fail(read, format!("chunk {:?} at {} is not live", chunk, start));
        };
        ensure!(c.read == read, chunk, "belongs to {:?}, listed by {:?}", c.read, read);
        ensure!(
            c.read_range.start == start,
            chunk,
            "keyed at {} but starts at {}",
            start,
            c.read_range.start
        );
        ensure!(
            start == expected,
            read,
            "partition has a {} at {}",
            if start > expected { "gap" } else { "overlap" },
            expected
        );
        ensure!(!c.read_range.is_empty(), chunk, "covers no read bases");
        expected = c.read_range.end;

        let Some(contig) = store.contigs.try_get(c.contig) else {
            return fail(chunk, format!("contig {:?} is not live", c.contig));
        };
        let range = &c.contig_range;
        ensure!(
            range.start < range.end && range.end <= contig.len(),
            chunk,
            "contig range {}..{} outside 0..{}",
            range.start,
            range.end,
            contig.len()
        );
        ensure!(
            contig.chunks.get(chunk, range.start).as_ref() == Some(range),
            chunk,
            "missing from the chunk index of {:?}",
            c.contig
        );

        let mut previous: Option<&crate::mutation::Mutation> = None;
        for &m in &c.mutations {
            let Some(mutation) = store.mutations.try_get(m) else {
                return fail(chunk, format!("observes dead mutation {:?}", m));
            };
            ensure!(
                contig.mutations.get(m, mutation.start()) == Some(mutation.range()),
                chunk,
                "observes {:?} which {:?} does not index",
                m,
                c.contig
            );
            ensure!(
                range.start <= mutation.start() && mutation.end() <= range.end,
                chunk,
                "observes {:?} at {:?} outside {}..{}",
                m,
                mutation.range(),
                range.start,
                range.end
            );
            if let Some(prev) = previous {
                let ordered = prev.end() < mutation.start()
                    || (prev.end() == mutation.start()
                        && !(prev.is_insertion() && mutation.is_insertion()));
                ensure!(
                    ordered,
                    chunk,
                    "observed mutations {:?} and {:?} are out of order or overlap",
                    prev.range(),
                    mutation.range()
                );
            }
            previous = Some(mutation);
        }
        let produced = store.produced_len(chunk);
        ensure!(
            produced == c.read_range.len(),
            chunk,
            "produces {} bases for a read range of {}",
            produced,
            c.read_range.len()
        );
    }
    ensure!(
        expected == r.len,
        read,
        "partition ends at {} of {}",
        expected,
        r.len
    );
    Ok(())
}

/// Checks the indexes of one contig against the chunks and mutations they hold.
pub fn check_contig(store: &Store, contig: Handle<Contig>) -> Check {
    let Some(c) = store.contigs.try_get(contig) else {
        return fail(contig, "contig is not live".to_string());
    };
    if let Err(message) = c.chunks.validate() {
        return fail(contig, format!("chunk index: {}", message));
    }
    if let Err(message) = c.mutations.validate() {
        return fail(contig, format!("mutation index: {}", message));
    }
    ensure!(!c.chunks.is_empty(), contig, "has no chunks");

    for (chunk, range) in c.chunks.iter() {
        let Some(ch) = store.chunks.try_get(chunk) else {
            return fail(contig, format!("indexes dead chunk {:?}", chunk));
        };
        ensure!(ch.contig == contig, chunk, "indexed by {:?} but maps to {:?}", contig, ch.contig);
        ensure!(
            ch.contig_range == range,
            chunk,
            "indexed at {:?} but maps to {:?}",
            range,
            ch.contig_range
        );
        ensure!(
            store.reads.try_get(ch.read).and_then(|r| r.chunks.get(&ch.read_range.start)) == Some(&chunk),
            chunk,
            "missing from the partition of {:?}",
            ch.read
        );
    }

    let mut seen = HashSet::new();
    for (m, range) in c.mutations.iter() {
        let Some(mutation) = store.mutations.try_get(m) else {
            return fail(contig, format!("indexes dead mutation {:?}", m));
        };
        ensure!(mutation.range() == range, m, "indexed at {:?} but spans {:?}", range, mutation.range());
        ensure!(range.end <= c.len(), m, "ends at {} beyond {}", range.end, c.len());
        ensure!(
            mutation.ref_len() + mutation.alt_len() > 0,
            m,
            "is empty"
        );
        ensure!(
            !store.observers(contig, m).is_empty(),
            m,
            "is not observed by any chunk of {:?}",
            contig
        );
        if let Alt::Seq(alt) = mutation.alt() {
            ensure!(
                seen.insert((range.start, range.end, alt.as_slice())),
                m,
                "duplicates another edit at {:?}",
                range
            );
        }
    }
    Ok(())
}

/// Audits every read and contig, then checks that no chunk or mutation is orphaned.
pub fn check_all(store: &Store) -> Check {
    for (read, _) in store.reads.iter() {
        check_read(store, read)?;
    }
    let (mut chunks, mut mutations) = (0, 0);
    for (contig, c) in store.contigs.iter() {
        check_contig(store, contig)?;
        chunks += c.chunks.len();
        mutations += c.mutations.len();
    }
    let partitioned: usize = store.reads.iter().map(|(_, r)| r.chunks.len()).sum();
    if chunks != store.chunks.len() || partitioned != store.chunks.len() {
        return Err(Violation {
            subject: "store".to_string(),
            message: format!(
                "{} live chunks, {} indexed by contigs, {} in read partitions",
                store.chunks.len(),
                chunks,
                partitioned
            ),
        });
    }
    if mutations != store.mutations.len() {
        return Err(Violation {
            subject: "store".to_string(),
            message: format!(
                "{} live mutations, {} indexed by contigs",
                store.mutations.len(),
                mutations
            ),
        });
    }
    Ok(())
}

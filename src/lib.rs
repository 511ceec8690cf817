//! readgraph - incremental read-overlap assembly graphs
//!
//! A library for merging sequencing reads into contigs one pairwise overlap
//! at a time. Reads are partitioned into chunks, each mapped onto an interval
//! of a contig; the differences between a read and the contig it maps to are
//! kept as shared mutations indexed by contig coordinates.
//!
//! # Features
//!
//! - Arena storage with typed handles for reads, contigs, chunks and mutations
//! - Interval-indexed chunk and mutation lookups per contig
//! - CIGAR parsing, trimming, composition and edit extraction
//! - Incremental merging of contigs along overlap alignments, including
//!   reverse-complement overlaps and indels
//! - Structural audit of the whole graph
//! - FASTA/PAF input and assembly statistics
//!
//! # Example
//!
//! ```no_run
//! use readgraph::graph::{Graph, Overlap};
//! use readgraph::stats::AssemblyStats;
//!
//! let mut graph = Graph::new();
//! let r1 = graph.add_read("r1", b"AAACCCGGGTTT").unwrap();
//! let r2 = graph.add_read("r2", b"CCCGGGTTTAAA").unwrap();
//! graph
//!     .add_overlap(&Overlap {
//!         read1: r1,
//!         read2: r2,
//!         r1_start: 3,
//!         r1_len: 9,
//!         r2_start: 0,
//!         r2_len: 9,
//!         reverse_complement: false,
//!         cigar: "9=".to_string(),
//!     })
//!     .unwrap();
//! assert_eq!(graph.num_contigs(), 1);
//! println!("{}", AssemblyStats::from_graph(&graph).format_summary());
//! ```

pub mod arena;
pub mod check;
pub mod chunk;
mod chunker;
pub mod cigar;
pub mod cli;
pub mod contig;
pub mod error;
pub mod graph;
pub mod input;
pub mod interval;
pub mod mutation;
pub mod read;
pub mod sequence;
pub mod stats;
pub mod store;

pub use arena::Handle;
pub use cigar::Cigar;
pub use error::{GraphError, Result};
pub use graph::{Graph, GraphConfig, Overlap};
pub use stats::AssemblyStats;

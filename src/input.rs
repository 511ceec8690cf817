//! Read and overlap input files
//!
//! Reads come from FASTA, overlaps from PAF with a `cg:Z:` alignment tag.
//! Both may be gzip-compressed (`.gz`).

use crate::error::{GraphError, Result};
use crate::graph::{Graph, Overlap};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Opens a plain or gzip-compressed text file.
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(GraphError::FileNotFound(path.display().to_string()));
    }
    let file = File::open(path)?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// A named sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub name: String,
    pub seq: Vec<u8>,
}

/// Parses FASTA records; sequences may span several lines.
pub fn read_fasta<R: BufRead>(reader: R) -> Result<Vec<FastaRecord>> {
    let mut records = Vec::new();
    let mut current: Option<FastaRecord> = None;

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            records.extend(current.take());
            let name = header.split_whitespace().next().ok_or_else(|| GraphError::Parse {
                line: line_num + 1,
                message: "FASTA header without a name".to_string(),
            })?;
            current = Some(FastaRecord {
                name: name.to_string(),
                seq: Vec::new(),
            });
        } else {
            let record = current.as_mut().ok_or_else(|| GraphError::Parse {
                line: line_num + 1,
                message: "sequence line before the first header".to_string(),
            })?;
            record.seq.extend_from_slice(line.as_bytes());
        }
    }
    records.extend(current);
    Ok(records)
}

/// Parses a FASTA file from a path.
pub fn read_fasta_file<P: AsRef<Path>>(path: P) -> Result<Vec<FastaRecord>> {
    read_fasta(open_input(path)?)
}

/// One PAF line. The target plays the reference role, the query is aligned against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PafRecord {
    pub query_name: String,
    pub query_len: usize,
    pub query_start: usize,
    pub query_end: usize,
    pub reverse: bool,
    pub target_name: String,
    pub target_len: usize,
    pub target_start: usize,
    pub target_end: usize,
    pub cigar: String,
    /// Line number in the input file, for error messages
    pub line: usize,
}

impl PafRecord {
    /// Parses one tab-separated PAF line.
    pub fn parse_line(line: &str, line_num: usize) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            return Err(GraphError::Parse {
                line: line_num,
                message: format!("PAF record requires at least 12 fields, found {}", fields.len()),
            });
        }
        let number = |index: usize, what: &str| -> Result<usize> {
            fields[index].parse().map_err(|_| GraphError::Parse {
                line: line_num,
                message: format!("invalid {}: {}", what, fields[index]),
            })
        };
        let reverse = match fields[4] {
            "+" => false,
            "-" => true,
            other => {
                return Err(GraphError::Parse {
                    line: line_num,
                    message: format!("invalid strand: {}", other),
                })
            }
        };
        let cigar = fields[12..]
            .iter()
            .find_map(|tag| tag.strip_prefix("cg:Z:"))
            .ok_or_else(|| GraphError::Parse {
                line: line_num,
                message: "missing cg:Z: alignment tag".to_string(),
            })?;

        let record = PafRecord {
            query_name: fields[0].to_string(),
            query_len: number(1, "query length")?,
            query_start: number(2, "query start")?,
            query_end: number(3, "query end")?,
            reverse,
            target_name: fields[5].to_string(),
            target_len: number(6, "target length")?,
            target_start: number(7, "target start")?,
            target_end: number(8, "target end")?,
            cigar: cigar.to_string(),
            line: line_num,
        };
        if record.query_start > record.query_end || record.target_start > record.target_end {
            return Err(GraphError::Parse {
                line: line_num,
                message: "alignment start after its end".to_string(),
            });
        }
        Ok(record)
    }

    /// Resolves the record's read names against `graph`.
    pub fn to_overlap(&self, graph: &Graph) -> Result<Overlap> {
        let resolve = |name: &str, len: usize| -> Result<_> {
            let read = graph
                .read_by_name(name)
                .ok_or_else(|| GraphError::UnknownRead(name.to_string()))?;
            let actual = graph.read(read).len();
            if actual != len {
                return Err(GraphError::InvalidOverlap(format!(
                    "line {}: {} has length {} but the record says {}",
                    self.line, name, actual, len
                )));
            }
            Ok(read)
        };
        Ok(Overlap {
            read1: resolve(&self.target_name, self.target_len)?,
            read2: resolve(&self.query_name, self.query_len)?,
            r1_start: self.target_start,
            r1_len: self.target_end - self.target_start,
            r2_start: self.query_start,
            r2_len: self.query_end - self.query_start,
            reverse_complement: self.reverse,
            cigar: self.cigar.clone(),
        })
    }
}

/// Parses PAF records, skipping blank and `#` lines.
pub fn read_paf<R: BufRead>(reader: R) -> Result<Vec<PafRecord>> {
    let mut records = Vec::new();
    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        records.push(PafRecord::parse_line(line, line_num + 1)?);
    }
    Ok(records)
}

/// Parses a PAF file from a path.
pub fn read_paf_file<P: AsRef<Path>>(path: P) -> Result<Vec<PafRecord>> {
    read_paf(open_input(path)?)
}

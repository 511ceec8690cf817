//! Summary statistics of an assembly graph

use crate::graph::Graph;
use crate::mutation::MutationKind;
use serde::{Deserialize, Serialize};

/// Statistics about an assembly graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyStats {
    /// Number of reads
    pub read_count: usize,
    /// Number of contigs
    pub contig_count: usize,
    /// Number of chunks (read pieces mapped onto contigs)
    pub chunk_count: usize,
    /// Number of mutations
    pub mutation_count: usize,
    /// Substitutions among the mutations
    pub substitutions: usize,
    /// Insertions among the mutations
    pub insertions: usize,
    /// Deletions among the mutations
    pub deletions: usize,
    /// Total length of all reads
    pub total_read_length: u64,
    /// Total length of all contigs
    pub total_contig_length: u64,
    /// Average contig length
    pub average_contig_length: f64,
    /// Minimum contig length
    pub min_contig_length: usize,
    /// Maximum contig length
    pub max_contig_length: usize,
    /// N50 of contig lengths
    pub n50: usize,
    /// GC content percentage of the contigs
    pub gc_content: f64,
    /// Average number of chunks per read
    pub chunks_per_read: f64,
    /// Contig length histogram (binned)
    pub contig_length_histogram: Vec<(String, usize)>,
}

impl AssemblyStats {
    /// Compute statistics from a graph
    pub fn from_graph(graph: &Graph) -> Self {
        let contig_lengths: Vec<usize> = graph.contigs().map(|(_, c)| c.len()).collect();

        let (min_contig_length, max_contig_length, average_contig_length) =
            match (contig_lengths.iter().min(), contig_lengths.iter().max()) {
                (Some(&min), Some(&max)) => {
                    let avg = contig_lengths.iter().sum::<usize>() as f64 / contig_lengths.len() as f64;
                    (min, max, avg)
                }
                _ => (0, 0, 0.0),
            };

        let (mut substitutions, mut insertions, mut deletions) = (0, 0, 0);
        for (_, m) in graph.store().mutations().iter() {
            match m.kind() {
                MutationKind::Substitution => substitutions += 1,
                MutationKind::Insertion => insertions += 1,
                MutationKind::Deletion => deletions += 1,
            }
        }

        let read_count = graph.num_reads();
        let chunk_count = graph.num_chunks();
        let chunks_per_read = if read_count == 0 {
            0.0
        } else {
            chunk_count as f64 / read_count as f64
        };

        AssemblyStats {
            read_count,
            contig_count: graph.num_contigs(),
            chunk_count,
            mutation_count: graph.num_mutations(),
            substitutions,
            insertions,
            deletions,
            total_read_length: graph.reads().map(|(_, r)| r.len() as u64).sum(),
            total_contig_length: contig_lengths.iter().map(|&l| l as u64).sum(),
            average_contig_length,
            min_contig_length,
            max_contig_length,
            n50: compute_n50(&contig_lengths),
            gc_content: compute_gc_content(graph),
            chunks_per_read,
            contig_length_histogram: compute_length_histogram(&contig_lengths),
        }
    }

    /// Format statistics as a human-readable string
    pub fn format_summary(&self) -> String {
        let mut output = String::new();
        output.push_str("=== Assembly Graph Statistics ===\n\n");

        output.push_str(&format!("Reads:                   {:>12}\n", self.read_count));
        output.push_str(&format!("Contigs:                 {:>12}\n", self.contig_count));
        output.push_str(&format!("Chunks:                  {:>12}\n", self.chunk_count));
        output.push_str(&format!(
            "Chunks per read:         {:>12.2}\n",
            self.chunks_per_read
        ));
        output.push('\n');

        output.push_str("--- Mutations ---\n");
        output.push_str(&format!("Total:                   {:>12}\n", self.mutation_count));
        output.push_str(&format!("Substitutions:           {:>12}\n", self.substitutions));
        output.push_str(&format!("Insertions:              {:>12}\n", self.insertions));
        output.push_str(&format!("Deletions:               {:>12}\n", self.deletions));
        output.push('\n');

        output.push_str("--- Sequence Statistics ---\n");
        output.push_str(&format!(
            "Total read length:       {:>12} bp\n",
            self.total_read_length
        ));
        output.push_str(&format!(
            "Total contig length:     {:>12} bp\n",
            self.total_contig_length
        ));
        output.push_str(&format!(
            "Average contig length:   {:>12.2} bp\n",
            self.average_contig_length
        ));
        output.push_str(&format!(
            "Min contig length:       {:>12} bp\n",
            self.min_contig_length
        ));
        output.push_str(&format!(
            "Max contig length:       {:>12} bp\n",
            self.max_contig_length
        ));
        output.push_str(&format!("N50:                     {:>12} bp\n", self.n50));
        output.push_str(&format!(
            "GC content:              {:>12.2}%\n",
            self.gc_content
        ));
        output.push('\n');

        output.push_str("--- Contig Length Distribution ---\n");
        for (bin, count) in &self.contig_length_histogram {
            if *count > 0 {
                output.push_str(&format!("{:>15}: {:>8}\n", bin, count));
            }
        }

        output
    }

    /// Export statistics as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn compute_n50(lengths: &[usize]) -> usize {
    let mut sorted = lengths.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let half = sorted.iter().sum::<usize>().div_ceil(2);
    let mut cumsum = 0;
    for len in sorted {
        cumsum += len;
        if cumsum >= half {
            return len;
        }
    }
    0
}

fn compute_gc_content(graph: &Graph) -> f64 {
    let (mut gc, mut total) = (0u64, 0u64);
    for (_, contig) in graph.contigs() {
        for base in contig.seq() {
            match base.to_ascii_uppercase() {
                b'G' | b'C' => {
                    gc += 1;
                    total += 1;
                }
                b'A' | b'T' => total += 1,
                _ => {}
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        gc as f64 / total as f64 * 100.0
    }
}

fn compute_length_histogram(lengths: &[usize]) -> Vec<(String, usize)> {
    let bins = [
        (0, 100, "0-100"),
        (100, 500, "100-500"),
        (500, 1000, "500-1K"),
        (1000, 5000, "1K-5K"),
        (5000, 10000, "5K-10K"),
        (10000, 50000, "10K-50K"),
        (50000, 100000, "50K-100K"),
        (100000, 1000000, "100K-1M"),
        (1000000, usize::MAX, ">1M"),
    ];

    let mut histogram: Vec<(String, usize)> =
        bins.iter().map(|(_, _, label)| (label.to_string(), 0)).collect();
    for &len in lengths {
        if let Some(i) = bins.iter().position(|&(min, max, _)| len >= min && len < max) {
            histogram[i].1 += 1;
        }
    }
    histogram
}

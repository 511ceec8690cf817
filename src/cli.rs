//! Command-line interface for readgraph

use crate::graph::{Graph, GraphConfig};
use crate::input::{read_fasta_file, read_paf_file};
use crate::sequence::is_valid_sequence;
use crate::stats::AssemblyStats;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// readgraph - incremental read-overlap assembly graphs
#[derive(Parser)]
#[command(name = "readgraph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging and detailed reports
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Build an assembly graph from reads and overlaps
    Assemble {
        /// Reads in FASTA format (optionally gzipped)
        #[arg(short, long)]
        reads: PathBuf,

        /// Overlaps in PAF format with cg:Z: tags (optionally gzipped)
        #[arg(short = 'p', long)]
        overlaps: PathBuf,

        /// Write contig sequences to this FASTA file
        #[arg(short, long)]
        contigs: Option<PathBuf>,

        /// Output format for statistics (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Output file for statistics (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Ignore overlaps whose trimmed alignment covers fewer reference bases
        #[arg(long, default_value_t = 1)]
        min_overlap: usize,

        /// Skip the structural audit after each overlap and at the end
        #[arg(long)]
        no_check: bool,

        /// Do not rejoin contig fragments and merge adjacent chunks
        #[arg(long)]
        no_compact: bool,

        /// Abort on the first rejected overlap instead of skipping it
        #[arg(long)]
        strict: bool,
    },

    /// Check reads and overlaps for consistency without assembling
    Validate {
        /// Reads in FASTA format (optionally gzipped)
        #[arg(short, long)]
        reads: PathBuf,

        /// Overlaps in PAF format with cg:Z: tags (optionally gzipped)
        #[arg(short = 'p', long)]
        overlaps: PathBuf,
    },
}

/// Run the CLI application
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Assemble {
            reads,
            overlaps,
            contigs,
            format,
            output,
            min_overlap,
            no_check,
            no_compact,
            strict,
        } => {
            let config = GraphConfig {
                check_after_overlap: !no_check,
                compact_after_overlap: !no_compact,
                min_overlap_len: min_overlap,
            };
            let options = AssembleOptions {
                contigs: contigs.as_deref(),
                format: &format,
                output: output.as_deref(),
                strict,
                final_check: !no_check,
            };
            cmd_assemble(&reads, &overlaps, config, &options)
        }
        Commands::Validate { reads, overlaps } => cmd_validate(&reads, &overlaps, cli.verbose),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("readgraph=debug,info")
    } else {
        EnvFilter::new("readgraph=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn create_spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn create_progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} overlaps ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

struct AssembleOptions<'a> {
    contigs: Option<&'a Path>,
    format: &'a str,
    output: Option<&'a Path>,
    strict: bool,
    final_check: bool,
}

fn load_graph(reads: &Path, config: GraphConfig) -> Result<Graph> {
    let records = read_fasta_file(reads).with_context(|| format!("failed to read {}", reads.display()))?;
    let mut graph = Graph::with_config(config);
    for record in records {
        graph
            .add_read(&record.name, &record.seq)
            .with_context(|| format!("failed to add read from {}", reads.display()))?;
    }
    Ok(graph)
}

fn cmd_assemble(reads: &Path, overlaps: &Path, config: GraphConfig, options: &AssembleOptions) -> Result<()> {
    let spinner = create_spinner("Reading input files...")?;
    let start = Instant::now();

    let mut graph = load_graph(reads, config)?;
    let records = read_paf_file(overlaps).with_context(|| format!("failed to read {}", overlaps.display()))?;
    spinner.finish_with_message(format!(
        "Loaded {} reads and {} overlaps in {:.2?}",
        graph.num_reads(),
        records.len(),
        start.elapsed()
    ));

    let pb = create_progress_bar(records.len() as u64)?;
    let (mut applied, mut skipped) = (0usize, 0usize);
    for record in &records {
        let result = record.to_overlap(&graph).and_then(|overlap| graph.add_overlap(&overlap));
        match result {
            Ok(()) => applied += 1,
            Err(e) if options.strict => {
                pb.abandon();
                return Err(e).with_context(|| format!("{}:{}", overlaps.display(), record.line));
            }
            Err(e) => {
                warn!("Skipping overlap at line {}: {}", record.line, e);
                skipped += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");
    info!(
        "Applied {} overlaps, skipped {} in {:.2?}",
        applied,
        skipped,
        start.elapsed()
    );

    if options.final_check {
        if let Err(violation) = graph.validate() {
            bail!("Assembly graph audit failed: {}", violation);
        }
        debug!("Assembly graph audit passed");
    }

    if let Some(path) = options.contigs {
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        graph.write_contigs_fasta(BufWriter::new(file))?;
        eprintln!("Contigs written to: {}", path.display());
    }

    let stats = AssemblyStats::from_graph(&graph);
    let output_text = match options.format.to_lowercase().as_str() {
        "json" => stats.to_json()?,
        _ => format!(
            "Overlaps applied: {} (skipped {})\n\n{}",
            applied,
            skipped,
            stats.format_summary()
        ),
    };

    if let Some(output_path) = options.output {
        std::fs::write(output_path, &output_text)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        println!("Statistics written to: {}", output_path.display());
    } else {
        println!("{}", output_text);
    }

    Ok(())
}

fn print_issues(title: &str, symbol: &str, issues: &[String], verbose: bool) {
    println!("{} ({}):", title, issues.len());
    let shown = if verbose { issues.len() } else { 5 };
    for issue in issues.iter().take(shown) {
        println!("  {} {}", symbol, issue);
    }
    if issues.len() > shown {
        println!("  ... and {} more {}", issues.len() - shown, title.to_lowercase());
    }
}

fn cmd_validate(reads: &Path, overlaps: &Path, verbose: bool) -> Result<()> {
    let spinner = create_spinner("Validating input files...")?;
    let start = Instant::now();

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let fasta = read_fasta_file(reads).with_context(|| format!("failed to read {}", reads.display()))?;
    let records = read_paf_file(overlaps).with_context(|| format!("failed to read {}", overlaps.display()))?;
    spinner.finish_with_message(format!("Files parsed in {:.2?}", start.elapsed()));

    let mut graph = Graph::new();
    for record in &fasta {
        if !is_valid_sequence(&record.seq) {
            warnings.push(format!("Read '{}' contains non-ACGTN bases", record.name));
        }
        if let Err(e) = graph.add_read(&record.name, &record.seq) {
            errors.push(e.to_string());
        }
    }

    let mut short = 0;
    for record in &records {
        match record.to_overlap(&graph).and_then(|overlap| graph.check_overlap(&overlap)) {
            Ok(true) => {}
            Ok(false) => short += 1,
            Err(e) => errors.push(format!("line {}: {}", record.line, e)),
        }
    }
    if short > 0 {
        warnings.push(format!("{} overlaps trim to nothing and would be ignored", short));
    }

    println!("\n=== Validation Results ===\n");
    println!("Reads: {}", fasta.len());
    println!("Overlaps: {}", records.len());
    println!();

    if errors.is_empty() && warnings.is_empty() {
        println!("✓ No issues found");
    } else {
        if !errors.is_empty() {
            print_issues("Errors", "✗", &errors, verbose);
            println!();
        }
        if !warnings.is_empty() {
            print_issues("Warnings", "⚠", &warnings, verbose);
        }
    }

    if errors.is_empty() {
        println!("\n✓ Validation passed");
    } else {
        println!("\n✗ Validation failed with {} errors", errors.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_assemble() {
        let cli = Cli::try_parse_from([
            "readgraph", "assemble", "-r", "reads.fa", "-p", "ovl.paf", "--strict", "--min-overlap", "20",
        ])
        .unwrap();
        assert!(!cli.verbose);
        match cli.command {
            Commands::Assemble {
                reads,
                overlaps,
                strict,
                min_overlap,
                format,
                no_check,
                ..
            } => {
                assert_eq!(reads, PathBuf::from("reads.fa"));
                assert_eq!(overlaps, PathBuf::from("ovl.paf"));
                assert!(strict);
                assert!(!no_check);
                assert_eq!(min_overlap, 20);
                assert_eq!(format, "text");
            }
            _ => panic!("Expected Assemble command"),
        }
    }

    #[test]
    fn test_cli_parse_validate_verbose() {
        let cli = Cli::try_parse_from(["readgraph", "validate", "-r", "reads.fa", "-p", "ovl.paf", "-v"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Validate { reads, .. } => assert_eq!(reads, PathBuf::from("reads.fa")),
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_cli_requires_overlaps() {
        assert!(Cli::try_parse_from(["readgraph", "assemble", "-r", "reads.fa"]).is_err());
    }
}

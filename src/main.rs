//! readgraph - command-line front end
//!
//! Builds an assembly graph from FASTA reads and PAF overlaps.

use readgraph::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

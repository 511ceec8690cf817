use readgraph::mutation::MutationKind;
use readgraph::sequence::reverse_complement;
use readgraph::{Graph, Overlap};

fn overlap(graph: &Graph, a: &str, b: &str, r1: (usize, usize), r2: (usize, usize), rc: bool, cigar: &str) -> Overlap {
    Overlap {
        read1: graph.read_by_name(a).unwrap(),
        read2: graph.read_by_name(b).unwrap(),
        r1_start: r1.0,
        r1_len: r1.1,
        r2_start: r2.0,
        r2_len: r2.1,
        reverse_complement: rc,
        cigar: cigar.to_string(),
    }
}

fn build(reads: &[(&str, &[u8])]) -> Graph {
    let mut graph = Graph::new();
    for (name, seq) in reads {
        graph.add_read(name, seq).unwrap();
    }
    graph
}

fn assert_reconstructs(graph: &Graph, reads: &[(&str, &[u8])]) {
    for (name, seq) in reads {
        let read = graph.read_by_name(name).unwrap();
        assert_eq!(
            String::from_utf8(graph.read_sequence(read)).unwrap(),
            String::from_utf8(seq.to_vec()).unwrap(),
            "read {}",
            name
        );
    }
    assert!(graph.check_all(), "{:?}", graph.validate());
}

// Contig sequences plus (start, end, alt) of every mutation, sorted.
fn layout(graph: &Graph) -> (Vec<Vec<u8>>, Vec<(usize, usize, Vec<u8>)>) {
    let mut contigs: Vec<_> = graph.contigs().map(|(_, c)| c.seq().to_vec()).collect();
    contigs.sort();
    let mut mutations = Vec::new();
    for (handle, contig) in graph.contigs() {
        for (m, range) in graph.contig_mutations(handle, 0..contig.len()) {
            let alt = graph.mutation(m).alt_seq().unwrap_or_default().to_vec();
            mutations.push((range.start, range.end, alt));
        }
    }
    mutations.sort();
    (contigs, mutations)
}

#[test]
fn test_perfect_overlap_scenario() {
    let reads: &[(&str, &[u8])] = &[("r1", b"AAACCCGGGTTT"), ("r2", b"CCCGGGTTTAAA")];
    let mut graph = build(reads);
    graph.add_overlap(&overlap(&graph, "r1", "r2", (3, 9), (0, 9), false, "9=")).unwrap();

    assert_eq!(graph.num_contigs(), 1);
    assert_eq!(graph.num_mutations(), 0);
    let (_, contig) = graph.contigs().next().unwrap();
    assert_eq!(contig.len(), 15);
    assert_eq!(contig.seq(), b"AAACCCGGGTTTAAA");

    let r1 = graph.read_by_name("r1").unwrap();
    let r2 = graph.read_by_name("r2").unwrap();
    let (c1, c2) = (graph.read_chunks(r1), graph.read_chunks(r2));
    assert_eq!((c1.len(), c2.len()), (1, 1));
    let (a, b) = (graph.chunk(c1[0]).contig_range(), graph.chunk(c2[0]).contig_range());
    assert_ne!(a, b);
    assert!(a.start < b.end && b.start < a.end);
    assert_reconstructs(&graph, reads);
}

#[test]
fn test_mismatch_scenario() {
    let reads: &[(&str, &[u8])] = &[("r1", b"AAACCCGGGTTT"), ("r2", b"CCCGGGTTTAAA")];
    let mut graph = build(reads);
    graph.add_overlap(&overlap(&graph, "r1", "r2", (3, 9), (0, 9), false, "3=1X5=")).unwrap();

    assert_eq!(graph.num_contigs(), 1);
    assert_eq!(graph.num_mutations(), 1);
    let (contig, c) = graph.contigs().next().unwrap();
    let (m, range) = graph.contig_mutations(contig, 0..c.len()).next().unwrap();
    assert_eq!(range.len(), 1);
    assert_eq!(range.start, 6);
    assert_eq!(graph.mutation(m).kind(), MutationKind::Substitution);
    let observers = graph.observers(contig, m);
    assert_eq!(observers.len(), 1);
    assert_eq!(graph.chunk(observers[0]).read(), graph.read_by_name("r2").unwrap());
    assert_reconstructs(&graph, reads);
}

#[test]
fn test_reverse_complement_scenario() {
    let forward = b"CCCGGGTTTAAA";
    let r2 = reverse_complement(forward);
    let reads: &[(&str, &[u8])] = &[("r1", b"AAACCCGGGTTT"), ("r2", &r2)];
    let mut graph = build(reads);
    graph.add_overlap(&overlap(&graph, "r1", "r2", (3, 9), (3, 9), true, "9=")).unwrap();

    assert_eq!(graph.num_contigs(), 1);
    let (_, contig) = graph.contigs().next().unwrap();
    assert_eq!(contig.seq(), b"AAACCCGGGTTTAAA");
    let chunks = graph.read_chunks(graph.read_by_name("r2").unwrap());
    assert_eq!(chunks.len(), 1);
    assert!(graph.chunk(chunks[0]).is_reverse());
    assert_reconstructs(&graph, reads);
}

#[test]
fn test_deletion_scenario() {
    let reads: &[(&str, &[u8])] = &[("r1", b"GATTACAGATTACA"), ("r2", b"TACAATTACATT")];
    let mut graph = build(reads);
    graph.add_overlap(&overlap(&graph, "r1", "r2", (3, 11), (0, 10), false, "4=1D6=")).unwrap();

    assert_eq!(graph.num_contigs(), 1);
    let (contig, c) = graph.contigs().next().unwrap();
    assert_eq!(c.seq(), b"GATTACAGATTACATT");
    let (m, range) = graph.contig_mutations(contig, 0..c.len()).next().unwrap();
    assert_eq!(range, 7..8);
    assert_eq!(graph.mutation(m).kind(), MutationKind::Deletion);
    assert_reconstructs(&graph, reads);
}

#[test]
fn test_unanchored_indels_are_trimmed() {
    let reads: &[(&str, &[u8])] = &[("r1", b"AAACCCGGGTTT"), ("r2", b"GCCCGGGTTTAAA")];
    let mut graph = build(reads);
    // The leading G stays on a contig of its own instead of becoming an insertion.
    graph.add_overlap(&overlap(&graph, "r1", "r2", (3, 9), (0, 10), false, "1I9=")).unwrap();
    assert_eq!(
        layout(&graph),
        (vec![b"AAACCCGGGTTTAAA".to_vec(), b"G".to_vec()], Vec::new())
    );
    assert_reconstructs(&graph, reads);
}

#[test]
fn test_merge_is_order_independent() {
    let s = b"ATGCGTACCTAGGATCCA";
    let reads: &[(&str, &[u8])] = &[("a", &s[0..10]), ("b", &s[4..14]), ("c", &s[8..18])];

    let mut forward = build(reads);
    forward.add_overlap(&overlap(&forward, "a", "b", (4, 6), (0, 6), false, "6=")).unwrap();
    forward.add_overlap(&overlap(&forward, "b", "c", (4, 6), (0, 6), false, "6=")).unwrap();

    let mut backward = build(reads);
    backward.add_overlap(&overlap(&backward, "b", "c", (4, 6), (0, 6), false, "6=")).unwrap();
    backward.add_overlap(&overlap(&backward, "a", "b", (4, 6), (0, 6), false, "6=")).unwrap();

    assert_eq!(layout(&forward), layout(&backward));
    assert_eq!(layout(&forward).0, vec![s.to_vec()]);
    assert_reconstructs(&forward, reads);
    assert_reconstructs(&backward, reads);
}

#[test]
fn test_shared_mutation_is_order_independent() {
    let reads: &[(&str, &[u8])] = &[
        ("r1", b"AAACCCGGGTTT"),
        ("r2", b"CCCAGGTTTAAA"),
        ("r3", b"CAGGTTTAAAGG"),
    ];

    let mut first = build(reads);
    first.add_overlap(&overlap(&first, "r1", "r2", (3, 9), (0, 9), false, "3=1X5=")).unwrap();
    first.add_overlap(&overlap(&first, "r2", "r3", (2, 10), (0, 10), false, "10=")).unwrap();

    let mut second = build(reads);
    second.add_overlap(&overlap(&second, "r2", "r3", (2, 10), (0, 10), false, "10=")).unwrap();
    second.add_overlap(&overlap(&second, "r1", "r2", (3, 9), (0, 9), false, "3=1X5=")).unwrap();

    let expected = (
        vec![b"AAACCCGGGTTTAAAGG".to_vec()],
        vec![(6, 7, b"A".to_vec())],
    );
    assert_eq!(layout(&first), expected);
    assert_eq!(layout(&second), expected);

    for graph in [&first, &second] {
        let (contig, _) = graph.contigs().next().unwrap();
        let (m, _) = graph.contig_mutations(contig, 6..7).next().unwrap();
        let mut readers: Vec<_> = graph
            .observers(contig, m)
            .into_iter()
            .map(|c| graph.read(graph.chunk(c).read()).name().to_string())
            .collect();
        readers.sort();
        assert_eq!(readers, vec!["r2", "r3"]);
        assert_reconstructs(graph, reads);
    }
}

#[test]
fn test_redundant_overlap_keeps_one_contig() {
    let s = b"ATGCGTACCTAGGATCCA";
    let reads: &[(&str, &[u8])] = &[("a", &s[0..10]), ("b", &s[4..14]), ("c", &s[8..18])];
    let mut graph = build(reads);
    graph.add_overlap(&overlap(&graph, "a", "b", (4, 6), (0, 6), false, "6=")).unwrap();
    graph.add_overlap(&overlap(&graph, "b", "c", (4, 6), (0, 6), false, "6=")).unwrap();
    graph.add_overlap(&overlap(&graph, "a", "c", (8, 2), (0, 2), false, "2=")).unwrap();

    assert_eq!(graph.num_contigs(), 1);
    assert_eq!(graph.num_chunks(), 3);
    assert_reconstructs(&graph, reads);
}

#[test]
fn test_uninvolved_read_is_untouched() {
    let reads: &[(&str, &[u8])] = &[("x", b"ACGTACGT"), ("y", b"TTTTGGGG"), ("z", b"CCCCAAAA")];
    let mut graph = build(reads);
    let z = graph.read_by_name("z").unwrap();
    let before = graph.read_chunks(z);
    graph.add_overlap(&overlap(&graph, "x", "y", (6, 2), (0, 2), false, "1X1=")).unwrap();

    assert_eq!(graph.num_contigs(), 2);
    assert_eq!(graph.read_chunks(z), before);
    assert_eq!(
        layout(&graph),
        (
            vec![b"ACGTACGTTTGGGG".to_vec(), b"CCCCAAAA".to_vec()],
            vec![(6, 7, b"T".to_vec())]
        )
    );
    assert_reconstructs(&graph, reads);
}

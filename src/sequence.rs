//! Base-level helpers shared by the graph and the alignment translator.

/// Returns the complement of a nucleotide, preserving case. Unknown symbols map to themselves.
#[inline]
pub fn complement_base(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' => b'a',
        b'N' => b'N',
        b'n' => b'n',
        other => other,
    }
}

/// Reverse complement of a sequence.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&c| complement_base(c)).collect()
}

/// Uppercases a sequence in place.
pub fn normalize_bases(seq: &mut [u8]) {
    seq.make_ascii_uppercase();
}

/// Returns `true` if every symbol is an IUPAC nucleotide code.
pub fn is_valid_sequence(seq: &[u8]) -> bool {
    seq.iter().all(|c| {
        matches!(
            c.to_ascii_uppercase(),
            b'A' | b'C' | b'G' | b'T' | b'U' | b'N' | b'R' | b'Y' | b'S' | b'W' | b'K' | b'M'
                | b'B' | b'D' | b'H' | b'V'
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"AACGTN"), b"NACGTT".to_vec());
        assert_eq!(reverse_complement(b""), Vec::<u8>::new());
        assert_eq!(reverse_complement(&reverse_complement(b"GATTACA")), b"GATTACA".to_vec());
    }

    #[test]
    fn test_validation() {
        let mut seq = b"acgtn".to_vec();
        normalize_bases(&mut seq);
        assert_eq!(seq, b"ACGTN".to_vec());
        assert!(is_valid_sequence(b"ACGTRYN"));
        assert!(!is_valid_sequence(b"ACGT-"));
    }
}

//! Signature scanner: exact substring containment over raw bytes.
//!
//! Deliberately simple — the contract is deterministic, case-sensitive
//! byte matching with no decoding or charset assumptions. The finder
//! is precompiled once per run; `memmem` keeps large binary scene
//! files cheap to scan.

use memchr::memmem::Finder;

/// Scanner for one fixed malicious byte signature.
#[derive(Debug, Clone)]
pub struct SignatureScanner {
    finder: Finder<'static>,
    marker_len: usize,
}

impl SignatureScanner {
    /// Compile the scanner for `marker`.
    #[must_use]
    pub fn new(marker: &[u8]) -> Self {
        Self {
            finder: Finder::new(marker).into_owned(),
            marker_len: marker.len(),
        }
    }

    /// Whether the marker occurs anywhere in `bytes`.
    #[must_use]
    pub fn detect(&self, bytes: &[u8]) -> bool {
        self.finder.find(bytes).is_some()
    }

    /// Length of the compiled marker in bytes.
    #[must_use]
    pub fn marker_len(&self) -> usize {
        self.marker_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn detects_marker_in_middle_of_binary_content() {
        let scanner = SignatureScanner::new(b"phage");
        let mut body = vec![0u8, 1, 255, 0x7f];
        body.extend_from_slice(b"createNode phage -n vaccine_gene;");
        body.extend_from_slice(&[0, 0, 0]);
        assert!(scanner.detect(&body));
    }

    #[test]
    fn clean_content_is_not_flagged() {
        let scanner = SignatureScanner::new(b"phage");
        assert!(!scanner.detect(b"requires maya \"2020\"; createNode transform;"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let scanner = SignatureScanner::new(b"phage");
        assert!(!scanner.detect(b"PHAGE Phage pHAGE"));
        assert!(scanner.detect(b"xxphagexx"));
    }

    #[test]
    fn no_decoding_assumptions_on_invalid_utf8() {
        let scanner = SignatureScanner::new(b"\xffsig\x00");
        assert!(scanner.detect(b"head\xff\xffsig\x00tail"));
        assert!(!scanner.detect(b"head\xffsig tail"));
    }

    #[test]
    fn marker_at_boundaries_detected() {
        let scanner = SignatureScanner::new(b"phage");
        assert!(scanner.detect(b"phage trailing"));
        assert!(scanner.detect(b"leading phage"));
        assert!(scanner.detect(b"phage"));
    }

    proptest! {
        // memmem must agree with the naive windows() search.
        #[test]
        fn detect_matches_naive_containment(
            haystack in proptest::collection::vec(any::<u8>(), 0..512),
            needle in proptest::collection::vec(any::<u8>(), 1..8),
        ) {
            let scanner = SignatureScanner::new(&needle);
            let naive = haystack
                .windows(needle.len())
                .any(|window| window == needle.as_slice());
            prop_assert_eq!(scanner.detect(&haystack), naive);
        }
    }
}

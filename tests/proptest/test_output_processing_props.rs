//! Property-based tests for output post-processing

use proptest::prelude::*;
use std::path::PathBuf;
use topaz_kernel::output::{strip_echo, ImageExtractor};

const MARKER: &str = "topaz_kernel: saved image data to: ";

proptest! {
    #[test]
    fn test_strip_echo_is_noop_without_echo(
        capture in "[a-z \r\n]{0,60}",
        echo in "[A-Z]{1,10}",
    ) {
        // Upper-case echo can never prefix a lower-case capture
        prop_assert_eq!(strip_echo(&capture, &echo), capture.as_str());
    }

    #[test]
    fn test_strip_echo_removes_exactly_the_echo(
        echo in "[a-z0-9 ]{1,20}",
        body in "[a-z0-9 ]{0,40}",
    ) {
        let capture = format!("{}\r\n{}\r\n", echo, body);
        prop_assert_eq!(strip_echo(&capture, &echo), body.as_str());
    }

    #[test]
    fn test_extraction_finds_every_marker_in_order(
        paths in prop::collection::vec("/tmp/[a-z0-9]{1,12}\\.png", 0..6),
        prose in prop::collection::vec("[a-z ]{0,20}", 7),
    ) {
        let extractor = ImageExtractor::new(MARKER).unwrap();
        let mut capture = String::new();
        for (i, path) in paths.iter().enumerate() {
            capture.push_str(&prose[i]);
            capture.push_str("\r\n");
            capture.push_str(MARKER);
            capture.push_str(path);
            capture.push_str("\r\n");
        }
        capture.push_str(&prose[paths.len()]);

        let (refs, cleaned) = extractor.extract(&capture);
        let found: Vec<PathBuf> = refs.into_iter().map(|r| r.path).collect();
        let expected: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
        prop_assert_eq!(found, expected);
        prop_assert!(!cleaned.contains(MARKER));
    }
}

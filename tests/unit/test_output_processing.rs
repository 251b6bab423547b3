//! Unit tests for output processing

use std::path::PathBuf;
use topaz_kernel::models::Command;
use topaz_kernel::output::{normalize_newlines, strip_echo, ImageExtractor, ImageReference};
use topaz_kernel::repl::PromptMatcher;

const MARKER: &str = "topaz_kernel: saved image data to: ";

#[cfg(test)]
mod output_processing_tests {
    use super::*;

    /// Prompt off, markers out, echo off, newlines normalised
    fn process(capture: &str, cell: &str) -> (Vec<ImageReference>, String) {
        let prompt = PromptMatcher::literal("topaz 1> ").unwrap();
        let extractor = ImageExtractor::new(MARKER).unwrap();
        let plan = Command::new(cell).delivery_plan().unwrap();

        let (refs, cleaned) = extractor.extract(prompt.strip_from(capture));
        (refs, normalize_newlines(strip_echo(&cleaned, &plan.echoes()[0])))
    }

    #[test]
    fn test_direct_capture() {
        let (refs, text) = process("status\r\nCurrent settings are:\r\n  user: DataCurator\r\ntopaz 1> ", "status");
        assert!(refs.is_empty());
        assert_eq!(text, "Current settings are:\n  user: DataCurator");
    }

    #[test]
    fn test_block_capture() {
        let capture = "printit\r\n3 + 4\r\n%\r\n7\r\ntopaz 1> ";
        let (_, text) = process(capture, "printit\n3 + 4\n%");
        assert_eq!(text, "7");
    }

    #[test]
    fn test_block_capture_when_sentinel_was_added() {
        let capture = "printit\r\n3 + 4\r\n%\r\n7\r\ntopaz 1> ";
        let (_, text) = process(capture, "printit\n3 + 4");
        assert_eq!(text, "7");
    }

    #[test]
    fn test_unexpected_echo_left_alone() {
        let capture = "something else\r\ntopaz 1> ";
        let (_, text) = process(capture, "status");
        assert_eq!(text, "something else\n");
    }

    #[test]
    fn test_images_removed_from_text() {
        let capture = format!(
            "run\r\nplot\r\n%\r\nhead\r\n{m}/tmp/one.png\r\n{m}/tmp/two.png\r\ntail\r\ntopaz 1> ",
            m = MARKER
        );
        let (refs, text) = process(&capture, "run\nplot\n%");

        assert_eq!(
            refs.iter().map(|r| r.path.clone()).collect::<Vec<_>>(),
            vec![PathBuf::from("/tmp/one.png"), PathBuf::from("/tmp/two.png")]
        );
        assert_eq!(text, "head\ntail");
        assert!(!text.contains(MARKER));
    }

    #[test]
    fn test_marker_mid_line_keeps_surrounding_text() {
        let extractor = ImageExtractor::new(MARKER).unwrap();
        let (refs, cleaned) = extractor.extract(&format!("x {}/tmp/p.png y", MARKER));
        assert_eq!(refs.len(), 1);
        assert_eq!(cleaned, "x y");
    }
}

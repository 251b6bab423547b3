//! Output post-processing
//!
//! Turns a raw capture from the child into what the notebook shows: the
//! prompt and the terminal's echo of the input come off, image markers are
//! pulled out and resolved into display payloads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::messages::DisplayData;

pub const SVG_MIME_TYPE: &str = "image/svg+xml";

/// Why an image marker could not be displayed. The message is shown to the
/// user verbatim.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Cannot read image file {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Not a valid image: {}", .path.display())]
    Invalid { path: PathBuf },
}

/// A file named by an image marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub path: PathBuf,
}

/// Finds image markers in captured text
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    pattern: Regex,
}

impl ImageExtractor {
    /// `marker` is the literal text that precedes the file path
    pub fn new(marker: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"{}(\S+)[ \t]*(\r?\n)?", regex::escape(marker)))?;
        Ok(Self { pattern })
    }

    /// Pull out every marker, left to right. The returned text has the
    /// markers (and the line breaks ending them) removed and is otherwise
    /// untouched.
    pub fn extract(&self, capture: &str) -> (Vec<ImageReference>, String) {
        let references = self
            .pattern
            .captures_iter(capture)
            .filter_map(|caps| caps.get(1))
            .map(|path| ImageReference {
                path: PathBuf::from(path.as_str()),
            })
            .collect();
        let cleaned = self.pattern.replace_all(capture, "").into_owned();
        (references, cleaned)
    }
}

/// Remove the terminal's echo of `echo` from the front of `capture`.
///
/// Applies only when the capture starts with the echo followed by a line
/// terminator; the echo, that terminator and one trailing terminator are
/// removed. Otherwise the capture comes back unchanged.
pub fn strip_echo<'a>(capture: &'a str, echo: &str) -> &'a str {
    let Some(rest) = capture.strip_prefix(echo) else {
        return capture;
    };
    let Some(body) = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
    else {
        return capture;
    };
    body.strip_suffix("\r\n")
        .or_else(|| body.strip_suffix('\n'))
        .unwrap_or(body)
}

/// Convert terminal line endings to plain newlines
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Read an image file into a display payload.
///
/// The format is sniffed from the content; SVG is recognised by extension or
/// by its leading markup and sent as text, everything else base64 encoded.
pub fn resolve_image(
    reference: &ImageReference,
    remove_after_read: bool,
) -> std::result::Result<DisplayData, ImageError> {
    let path = reference.path.as_path();
    let bytes = std::fs::read(path).map_err(|source| ImageError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    if remove_after_read {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Could not remove image file {}: {}", path.display(), e);
        }
    }

    if is_svg(path, &bytes) {
        let text = String::from_utf8(bytes).map_err(|_| ImageError::Invalid {
            path: path.to_path_buf(),
        })?;
        return Ok(DisplayData::single(SVG_MIME_TYPE, text));
    }

    let format = image::guess_format(&bytes).map_err(|_| ImageError::Invalid {
        path: path.to_path_buf(),
    })?;
    debug!("Image {} sniffed as {:?}", path.display(), format);
    Ok(DisplayData::single(
        format.to_mime_type(),
        STANDARD.encode(&bytes),
    ))
}

fn is_svg(path: &Path, bytes: &[u8]) -> bool {
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false);
    if by_extension {
        return true;
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

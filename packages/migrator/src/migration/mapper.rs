//! Filename → observation mapping.
//!
//! Source filenames encode which observations a file belongs to:
//!
//! - `6602.jpg`: single observation 6602
//! - `6602a.jpg`: one of several files for observation 6602
//! - `6000-6001.jpg`: one file covering observations 6000 through 6001
//!
//! Anything else is flagged invalid for manual review. Parsing is pure and
//! does no I/O.

use serde::{Deserialize, Serialize};

pub const VALID_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "mp4", "mov", "avi"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenamePattern {
    Single,
    Multiple,
    Range,
    Invalid,
}

/// Result of classifying one source filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub pattern: FilenamePattern,
    /// Observation keys this file maps to. Empty iff `pattern` is Invalid.
    pub sequential_ids: Vec<u64>,
    /// Lowercase extension without the leading dot; may be empty.
    pub extension: String,
    pub original_filename: String,
    /// Why the filename is invalid; present iff `pattern` is Invalid.
    pub error: Option<String>,
}

impl ParsedFilename {
    fn invalid(filename: &str, extension: String, error: String) -> Self {
        Self {
            pattern: FilenamePattern::Invalid,
            sequential_ids: Vec::new(),
            extension,
            original_filename: filename.to_string(),
            error: Some(error),
        }
    }

    fn valid(
        filename: &str,
        pattern: FilenamePattern,
        sequential_ids: Vec<u64>,
        extension: String,
    ) -> Self {
        Self {
            pattern,
            sequential_ids,
            extension,
            original_filename: filename.to_string(),
            error: None,
        }
    }
}

/// Whether an extension (with or without leading dot, any case) is a
/// supported media extension.
pub fn is_valid_extension(extension: &str) -> bool {
    let ext = extension.trim_start_matches('.').to_lowercase();
    VALID_EXTENSIONS.contains(&ext.as_str())
}

/// Storage key for a file: `media/{observation_id}/{filename}`.
///
/// The original filename is preserved verbatim so a key can always be traced
/// back to its source file by eye.
pub fn build_s3_key(observation_id: &str, filename: &str) -> String {
    format!("media/{}/{}", observation_id, filename)
}

/// Classify a filename. Patterns are tried in fixed priority order:
/// range, multiple, single; anything else is invalid.
pub fn parse(filename: &str) -> ParsedFilename {
    let Some((stem, raw_ext)) = filename.rsplit_once('.') else {
        return ParsedFilename::invalid(
            filename,
            String::new(),
            "Missing file extension".to_string(),
        );
    };
    if raw_ext.is_empty() {
        return ParsedFilename::invalid(
            filename,
            String::new(),
            "Missing file extension".to_string(),
        );
    }

    let extension = raw_ext.to_lowercase();
    if !VALID_EXTENSIONS.contains(&extension.as_str()) {
        return ParsedFilename::invalid(
            filename,
            extension.clone(),
            format!("Unsupported extension: {extension}"),
        );
    }

    // Range: <digits>-<digits>
    if let Some((start, end)) = stem.split_once('-') {
        if let (Some(start), Some(end)) = (parse_digits(start), parse_digits(end)) {
            if start > end {
                return ParsedFilename::invalid(
                    filename,
                    extension,
                    format!("Range start ({start}) is greater than end ({end})"),
                );
            }
            return ParsedFilename::valid(
                filename,
                FilenamePattern::Range,
                (start..=end).collect(),
                extension,
            );
        }
    }

    // Multiple: <digits><one letter>
    if stem.len() >= 2 && stem.ends_with(|c: char| c.is_ascii_alphabetic()) {
        if let Some(id) = parse_digits(&stem[..stem.len() - 1]) {
            return ParsedFilename::valid(
                filename,
                FilenamePattern::Multiple,
                vec![id],
                extension,
            );
        }
    }

    // Single: <digits>
    if let Some(id) = parse_digits(stem) {
        return ParsedFilename::valid(filename, FilenamePattern::Single, vec![id], extension);
    }

    ParsedFilename::invalid(
        filename,
        extension,
        "Filename does not match any valid pattern".to_string(),
    )
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

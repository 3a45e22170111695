//! CLI output formatting.
//!
//! Each command has a `format_*` function returning lines, kept pure for
//! testability; `main` does the printing.
//!
//! ## Batch
//!
//! ```text
//! Processing 3 images
//! 001 album/beach.png → album/beach.webp (encoded)
//! 002 broken.jpg
//!     Error: failed to decode source: ...
//! 003 logo.png → logo.webp (cached)
//! ```
//!
//! ## Formats
//!
//! ```text
//! avif  image/avif
//! gif   image/gif
//! jpg   image/jpeg
//! pjpg  image/jpeg  (progressive)
//! ...
//! ```

use crate::api::Encoded;
use crate::cache::CacheStats;
use crate::imaging::{OutputFormat, SUPPORTED_FORMATS};
use crate::process::ProcessEvent;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

/// Format a single batch progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { image_count } => {
            vec![format!("Processing {}", plural(*image_count, "image"))]
        }
        ProcessEvent::ImageProcessed {
            index,
            source_path,
            output_path,
            status,
        } => vec![format!(
            "{} {} → {} ({})",
            format_index(*index),
            source_path,
            output_path,
            status
        )],
        ProcessEvent::ImageFailed {
            index,
            source_path,
            error,
        } => vec![
            format!("{} {}", format_index(*index), source_path),
            format!("{}Error: {}", indent(1), error),
        ],
    }
}

/// Closing summary of a batch.
pub fn format_batch_summary(stats: &CacheStats, failed: usize) -> Vec<String> {
    let mut lines = vec![format!("Cache: {stats}")];
    if failed > 0 {
        lines.push(format!("Failed: {}", plural(failed, "image")));
    }
    lines
}

/// Result line of a single `run`.
pub fn format_run_output(encoded: &Encoded, output: &Path) -> Vec<String> {
    vec![format!(
        "{} → {} ({}, {} bytes)",
        encoded.format,
        output.display(),
        encoded.media_type,
        encoded.bytes.len()
    )]
}

/// The supported-format table, one format per line.
pub fn format_formats_table() -> Vec<String> {
    SUPPORTED_FORMATS
        .iter()
        .map(|&(format, key, media_type)| {
            let line = format!("{key:<5} {media_type}");
            if format == OutputFormat::Pjpg {
                format!("{line}  (progressive)")
            } else {
                line
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStatus;

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn started_event_pluralizes() {
        let one = format_process_event(&ProcessEvent::Started { image_count: 1 });
        assert_eq!(one, vec!["Processing 1 image"]);
        let many = format_process_event(&ProcessEvent::Started { image_count: 12 });
        assert_eq!(many, vec!["Processing 12 images"]);
    }

    #[test]
    fn processed_event_shows_paths_and_status() {
        let lines = format_process_event(&ProcessEvent::ImageProcessed {
            index: 3,
            source_path: "album/beach.png".into(),
            output_path: "album/beach.webp".into(),
            status: CacheStatus::Cached,
        });
        assert_eq!(lines, vec!["003 album/beach.png → album/beach.webp (cached)"]);
    }

    #[test]
    fn failed_event_indents_error() {
        let lines = format_process_event(&ProcessEvent::ImageFailed {
            index: 2,
            source_path: "broken.jpg".into(),
            error: "bad bytes".into(),
        });
        assert_eq!(lines, vec!["002 broken.jpg", "    Error: bad bytes"]);
    }

    #[test]
    fn batch_summary_mentions_failures_only_when_present() {
        let mut stats = CacheStats::default();
        stats.record(CacheStatus::Encoded);
        assert_eq!(format_batch_summary(&stats, 0), vec!["Cache: 1 encoded"]);
        assert_eq!(
            format_batch_summary(&stats, 2),
            vec!["Cache: 1 encoded", "Failed: 2 images"]
        );
    }

    #[test]
    fn run_output_line() {
        let encoded = Encoded {
            bytes: vec![0; 10],
            media_type: "image/webp",
            format: OutputFormat::Webp,
        };
        assert_eq!(
            format_run_output(&encoded, Path::new("out.webp")),
            vec!["webp → out.webp (image/webp, 10 bytes)"]
        );
    }

    #[test]
    fn formats_table_lists_every_format() {
        let lines = format_formats_table();
        assert_eq!(lines.len(), SUPPORTED_FORMATS.len());
        assert_eq!(lines[0], "avif  image/avif");
        assert_eq!(lines[3], "pjpg  image/jpeg  (progressive)");
    }
}

//! The Merger: reassembles per-part Markdown into one document.
//!
//! The algorithm is a small pipeline of pure functions over a string, in the
//! same style as this codebase's Markdown post-processing pass: a regex
//! split, a filter, a sort, a join, then whitespace normalization. Keeping
//! it pure means the idempotence law ("running the Merger twice on the same
//! input produces identical output") is just a property of function
//! composition, not something the I/O layer needs to enforce.

use once_cell::sync::Lazy;
use regex::Regex;

static PART_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^--- PART (\d+) ---$").unwrap());
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

const JOIN_THRESHOLD_CHARS: usize = 100;

struct Chunk {
    label: u32,
    body: String,
}

/// Splits `content` on `--- PART n ---` marker lines. Returns `None` if no
/// marker is found at all (the whole-PDF compatibility case).
fn split_into_chunks(content: &str) -> Option<Vec<Chunk>> {
    let matches: Vec<_> = PART_MARKER.captures_iter(content).collect();
    if matches.is_empty() {
        return None;
    }

    let mut chunks = Vec::with_capacity(matches.len());
    let mut positions: Vec<(u32, usize, usize)> = Vec::with_capacity(matches.len());
    for cap in &matches {
        let whole = cap.get(0).unwrap();
        let label: u32 = cap[1].parse().unwrap_or(0);
        positions.push((label, whole.start(), whole.end()));
    }

    for i in 0..positions.len() {
        let (label, _, body_start) = positions[i];
        let body_end = positions.get(i + 1).map(|p| p.1).unwrap_or(content.len());
        let body = content[body_start..body_end].to_string();
        chunks.push(Chunk { label, body });
    }

    Some(chunks)
}

/// Filters empty chunks, sorts by numeric label (stable), and joins bodies
/// with `"\n\n"` when both neighbors exceed the 100-character threshold,
/// else `"\n"`.
fn join_chunks(mut chunks: Vec<Chunk>) -> (String, usize) {
    chunks.retain(|c| !c.body.trim().is_empty());
    chunks.sort_by_key(|c| c.label);

    let retained = chunks.len();
    let mut joined = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let trimmed = chunk.body.trim();
        if i > 0 {
            let prev_len = chunks[i - 1].body.trim().len();
            let sep = if prev_len > JOIN_THRESHOLD_CHARS && trimmed.len() > JOIN_THRESHOLD_CHARS {
                "\n\n"
            } else {
                "\n"
            };
            joined.push_str(sep);
        }
        joined.push_str(trimmed);
    }
    (joined, retained)
}

/// Collapses any run of 3+ newlines to exactly 2, trims the ends.
fn normalize_whitespace(content: &str) -> String {
    EXCESS_NEWLINES.replace_all(content, "\n\n").trim().to_string()
}

fn merged_header(retained: usize) -> String {
    format!(
        "# Merged PDF Document\n\nThis document was produced by merging {retained} PDF parts.\n\n"
    )
}

/// Runs the full merge algorithm over the item's stored Markdown. Pure: the
/// same input always yields the same output.
pub fn merge(stored_markdown: &str) -> String {
    let Some(chunks) = split_into_chunks(stored_markdown) else {
        return stored_markdown.to_string();
    };

    let (joined, retained) = join_chunks(chunks);
    let normalized = normalize_whitespace(&joined);
    format!("{}{}", merged_header(retained), normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_markers_returns_content_unchanged() {
        let content = "# Plain document\n\nNo markers here.";
        assert_eq!(merge(content), content);
    }

    #[test]
    fn two_long_parts_join_with_blank_line() {
        let long_body = "x".repeat(150);
        let content = format!(
            "\n\n--- PART 1 ---\n\n{long_body}\n\n--- PART 2 ---\n\n{long_body}\n"
        );
        let merged = merge(&content);
        assert!(merged.starts_with("# Merged PDF Document\n\nThis document was produced by merging 2 PDF parts."));
        assert!(merged.contains(&format!("{long_body}\n\n{long_body}")));
        assert!(!merged.contains("--- PART"));
    }

    #[test]
    fn short_parts_join_with_single_newline() {
        let content = "\n\n--- PART 1 ---\n\nshort one\n\n--- PART 2 ---\n\nshort two\n";
        let merged = merge(content);
        assert!(merged.ends_with("short one\nshort two"));
    }

    #[test]
    fn empty_parts_are_filtered_and_excluded_from_count() {
        let content = "\n\n--- PART 1 ---\n\nfirst\n\n--- PART 2 ---\n\n   \n\n--- PART 3 ---\n\nthird\n";
        let merged = merge(content);
        assert!(merged.contains("merging 2 PDF parts"));
        assert!(!merged.contains("   "));
    }

    #[test]
    fn zero_non_empty_parts_reports_zero_in_header() {
        let content = "\n\n--- PART 1 ---\n\n   \n\n--- PART 2 ---\n\n\n";
        let merged = merge(content);
        assert!(merged.contains("merging 0 PDF parts"));
    }

    #[test]
    fn parts_out_of_arrival_order_are_sorted_numerically() {
        let content = "\n\n--- PART 2 ---\n\nsecond\n\n--- PART 1 ---\n\nfirst\n";
        let merged = merge(content);
        let pos_first = merged.find("first").unwrap();
        let pos_second = merged.find("second").unwrap();
        assert!(pos_first < pos_second);
    }

    #[test]
    fn excess_newlines_are_collapsed_to_two() {
        let content = "\n\n--- PART 1 ---\n\nfirst\n\n\n\n\n--- PART 2 ---\n\nsecond\n";
        let merged = merge(content);
        assert!(!merged.contains("\n\n\n"));
    }

    #[test]
    fn merge_is_idempotent_when_rerun_on_its_own_output() {
        let content = "\n\n--- PART 1 ---\n\nfirst\n\n--- PART 2 ---\n\nsecond\n";
        let once = merge(content);
        // Re-running on a document with no markers (the already-merged
        // output) is the whole-PDF compatibility path: unchanged.
        let twice = merge(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn running_merge_twice_on_same_stored_markdown_is_identical() {
        let content = "\n\n--- PART 1 ---\n\nfirst\n\n--- PART 2 ---\n\nsecond\n";
        assert_eq!(merge(content), merge(content));
    }
}

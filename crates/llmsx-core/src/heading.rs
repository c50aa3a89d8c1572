//! Heading text cleanup and filename slugs.

use html_escape::decode_html_entities;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Turn raw ATX heading text into a display title.
///
/// - leading/closing `#` markers are dropped
/// - `[Label](url)` becomes `Label`
/// - `<a ...>` / `</a>` tags are removed
/// - HTML entities are decoded
/// - inner whitespace is collapsed
pub fn clean_title(raw: &str) -> String {
    let without_markers = strip_atx_markers(raw);
    let stripped = strip_links_and_anchors(without_markers);
    let decoded = decode_html_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase ASCII slug for filenames: diacritics folded, every run of
/// non-alphanumerics collapsed to a single `-`.
///
/// Returns an empty string when nothing alphanumeric survives; callers pick
/// their own fallback.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for ch in title.nfkd().filter(|c| !is_combining_mark(*c)) {
        for lower in ch.to_lowercase() {
            if lower.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(lower);
            } else {
                pending_dash = true;
            }
        }
    }

    slug
}

fn strip_atx_markers(raw: &str) -> &str {
    let trimmed = raw.trim().trim_start_matches('#').trim();
    // A closing sequence only counts when preceded by a space: `# C#` keeps its `#`.
    let closing = trimmed.trim_end_matches('#');
    if closing.len() < trimmed.len() && (closing.is_empty() || closing.ends_with(' ')) {
        closing.trim_end()
    } else {
        trimmed
    }
}

fn strip_links_and_anchors(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut output = String::with_capacity(input.len());
    let mut copied_to = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'[' => {
                if let Some((label_end, link_end)) = markdown_link_bounds(bytes, i) {
                    output.push_str(&input[copied_to..i]);
                    output.push_str(&input[i + 1..label_end]);
                    i = link_end + 1;
                    copied_to = i;
                    continue;
                }
            },
            b'<' => {
                if let Some(close) = memchr::memchr(b'>', &bytes[i + 1..]).map(|p| p + i + 1) {
                    let tag = input[i + 1..close].trim().to_ascii_lowercase();
                    if tag == "a" || tag.starts_with("a ") || tag.starts_with("/a") {
                        output.push_str(&input[copied_to..i]);
                        i = close + 1;
                        copied_to = i;
                        continue;
                    }
                }
            },
            _ => {},
        }
        i += 1;
    }

    output.push_str(&input[copied_to..]);
    output
}

/// For a `[` at `start`, find the closing `]` and the `)` ending the target.
fn markdown_link_bounds(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut idx = start + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b']' => {
                if bytes.get(idx + 1) != Some(&b'(') {
                    return None;
                }
                return closing_paren(bytes, idx + 2).map(|close| (idx, close));
            },
            _ => idx += 1,
        }
    }
    None
}

fn closing_paren(bytes: &[u8], mut pos: usize) -> Option<usize> {
    let mut depth = 1usize;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            },
            _ => {},
        }
        pos += 1;
    }
    None
}

//! Manifest section splitting on top of the tree-sitter markdown grammar.
//!
//! Only real headings split sections: a `# comment` inside a fenced code
//! block is code, not a heading, because the grammar says so. Headings
//! deeper than the split depth stay inside their parent's body untouched.

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser, TreeCursor};

use crate::heading::clean_title;
use crate::{Error, Result};

/// Default deepest heading level that starts a new section (`##`).
pub const DEFAULT_SPLIT_DEPTH: u8 = 2;

/// Title given to text that precedes the first heading.
pub const PREAMBLE_TITLE: &str = "Overview";

/// Blocks whose headings belong to the container, not the document outline.
const CONTAINER_KINDS: &[&str] = &["block_quote", "list_item"];

/// One heading-delimited span of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Cleaned heading text.
    pub title: String,
    /// Heading level (1-6); 0 for the preamble.
    pub level: u8,
    /// Text between this heading and the next splitting heading, with
    /// surrounding blank lines removed.
    pub body: String,
    /// 1-based line of the heading (or of the preamble's first line).
    pub start_line: usize,
    /// 1-based last line belonging to the section.
    pub end_line: usize,
}

struct HeadingMark {
    level: u8,
    title: String,
    start_byte: usize,
    end_byte: usize,
}

/// Splits manifest text into [`Section`]s.
pub struct SectionParser {
    parser: Parser,
    split_depth: u8,
}

impl SectionParser {
    /// Create a parser that splits at `#` and `##` headings.
    pub fn new() -> Result<Self> {
        Self::with_split_depth(DEFAULT_SPLIT_DEPTH)
    }

    /// Create a parser that splits at headings of level `1..=depth`.
    ///
    /// `depth` is clamped to `1..=6`.
    pub fn with_split_depth(depth: u8) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_md::LANGUAGE.into())
            .map_err(|e| Error::Parse(format!("Failed to set language: {e}")))?;

        Ok(Self {
            parser,
            split_depth: depth.clamp(1, 6),
        })
    }

    /// Deepest heading level that starts a section.
    pub const fn split_depth(&self) -> u8 {
        self.split_depth
    }

    /// Split `text` into sections.
    ///
    /// Whitespace-only input yields no sections. Text without any splitting
    /// heading becomes a single [`PREAMBLE_TITLE`] section.
    pub fn parse(&mut self, text: &str) -> Result<Vec<Section>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let tree = self
            .parser
            .parse(text, None)
            .ok_or_else(|| Error::Parse("Failed to parse markdown".into()))?;

        let mut marks = Vec::new();
        let mut cursor = tree.root_node().walk();
        walk_tree(&mut cursor, |node| {
            if CONTAINER_KINDS.contains(&node.kind()) {
                return false;
            }
            if let Some(mark) = heading_mark(node, text) {
                if mark.level <= self.split_depth {
                    marks.push(mark);
                }
            }
            true
        });

        Ok(build_sections(text, &marks))
    }
}

fn build_sections(text: &str, marks: &[HeadingMark]) -> Vec<Section> {
    let total_lines = text.lines().count().max(1);
    let mut sections = Vec::with_capacity(marks.len() + 1);

    let preamble_end = marks.first().map_or(text.len(), |m| m.start_byte);
    if let Some(body) = trim_blank_lines(&text[..preamble_end]) {
        let start_line = line_of(text, body_offset(text, body));
        sections.push(Section {
            title: PREAMBLE_TITLE.to_string(),
            level: 0,
            body: body.to_string(),
            start_line,
            end_line: last_line_before(text, preamble_end),
        });
    }

    for (idx, mark) in marks.iter().enumerate() {
        let next_start = marks.get(idx + 1).map_or(text.len(), |m| m.start_byte);
        let body_start = mark.end_byte.min(next_start);
        let body = trim_blank_lines(&text[body_start..next_start]).unwrap_or_default();

        let end_line = if idx + 1 < marks.len() {
            last_line_before(text, next_start)
        } else {
            total_lines
        };

        sections.push(Section {
            title: if mark.title.is_empty() {
                "Untitled".to_string()
            } else {
                mark.title.clone()
            },
            level: mark.level,
            body: body.to_string(),
            start_line: line_of(text, mark.start_byte),
            end_line,
        });
    }

    sections
}

fn heading_mark(node: Node, text: &str) -> Option<HeadingMark> {
    let raw = &text[node.byte_range()];
    let (level, title) = match node.kind() {
        "atx_heading" => {
            let level = atx_level(node)?;
            let first_line = raw.lines().next().unwrap_or_default();
            (level, clean_title(first_line))
        },
        "setext_heading" => {
            let level = setext_level(node)?;
            let lines: Vec<&str> = raw.trim_end().lines().collect();
            let content = lines.split_last().map(|(_, rest)| rest.join(" ")).unwrap_or_default();
            (level, clean_title(&content))
        },
        _ => return None,
    };

    Some(HeadingMark {
        level,
        title,
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
    })
}

fn atx_level(node: Node) -> Option<u8> {
    let mut cursor = node.walk();
    let level = node.children(&mut cursor).find_map(|child| match child.kind() {
        "atx_h1_marker" => Some(1),
        "atx_h2_marker" => Some(2),
        "atx_h3_marker" => Some(3),
        "atx_h4_marker" => Some(4),
        "atx_h5_marker" => Some(5),
        "atx_h6_marker" => Some(6),
        _ => None,
    });
    level
}

fn setext_level(node: Node) -> Option<u8> {
    let mut cursor = node.walk();
    let level = node.children(&mut cursor).find_map(|child| match child.kind() {
        "setext_h1_underline" => Some(1),
        "setext_h2_underline" => Some(2),
        _ => None,
    });
    level
}

/// Depth-first pre-order traversal; `visit` returns whether to descend.
fn walk_tree<F>(cursor: &mut TreeCursor, mut visit: F)
where
    F: FnMut(Node) -> bool,
{
    loop {
        let descend = visit(cursor.node());

        if (descend && cursor.goto_first_child()) || cursor.goto_next_sibling() {
            continue;
        }

        loop {
            if !cursor.goto_parent() {
                return;
            }
            if cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

/// Drop leading and trailing whitespace-only lines; `None` if nothing remains.
fn trim_blank_lines(slice: &str) -> Option<&str> {
    let first_content = slice.find(|c: char| !c.is_whitespace())?;
    let line_start = slice[..first_content].rfind('\n').map_or(0, |nl| nl + 1);
    Some(slice[line_start..].trim_end())
}

/// Byte offset of `sub` within `text`; `sub` must be a subslice of `text`.
fn body_offset(text: &str, sub: &str) -> usize {
    (sub.as_ptr() as usize).saturating_sub(text.as_ptr() as usize)
}

/// 1-based line number containing byte `offset`.
fn line_of(text: &str, offset: usize) -> usize {
    let offset = offset.min(text.len());
    memchr::memchr_iter(b'\n', &text.as_bytes()[..offset]).count() + 1
}

/// 1-based line number of the last line that ends before `offset`.
fn last_line_before(text: &str, offset: usize) -> usize {
    line_of(text, offset).saturating_sub(1).max(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<Section> {
        SectionParser::new().unwrap().parse(text).unwrap()
    }

    fn titles(sections: &[Section]) -> Vec<&str> {
        sections.iter().map(|s| s.title.as_str()).collect()
    }

    #[test]
    fn test_single_heading() {
        let sections = parse("# Title\n\nBody text");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Title");
        assert_eq!(sections[0].level, 1);
        assert_eq!(sections[0].body, "Body text");
        assert_eq!(sections[0].start_line, 1);
        assert_eq!(sections[0].end_line, 3);
    }

    #[test]
    fn test_splits_at_h1_and_h2_only() {
        let text = "# Hono\n\n> Web framework\n\n## Docs\n\n- [Routing](https://hono.dev/routing)\n\n### Details\n\nnested\n\n## Examples\n\n- [Basic](https://hono.dev/basic)\n";
        let sections = parse(text);

        assert_eq!(titles(&sections), vec!["Hono", "Docs", "Examples"]);
        assert_eq!(sections[0].body, "> Web framework");
        assert!(sections[1].body.contains("### Details"));
        assert!(sections[1].body.contains("nested"));
        assert_eq!(sections[2].level, 2);
    }

    #[test]
    fn test_custom_split_depth() {
        let text = "# A\n\n## B\n\n### C\n\ntext\n";
        let mut parser = SectionParser::with_split_depth(3).unwrap();
        let sections = parser.parse(text).unwrap();
        assert_eq!(titles(&sections), vec!["A", "B", "C"]);

        let mut parser = SectionParser::with_split_depth(1).unwrap();
        let sections = parser.parse(text).unwrap();
        assert_eq!(titles(&sections), vec!["A"]);
    }

    #[test]
    fn test_headings_in_code_fences_are_ignored() {
        let text = "# Setup\n\n```bash\n# install deps\nnpm install\n```\n\n## Usage\n\nRun it.\n";
        let sections = parse(text);

        assert_eq!(titles(&sections), vec!["Setup", "Usage"]);
        assert!(sections[0].body.contains("# install deps"));
    }

    #[test]
    fn test_headings_inside_quotes_and_lists_stay_in_body() {
        let text = "# Guide\n\nIntro\n\n> ## Note\n>\n> Careful.\n\n- ## Step one\n- Step two\n\n## Next\n\nDone\n";
        let sections = parse(text);

        assert_eq!(titles(&sections), vec!["Guide", "Next"]);
        assert!(sections[0].body.contains("> ## Note"));
        assert!(sections[0].body.contains("- ## Step one"));
    }

    #[test]
    fn test_preamble_becomes_overview() {
        let sections = parse("Some intro text.\n\n# First\n\ncontent\n");
        assert_eq!(titles(&sections), vec![PREAMBLE_TITLE, "First"]);
        assert_eq!(sections[0].level, 0);
        assert_eq!(sections[0].body, "Some intro text.");
        assert_eq!(sections[0].start_line, 1);
        assert_eq!(sections[1].start_line, 3);
    }

    #[test]
    fn test_text_without_headings_is_one_section() {
        let sections = parse("just a paragraph\nwith two lines\n");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, PREAMBLE_TITLE);
        assert_eq!(sections[0].body, "just a paragraph\nwith two lines");
    }

    #[test]
    fn test_blank_input_has_no_sections() {
        assert!(parse("").is_empty());
        assert!(parse("  \n\n\t\n").is_empty());
    }

    #[test]
    fn test_heading_titles_are_cleaned() {
        let sections = parse("# [Guide](https://example.com) &amp; More ##\n\nbody\n");
        assert_eq!(sections[0].title, "Guide & More");
    }

    #[test]
    fn test_setext_headings_split() {
        let sections = parse("Title\n=====\n\nintro\n\nPart\n----\n\nmore\n");
        assert_eq!(titles(&sections), vec!["Title", "Part"]);
        assert_eq!(sections[1].level, 2);
        assert_eq!(sections[1].body, "more");
    }

    #[test]
    fn test_heading_with_empty_body() {
        let sections = parse("# Empty\n# Full\n\ntext\n");
        assert_eq!(titles(&sections), vec!["Empty", "Full"]);
        assert_eq!(sections[0].body, "");
        assert_eq!(sections[0].end_line, 1);
    }

    #[test]
    fn test_line_ranges_are_contiguous() {
        let text = "# One\na\nb\n## Two\nc\n# Three\nd\n";
        let sections = parse(text);
        let ranges: Vec<(usize, usize)> = sections.iter().map(|s| (s.start_line, s.end_line)).collect();
        assert_eq!(ranges, vec![(1, 3), (4, 5), (6, 7)]);
    }
}
